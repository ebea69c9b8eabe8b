use crate::core::components::Port;
use crate::core::error::{EngineError, Result};
use crate::core::types::ValueId;
use crate::core::values::ValueSpec;

/// Values of one port grouped by spec; specs keep first-appearance order
/// and ids keep registration order within each spec.
#[derive(Debug, Clone, Default)]
pub struct SpecGroups {
    groups: Vec<(ValueSpec, Vec<ValueId>)>,
}

impl SpecGroups {
    pub fn of(port: &Port) -> Self {
        let mut groups: Vec<(ValueSpec, Vec<ValueId>)> = Vec::new();
        for (id, value) in port.values() {
            match groups.iter_mut().find(|(spec, _)| spec == value.spec()) {
                Some((_, ids)) => ids.push(id),
                None => groups.push((value.spec().clone(), vec![id])),
            }
        }
        Self { groups }
    }

    pub fn get(&self, spec: &ValueSpec) -> Option<&[ValueId]> {
        self.groups
            .iter()
            .find(|(candidate, _)| candidate == spec)
            .map(|(_, ids)| ids.as_slice())
    }

    pub fn specs(&self) -> impl Iterator<Item = &ValueSpec> + '_ {
        self.groups.iter().map(|(spec, _)| spec)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ValueSpec, &[ValueId])> + '_ {
        self.groups.iter().map(|(spec, ids)| (spec, ids.as_slice()))
    }

    /// Specs present here but absent from `other`
    pub fn missing_from(&self, other: &SpecGroups) -> Vec<ValueSpec> {
        self.specs()
            .filter(|spec| other.get(spec).is_none())
            .cloned()
            .collect()
    }
}

/// Spec-set and multiplicity checks between the two ends of a connection
pub struct ConnectionValidator;

impl ConnectionValidator {
    /// Both sides must carry the same specs, each the same number of times.
    /// Value names are not compared.
    pub fn check_compatibility(source: &Port, destination: &Port) -> Result<()> {
        let source_groups = SpecGroups::of(source);
        let destination_groups = SpecGroups::of(destination);

        let missing_in_destination = source_groups.missing_from(&destination_groups);
        let missing_in_source = destination_groups.missing_from(&source_groups);
        if !missing_in_source.is_empty() || !missing_in_destination.is_empty() {
            return Err(EngineError::IncompatibleSpecSet {
                missing_in_source,
                missing_in_destination,
            });
        }

        for (spec, source_ids) in source_groups.iter() {
            let in_destination = destination_groups.get(spec).map_or(0, <[ValueId]>::len);
            if source_ids.len() != in_destination {
                return Err(EngineError::MultiplicityMismatch {
                    spec: spec.clone(),
                    in_source: source_ids.len(),
                    in_destination,
                });
            }
        }
        Ok(())
    }

    /// Source/destination value ids paired positionally within every shared spec
    pub fn pair_by_spec(source: &Port, destination: &Port) -> Vec<(ValueId, ValueId)> {
        let destination_groups = SpecGroups::of(destination);
        SpecGroups::of(source)
            .iter()
            .filter_map(|(spec, source_ids)| {
                destination_groups
                    .get(spec)
                    .map(|destination_ids| source_ids.iter().copied().zip(destination_ids.iter().copied()))
            })
            .flatten()
            .collect()
    }

    /// Source/destination value ids paired by identical value name
    pub fn pair_by_name(source: &Port, destination: &Port) -> Vec<(ValueId, ValueId)> {
        source
            .values()
            .filter_map(|(id, value)| destination.value_id(value.name()).map(|other| (id, other)))
            .collect()
    }
}
