use crate::core::error::{EngineError, Result};
use crate::core::types::{check_base_name, Handle, NAME_DELIMITER};
use std::collections::HashMap;

/// Kind of object a repository is configured to hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Value,
    Port,
    Element,
    Connection,
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ObjectKind::Value => "value",
            ObjectKind::Port => "port",
            ObjectKind::Element => "element",
            ObjectKind::Connection => "connection",
        };
        f.write_str(name)
    }
}

/// Objects that can be stored in an [`ObjectRepository`]
pub trait Registrable {
    type Id: Handle;

    /// Declared kind, checked against the repository's configured kind
    fn kind(&self) -> ObjectKind;

    /// Base name, unique within one repository
    fn name(&self) -> &str;
}

/// Identifier- and name-indexed store.
///
/// Keeps id → object, base name → id and id → base name, plus the
/// registration order. An optional suffix lets callers address objects by
/// their full name `<base>_<suffix>` as well as by the base name.
#[derive(Debug, Clone)]
pub struct ObjectRepository<T: Registrable> {
    kind: ObjectKind,
    suffix: Option<String>,
    objects: HashMap<T::Id, T>,
    name_to_id: HashMap<String, T::Id>,
    id_to_name: HashMap<T::Id, String>,
    order: Vec<T::Id>,
}

impl<T: Registrable> ObjectRepository<T> {
    pub fn new(kind: ObjectKind) -> Self {
        Self {
            kind,
            suffix: None,
            objects: HashMap::new(),
            name_to_id: HashMap::new(),
            id_to_name: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Repository whose entries are also reachable as `<base>_<suffix>`.
    /// A leading delimiter on `suffix` is ignored, so `"E1"` and `"_E1"` are equivalent.
    pub fn with_suffix(kind: ObjectKind, suffix: &str) -> Self {
        let trimmed = suffix.trim_start_matches(NAME_DELIMITER);
        let mut repository = Self::new(kind);
        if !trimmed.is_empty() {
            repository.suffix = Some(trimmed.to_string());
        }
        repository
    }

    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    pub fn suffix(&self) -> Option<&str> {
        self.suffix.as_deref()
    }

    pub fn full_name(&self, base_name: &str) -> String {
        match &self.suffix {
            Some(suffix) => format!("{}{}{}", base_name, NAME_DELIMITER, suffix),
            None => base_name.to_string(),
        }
    }

    fn base_name<'a>(&self, name: &'a str) -> &'a str {
        if let Some(suffix) = &self.suffix {
            if let Some(stem) = name.strip_suffix(suffix.as_str()) {
                if let Some(base) = stem.strip_suffix(NAME_DELIMITER) {
                    return base;
                }
            }
        }
        name
    }

    /// Register an object, generating an identifier unless one is supplied
    pub fn register(&mut self, object: T, id: Option<T::Id>) -> Result<T::Id> {
        if object.kind() != self.kind {
            return Err(EngineError::TypeMismatch {
                expected: self.kind.to_string(),
                found: object.kind().to_string(),
            });
        }

        let name = object.name().to_string();
        check_base_name(&name)?;
        if self.name_to_id.contains_key(&name) {
            return Err(EngineError::DuplicateName {
                name,
                repository: self.describe(),
            });
        }

        let id = match id {
            Some(id) if self.objects.contains_key(&id) => {
                return Err(EngineError::DuplicateId {
                    id: id.to_string(),
                    repository: self.describe(),
                });
            }
            Some(id) => id,
            None => T::Id::generate(),
        };

        self.objects.insert(id, object);
        self.name_to_id.insert(name.clone(), id);
        self.id_to_name.insert(id, name);
        self.order.push(id);
        Ok(id)
    }

    pub fn get_by_id(&self, id: T::Id) -> Option<&T> {
        self.objects.get(&id)
    }

    pub fn get_by_id_mut(&mut self, id: T::Id) -> Option<&mut T> {
        self.objects.get_mut(&id)
    }

    /// Resolve a base name or a full name carrying this repository's suffix
    pub fn get_by_name(&self, name: &str) -> Option<&T> {
        self.id_of_name(name).and_then(|id| self.objects.get(&id))
    }

    pub fn get_by_name_mut(&mut self, name: &str) -> Option<&mut T> {
        let id = self.id_of_name(name)?;
        self.objects.get_mut(&id)
    }

    pub fn id_of_name(&self, name: &str) -> Option<T::Id> {
        self.name_to_id.get(self.base_name(name)).copied()
    }

    /// Identity lookup: the identifier under which this exact object is stored
    pub fn get_by_object(&self, object: &T) -> Option<T::Id> {
        self.objects
            .iter()
            .find(|(_, stored)| std::ptr::eq(*stored, object))
            .map(|(id, _)| *id)
    }

    /// Positional lookup in registration order
    pub fn get_by_index(&self, index: usize) -> Option<&T> {
        self.order.get(index).and_then(|id| self.objects.get(id))
    }

    pub fn id_at(&self, index: usize) -> Option<T::Id> {
        self.order.get(index).copied()
    }

    pub fn position(&self, id: T::Id) -> Option<usize> {
        self.order.iter().position(|candidate| *candidate == id)
    }

    pub fn contains_id(&self, id: T::Id) -> bool {
        self.objects.contains_key(&id)
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.id_of_name(name).is_some()
    }

    /// Remove by identifier, purging every index. No-op if absent.
    pub fn remove(&mut self, id: T::Id) -> Option<T> {
        let object = self.objects.remove(&id)?;
        if let Some(name) = self.id_to_name.remove(&id) {
            self.name_to_id.remove(&name);
        }
        self.order.retain(|candidate| *candidate != id);
        Some(object)
    }

    pub fn remove_by_name(&mut self, name: &str) -> Option<T> {
        let id = self.id_of_name(name)?;
        self.remove(id)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Identifiers in registration order
    pub fn ids(&self) -> Vec<T::Id> {
        self.order.clone()
    }

    pub fn base_names(&self) -> Vec<&str> {
        self.order
            .iter()
            .filter_map(|id| self.id_to_name.get(id).map(String::as_str))
            .collect()
    }

    pub fn full_names(&self) -> Vec<String> {
        self.base_names()
            .into_iter()
            .map(|name| self.full_name(name))
            .collect()
    }

    /// Iterate `(id, object)` in registration order
    pub fn iter(&self) -> impl Iterator<Item = (T::Id, &T)> + '_ {
        self.order
            .iter()
            .filter_map(move |id| self.objects.get(id).map(|object| (*id, object)))
    }

    pub fn values(&self) -> impl Iterator<Item = &T> + '_ {
        self.iter().map(|(_, object)| object)
    }

    /// Unordered mutable access to every stored object
    pub(crate) fn objects_mut(&mut self) -> &mut HashMap<T::Id, T> {
        &mut self.objects
    }

    fn describe(&self) -> String {
        match &self.suffix {
            Some(suffix) => format!("{} repository '{}'", self.kind, suffix),
            None => format!("{} repository", self.kind),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::ValueId;
    use crate::core::values::{Value, ValueSpec};

    fn value(name: &str) -> Value {
        Value::new(name, ValueSpec::new("flow"))
    }

    #[test]
    fn test_register_and_lookup() {
        let mut repo = ObjectRepository::new(ObjectKind::Value);
        let id = repo.register(value("G"), None).unwrap();
        assert_eq!(repo.get_by_id(id).unwrap().name(), "G");
        assert_eq!(repo.get_by_name("G").unwrap().name(), "G");
        assert_eq!(repo.len(), 1);
    }

    #[test]
    fn test_suffix_resolves_both_names() {
        let mut repo = ObjectRepository::with_suffix(ObjectKind::Value, "_E1");
        repo.register(value("G"), None).unwrap();
        assert!(repo.get_by_name("G").is_some());
        assert!(repo.get_by_name("G_E1").is_some());
        assert!(repo.get_by_name("G_E2").is_none());
        assert_eq!(repo.full_names(), vec!["G_E1".to_string()]);
    }

    #[test]
    fn test_bulk_mutation_keeps_indices() {
        let mut repo = ObjectRepository::new(ObjectKind::Value);
        let a = repo.register(value("A"), None).unwrap();
        let b = repo.register(value("B"), None).unwrap();

        for object in repo.objects_mut().values_mut() {
            object.set(1.0, crate::core::values::ValueStatus::Fixed).unwrap();
        }
        assert_eq!(repo.ids(), vec![a, b]);
        assert_eq!(repo.id_of_name("B"), Some(b));
        assert!(repo.values().all(|v| v.is_known()));
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut repo = ObjectRepository::new(ObjectKind::Value);
        repo.register(value("G"), None).unwrap();
        let err = repo.register(value("G"), None).unwrap_err();
        assert!(matches!(err, EngineError::DuplicateName { .. }));
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut repo = ObjectRepository::new(ObjectKind::Value);
        let id = ValueId::generate();
        repo.register(value("A"), Some(id)).unwrap();
        let err = repo.register(value("B"), Some(id)).unwrap_err();
        assert!(matches!(err, EngineError::DuplicateId { .. }));
        assert!(repo.get_by_name("B").is_none());
    }

    #[test]
    fn test_delimiter_rejected() {
        let mut repo = ObjectRepository::new(ObjectKind::Value);
        let err = repo.register(value("G_1"), None).unwrap_err();
        assert!(matches!(err, EngineError::InvalidName { .. }));
    }

    #[test]
    fn test_kind_mismatch_rejected() {
        let mut repo: ObjectRepository<Value> = ObjectRepository::new(ObjectKind::Port);
        let err = repo.register(value("G"), None).unwrap_err();
        assert!(matches!(err, EngineError::TypeMismatch { .. }));
    }

    #[test]
    fn test_remove_purges_all_indices() {
        let mut repo = ObjectRepository::new(ObjectKind::Value);
        let id = repo.register(value("G"), None).unwrap();
        let removed = repo.remove(id).unwrap();

        assert!(repo.get_by_id(id).is_none());
        assert!(repo.get_by_name("G").is_none());
        assert!(repo.get_by_object(&removed).is_none());
        assert!(repo.remove(id).is_none());
        assert!(repo.register(value("G"), None).is_ok());
    }

    #[test]
    fn test_identity_lookup() {
        let mut repo = ObjectRepository::new(ObjectKind::Value);
        let id = repo.register(value("G"), None).unwrap();
        let stored = repo.get_by_id(id).unwrap();
        assert_eq!(repo.get_by_object(stored), Some(id));

        let lookalike = value("G");
        assert_eq!(repo.get_by_object(&lookalike), None);
    }

    #[test]
    fn test_registration_order_survives_removal() {
        let mut repo = ObjectRepository::new(ObjectKind::Value);
        repo.register(value("A"), None).unwrap();
        let b = repo.register(value("B"), None).unwrap();
        repo.register(value("C"), None).unwrap();
        repo.remove(b);
        assert_eq!(repo.base_names(), vec!["A", "C"]);
        assert_eq!(repo.get_by_index(1).unwrap().name(), "C");
    }
}
