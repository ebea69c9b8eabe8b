use crate::core::types::ElementId;
use std::collections::{HashMap, HashSet};

/// Topological sorting of the element-level dependency graph
pub struct ExecutionOrderBuilder;

impl ExecutionOrderBuilder {
    /// Build a topologically sorted execution order organized into stages.
    ///
    /// Elements inside one stage have no edges between them and may run
    /// concurrently. Within a stage elements keep the order of `elements`
    /// (registration order). Edges naming unknown elements and self-edges
    /// are ignored. On a cycle the error carries every element that could
    /// not be scheduled, in registration order.
    pub fn build_execution_order_stages(
        elements: &[ElementId],
        edges: &[(ElementId, ElementId)],
    ) -> Result<Vec<Vec<ElementId>>, Vec<ElementId>> {
        let mut adj_list: HashMap<ElementId, Vec<ElementId>> = HashMap::new();
        let mut in_degree: HashMap<ElementId, usize> = HashMap::new();

        for id in elements {
            in_degree.insert(*id, 0);
            adj_list.insert(*id, Vec::new());
        }

        let mut seen = HashSet::new();
        for &(source, target) in edges {
            if source == target || !in_degree.contains_key(&source) || !in_degree.contains_key(&target) {
                continue;
            }
            if !seen.insert((source, target)) {
                continue;
            }
            if let Some(neighbors) = adj_list.get_mut(&source) {
                neighbors.push(target);
            }
            if let Some(degree) = in_degree.get_mut(&target) {
                *degree += 1;
            }
        }

        let mut stages = Vec::new();
        let mut processed = 0;

        while processed < elements.len() {
            let current_stage: Vec<ElementId> = elements
                .iter()
                .filter(|id| in_degree.get(id) == Some(&0))
                .copied()
                .collect();

            if current_stage.is_empty() {
                let remaining = elements
                    .iter()
                    .filter(|id| in_degree.contains_key(id))
                    .copied()
                    .collect();
                return Err(remaining);
            }

            for id in &current_stage {
                in_degree.remove(id);
                processed += 1;

                if let Some(neighbors) = adj_list.get(id) {
                    for neighbor in neighbors {
                        if let Some(degree) = in_degree.get_mut(neighbor) {
                            *degree -= 1;
                        }
                    }
                }
            }

            stages.push(current_stage);
        }

        Ok(stages)
    }

    /// Flattened form of [`ExecutionOrderBuilder::build_execution_order_stages`]
    pub fn build_execution_order(
        elements: &[ElementId],
        edges: &[(ElementId, ElementId)],
    ) -> Result<Vec<ElementId>, Vec<ElementId>> {
        let stages = Self::build_execution_order_stages(elements, edges)?;
        Ok(stages.into_iter().flatten().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Handle;

    fn ids(count: usize) -> Vec<ElementId> {
        (0..count).map(|_| ElementId::generate()).collect()
    }

    #[test]
    fn test_build_execution_order_stages_simple() {
        // A -> B -> C
        let n = ids(3);
        let edges = vec![(n[0], n[1]), (n[1], n[2])];

        let stages = ExecutionOrderBuilder::build_execution_order_stages(&n, &edges)
            .expect("Should build execution order");

        assert_eq!(stages, vec![vec![n[0]], vec![n[1]], vec![n[2]]]);
    }

    #[test]
    fn test_build_execution_order_stages_parallel() {
        // A -> B, A -> C, B -> D, C -> D
        let n = ids(4);
        let edges = vec![(n[0], n[1]), (n[0], n[2]), (n[1], n[3]), (n[2], n[3])];

        let stages = ExecutionOrderBuilder::build_execution_order_stages(&n, &edges)
            .expect("Should build execution order");

        assert_eq!(stages.len(), 3);
        assert_eq!(stages[0], vec![n[0]]);
        assert_eq!(stages[1], vec![n[1], n[2]]);
        assert_eq!(stages[2], vec![n[3]]);
    }

    #[test]
    fn test_independent_elements_keep_registration_order() {
        let n = ids(3);
        let order = ExecutionOrderBuilder::build_execution_order(&n, &[]).unwrap();
        assert_eq!(order, n);
    }

    #[test]
    fn test_downstream_registered_first_runs_last() {
        let n = ids(2);
        let order = ExecutionOrderBuilder::build_execution_order(&n, &[(n[1], n[0])]).unwrap();
        assert_eq!(order, vec![n[1], n[0]]);
    }

    #[test]
    fn test_duplicate_and_self_edges_ignored() {
        let n = ids(2);
        let edges = vec![(n[0], n[1]), (n[0], n[1]), (n[1], n[1])];
        let order = ExecutionOrderBuilder::build_execution_order(&n, &edges).unwrap();
        assert_eq!(order, n);
    }

    #[test]
    fn test_build_execution_order_stages_cycle_detection() {
        // A -> B -> A, C downstream of the cycle, D independent
        let n = ids(4);
        let edges = vec![(n[0], n[1]), (n[1], n[0]), (n[1], n[2])];

        let remaining = ExecutionOrderBuilder::build_execution_order_stages(&n, &edges).unwrap_err();
        assert_eq!(remaining, vec![n[0], n[1], n[2]]);
    }
}
