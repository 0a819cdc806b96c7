use super::component::ComponentOp;
use crate::error::{FilterError, FilterResult};
use std::collections::{BTreeMap, VecDeque};

/// Dependency graph over declared stages
///
/// Built once from the stage declarations; construction fails on unknown
/// dependencies, self edges and cycles, so a `StageGraph` is always a DAG.
#[derive(Debug, Clone)]
pub struct StageGraph {
    /// Stage names in declaration order
    nodes: Vec<String>,
    dependencies: BTreeMap<String, Vec<String>>,
    dependants: BTreeMap<String, Vec<String>>,
    order: Vec<String>,
}

impl StageGraph {
    pub fn build(ops: &[ComponentOp]) -> FilterResult<Self> {
        let nodes: Vec<String> = ops.iter().map(|op| op.name().to_string()).collect();
        let mut dependencies: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut dependants: BTreeMap<String, Vec<String>> = BTreeMap::new();

        for node in &nodes {
            dependencies.entry(node.clone()).or_default();
            dependants.entry(node.clone()).or_default();
        }

        for op in ops {
            for dependency in &op.dependencies {
                if dependency == op.name() {
                    return Err(FilterError::CycleDetected(op.name().to_string()));
                }
                if !dependants.contains_key(dependency) {
                    return Err(FilterError::MissingDependency {
                        stage: op.name().to_string(),
                        dependency: dependency.clone(),
                    });
                }
                dependencies
                    .entry(op.name().to_string())
                    .or_default()
                    .push(dependency.clone());
                dependants
                    .entry(dependency.clone())
                    .or_default()
                    .push(op.name().to_string());
            }
        }

        let order = topological_order(&nodes, &dependencies, &dependants)?;

        Ok(Self {
            nodes,
            dependencies,
            dependants,
            order,
        })
    }

    /// Stages in execution order; ties keep declaration order
    pub fn order(&self) -> &[String] {
        &self.order
    }

    pub fn dependencies(&self, stage: &str) -> &[String] {
        self.dependencies
            .get(stage)
            .map(|d| d.as_slice())
            .unwrap_or(&[])
    }

    pub fn dependants(&self, stage: &str) -> &[String] {
        self.dependants
            .get(stage)
            .map(|d| d.as_slice())
            .unwrap_or(&[])
    }

    pub fn roots(&self) -> Vec<&str> {
        self.nodes
            .iter()
            .filter(|n| self.dependencies(n).is_empty())
            .map(|n| n.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// True when the stages form a single chain: one root and at most one
    /// edge in and out of every stage
    pub fn is_linear_chain(&self) -> bool {
        if self.nodes.is_empty() {
            return false;
        }
        self.roots().len() == 1
            && self
                .nodes
                .iter()
                .all(|n| self.dependencies(n).len() <= 1 && self.dependants(n).len() <= 1)
    }
}

// Kahn's algorithm. The ready queue is seeded and refilled in declaration
// order so the result is deterministic.
fn topological_order(
    nodes: &[String],
    dependencies: &BTreeMap<String, Vec<String>>,
    dependants: &BTreeMap<String, Vec<String>>,
) -> FilterResult<Vec<String>> {
    let position: BTreeMap<&str, usize> = nodes
        .iter()
        .enumerate()
        .map(|(i, n)| (n.as_str(), i))
        .collect();
    let mut in_degree: BTreeMap<&str, usize> = nodes
        .iter()
        .map(|n| (n.as_str(), dependencies.get(n).map_or(0, |d| d.len())))
        .collect();

    let mut ready: VecDeque<&str> = nodes
        .iter()
        .map(|n| n.as_str())
        .filter(|n| in_degree[n] == 0)
        .collect();
    let mut order = Vec::with_capacity(nodes.len());

    while let Some(node) = ready.pop_front() {
        order.push(node.to_string());

        let mut released: Vec<&str> = Vec::new();
        for dependant in dependants.get(node).into_iter().flatten() {
            if let Some(degree) = in_degree.get_mut(dependant.as_str()) {
                *degree -= 1;
                if *degree == 0 {
                    released.push(dependant.as_str());
                }
            }
        }
        released.sort_by_key(|n| position[n]);
        ready.extend(released);
    }

    if order.len() != nodes.len() {
        let stuck: Vec<&str> = nodes
            .iter()
            .map(|n| n.as_str())
            .filter(|n| in_degree[n] > 0)
            .collect();
        return Err(FilterError::CycleDetected(stuck.join(", ")));
    }

    Ok(order)
}
