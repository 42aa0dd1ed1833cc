//! Load dependency graph (DAG) construction and traversal
//!
//! Every load step declares the tables it reads and the one table it writes.
//! A step depends on the step writing each table it reads; the graph is
//! executed in topological order.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use crate::catalog::{CatalogError, Statement};

/// One step of the load pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadStep {
    pub statement: Statement,

    /// Tables the statement reads (empty for copies from object storage)
    pub reads: Vec<&'static str>,

    /// Table the statement writes
    pub writes: &'static str,
}

impl LoadStep {
    pub fn name(&self) -> &str {
        &self.statement.name
    }
}

/// Dependency graph with forward and reverse edges
#[derive(Debug, Clone)]
pub struct LoadGraph {
    /// Steps in declaration order
    steps: Vec<LoadStep>,

    /// Forward edges: step -> steps it depends on (parents)
    parents: HashMap<usize, Vec<usize>>,

    /// Reverse edges: step -> steps that depend on it (children)
    children: HashMap<usize, Vec<usize>>,

    /// Execution order (indices into `steps`)
    order: Vec<usize>,
}

impl LoadGraph {
    /// Build the graph and compute its execution order
    ///
    /// `known_tables` are the tables that exist in the schema; reading or
    /// writing anything else is rejected, as is a cycle or two steps writing
    /// the same table.
    pub fn build(steps: Vec<LoadStep>, known_tables: &[&str]) -> Result<Self, CatalogError> {
        let mut writers: HashMap<&str, usize> = HashMap::new();

        for (idx, step) in steps.iter().enumerate() {
            if !known_tables.contains(&step.writes) {
                return Err(CatalogError::UnknownTable {
                    step: step.name().to_string(),
                    table: step.writes.to_string(),
                });
            }
            if let Some(&other) = writers.get(step.writes) {
                return Err(CatalogError::DuplicateWriter {
                    table: step.writes.to_string(),
                    first: steps[other].name().to_string(),
                    second: step.name().to_string(),
                });
            }
            writers.insert(step.writes, idx);
        }

        let mut parents: HashMap<usize, Vec<usize>> = HashMap::new();
        let mut children: HashMap<usize, Vec<usize>> = HashMap::new();

        for (idx, step) in steps.iter().enumerate() {
            for table in &step.reads {
                if !known_tables.contains(table) {
                    return Err(CatalogError::UnknownTable {
                        step: step.name().to_string(),
                        table: table.to_string(),
                    });
                }

                // Tables nobody writes are read as they already are
                if let Some(&writer) = writers.get(table) {
                    parents.entry(idx).or_default().push(writer);
                    children.entry(writer).or_default().push(idx);
                }
            }
        }

        let order = Self::topological_order(steps.len(), &parents, &children)
            .ok_or_else(|| CatalogError::CycleDetected(
                steps.iter().map(|s| s.name().to_string()).collect(),
            ))?;

        Ok(Self {
            steps,
            parents,
            children,
            order,
        })
    }

    /// Kahn's algorithm; among ready steps the earliest declared runs first,
    /// so a declaration order that already respects dependencies is kept.
    fn topological_order(
        len: usize,
        parents: &HashMap<usize, Vec<usize>>,
        children: &HashMap<usize, Vec<usize>>,
    ) -> Option<Vec<usize>> {
        let mut in_degree: Vec<usize> = (0..len)
            .map(|idx| parents.get(&idx).map_or(0, Vec::len))
            .collect();

        let mut ready: BTreeSet<usize> = (0..len).filter(|&idx| in_degree[idx] == 0).collect();
        let mut result = Vec::with_capacity(len);

        while let Some(idx) = ready.pop_first() {
            result.push(idx);

            if let Some(dependents) = children.get(&idx) {
                for &child in dependents {
                    in_degree[child] -= 1;
                    if in_degree[child] == 0 {
                        ready.insert(child);
                    }
                }
            }
        }

        // Anything left over sits on a cycle
        if result.len() == len {
            Some(result)
        } else {
            None
        }
    }

    /// Steps in execution order
    pub fn ordered_steps(&self) -> Vec<&LoadStep> {
        self.order.iter().map(|&idx| &self.steps[idx]).collect()
    }

    /// Look up a step by statement name
    pub fn step(&self, name: &str) -> Option<&LoadStep> {
        self.steps.iter().find(|s| s.name() == name)
    }

    /// Immediate dependencies of a step
    pub fn parents(&self, name: &str) -> Vec<&str> {
        self.index_of(name)
            .and_then(|idx| self.parents.get(&idx))
            .map(|deps| deps.iter().map(|&p| self.steps[p].name()).collect())
            .unwrap_or_default()
    }

    /// All steps that transitively depend on this one
    ///
    /// These are the steps that cannot run if this one fails.
    pub fn downstream(&self, name: &str) -> Vec<&str> {
        let Some(start) = self.index_of(name) else {
            return Vec::new();
        };

        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();
        let mut result = Vec::new();

        if let Some(children) = self.children.get(&start) {
            queue.extend(children.iter().copied());
        }

        // BFS to find all downstream steps
        while let Some(current) = queue.pop_front() {
            if !visited.insert(current) {
                continue;
            }
            result.push(self.steps[current].name());

            if let Some(children) = self.children.get(&current) {
                for &child in children {
                    if !visited.contains(&child) {
                        queue.push_back(child);
                    }
                }
            }
        }

        result
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.name() == name)
    }
}
