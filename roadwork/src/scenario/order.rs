//! Stable ordering of queued projects under prerequisite constraints.

use std::collections::HashMap;

use log::debug;
use petgraph::prelude::*;

use crate::scenario::ScenarioError;

/// Produces a total order of `projects` in which every prerequisite
/// appears before its dependents. Projects with no ordering constraint
/// between them keep their registration order; the tie-break is position
/// in `projects`, never name. Prerequisites already in `applied` impose
/// no edge; prerequisites known nowhere at all are an error.
pub(crate) fn order_projects(
    projects: &[String],
    prerequisites: &HashMap<String, Vec<String>>,
    applied: &[String],
) -> Result<Vec<String>, ScenarioError> {
    let index: HashMap<&str, usize> = projects
        .iter()
        .enumerate()
        .map(|(i, name)| (name.as_str(), i))
        .collect();

    let mut graph: DiGraphMap<usize, ()> = DiGraphMap::new();
    for i in 0..projects.len() {
        graph.add_node(i);
    }

    let mut missing: Vec<String> = Vec::new();
    for (i, project) in projects.iter().enumerate() {
        for prereq in prerequisites.get(project).into_iter().flatten() {
            if prereq == project {
                return Err(ScenarioError::DependencyCycle(vec![project.clone()]));
            }
            if applied.iter().any(|a| a == prereq) {
                continue;
            }
            match index.get(prereq.as_str()) {
                Some(&j) => {
                    graph.add_edge(j, i, ());
                }
                None => missing.push(prereq.clone()),
            }
        }
    }
    if !missing.is_empty() {
        missing.sort();
        missing.dedup();
        return Err(ScenarioError::MissingPrerequisite(missing));
    }

    let n = projects.len();
    let mut in_degree: Vec<usize> = (0..n)
        .map(|i| graph.neighbors_directed(i, Incoming).count())
        .collect();
    let mut placed = vec![false; n];
    let mut ordered = Vec::with_capacity(n);

    while ordered.len() < n {
        // always take the earliest-registered ready project
        let next = (0..n).find(|&i| !placed[i] && in_degree[i] == 0);
        match next {
            Some(i) => {
                placed[i] = true;
                ordered.push(projects[i].clone());
                for j in graph.neighbors(i) {
                    in_degree[j] -= 1;
                }
            }
            None => {
                let cycle: Vec<String> = (0..n)
                    .filter(|&i| !placed[i])
                    .map(|i| projects[i].clone())
                    .collect();
                return Err(ScenarioError::DependencyCycle(cycle));
            }
        }
    }
    debug!("ordered projects: {:?}", ordered);
    Ok(ordered)
}
