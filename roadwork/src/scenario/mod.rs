//! The scenario controller: registers project cards, derives the
//! application queue from dependency constraints, and drives selection
//! resolution and property application per project.
//!
//! Application is fail-fast per project: a failing change aborts the rest
//! of that project's changes, but changes already committed for it are
//! NOT rolled back (the network may be left partially mutated), and
//! already-applied projects are never affected. Reverting would require
//! transactional snapshotting of the network; callers needing a clean
//! state should rebuild the scenario from its base.

use std::collections::HashMap;

use log::{debug, info};

use crate::card::{ChangeOp, ProjectCard};
use crate::config::ScenarioConfig;
use crate::network::{
    edit_link_properties, edit_node_properties, ApplyReport, RoadwayNetwork,
};
use crate::selection::{Facility, Selection};
use crate::transit::{TransitError, TransitNetwork};
use crate::types::NodeId;
use crate::Error;

mod order;

pub(crate) use order::order_projects;

#[derive(thiserror::Error, Debug)]
pub enum ScenarioError {
    #[error("dependency cycle among projects: {0:?}")]
    DependencyCycle(Vec<String>),
    #[error("missing prerequisites: {0:?}")]
    MissingPrerequisite(Vec<String>),
    #[error("missing corequisites: {0:?}")]
    MissingCorequisite(Vec<String>),
    #[error("conflicting projects: {0:?}")]
    ConflictViolation(Vec<String>),
    #[error("project name already registered: {0}")]
    DuplicateProjectName(String),
    #[error("project not in queue: {0}")]
    NotQueued(String),
}

/// Terminal state of one project application.
#[derive(Debug, Clone, PartialEq)]
pub enum ProjectStatus {
    Applied,
    /// Every property edit was skipped by the existing-value policy; the
    /// project left the queue without touching the network.
    SkippedAllChanges,
    Failed(String),
}

/// Structured per-project result surfaced by the controller.
#[derive(Debug, Clone)]
pub struct ProjectOutcome {
    pub project: String,
    pub status: ProjectStatus,
    pub warnings: Vec<String>,
}

/// What a scenario is tiered from: the networks plus the names and
/// conflict declarations of projects applied before this scenario
/// existed. Conflicts are inherited transitively so a new project can
/// still collide with a long-applied one.
#[derive(Debug, Clone, Default)]
pub struct BaseScenario {
    pub road_net: RoadwayNetwork,
    pub transit_net: Option<TransitNetwork>,
    pub applied_projects: Vec<String>,
    pub conflicts: HashMap<String, Vec<String>>,
}

impl BaseScenario {
    pub fn new(road_net: RoadwayNetwork) -> Self {
        BaseScenario {
            road_net,
            ..BaseScenario::default()
        }
    }

    pub fn with_transit(mut self, transit_net: TransitNetwork) -> Self {
        self.transit_net = Some(transit_net);
        self
    }
}

/// A base network plus an ordered, constrained set of applied and queued
/// project cards.
#[derive(Debug)]
pub struct Scenario {
    pub name: String,
    config: ScenarioConfig,
    road_net: RoadwayNetwork,
    transit_net: Option<TransitNetwork>,
    project_cards: HashMap<String, ProjectCard>,
    /// Registered, not-yet-applied project names in registration order.
    planned: Vec<String>,
    applied: Vec<String>,
    prerequisites: HashMap<String, Vec<String>>,
    corequisites: HashMap<String, Vec<String>>,
    conflicts: HashMap<String, Vec<String>>,
    outcomes: Vec<ProjectOutcome>,
}

impl Scenario {
    pub fn new(base: BaseScenario, config: ScenarioConfig) -> Self {
        info!(
            "creating scenario from base with {} applied project(s)",
            base.applied_projects.len()
        );
        Scenario {
            name: String::new(),
            config,
            road_net: base.road_net,
            transit_net: base.transit_net,
            project_cards: HashMap::new(),
            planned: Vec::new(),
            applied: base.applied_projects.iter().map(|p| p.to_lowercase()).collect(),
            prerequisites: HashMap::new(),
            corequisites: HashMap::new(),
            conflicts: base
                .conflicts
                .iter()
                .map(|(k, v)| (k.to_lowercase(), lowercased(v)))
                .collect(),
            outcomes: Vec::new(),
        }
    }

    pub fn road_net(&self) -> &RoadwayNetwork {
        &self.road_net
    }

    pub fn transit_net(&self) -> Option<&TransitNetwork> {
        self.transit_net.as_ref()
    }

    pub fn applied_projects(&self) -> &[String] {
        &self.applied
    }

    pub fn outcomes(&self) -> &[ProjectOutcome] {
        &self.outcomes
    }

    /// Registers a card. Names are matched case-insensitively; a name
    /// already planned or applied is rejected, and the card is never
    /// mutated afterwards.
    pub fn register(&mut self, card: ProjectCard) -> Result<(), Error> {
        card.validate()?;
        let name = card.name.to_lowercase();
        if self.planned.contains(&name) || self.applied.contains(&name) {
            return Err(ScenarioError::DuplicateProjectName(name).into());
        }
        info!("adding {} to scenario", name);
        self.prerequisites.insert(name.clone(), lowercased(&card.prerequisites));
        self.corequisites.insert(name.clone(), lowercased(&card.corequisites));
        self.conflicts.insert(name.clone(), lowercased(&card.conflicts));
        self.project_cards.insert(name.clone(), card);
        self.planned.push(name);
        Ok(())
    }

    /// The registered-but-unapplied projects in the order they would be
    /// applied: registration order except where a prerequisite forces a
    /// project later. Recomputed from current state on every call.
    pub fn queued_projects(&self) -> Result<Vec<String>, Error> {
        self.check_corequisites(&self.planned)?;
        let ordered = order_projects(&self.planned, &self.prerequisites, &self.applied)?;
        Ok(ordered)
    }

    /// Applies a specific batch of queued projects, ordered among
    /// themselves by prerequisites. Fails fast with no state change if
    /// any name is unqueued or any constraint is unsatisfied.
    pub fn apply_projects(&mut self, names: &[&str]) -> Result<(), Error> {
        let batch: Vec<String> = names.iter().map(|n| n.to_lowercase()).collect();
        for name in &batch {
            if !self.planned.contains(name) {
                return Err(ScenarioError::NotQueued(name.clone()).into());
            }
        }
        self.check_prerequisites(&batch)?;
        self.check_corequisites(&batch)?;
        self.check_conflicts(&batch)?;

        let ordered = order_projects(&batch, &self.prerequisites, &self.applied)?;
        for name in &ordered {
            self.apply_project(name)?;
        }
        Ok(())
    }

    /// Applies everything in the queue, head first, until it is empty.
    pub fn apply_all_projects(&mut self) -> Result<(), Error> {
        let queue = self.queued_projects()?;
        self.check_conflicts(&queue)?;
        for name in &queue {
            self.apply_project(name)?;
        }
        Ok(())
    }

    /// Prerequisites of each batch member must be applied already or be
    /// in the same batch.
    fn check_prerequisites(&self, batch: &[String]) -> Result<(), ScenarioError> {
        let mut missing: Vec<String> = Vec::new();
        for project in batch {
            for prereq in self.prerequisites.get(project).into_iter().flatten() {
                if !self.applied.contains(prereq) && !batch.contains(prereq) {
                    missing.push(prereq.clone());
                }
            }
        }
        if !missing.is_empty() {
            missing.sort();
            missing.dedup();
            return Err(ScenarioError::MissingPrerequisite(missing));
        }
        Ok(())
    }

    fn check_corequisites(&self, batch: &[String]) -> Result<(), ScenarioError> {
        let mut missing: Vec<String> = Vec::new();
        for project in batch {
            for coreq in self.corequisites.get(project).into_iter().flatten() {
                if !self.applied.contains(coreq) && !batch.contains(coreq) {
                    missing.push(coreq.clone());
                }
            }
        }
        if !missing.is_empty() {
            missing.sort();
            missing.dedup();
            return Err(ScenarioError::MissingCorequisite(missing));
        }
        Ok(())
    }

    /// Conflicts are checked in both directions: a batch member naming
    /// an active project, and an active project naming a batch member.
    fn check_conflicts(&self, batch: &[String]) -> Result<(), ScenarioError> {
        let mut problems: Vec<String> = Vec::new();
        for project in batch {
            for conflict in self.conflicts.get(project).into_iter().flatten() {
                if conflict == project {
                    continue;
                }
                if self.applied.contains(conflict) || batch.contains(conflict) {
                    problems.push(project.clone());
                    problems.push(conflict.clone());
                }
            }
        }
        for owner in &self.applied {
            for conflict in self.conflicts.get(owner).into_iter().flatten() {
                if batch.contains(conflict) {
                    problems.push(owner.clone());
                    problems.push(conflict.clone());
                }
            }
        }
        if !problems.is_empty() {
            problems.sort();
            problems.dedup();
            return Err(ScenarioError::ConflictViolation(problems));
        }
        Ok(())
    }

    fn apply_project(&mut self, name: &str) -> Result<(), Error> {
        info!("applying {}", name);
        let card = self
            .project_cards
            .get(name)
            .cloned()
            .ok_or_else(|| ScenarioError::NotQueued(name.to_string()))?;

        let mut report = ApplyReport::new();
        for change in &card.changes {
            if let Err(err) = self.apply_change(change, &mut report) {
                self.outcomes.push(ProjectOutcome {
                    project: name.to_string(),
                    status: ProjectStatus::Failed(err.to_string()),
                    warnings: report.warnings.clone(),
                });
                return Err(err);
            }
        }

        let status = if report.edits_applied == 0 && report.edits_skipped > 0 {
            ProjectStatus::SkippedAllChanges
        } else {
            ProjectStatus::Applied
        };
        debug!("{} finished as {:?}", name, status);
        self.planned.retain(|p| p != name);
        self.applied.push(name.to_string());
        self.outcomes.push(ProjectOutcome {
            project: name.to_string(),
            status,
            warnings: report.warnings,
        });
        Ok(())
    }

    fn apply_change(&mut self, change: &ChangeOp, report: &mut ApplyReport) -> Result<(), Error> {
        match change {
            ChangeOp::RoadwayPropertyChange {
                facility,
                property_changes,
            } => {
                let selection = self
                    .road_net
                    .get_selection(facility, self.config.max_search_breadth)?;
                match &selection {
                    Selection::Links { link_ids, .. } => edit_link_properties(
                        &mut self.road_net,
                        link_ids,
                        property_changes,
                        &self.config,
                        report,
                    )?,
                    Selection::Nodes { node_ids } => edit_node_properties(
                        &mut self.road_net,
                        node_ids,
                        property_changes,
                        &self.config,
                        report,
                    )?,
                }
            }
            ChangeOp::RoadwayDeletion(deletion) => {
                if let Some(criteria) = &deletion.links {
                    let selection = self
                        .road_net
                        .get_selection(&Facility::links(criteria.clone()), self.config.max_search_breadth)?;
                    let link_ids = selection.link_ids().to_vec();
                    let endpoints: Vec<(NodeId, NodeId)> = link_ids
                        .iter()
                        .filter_map(|id| self.road_net.link(*id))
                        .map(|l| (l.a, l.b))
                        .collect();
                    if let Some(transit) = &self.transit_net {
                        transit.check_links_unused(&endpoints)?;
                    }
                    self.road_net.delete_links(&link_ids, deletion.clean_shapes)?;
                    report.edits_applied += link_ids.len();
                }
                if let Some(criteria) = &deletion.nodes {
                    let selection = self
                        .road_net
                        .get_selection(&Facility::nodes(criteria.clone()), self.config.max_search_breadth)?;
                    let node_ids = selection.node_ids().to_vec();
                    self.road_net.delete_nodes(&node_ids)?;
                    report.edits_applied += node_ids.len();
                }
            }
            ChangeOp::RoadwayAddition(addition) => {
                for shape in &addition.shapes {
                    self.road_net.add_shape(shape.clone())?;
                }
                for node in &addition.nodes {
                    self.road_net.add_node(node.clone())?;
                }
                for link in &addition.links {
                    self.road_net.add_link(link.clone())?;
                }
                report.edits_applied +=
                    addition.shapes.len() + addition.nodes.len() + addition.links.len();
            }
            ChangeOp::TransitPropertyChange {
                selection,
                property_changes,
            } => {
                let transit = self.transit_net.as_mut().ok_or(TransitError::MissingNetwork)?;
                let trip_ids = transit.select_trips(selection)?;
                transit.apply_property_change(&trip_ids, property_changes, &self.config, report)?;
            }
            ChangeOp::TransitRoutingChange { selection, routing } => {
                let transit = self.transit_net.as_mut().ok_or(TransitError::MissingNetwork)?;
                let trip_ids = transit.select_trips(selection)?;
                transit.apply_routing_change(&trip_ids, routing, &self.road_net)?;
                report.edits_applied += trip_ids.len();
            }
        }
        Ok(())
    }
}

fn lowercased(names: &[String]) -> Vec<String> {
    names.iter().map(|n| n.to_lowercase()).collect()
}
