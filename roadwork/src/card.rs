//! Project cards: named, immutable descriptions of network changes plus
//! the dependency metadata (prerequisites, corequisites, conflicts) the
//! scenario queue orders them by.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::config::{ExistingValueConflict, OverwriteScoped, DEFAULT_CATEGORY};
use crate::network::{RoadwayLink, RoadwayNode, RoadwayShape};
use crate::selection::{Facility, LinkCriteria, NodeCriteria};
use crate::time::Timespan;
use crate::transit::TransitSelection;
use crate::types::{NodeId, PropValue};

#[derive(Error, Debug)]
pub enum CardError {
    #[error("project card has an empty name")]
    EmptyName,
    #[error("project {project}: scoped entries for {property} overlap: {first} and {second}")]
    ScopeConflict {
        project: String,
        property: String,
        first: String,
        second: String,
    },
}

/// One change operation on a project card.
///
/// Modeled as a tagged enum so the apply loop can match exhaustively
/// instead of dispatching on a string category.
#[derive(Debug, Clone)]
pub enum ChangeOp {
    RoadwayPropertyChange {
        facility: Facility,
        property_changes: BTreeMap<String, PropertyChange>,
    },
    RoadwayDeletion(RoadwayDeletion),
    RoadwayAddition(RoadwayAddition),
    TransitPropertyChange {
        selection: TransitSelection,
        property_changes: BTreeMap<String, PropertyChange>,
    },
    TransitRoutingChange {
        selection: TransitSelection,
        routing: Vec<NodeId>,
    },
}

/// Links and/or nodes to remove from the roadway network.
#[derive(Debug, Clone, Default)]
pub struct RoadwayDeletion {
    pub links: Option<LinkCriteria>,
    pub nodes: Option<NodeCriteria>,
    /// Also drop shapes left unreferenced by the deleted links.
    pub clean_shapes: bool,
}

/// New elements to add to the roadway network. Nodes and shapes are added
/// before links so links can reference them.
#[derive(Debug, Clone, Default)]
pub struct RoadwayAddition {
    pub nodes: Vec<RoadwayNode>,
    pub links: Vec<RoadwayLink>,
    pub shapes: Vec<RoadwayShape>,
}

/// Either an outright replacement or an additive delta.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyEdit {
    Set(PropValue),
    Change(f64),
}

/// A keyed property edit: the unscoped default edit, an optional stated
/// `existing` value, scoped (timespan/category) edits, and per-change
/// policy overrides.
#[derive(Debug, Clone)]
pub struct PropertyChange {
    pub existing: Option<PropValue>,
    pub edit: PropertyEdit,
    pub scoped: Vec<ScopedPropertySet>,
    pub existing_value_conflict: Option<ExistingValueConflict>,
    pub overwrite_scoped: Option<OverwriteScoped>,
}

impl PropertyChange {
    pub fn set<V: Into<PropValue>>(value: V) -> Self {
        PropertyChange {
            existing: None,
            edit: PropertyEdit::Set(value.into()),
            scoped: Vec::new(),
            existing_value_conflict: None,
            overwrite_scoped: None,
        }
    }

    pub fn change(delta: f64) -> Self {
        PropertyChange {
            existing: None,
            edit: PropertyEdit::Change(delta),
            scoped: Vec::new(),
            existing_value_conflict: None,
            overwrite_scoped: None,
        }
    }

    pub fn with_existing<V: Into<PropValue>>(mut self, existing: V) -> Self {
        self.existing = Some(existing.into());
        self
    }

    pub fn with_scoped(mut self, scoped: Vec<ScopedPropertySet>) -> Self {
        self.scoped = scoped;
        self
    }

    pub fn on_existing_conflict(mut self, policy: ExistingValueConflict) -> Self {
        self.existing_value_conflict = Some(policy);
        self
    }

    pub fn on_scoped_overwrite(mut self, policy: OverwriteScoped) -> Self {
        self.overwrite_scoped = Some(policy);
        self
    }
}

/// A single scoped edit: value for one timespan/category window.
#[derive(Debug, Clone)]
pub struct ScopedPropertySet {
    pub category: Option<String>,
    pub timespan: Option<Timespan>,
    pub edit: PropertyEdit,
}

impl ScopedPropertySet {
    pub fn set<V: Into<PropValue>>(timespan: Timespan, value: V) -> Self {
        ScopedPropertySet {
            category: None,
            timespan: Some(timespan),
            edit: PropertyEdit::Set(value.into()),
        }
    }

    pub fn with_category(mut self, category: &str) -> Self {
        self.category = Some(category.to_string());
        self
    }

    pub fn category_or_default(&self) -> &str {
        self.category.as_deref().unwrap_or(DEFAULT_CATEGORY)
    }

    pub fn timespan_or_default(&self) -> Timespan {
        self.timespan.unwrap_or(Timespan::ALL_DAY)
    }
}

/// A named, immutable description of one or more network changes.
#[derive(Debug, Clone)]
pub struct ProjectCard {
    pub name: String,
    pub prerequisites: Vec<String>,
    pub corequisites: Vec<String>,
    pub conflicts: Vec<String>,
    pub changes: Vec<ChangeOp>,
}

impl ProjectCard {
    pub fn new(name: &str) -> Self {
        ProjectCard {
            name: name.to_string(),
            prerequisites: Vec::new(),
            corequisites: Vec::new(),
            conflicts: Vec::new(),
            changes: Vec::new(),
        }
    }

    pub fn with_prerequisites(mut self, names: &[&str]) -> Self {
        self.prerequisites = names.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_corequisites(mut self, names: &[&str]) -> Self {
        self.corequisites = names.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_conflicts(mut self, names: &[&str]) -> Self {
        self.conflicts = names.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_change(mut self, change: ChangeOp) -> Self {
        self.changes.push(change);
        self
    }

    /// Checks the card is internally consistent. A card's own scoped
    /// entries for one property must be pairwise non-overlapping, else
    /// the apply result would depend on entry order.
    pub fn validate(&self) -> Result<(), CardError> {
        if self.name.trim().is_empty() {
            return Err(CardError::EmptyName);
        }
        for change in &self.changes {
            let property_changes = match change {
                ChangeOp::RoadwayPropertyChange { property_changes, .. } => property_changes,
                ChangeOp::TransitPropertyChange { property_changes, .. } => property_changes,
                _ => continue,
            };
            for (property, prop_change) in property_changes {
                self.check_scoped_disjoint(property, &prop_change.scoped)?;
            }
        }
        Ok(())
    }

    fn check_scoped_disjoint(
        &self,
        property: &str,
        scoped: &[ScopedPropertySet],
    ) -> Result<(), CardError> {
        for (i, a) in scoped.iter().enumerate() {
            for b in scoped.iter().skip(i + 1) {
                let categories_collide = a.category_or_default() == b.category_or_default()
                    || a.category_or_default() == DEFAULT_CATEGORY
                    || b.category_or_default() == DEFAULT_CATEGORY;
                if categories_collide && a.timespan_or_default().overlaps(&b.timespan_or_default())
                {
                    return Err(CardError::ScopeConflict {
                        project: self.name.clone(),
                        property: property.to_string(),
                        first: format!("{}/{}", a.category_or_default(), a.timespan_or_default()),
                        second: format!("{}/{}", b.category_or_default(), b.timespan_or_default()),
                    });
                }
            }
        }
        Ok(())
    }
}
