//! Applies keyed property edits to matched network elements under the
//! existing-value and scoped-overwrite policies.

use log::{debug, info};

use std::collections::BTreeMap;

use thiserror::Error;

use crate::card::{PropertyChange, PropertyEdit};
use crate::config::{ExistingValueConflict, OverwriteScoped, ScenarioConfig};
use crate::network::{scopes, RoadwayNetwork, ScopedValue};
use crate::types::{LinkId, NodeId, PropValue};

#[derive(Error, Debug)]
pub enum EditError {
    #[error("existing value conflict on {element} {property}: card says {expected}, found {found}")]
    ExistingValueConflict {
        element: String,
        property: String,
        expected: String,
        found: String,
    },
    #[error("scoped values overlap on {element} {property}: {first} and {second}")]
    ScopedOverlap {
        element: String,
        property: String,
        first: String,
        second: String,
    },
    #[error("cannot apply numeric change to {property} on {element}")]
    NonNumericChange { element: String, property: String },
    #[error("invalid node move: {0}")]
    NodeMove(String),
}

/// Per-project record of what the applicator did: how many element
/// property edits landed, how many were skipped by policy, and the
/// warnings recorded along the way.
#[derive(Debug, Clone, Default)]
pub struct ApplyReport {
    pub edits_applied: usize,
    pub edits_skipped: usize,
    pub warnings: Vec<String>,
}

impl ApplyReport {
    pub fn new() -> Self {
        ApplyReport::default()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub(crate) fn warn(&mut self, message: String) {
        log::warn!("{}", message);
        self.warnings.push(message);
    }
}

/// Computes the new unscoped value for one element's property, enforcing
/// the existing-value policy. `Ok(None)` means the edit was skipped.
pub(crate) fn edit_property_value(
    current: Option<&PropValue>,
    change: &PropertyChange,
    policy: ExistingValueConflict,
    element: &str,
    property: &str,
    report: &mut ApplyReport,
) -> Result<Option<PropValue>, EditError> {
    if let Some(expected) = &change.existing {
        let found = current
            .map(|v| v.to_string())
            .unwrap_or_else(|| "<unset>".to_string());
        let matches = current.map_or(false, |v| v.loosely_eq(expected));
        if !matches {
            match policy {
                ExistingValueConflict::Error => {
                    return Err(EditError::ExistingValueConflict {
                        element: element.to_string(),
                        property: property.to_string(),
                        expected: expected.to_string(),
                        found,
                    });
                }
                ExistingValueConflict::Skip => {
                    report.edits_skipped += 1;
                    report.warn(format!(
                        "skipping {} on {}: card says {} but found {}",
                        property, element, expected, found
                    ));
                    return Ok(None);
                }
                ExistingValueConflict::Warn => {
                    report.warn(format!(
                        "editing {} on {} despite mismatch: card says {} but found {}",
                        property, element, expected, found
                    ));
                }
            }
        }
    }

    match &change.edit {
        PropertyEdit::Set(value) => Ok(Some(value.clone())),
        PropertyEdit::Change(delta) => {
            let basis = current.cloned().or_else(|| change.existing.clone()).ok_or(
                EditError::NonNumericChange {
                    element: element.to_string(),
                    property: property.to_string(),
                },
            )?;
            let updated = basis.apply_delta(*delta).ok_or(EditError::NonNumericChange {
                element: element.to_string(),
                property: property.to_string(),
            })?;
            Ok(Some(updated))
        }
    }
}

/// Rewrites one element's scoped list for a property under the scoped
/// overwrite policy, then re-checks the non-overlap invariant.
fn edit_scoped_values(
    values: &mut Vec<ScopedValue>,
    base_default: Option<&PropValue>,
    change: &PropertyChange,
    policy: OverwriteScoped,
    element: &str,
    property: &str,
) -> Result<(), EditError> {
    match policy {
        OverwriteScoped::All => values.clear(),
        OverwriteScoped::Error => {
            for set in &change.scoped {
                let category = set.category_or_default();
                let timespan = set.timespan_or_default();
                if let Some(existing) = values
                    .iter()
                    .find(|v| scopes::scopes_overlap(v, category, timespan))
                {
                    return Err(EditError::ScopedOverlap {
                        element: element.to_string(),
                        property: property.to_string(),
                        first: format!("{}/{}", existing.category, existing.timespan),
                        second: format!("{}/{}", category, timespan),
                    });
                }
            }
        }
        OverwriteScoped::Conflicting => {}
    }

    for set in &change.scoped {
        let category = set.category_or_default().to_string();
        let timespan = set.timespan_or_default();

        let exact_match = values
            .iter()
            .find(|v| scopes::scope_matches_exactly(v, &category, timespan))
            .map(|v| v.value.clone());

        if policy == OverwriteScoped::Conflicting {
            let before = values.len();
            values.retain(|v| !scopes::scopes_overlap(v, &category, timespan));
            if values.len() < before {
                debug!(
                    "replaced {} conflicting scoped value(s) for {} on {}",
                    before - values.len(),
                    property,
                    element
                );
            }
        }

        let value = match &set.edit {
            PropertyEdit::Set(value) => value.clone(),
            PropertyEdit::Change(delta) => {
                let basis = exact_match.or_else(|| base_default.cloned()).ok_or(
                    EditError::NonNumericChange {
                        element: element.to_string(),
                        property: property.to_string(),
                    },
                )?;
                basis.apply_delta(*delta).ok_or(EditError::NonNumericChange {
                    element: element.to_string(),
                    property: property.to_string(),
                })?
            }
        };

        values.push(ScopedValue {
            category,
            timespan,
            value,
        });
    }

    if let Some((first, second)) = scopes::find_overlap(values) {
        return Err(EditError::ScopedOverlap {
            element: element.to_string(),
            property: property.to_string(),
            first,
            second,
        });
    }
    Ok(())
}

pub(crate) fn edit_link_properties(
    net: &mut RoadwayNetwork,
    link_ids: &[LinkId],
    property_changes: &BTreeMap<String, PropertyChange>,
    config: &ScenarioConfig,
    report: &mut ApplyReport,
) -> Result<(), EditError> {
    info!(
        "editing {} propert(ies) on {} link(s)",
        property_changes.len(),
        link_ids.len()
    );
    for (property, change) in property_changes {
        let policy = change
            .existing_value_conflict
            .unwrap_or(config.existing_value_conflict);
        let scoped_policy = change.overwrite_scoped.unwrap_or(config.overwrite_scoped);
        for link_id in link_ids {
            let element = format!("link {}", link_id);
            let current = net
                .link(*link_id)
                .expect("selection produced a missing link")
                .prop(property);
            let updated = edit_property_value(
                current.as_ref(),
                change,
                policy,
                &element,
                property,
                report,
            )?;
            let updated = match updated {
                Some(value) => value,
                None => continue,
            };

            let link = net.link_mut(*link_id).expect("link disappeared mid-edit");
            match property.as_str() {
                "distance" => {
                    link.distance =
                        updated.as_f64().ok_or_else(|| EditError::NonNumericChange {
                            element: element.clone(),
                            property: property.clone(),
                        })?;
                }
                "name" => link.name = updated.to_string(),
                "ref" => link.ref_name = Some(updated.to_string()),
                _ => {
                    link.props.insert(property.clone(), updated.clone());
                }
            }
            report.edits_applied += 1;

            if !change.scoped.is_empty() {
                let base = link.prop(property);
                let values = link.scoped.entry(property.clone()).or_default();
                edit_scoped_values(values, base.as_ref(), change, scoped_policy, &element, property)?;
            }
        }
    }
    net.touch();
    Ok(())
}

pub(crate) fn edit_node_properties(
    net: &mut RoadwayNetwork,
    node_ids: &[NodeId],
    property_changes: &BTreeMap<String, PropertyChange>,
    config: &ScenarioConfig,
    report: &mut ApplyReport,
) -> Result<(), EditError> {
    info!(
        "editing {} propert(ies) on {} node(s)",
        property_changes.len(),
        node_ids.len()
    );
    let has_geometry = property_changes.keys().any(|k| k == "X" || k == "Y");
    if has_geometry {
        move_node(net, node_ids, property_changes)?;
    }

    for (property, change) in property_changes {
        if property == "X" || property == "Y" {
            continue;
        }
        let policy = change
            .existing_value_conflict
            .unwrap_or(config.existing_value_conflict);
        for node_id in node_ids {
            let element = format!("node {}", node_id);
            let current = net
                .node(*node_id)
                .expect("selection produced a missing node")
                .props
                .get(property)
                .cloned();
            let updated = edit_property_value(
                current.as_ref(),
                change,
                policy,
                &element,
                property,
                report,
            )?;
            if let Some(value) = updated {
                if !change.scoped.is_empty() {
                    report.warn(format!(
                        "scoped values are not stored on nodes; ignoring scoped entries for {} on {}",
                        property, element
                    ));
                }
                let node = net.node_mut(*node_id).expect("node disappeared mid-edit");
                node.props.insert(property.clone(), value);
                report.edits_applied += 1;
            }
        }
    }
    net.touch();
    Ok(())
}

/// Moving a node requires both coordinates, a single-node selection, and
/// plain `set` values.
fn move_node(
    net: &mut RoadwayNetwork,
    node_ids: &[NodeId],
    property_changes: &BTreeMap<String, PropertyChange>,
) -> Result<(), EditError> {
    if node_ids.len() != 1 {
        return Err(EditError::NodeMove(format!(
            "cannot move {} nodes to the same location",
            node_ids.len()
        )));
    }
    let coord = |axis: &str| -> Result<f64, EditError> {
        let change = property_changes
            .get(axis)
            .ok_or_else(|| EditError::NodeMove(format!("missing {} for node move", axis)))?;
        match &change.edit {
            PropertyEdit::Set(value) => value
                .as_f64()
                .ok_or_else(|| EditError::NodeMove(format!("{} must be numeric", axis))),
            PropertyEdit::Change(_) => {
                Err(EditError::NodeMove(format!("{} must be a set value", axis)))
            }
        }
    };
    let x = coord("X")?;
    let y = coord("Y")?;
    let node = net
        .node_mut(node_ids[0])
        .expect("selection produced a missing node");
    debug!("moving node {} to ({}, {})", node.model_node_id, x, y);
    node.x = x;
    node.y = y;
    Ok(())
}
