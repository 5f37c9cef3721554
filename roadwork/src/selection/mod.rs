//! Turning facility descriptors into concrete sets of links or nodes.
//!
//! Direct selections (explicit ids or property filters, no `from`/`to`)
//! filter the keyed collections; facility selections with anchors run the
//! subnet/segment search. Resolved selections are memoized on the network
//! object keyed by the canonical text of their descriptor.

use std::collections::BTreeMap;

use itertools::Itertools;
use log::{info, warn};
use thiserror::Error;

use crate::network::{RoadwayLink, RoadwayNetwork, RoadwayNode};
use crate::types::{LinkId, NodeId, PropValue};

mod segment;
mod subnet;

pub use segment::Segment;
pub use subnet::Subnet;

pub(crate) use segment::find_segment;

#[derive(Error, Debug)]
pub enum SelectionError {
    #[error("invalid selection: {0}")]
    InvalidSelection(String),
    #[error("no facility found from {from} to {to} matching {criteria}")]
    FacilityNotFound {
        from: String,
        to: String,
        criteria: String,
    },
    #[error("selection references missing ids: {0}")]
    MissingIds(String),
}

/// Identifies one anchor node of a facility search.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeAnchor {
    Node(NodeId),
    Osm(String),
}

impl NodeAnchor {
    fn key(&self) -> String {
        match self {
            NodeAnchor::Node(id) => format!("model:{}", id),
            NodeAnchor::Osm(id) => format!("osm:{}", id),
        }
    }
}

/// Loose link match criteria plus hard post-filters.
///
/// `name`/`ref_name`/`model_link_id` seed the subnet for a facility
/// search (or select directly when no anchors are given); `filters` prune
/// the matched set afterwards without triggering re-search.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkCriteria {
    pub model_link_id: Vec<LinkId>,
    pub name: Vec<String>,
    pub ref_name: Vec<String>,
    pub filters: BTreeMap<String, Vec<PropValue>>,
    pub ignore_missing: bool,
}

impl Default for LinkCriteria {
    fn default() -> Self {
        LinkCriteria {
            model_link_id: Vec::new(),
            name: Vec::new(),
            ref_name: Vec::new(),
            filters: BTreeMap::new(),
            ignore_missing: true,
        }
    }
}

impl LinkCriteria {
    pub(crate) fn key(&self) -> String {
        let ids = self.model_link_id.iter().sorted().join(",");
        let names = self.name.iter().map(|s| s.to_lowercase()).sorted().join(",");
        let refs = self
            .ref_name
            .iter()
            .map(|s| s.to_lowercase())
            .sorted()
            .join(",");
        let filters = self
            .filters
            .iter()
            .map(|(k, vs)| format!("{}:[{}]", k, vs.iter().join(",")))
            .join(";");
        format!(
            "ids=[{}] name=[{}] ref=[{}] filters=[{}] ignore_missing={}",
            ids, names, refs, filters, self.ignore_missing
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeCriteria {
    pub model_node_id: Vec<NodeId>,
    pub osm_node_id: Vec<String>,
    pub filters: BTreeMap<String, Vec<PropValue>>,
    pub ignore_missing: bool,
}

impl Default for NodeCriteria {
    fn default() -> Self {
        NodeCriteria {
            model_node_id: Vec::new(),
            osm_node_id: Vec::new(),
            filters: BTreeMap::new(),
            ignore_missing: true,
        }
    }
}

impl NodeCriteria {
    fn key(&self) -> String {
        let ids = self.model_node_id.iter().sorted().join(",");
        let osm = self.osm_node_id.iter().sorted().join(",");
        let filters = self
            .filters
            .iter()
            .map(|(k, vs)| format!("{}:[{}]", k, vs.iter().join(",")))
            .join(";");
        format!(
            "ids=[{}] osm=[{}] filters=[{}] ignore_missing={}",
            ids, osm, filters, self.ignore_missing
        )
    }
}

/// A link selection: criteria plus optional facility anchors. Anchors
/// come in pairs; a lone `from` or `to` is malformed.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LinkSelection {
    pub criteria: LinkCriteria,
    pub from: Option<NodeAnchor>,
    pub to: Option<NodeAnchor>,
}

/// A facility descriptor from a project card.
#[derive(Debug, Clone, PartialEq)]
pub enum Facility {
    Links(LinkSelection),
    Nodes(NodeCriteria),
}

impl Facility {
    pub fn links(criteria: LinkCriteria) -> Self {
        Facility::Links(LinkSelection {
            criteria,
            from: None,
            to: None,
        })
    }

    pub fn segment(criteria: LinkCriteria, from: NodeAnchor, to: NodeAnchor) -> Self {
        Facility::Links(LinkSelection {
            criteria,
            from: Some(from),
            to: Some(to),
        })
    }

    pub fn nodes(criteria: NodeCriteria) -> Self {
        Facility::Nodes(criteria)
    }

    /// Canonical text of the descriptor; selections are memoized under
    /// this key.
    pub fn selection_key(&self) -> String {
        match self {
            Facility::Links(sel) => {
                let mut key = format!("links {}", sel.criteria.key());
                if let Some(from) = &sel.from {
                    key.push_str(&format!(" from={}", from.key()));
                }
                if let Some(to) = &sel.to {
                    key.push_str(&format!(" to={}", to.key()));
                }
                key
            }
            Facility::Nodes(criteria) => format!("nodes {}", criteria.key()),
        }
    }
}

/// A resolved, cached selection result.
#[derive(Debug, Clone)]
pub enum Selection {
    Links {
        link_ids: Vec<LinkId>,
        segment: Option<Segment>,
    },
    Nodes {
        node_ids: Vec<NodeId>,
    },
}

impl Selection {
    pub fn link_ids(&self) -> &[LinkId] {
        match self {
            Selection::Links { link_ids, .. } => link_ids,
            Selection::Nodes { .. } => &[],
        }
    }

    pub fn node_ids(&self) -> &[NodeId] {
        match self {
            Selection::Nodes { node_ids } => node_ids,
            Selection::Links { .. } => &[],
        }
    }

    pub fn segment(&self) -> Option<&Segment> {
        match self {
            Selection::Links { segment, .. } => segment.as_ref(),
            Selection::Nodes { .. } => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Selection::Links { link_ids, .. } => link_ids.is_empty(),
            Selection::Nodes { node_ids } => node_ids.is_empty(),
        }
    }
}

pub(crate) fn anchor_node_id(
    net: &RoadwayNetwork,
    anchor: &NodeAnchor,
) -> Result<NodeId, SelectionError> {
    match anchor {
        NodeAnchor::Node(id) => {
            if net.node(*id).is_none() {
                return Err(SelectionError::InvalidSelection(format!(
                    "anchor node {} not in network",
                    id
                )));
            }
            Ok(*id)
        }
        NodeAnchor::Osm(osm_id) => net
            .find_node_by_osm_id(osm_id)
            .map(|n| n.model_node_id)
            .ok_or_else(|| {
                SelectionError::InvalidSelection(format!(
                    "anchor osm node {:?} not in network",
                    osm_id
                ))
            }),
    }
}

pub(crate) fn resolve(
    net: &RoadwayNetwork,
    facility: &Facility,
    max_search_breadth: usize,
) -> Result<Selection, SelectionError> {
    match facility {
        Facility::Links(sel) => resolve_links(net, sel, max_search_breadth),
        Facility::Nodes(criteria) => resolve_nodes(net, criteria),
    }
}

fn resolve_links(
    net: &RoadwayNetwork,
    sel: &LinkSelection,
    max_search_breadth: usize,
) -> Result<Selection, SelectionError> {
    match (&sel.from, &sel.to) {
        (Some(_), Some(_)) => {
            let segment = find_segment(net, sel, max_search_breadth)?;
            let link_ids = segment
                .matched_link_ids
                .iter()
                .copied()
                .filter(|id| link_passes_filters(net.link(*id).expect("matched link"), &sel.criteria.filters))
                .collect::<Vec<_>>();
            info!("facility selection matched {} link(s)", link_ids.len());
            Ok(Selection::Links {
                link_ids,
                segment: Some(segment),
            })
        }
        (None, None) => resolve_direct_links(net, sel),
        _ => Err(SelectionError::InvalidSelection(
            "selection has only one of from/to".to_string(),
        )),
    }
}

fn resolve_direct_links(
    net: &RoadwayNetwork,
    sel: &LinkSelection,
) -> Result<Selection, SelectionError> {
    let criteria = &sel.criteria;
    let link_ids = if !criteria.model_link_id.is_empty() {
        let missing: Vec<LinkId> = criteria
            .model_link_id
            .iter()
            .copied()
            .filter(|id| net.link(*id).is_none())
            .collect();
        if !missing.is_empty() {
            if !criteria.ignore_missing {
                return Err(SelectionError::MissingIds(format!("links {:?}", missing)));
            }
            warn!("ignoring missing link selections: {:?}", missing);
        }
        criteria
            .model_link_id
            .iter()
            .copied()
            .sorted()
            .dedup()
            .filter_map(|id| net.link(id))
            .filter(|link| link_passes_filters(link, &criteria.filters))
            .map(|link| link.model_link_id)
            .collect()
    } else if !criteria.name.is_empty() || !criteria.ref_name.is_empty() {
        return Err(SelectionError::InvalidSelection(
            "name/ref criteria need from and to anchors; use explicit ids or filters instead"
                .to_string(),
        ));
    } else {
        net.links()
            .filter(|link| link_passes_filters(link, &criteria.filters))
            .map(|link| link.model_link_id)
            .collect::<Vec<_>>()
    };
    if link_ids.is_empty() {
        warn!("no links found matching criteria {}", criteria.key());
    }
    info!("selected {} link(s)", link_ids.len());
    Ok(Selection::Links {
        link_ids,
        segment: None,
    })
}

fn resolve_nodes(
    net: &RoadwayNetwork,
    criteria: &NodeCriteria,
) -> Result<Selection, SelectionError> {
    let explicit = !criteria.model_node_id.is_empty() || !criteria.osm_node_id.is_empty();
    let node_ids = if explicit {
        let mut ids: Vec<NodeId> = Vec::new();
        let mut missing: Vec<String> = Vec::new();
        for id in &criteria.model_node_id {
            match net.node(*id) {
                Some(_) => ids.push(*id),
                None => missing.push(id.to_string()),
            }
        }
        for osm_id in &criteria.osm_node_id {
            match net.find_node_by_osm_id(osm_id) {
                Some(node) => ids.push(node.model_node_id),
                None => missing.push(format!("osm:{}", osm_id)),
            }
        }
        if !missing.is_empty() {
            if !criteria.ignore_missing {
                return Err(SelectionError::MissingIds(format!("nodes {:?}", missing)));
            }
            warn!("ignoring missing node selections: {:?}", missing);
        }
        ids.into_iter()
            .sorted()
            .dedup()
            .filter(|id| node_passes_filters(net.node(*id).expect("selected node"), &criteria.filters))
            .collect()
    } else {
        net.nodes()
            .filter(|node| node_passes_filters(node, &criteria.filters))
            .map(|node| node.model_node_id)
            .collect::<Vec<_>>()
    };
    info!("selected {} node(s)", node_ids.len());
    Ok(Selection::Nodes { node_ids })
}

fn link_passes_filters(link: &RoadwayLink, filters: &BTreeMap<String, Vec<PropValue>>) -> bool {
    filters.iter().all(|(property, allowed)| {
        link.prop(property)
            .map_or(false, |value| allowed.iter().any(|a| a.loosely_eq(&value)))
    })
}

fn node_passes_filters(node: &RoadwayNode, filters: &BTreeMap<String, Vec<PropValue>>) -> bool {
    filters.iter().all(|(property, allowed)| {
        let value = match property.as_str() {
            "X" => Some(PropValue::Float(node.x)),
            "Y" => Some(PropValue::Float(node.y)),
            _ => node.props.get(property).cloned(),
        };
        value.map_or(false, |value| allowed.iter().any(|a| a.loosely_eq(&value)))
    })
}
