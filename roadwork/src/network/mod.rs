//! The roadway network model: node/link/shape collections keyed by stable
//! identifiers, in-place mutation operations, and the per-network
//! selection cache.
//!
//! A network is exclusively owned by one scenario during an apply run and
//! is passed by `&mut` through the apply pipeline. Every mutation bumps a
//! generation counter; cached selections are only valid while their stored
//! generation matches the network's current one.

use std::collections::{BTreeMap, HashMap};

use log::{debug, warn};
use thiserror::Error;

use crate::selection::{self, Facility, Selection, SelectionError};
use crate::time::Timespan;
use crate::types::{LinkId, NodeId, PropValue, ShapeId};

mod edit;
mod scopes;

pub use edit::{ApplyReport, EditError};
pub(crate) use edit::{edit_link_properties, edit_node_properties, edit_property_value};

#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("cannot add node: {0}")]
    NodeAdd(String),
    #[error("cannot add link: {0}")]
    LinkAdd(String),
    #[error("cannot add shape: {0}")]
    ShapeAdd(String),
    #[error("cannot delete nodes: {0}")]
    NodeDeletion(String),
    #[error("link {0} not found")]
    LinkNotFound(LinkId),
    #[error("node {0} not found")]
    NodeNotFound(NodeId),
}

/// One entry of a scoped property value: the value a property takes for a
/// timespan/category window, overriding the unscoped default.
#[derive(Debug, Clone, PartialEq)]
pub struct ScopedValue {
    pub category: String,
    pub timespan: Timespan,
    pub value: PropValue,
}

#[derive(Debug, Clone)]
pub struct RoadwayNode {
    pub model_node_id: NodeId,
    pub osm_node_id: Option<String>,
    pub x: f64,
    pub y: f64,
    pub props: BTreeMap<String, PropValue>,
}

impl RoadwayNode {
    pub fn new(model_node_id: NodeId, x: f64, y: f64) -> Self {
        RoadwayNode {
            model_node_id,
            osm_node_id: None,
            x,
            y,
            props: BTreeMap::new(),
        }
    }

    pub fn with_osm_id(mut self, osm_node_id: &str) -> Self {
        self.osm_node_id = Some(osm_node_id.to_string());
        self
    }

    pub fn with_prop<V: Into<PropValue>>(mut self, name: &str, value: V) -> Self {
        self.props.insert(name.to_string(), value.into());
        self
    }
}

/// A directed link between two nodes. `name` and `ref_name` carry the
/// street name and route designation (e.g. "I-94") the subnet builder
/// matches loose criteria against; everything else lives in `props`.
#[derive(Debug, Clone)]
pub struct RoadwayLink {
    pub model_link_id: LinkId,
    pub a: NodeId,
    pub b: NodeId,
    pub name: String,
    pub ref_name: Option<String>,
    pub shape_id: Option<ShapeId>,
    pub distance: f64,
    pub props: BTreeMap<String, PropValue>,
    pub scoped: BTreeMap<String, Vec<ScopedValue>>,
}

impl RoadwayLink {
    pub fn new(model_link_id: LinkId, a: NodeId, b: NodeId) -> Self {
        RoadwayLink {
            model_link_id,
            a,
            b,
            name: String::new(),
            ref_name: None,
            shape_id: None,
            distance: 1.0,
            props: BTreeMap::new(),
            scoped: BTreeMap::new(),
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn with_ref(mut self, ref_name: &str) -> Self {
        self.ref_name = Some(ref_name.to_string());
        self
    }

    pub fn with_distance(mut self, distance: f64) -> Self {
        self.distance = distance;
        self
    }

    pub fn with_shape(mut self, shape_id: ShapeId) -> Self {
        self.shape_id = Some(shape_id);
        self
    }

    pub fn with_prop<V: Into<PropValue>>(mut self, name: &str, value: V) -> Self {
        self.props.insert(name.to_string(), value.into());
        self
    }

    /// Current value of a property as the applicator and filters see it.
    /// `distance` is a typed field; everything else is in `props`.
    pub fn prop(&self, name: &str) -> Option<PropValue> {
        match name {
            "distance" => Some(PropValue::Float(self.distance)),
            "name" => Some(PropValue::Str(self.name.clone())),
            "ref" => self.ref_name.clone().map(PropValue::Str),
            _ => self.props.get(name).cloned(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RoadwayShape {
    pub shape_id: ShapeId,
    pub points: Vec<(f64, f64)>,
}

impl RoadwayShape {
    pub fn new(shape_id: ShapeId, points: Vec<(f64, f64)>) -> Self {
        RoadwayShape { shape_id, points }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct CachedSelection {
    generation: u64,
    selection: Selection,
}

/// In-memory roadway network with keyed collections and in-place
/// mutation. Reading networks from files is a collaborator's concern;
/// this type starts empty and is populated through the add operations.
#[derive(Debug, Clone, Default)]
pub struct RoadwayNetwork {
    nodes: BTreeMap<NodeId, RoadwayNode>,
    links: BTreeMap<LinkId, RoadwayLink>,
    shapes: BTreeMap<ShapeId, RoadwayShape>,
    generation: u64,
    selections: HashMap<String, CachedSelection>,
}

impl RoadwayNetwork {
    pub fn new() -> Self {
        RoadwayNetwork::default()
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn num_links(&self) -> usize {
        self.links.len()
    }

    pub fn node(&self, id: NodeId) -> Option<&RoadwayNode> {
        self.nodes.get(&id)
    }

    pub fn link(&self, id: LinkId) -> Option<&RoadwayLink> {
        self.links.get(&id)
    }

    pub fn shape(&self, id: ShapeId) -> Option<&RoadwayShape> {
        self.shapes.get(&id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &RoadwayNode> {
        self.nodes.values()
    }

    pub fn links(&self) -> impl Iterator<Item = &RoadwayLink> {
        self.links.values()
    }

    pub fn find_node_by_osm_id(&self, osm_node_id: &str) -> Option<&RoadwayNode> {
        self.nodes
            .values()
            .find(|n| n.osm_node_id.as_deref() == Some(osm_node_id))
    }

    /// Monotonic counter bumped on every mutation; selection cache
    /// entries are valid only for the generation they were resolved at.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn touch(&mut self) {
        self.generation += 1;
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Option<&mut RoadwayNode> {
        self.nodes.get_mut(&id)
    }

    pub(crate) fn link_mut(&mut self, id: LinkId) -> Option<&mut RoadwayLink> {
        self.links.get_mut(&id)
    }

    pub fn add_node(&mut self, node: RoadwayNode) -> Result<NodeId, NetworkError> {
        let id = node.model_node_id;
        if self.nodes.contains_key(&id) {
            return Err(NetworkError::NodeAdd(format!("node {} already exists", id)));
        }
        self.nodes.insert(id, node);
        self.touch();
        Ok(id)
    }

    pub fn add_link(&mut self, link: RoadwayLink) -> Result<LinkId, NetworkError> {
        let id = link.model_link_id;
        if self.links.contains_key(&id) {
            return Err(NetworkError::LinkAdd(format!("link {} already exists", id)));
        }
        for endpoint in &[link.a, link.b] {
            if !self.nodes.contains_key(endpoint) {
                return Err(NetworkError::LinkAdd(format!(
                    "link {} references missing node {}",
                    id, endpoint
                )));
            }
        }
        for (property, values) in &link.scoped {
            if let Some((first, second)) = scopes::find_overlap(values) {
                return Err(NetworkError::LinkAdd(format!(
                    "link {} has overlapping scoped values for {}: {} and {}",
                    id, property, first, second
                )));
            }
        }
        self.links.insert(id, link);
        self.touch();
        Ok(id)
    }

    pub fn add_shape(&mut self, shape: RoadwayShape) -> Result<ShapeId, NetworkError> {
        let id = shape.shape_id;
        if self.shapes.contains_key(&id) {
            return Err(NetworkError::ShapeAdd(format!("shape {} already exists", id)));
        }
        self.shapes.insert(id, shape);
        self.touch();
        Ok(id)
    }

    /// Removes links by id. With `clean_shapes`, shapes left unreferenced
    /// by any surviving link are dropped as well.
    pub fn delete_links(&mut self, ids: &[LinkId], clean_shapes: bool) -> Result<(), NetworkError> {
        for id in ids {
            if !self.links.contains_key(id) {
                return Err(NetworkError::LinkNotFound(*id));
            }
        }
        let mut candidate_shapes = Vec::new();
        for id in ids {
            if let Some(link) = self.links.remove(id) {
                if let Some(shape_id) = link.shape_id {
                    candidate_shapes.push(shape_id);
                }
            }
        }
        if clean_shapes {
            for shape_id in candidate_shapes {
                let still_used = self.links.values().any(|l| l.shape_id == Some(shape_id));
                if !still_used {
                    debug!("dropping orphaned shape {}", shape_id);
                    self.shapes.remove(&shape_id);
                }
            }
        }
        self.touch();
        Ok(())
    }

    /// Removes nodes by id. A node still referenced by a link cannot be
    /// deleted; delete the links first.
    pub fn delete_nodes(&mut self, ids: &[NodeId]) -> Result<(), NetworkError> {
        for id in ids {
            if !self.nodes.contains_key(id) {
                return Err(NetworkError::NodeNotFound(*id));
            }
        }
        for id in ids {
            let attached: Vec<LinkId> = self
                .links
                .values()
                .filter(|l| l.a == *id || l.b == *id)
                .map(|l| l.model_link_id)
                .collect();
            if !attached.is_empty() {
                return Err(NetworkError::NodeDeletion(format!(
                    "node {} still referenced by links {:?}",
                    id, attached
                )));
            }
        }
        for id in ids {
            self.nodes.remove(id);
        }
        self.touch();
        Ok(())
    }

    /// Sets a single link property outright, optionally for a scoped
    /// window only. Project-card application goes through the richer
    /// policy-aware path instead.
    pub fn set_link_property<V: Into<PropValue>>(
        &mut self,
        link_id: LinkId,
        property: &str,
        value: V,
        scope: Option<(String, Timespan)>,
    ) -> Result<(), NetworkError> {
        let link = self
            .links
            .get_mut(&link_id)
            .ok_or(NetworkError::LinkNotFound(link_id))?;
        match scope {
            None => {
                link.props.insert(property.to_string(), value.into());
            }
            Some((category, timespan)) => {
                let values = link.scoped.entry(property.to_string()).or_default();
                values.retain(|v| !scopes::scopes_overlap(v, &category, timespan));
                values.push(ScopedValue {
                    category,
                    timespan,
                    value: value.into(),
                });
            }
        }
        self.touch();
        Ok(())
    }

    /// Resolves a facility selection against this network, memoized per
    /// distinct selection criteria. A cached result is reused only while
    /// the network is unchanged since it was resolved.
    pub fn get_selection(
        &mut self,
        facility: &Facility,
        max_search_breadth: usize,
    ) -> Result<Selection, SelectionError> {
        let key = facility.selection_key();
        if let Some(cached) = self.selections.get(&key) {
            if cached.generation == self.generation {
                debug!("selection cache hit: {}", key);
                return Ok(cached.selection.clone());
            }
            warn!("selection cache stale for {}, re-resolving", key);
        }
        let selection = selection::resolve(self, facility, max_search_breadth)?;
        self.selections.insert(
            key,
            CachedSelection {
                generation: self.generation,
                selection: selection.clone(),
            },
        );
        Ok(selection)
    }

    /// Number of memoized selections, current or stale.
    pub fn cached_selections(&self) -> usize {
        self.selections.len()
    }
}
