//! # roadwork
//!
//! A scenario engine for transportation networks: a base roadway/transit
//! network plus an ordered collection of project cards applied under
//! prerequisite, corequisite, and conflict constraints.
//!
//! The crate owns three tightly coupled pieces:
//!
//! * the dependency resolver that turns registered project cards into a
//!   deterministic application queue ([`scenario`]),
//! * the selection resolver that turns a facility descriptor into a
//!   concrete set of links or nodes, running a breadth-bounded subnet
//!   shortest-path search for `from`/`to` facilities ([`selection`]),
//! * the property change applicator that edits matched elements under
//!   the existing-value and scoped-overwrite policies ([`network`]).
//!
//! Reading and writing network or project-card files, schema validation,
//! and visualization are collaborators' concerns; everything here works
//! on in-memory models.
//!
//! ```
//! use roadwork::{
//!     BaseScenario, ChangeOp, Facility, LinkCriteria, ProjectCard, PropertyChange,
//!     RoadwayLink, RoadwayNetwork, RoadwayNode, Scenario, ScenarioConfig,
//! };
//!
//! let mut net = RoadwayNetwork::new();
//! net.add_node(RoadwayNode::new(1, 0.0, 0.0)).unwrap();
//! net.add_node(RoadwayNode::new(2, 1.0, 0.0)).unwrap();
//! net.add_link(RoadwayLink::new(10, 1, 2).with_prop("lanes", 2i64)).unwrap();
//!
//! let mut scenario = Scenario::new(BaseScenario::new(net), ScenarioConfig::default());
//! let mut changes = std::collections::BTreeMap::new();
//! changes.insert("lanes".to_string(), PropertyChange::change(1.0));
//! let criteria = LinkCriteria {
//!     model_link_id: vec![10],
//!     ..LinkCriteria::default()
//! };
//! scenario
//!     .register(ProjectCard::new("widen").with_change(ChangeOp::RoadwayPropertyChange {
//!         facility: Facility::links(criteria),
//!         property_changes: changes,
//!     }))
//!     .unwrap();
//! scenario.apply_all_projects().unwrap();
//! assert_eq!(scenario.applied_projects().to_vec(), vec!["widen".to_string()]);
//! ```

pub mod card;
pub mod config;
pub mod network;
pub mod scenario;
pub mod selection;
pub mod time;
pub mod transit;
pub mod types;

#[cfg(test)]
mod test;

use thiserror::Error;

/// Any error the engine can produce, aggregated over the per-concern
/// error enums.
#[derive(Error, Debug)]
pub enum Error {
    #[error("project card error: {0}")]
    Card(#[from] card::CardError),
    #[error("network error: {0}")]
    Network(#[from] network::NetworkError),
    #[error("edit error: {0}")]
    Edit(#[from] network::EditError),
    #[error("selection error: {0}")]
    Selection(#[from] selection::SelectionError),
    #[error("transit error: {0}")]
    Transit(#[from] transit::TransitError),
    #[error("scenario error: {0}")]
    Scenario(#[from] scenario::ScenarioError),
    #[error("time error: {0}")]
    Time(#[from] time::TimeError),
}

pub use card::{
    ChangeOp, ProjectCard, PropertyChange, PropertyEdit, RoadwayAddition, RoadwayDeletion,
    ScopedPropertySet,
};
pub use config::{ExistingValueConflict, OverwriteScoped, ScenarioConfig};
pub use network::{ApplyReport, RoadwayLink, RoadwayNetwork, RoadwayNode, RoadwayShape, ScopedValue};
pub use scenario::{BaseScenario, ProjectOutcome, ProjectStatus, Scenario};
pub use selection::{
    Facility, LinkCriteria, LinkSelection, NodeAnchor, NodeCriteria, Segment, Selection, Subnet,
};
pub use time::Timespan;
pub use transit::{TransitNetwork, TransitRoute, TransitSelection, TransitTrip};
pub use types::{LinkId, NodeId, PropValue, ShapeId};
