//! Minimal transit network model: enough structure (routes, trips, and
//! each trip's routing over roadway nodes) to identify the trips a
//! transit selection affects and to apply property and routing changes
//! to them. GTFS schedule semantics beyond that are out of scope.

use std::collections::BTreeMap;

use itertools::Itertools;
use log::{debug, info};
use thiserror::Error;

use crate::card::PropertyChange;
use crate::config::ScenarioConfig;
use crate::network::{edit_property_value, ApplyReport, EditError, RoadwayNetwork};
use crate::types::{NodeId, PropValue};

#[derive(Error, Debug)]
pub enum TransitError {
    #[error("no transit network in scenario")]
    MissingNetwork,
    #[error("route {0:?} already exists")]
    DuplicateRoute(String),
    #[error("trip {0:?} already exists")]
    DuplicateTrip(String),
    #[error("trip references unknown route {0:?}")]
    UnknownRoute(String),
    #[error("routing references node {0} not in the roadway network")]
    UnknownRoutingNode(NodeId),
    #[error("no transit trips selected by {0}")]
    SelectionEmpty(String),
    #[error("transit inconsistent with roadway network: {0}")]
    RoadwayConsistency(String),
}

#[derive(Debug, Clone)]
pub struct TransitRoute {
    pub route_id: String,
    pub props: BTreeMap<String, PropValue>,
}

impl TransitRoute {
    pub fn new(route_id: &str) -> Self {
        TransitRoute {
            route_id: route_id.to_string(),
            props: BTreeMap::new(),
        }
    }
}

/// One scheduled trip: its route, the roadway nodes it traverses in
/// order, and trip-level properties such as `headway_secs`.
#[derive(Debug, Clone)]
pub struct TransitTrip {
    pub trip_id: String,
    pub route_id: String,
    pub routing: Vec<NodeId>,
    pub props: BTreeMap<String, PropValue>,
}

impl TransitTrip {
    pub fn new(trip_id: &str, route_id: &str, routing: Vec<NodeId>) -> Self {
        TransitTrip {
            trip_id: trip_id.to_string(),
            route_id: route_id.to_string(),
            routing,
            props: BTreeMap::new(),
        }
    }

    pub fn with_prop<V: Into<PropValue>>(mut self, name: &str, value: V) -> Self {
        self.props.insert(name.to_string(), value.into());
        self
    }
}

/// Criteria identifying the trips a transit change applies to.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransitSelection {
    pub route_ids: Vec<String>,
    pub trip_ids: Vec<String>,
    pub filters: BTreeMap<String, Vec<PropValue>>,
}

impl TransitSelection {
    pub fn routes(route_ids: &[&str]) -> Self {
        TransitSelection {
            route_ids: route_ids.iter().map(|s| s.to_string()).collect(),
            ..TransitSelection::default()
        }
    }

    pub fn trips(trip_ids: &[&str]) -> Self {
        TransitSelection {
            trip_ids: trip_ids.iter().map(|s| s.to_string()).collect(),
            ..TransitSelection::default()
        }
    }

    fn describe(&self) -> String {
        format!(
            "routes=[{}] trips=[{}] filters=[{}]",
            self.route_ids.iter().join(","),
            self.trip_ids.iter().join(","),
            self.filters
                .iter()
                .map(|(k, vs)| format!("{}:[{}]", k, vs.iter().join(",")))
                .join(";")
        )
    }

    fn matches(&self, trip: &TransitTrip) -> bool {
        if !self.route_ids.is_empty() && !self.route_ids.contains(&trip.route_id) {
            return false;
        }
        if !self.trip_ids.is_empty() && !self.trip_ids.contains(&trip.trip_id) {
            return false;
        }
        self.filters.iter().all(|(property, allowed)| {
            trip.props
                .get(property)
                .map_or(false, |value| allowed.iter().any(|a| a.loosely_eq(value)))
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct TransitNetwork {
    routes: BTreeMap<String, TransitRoute>,
    trips: BTreeMap<String, TransitTrip>,
}

impl TransitNetwork {
    pub fn new() -> Self {
        TransitNetwork::default()
    }

    pub fn add_route(&mut self, route: TransitRoute) -> Result<(), TransitError> {
        if self.routes.contains_key(&route.route_id) {
            return Err(TransitError::DuplicateRoute(route.route_id));
        }
        self.routes.insert(route.route_id.clone(), route);
        Ok(())
    }

    pub fn add_trip(&mut self, trip: TransitTrip) -> Result<(), TransitError> {
        if self.trips.contains_key(&trip.trip_id) {
            return Err(TransitError::DuplicateTrip(trip.trip_id));
        }
        if !self.routes.contains_key(&trip.route_id) {
            return Err(TransitError::UnknownRoute(trip.route_id));
        }
        self.trips.insert(trip.trip_id.clone(), trip);
        Ok(())
    }

    pub fn trip(&self, trip_id: &str) -> Option<&TransitTrip> {
        self.trips.get(trip_id)
    }

    pub fn trips(&self) -> impl Iterator<Item = &TransitTrip> {
        self.trips.values()
    }

    /// Resolves a transit selection to the affected trip ids. An empty
    /// result is an error; a transit change must touch something.
    pub fn select_trips(&self, selection: &TransitSelection) -> Result<Vec<String>, TransitError> {
        let trip_ids: Vec<String> = self
            .trips
            .values()
            .filter(|trip| selection.matches(trip))
            .map(|trip| trip.trip_id.clone())
            .collect();
        if trip_ids.is_empty() {
            return Err(TransitError::SelectionEmpty(selection.describe()));
        }
        debug!("transit selection matched {} trip(s)", trip_ids.len());
        Ok(trip_ids)
    }

    pub(crate) fn apply_property_change(
        &mut self,
        trip_ids: &[String],
        property_changes: &BTreeMap<String, PropertyChange>,
        config: &ScenarioConfig,
        report: &mut ApplyReport,
    ) -> Result<(), EditError> {
        info!(
            "editing {} transit propert(ies) on {} trip(s)",
            property_changes.len(),
            trip_ids.len()
        );
        for (property, change) in property_changes {
            let policy = change
                .existing_value_conflict
                .unwrap_or(config.existing_value_conflict);
            for trip_id in trip_ids {
                let element = format!("trip {}", trip_id);
                let trip = self.trips.get_mut(trip_id).expect("selected trip must exist");
                let current = trip.props.get(property).cloned();
                if let Some(value) =
                    edit_property_value(current.as_ref(), change, policy, &element, property, report)?
                {
                    trip.props.insert(property.clone(), value);
                    report.edits_applied += 1;
                }
            }
        }
        Ok(())
    }

    /// Replaces the routing node sequence of the selected trips. Every
    /// routing node must exist in the attached roadway network.
    pub(crate) fn apply_routing_change(
        &mut self,
        trip_ids: &[String],
        routing: &[NodeId],
        road_net: &RoadwayNetwork,
    ) -> Result<(), TransitError> {
        for node in routing {
            if road_net.node(*node).is_none() {
                return Err(TransitError::UnknownRoutingNode(*node));
            }
        }
        for trip_id in trip_ids {
            let trip = self.trips.get_mut(trip_id).expect("selected trip must exist");
            debug!(
                "rerouting trip {} over {} node(s)",
                trip_id,
                routing.len()
            );
            trip.routing = routing.to_vec();
        }
        Ok(())
    }

    /// Checks no trip traverses any of the given directed node pairs.
    /// Called before roadway links are deleted so the deletion fails
    /// instead of silently breaking transit routings.
    pub(crate) fn check_links_unused(
        &self,
        deleted: &[(NodeId, NodeId)],
    ) -> Result<(), TransitError> {
        for trip in self.trips.values() {
            for (a, b) in trip.routing.iter().tuple_windows() {
                if deleted.contains(&(*a, *b)) {
                    return Err(TransitError::RoadwayConsistency(format!(
                        "trip {} traverses deleted link {} -> {}",
                        trip.trip_id, a, b
                    )));
                }
            }
        }
        Ok(())
    }
}
