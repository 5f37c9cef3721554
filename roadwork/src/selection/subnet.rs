//! Breadth-bounded candidate subgraphs for facility searches.
//!
//! A subnet starts from the links matching a selection's loose criteria
//! (name/ref/link id) and grows one hop at a time around what it already
//! contains. Each link remembers the expansion iteration that pulled it
//! in; the shortest-path search penalizes later iterations so the path
//! prefers links the selection actually named.

use std::collections::{BTreeMap, BTreeSet};

use log::debug;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::config::SUBNET_SP_WEIGHT_FACTOR;
use crate::network::RoadwayNetwork;
use crate::selection::LinkCriteria;
use crate::types::{LinkId, NodeId};

#[derive(Debug, Clone)]
pub(crate) struct SubnetEdge {
    pub link_id: LinkId,
    pub weight: f64,
}

#[derive(Debug, Clone)]
pub struct Subnet {
    /// Member links and the expansion iteration that added each.
    links: BTreeMap<LinkId, usize>,
    nodes: BTreeSet<NodeId>,
    iteration: usize,
}

impl Subnet {
    /// Builds the initial subnet from loose criteria. The criteria are
    /// tried in fallback order: as given, then with `ref` values folded
    /// into `name`, then with `name` values searched against `ref` —
    /// street designations routinely land in either field. Returns `None`
    /// when no option matches any link.
    pub(crate) fn from_criteria(net: &RoadwayNetwork, criteria: &LinkCriteria) -> Option<Subnet> {
        for (names, refs) in criteria_options(criteria) {
            let matched = matching_links(net, criteria, &names, &refs);
            if !matched.is_empty() {
                debug!(
                    "initial subnet from names {:?} refs {:?}: {} link(s)",
                    names,
                    refs,
                    matched.len()
                );
                let mut nodes = BTreeSet::new();
                for id in &matched {
                    let link = net.link(*id).expect("matched link must exist");
                    nodes.insert(link.a);
                    nodes.insert(link.b);
                }
                return Some(Subnet {
                    links: matched.into_iter().map(|id| (id, 0)).collect(),
                    nodes,
                    iteration: 0,
                });
            }
        }
        None
    }

    pub fn num_links(&self) -> usize {
        self.links.len()
    }

    /// Number of breadth expansions spent so far.
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    pub(crate) fn contains_node(&self, node: NodeId) -> bool {
        self.nodes.contains(&node)
    }

    pub(crate) fn link_ids(&self) -> impl Iterator<Item = LinkId> + '_ {
        self.links.keys().copied()
    }

    /// Adds one degree of breadth: every link touching a subnet node
    /// joins, tagged with the new iteration number.
    pub(crate) fn expand_breadth(&mut self, net: &RoadwayNetwork) {
        self.iteration += 1;
        let mut added = 0usize;
        let mut new_nodes = Vec::new();
        for link in net.links() {
            if self.links.contains_key(&link.model_link_id) {
                continue;
            }
            if self.nodes.contains(&link.a) || self.nodes.contains(&link.b) {
                self.links.insert(link.model_link_id, self.iteration);
                new_nodes.push(link.a);
                new_nodes.push(link.b);
                added += 1;
            }
        }
        self.nodes.extend(new_nodes);
        debug!(
            "subnet breadth {}: added {} link(s), now {}",
            self.iteration,
            added,
            self.links.len()
        );
    }

    /// Expands until the given nodes are all inside, spending at most
    /// `budget` iterations. Returns whether every node made it in.
    pub(crate) fn expand_to_nodes(
        &mut self,
        net: &RoadwayNetwork,
        nodes: &[NodeId],
        budget: usize,
    ) -> bool {
        while !nodes.iter().all(|n| self.contains_node(*n)) && self.iteration < budget {
            self.expand_breadth(net);
        }
        nodes.iter().all(|n| self.contains_node(*n))
    }

    /// Materializes the search graph. Edges are inserted in ascending
    /// link-id order so equal-cost frontiers expand lowest link id first,
    /// making tie-breaks deterministic. Edge weight is the link distance
    /// plus a penalty per expansion iteration.
    pub(crate) fn build_graph(
        &self,
        net: &RoadwayNetwork,
    ) -> (DiGraph<NodeId, SubnetEdge>, BTreeMap<NodeId, NodeIndex>) {
        let mut graph = DiGraph::new();
        let mut index = BTreeMap::new();
        for node in &self.nodes {
            index.insert(*node, graph.add_node(*node));
        }
        for (link_id, iteration) in &self.links {
            let link = net.link(*link_id).expect("subnet link must exist");
            let weight = link.distance + (*iteration as f64) * SUBNET_SP_WEIGHT_FACTOR;
            graph.add_edge(
                index[&link.a],
                index[&link.b],
                SubnetEdge {
                    link_id: *link_id,
                    weight,
                },
            );
        }
        (graph, index)
    }
}

fn criteria_options(criteria: &LinkCriteria) -> Vec<(Vec<String>, Vec<String>)> {
    let names: Vec<String> = criteria.name.iter().map(|s| s.to_lowercase()).collect();
    let refs: Vec<String> = criteria.ref_name.iter().map(|s| s.to_lowercase()).collect();

    let mut options = vec![(names.clone(), refs.clone())];
    if !refs.is_empty() {
        let mut folded = names.clone();
        folded.extend(refs.clone());
        options.push((folded, Vec::new()));
    }
    if !names.is_empty() {
        options.push((Vec::new(), names));
    }
    options
}

fn matching_links(
    net: &RoadwayNetwork,
    criteria: &LinkCriteria,
    names: &[String],
    refs: &[String],
) -> BTreeSet<LinkId> {
    net.links()
        .filter(|link| {
            if criteria.model_link_id.contains(&link.model_link_id) {
                return true;
            }
            let link_name = link.name.to_lowercase();
            if !link_name.is_empty() && names.iter().any(|n| link_name.contains(n)) {
                return true;
            }
            if let Some(ref_name) = &link.ref_name {
                let ref_name = ref_name.to_lowercase();
                if refs.iter().any(|r| ref_name.contains(r)) {
                    return true;
                }
            }
            false
        })
        .map(|link| link.model_link_id)
        .collect()
}
