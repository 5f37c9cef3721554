//! Shortest-path search for facility selections: finds the contiguous
//! run of links between a selection's `from` and `to` anchors inside a
//! breadth-bounded subnet, widening the subnet and retrying on failure.

use itertools::Itertools;
use log::debug;
use petgraph::algo::astar;
use petgraph::visit::EdgeRef;

use crate::config::INITIAL_SEARCH_BREADTH;
use crate::network::RoadwayNetwork;
use crate::selection::subnet::Subnet;
use crate::selection::{anchor_node_id, LinkSelection, SelectionError};
use crate::types::{LinkId, NodeId};

/// The resolved path for a facility selection: the subnet it was found
/// in, the node sequence, and the links connecting consecutive nodes.
#[derive(Debug, Clone)]
pub struct Segment {
    pub subnet: Subnet,
    pub path: Vec<NodeId>,
    pub matched_link_ids: Vec<LinkId>,
}

/// Runs the bounded search. The subnet is first grown until it holds
/// both anchors (spending the small initial breadth allowance), then the
/// shortest path is attempted; every miss widens the subnet by one
/// breadth increment until `max_search_breadth` total expansions have
/// been spent.
pub(crate) fn find_segment(
    net: &RoadwayNetwork,
    selection: &LinkSelection,
    max_search_breadth: usize,
) -> Result<Segment, SelectionError> {
    let (from, to) = match (&selection.from, &selection.to) {
        (Some(from), Some(to)) => (from, to),
        _ => {
            return Err(SelectionError::InvalidSelection(
                "segment selection requires both from and to".to_string(),
            ))
        }
    };
    let from_node = anchor_node_id(net, from)?;
    let to_node = anchor_node_id(net, to)?;
    let not_found = || SelectionError::FacilityNotFound {
        from: from_node.to_string(),
        to: to_node.to_string(),
        criteria: selection.criteria.key(),
    };

    let mut subnet = Subnet::from_criteria(net, &selection.criteria).ok_or_else(|| not_found())?;
    subnet.expand_to_nodes(
        net,
        &[from_node, to_node],
        INITIAL_SEARCH_BREADTH.min(max_search_breadth),
    );

    loop {
        if subnet.contains_node(from_node) && subnet.contains_node(to_node) {
            if let Some(path) = shortest_path(net, &subnet, from_node, to_node) {
                debug!(
                    "found path from {} to {} through {} node(s) at breadth {}",
                    from_node,
                    to_node,
                    path.len(),
                    subnet.iteration()
                );
                let matched_link_ids = links_along_path(net, &subnet, &path);
                return Ok(Segment {
                    subnet,
                    path,
                    matched_link_ids,
                });
            }
        }
        if subnet.iteration() >= max_search_breadth {
            return Err(not_found());
        }
        debug!(
            "no path from {} to {} at breadth {}, widening",
            from_node,
            to_node,
            subnet.iteration()
        );
        subnet.expand_breadth(net);
    }
}

fn shortest_path(
    net: &RoadwayNetwork,
    subnet: &Subnet,
    from: NodeId,
    to: NodeId,
) -> Option<Vec<NodeId>> {
    let (graph, index) = subnet.build_graph(net);
    let start = index[&from];
    let goal = index[&to];
    let (_cost, path) = astar(&graph, start, |n| n == goal, |e| e.weight().weight, |_| 0.0)?;
    Some(path.into_iter().map(|ix| graph[ix]).collect())
}

/// Recovers the link for each consecutive node pair of the path. Where
/// parallel links connect the same pair, the lowest link id wins, which
/// mirrors the deterministic tie-break of the search itself.
fn links_along_path(net: &RoadwayNetwork, subnet: &Subnet, path: &[NodeId]) -> Vec<LinkId> {
    path.iter()
        .tuple_windows()
        .map(|(a, b)| {
            subnet
                .link_ids()
                .find(|id| {
                    let link = net.link(*id).expect("subnet link must exist");
                    link.a == *a && link.b == *b
                })
                .expect("path traverses a link outside the subnet")
        })
        .collect()
}
