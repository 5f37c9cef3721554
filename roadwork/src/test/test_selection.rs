use crate::config::DEFAULT_MAX_SEARCH_BREADTH;
use crate::selection::{Facility, LinkCriteria, LinkSelection, NodeAnchor, NodeCriteria, SelectionError};
use crate::test::fixtures::{init_logging, SIXTH_STREET};
use crate::types::PropValue;

fn sixth_street_facility(from: NodeAnchor, to: NodeAnchor) -> Facility {
    let criteria = LinkCriteria {
        name: vec!["6th".to_string()],
        ..LinkCriteria::default()
    };
    Facility::segment(criteria, from, to)
}

#[test]
fn test_explicit_link_ids() {
    let mut net = SIXTH_STREET.clone();
    let criteria = LinkCriteria {
        model_link_id: vec![103, 101],
        ..LinkCriteria::default()
    };
    let selection = net
        .get_selection(&Facility::links(criteria), DEFAULT_MAX_SEARCH_BREADTH)
        .unwrap();
    assert_eq!(selection.link_ids(), &[101, 103]);
    assert!(selection.segment().is_none());
}

#[test]
fn test_explicit_ids_ignore_missing() {
    let mut net = SIXTH_STREET.clone();
    let mut criteria = LinkCriteria {
        model_link_id: vec![101, 999],
        ..LinkCriteria::default()
    };
    let selection = net
        .get_selection(&Facility::links(criteria.clone()), DEFAULT_MAX_SEARCH_BREADTH)
        .unwrap();
    assert_eq!(selection.link_ids(), &[101]);

    criteria.ignore_missing = false;
    let result = net.get_selection(&Facility::links(criteria), DEFAULT_MAX_SEARCH_BREADTH);
    assert!(matches!(result, Err(SelectionError::MissingIds(_))));
}

#[test]
fn test_segment_search_widens_subnet() {
    init_logging();
    let mut net = SIXTH_STREET.clone();
    let facility = sixth_street_facility(NodeAnchor::Node(1), NodeAnchor::Node(6));

    // the gap between the named ends needs two expansions to close
    let selection = net.get_selection(&facility, 2).unwrap();
    assert_eq!(selection.link_ids(), &[101, 102, 103, 104, 105]);
    let segment = selection.segment().unwrap();
    assert_eq!(segment.path, vec![1, 2, 3, 4, 5, 6]);
    assert_eq!(segment.subnet.iteration(), 2);
}

#[test]
fn test_segment_search_fails_below_needed_breadth() {
    let mut net = SIXTH_STREET.clone();
    let facility = sixth_street_facility(NodeAnchor::Node(1), NodeAnchor::Node(6));
    let result = net.get_selection(&facility, 1);
    assert!(matches!(result, Err(SelectionError::FacilityNotFound { .. })));
}

#[test]
fn test_segment_search_exhausts_breadth_budget() {
    let mut net = SIXTH_STREET.clone();
    // node 9 has no links at all, so no breadth ever reaches it
    let facility = sixth_street_facility(NodeAnchor::Node(1), NodeAnchor::Node(9));
    let result = net.get_selection(&facility, DEFAULT_MAX_SEARCH_BREADTH);
    match result {
        Err(SelectionError::FacilityNotFound { from, to, .. }) => {
            assert_eq!(from, "1");
            assert_eq!(to, "9");
        }
        other => panic!("expected FacilityNotFound, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_segment_anchors_by_osm_id() {
    let mut net = SIXTH_STREET.clone();
    let facility = sixth_street_facility(
        NodeAnchor::Osm("osm1".to_string()),
        NodeAnchor::Osm("osm6".to_string()),
    );
    let selection = net.get_selection(&facility, DEFAULT_MAX_SEARCH_BREADTH).unwrap();
    assert_eq!(selection.link_ids(), &[101, 102, 103, 104, 105]);
}

#[test]
fn test_segment_hard_filters_prune_without_research() {
    let mut net = SIXTH_STREET.clone();
    let mut criteria = LinkCriteria {
        name: vec!["6th".to_string()],
        ..LinkCriteria::default()
    };
    criteria
        .filters
        .insert("lanes".to_string(), vec![PropValue::Int(2)]);
    let facility = Facility::segment(criteria, NodeAnchor::Node(1), NodeAnchor::Node(6));

    let selection = net.get_selection(&facility, DEFAULT_MAX_SEARCH_BREADTH).unwrap();
    // link 103 has 3 lanes: pruned from the match, still part of the path
    assert_eq!(selection.link_ids(), &[101, 102, 104, 105]);
    assert_eq!(selection.segment().unwrap().path, vec![1, 2, 3, 4, 5, 6]);
}

#[test]
fn test_name_criteria_found_in_ref_field() {
    use crate::network::RoadwayLink;

    let mut net = SIXTH_STREET.clone();
    // the designation lives in ref, the selection asks by name
    net.add_link(RoadwayLink::new(110, 1, 6).with_ref("I-94")).unwrap();
    let criteria = LinkCriteria {
        name: vec!["I-94".to_string()],
        ..LinkCriteria::default()
    };
    let facility = Facility::segment(criteria, NodeAnchor::Node(1), NodeAnchor::Node(6));
    let selection = net.get_selection(&facility, DEFAULT_MAX_SEARCH_BREADTH).unwrap();
    assert_eq!(selection.link_ids(), &[110]);
}

#[test]
fn test_lone_anchor_is_invalid() {
    let mut net = SIXTH_STREET.clone();
    let facility = Facility::Links(LinkSelection {
        criteria: LinkCriteria::default(),
        from: Some(NodeAnchor::Node(1)),
        to: None,
    });
    let result = net.get_selection(&facility, DEFAULT_MAX_SEARCH_BREADTH);
    assert!(matches!(result, Err(SelectionError::InvalidSelection(_))));
}

#[test]
fn test_node_selection_by_osm_and_filters() {
    let mut net = SIXTH_STREET.clone();
    let criteria = NodeCriteria {
        osm_node_id: vec!["osm3".to_string(), "osm5".to_string()],
        ..NodeCriteria::default()
    };
    let selection = net
        .get_selection(&Facility::nodes(criteria), DEFAULT_MAX_SEARCH_BREADTH)
        .unwrap();
    assert_eq!(selection.node_ids(), &[3, 5]);

    let mut filtered = NodeCriteria::default();
    filtered.filters.insert("X".to_string(), vec![PropValue::Float(9.0)]);
    let selection = net
        .get_selection(&Facility::nodes(filtered), DEFAULT_MAX_SEARCH_BREADTH)
        .unwrap();
    assert_eq!(selection.node_ids(), &[9]);
}

#[test]
fn test_selection_cache_hit_and_invalidation() {
    let mut net = SIXTH_STREET.clone();
    let mut criteria = LinkCriteria {
        model_link_id: vec![103],
        ..LinkCriteria::default()
    };
    criteria
        .filters
        .insert("lanes".to_string(), vec![PropValue::Int(3)]);
    let facility = Facility::links(criteria);

    let first = net.get_selection(&facility, DEFAULT_MAX_SEARCH_BREADTH).unwrap();
    assert_eq!(first.link_ids(), &[103]);
    assert_eq!(net.cached_selections(), 1);

    // unchanged network: memoized result, no new entry
    let second = net.get_selection(&facility, DEFAULT_MAX_SEARCH_BREADTH).unwrap();
    assert_eq!(second.link_ids(), &[103]);
    assert_eq!(net.cached_selections(), 1);

    // the mutation invalidates the cached result, which no longer matches
    net.set_link_property(103, "lanes", 2i64, None).unwrap();
    let third = net.get_selection(&facility, DEFAULT_MAX_SEARCH_BREADTH).unwrap();
    assert!(third.link_ids().is_empty());
}
