use maplit::btreemap;

use crate::card::{ChangeOp, ProjectCard, PropertyChange, RoadwayAddition, RoadwayDeletion};
use crate::config::{ExistingValueConflict, ScenarioConfig};
use crate::network::{RoadwayLink, RoadwayNode, RoadwayShape};
use crate::scenario::{BaseScenario, ProjectStatus, Scenario, ScenarioError};
use crate::selection::{Facility, LinkCriteria};
use crate::test::fixtures::{init_logging, SIXTH_STREET};
use crate::types::{LinkId, PropValue};
use crate::Error;

fn scenario() -> Scenario {
    Scenario::new(BaseScenario::new(SIXTH_STREET.clone()), ScenarioConfig::default())
}

fn link_facility(link_id: LinkId) -> Facility {
    Facility::links(LinkCriteria {
        model_link_id: vec![link_id],
        ..LinkCriteria::default()
    })
}

fn lane_card(name: &str, link_id: LinkId, change: PropertyChange) -> ProjectCard {
    ProjectCard::new(name).with_change(ChangeOp::RoadwayPropertyChange {
        facility: link_facility(link_id),
        property_changes: btreemap! { "lanes".to_string() => change },
    })
}

fn names(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

#[test]
fn test_end_to_end_queue_and_apply() {
    init_logging();
    let mut scenario = scenario();
    scenario.register(lane_card("a", 101, PropertyChange::set(4i64))).unwrap();
    scenario
        .register(lane_card("b", 102, PropertyChange::change(1.0)).with_prerequisites(&["a"]))
        .unwrap();
    scenario.register(lane_card("c", 103, PropertyChange::set(1i64))).unwrap();

    assert_eq!(scenario.queued_projects().unwrap(), names(&["a", "b", "c"]));

    scenario.apply_projects(&["a"]).unwrap();
    assert_eq!(scenario.applied_projects(), names(&["a"]).as_slice());
    assert_eq!(scenario.queued_projects().unwrap(), names(&["b", "c"]));
    assert_eq!(
        scenario.road_net().link(101).unwrap().prop("lanes"),
        Some(PropValue::Int(4))
    );

    scenario.apply_all_projects().unwrap();
    assert_eq!(scenario.applied_projects(), names(&["a", "b", "c"]).as_slice());
    assert_eq!(
        scenario.road_net().link(102).unwrap().prop("lanes"),
        Some(PropValue::Int(3))
    );
    assert_eq!(
        scenario.road_net().link(103).unwrap().prop("lanes"),
        Some(PropValue::Int(1))
    );
    assert!(scenario
        .outcomes()
        .iter()
        .all(|o| o.status == ProjectStatus::Applied));
}

#[test]
fn test_queue_keeps_registration_order_unless_forced() {
    let mut scenario = scenario();
    scenario
        .register(lane_card("b", 102, PropertyChange::set(2i64)).with_prerequisites(&["c"]))
        .unwrap();
    scenario.register(lane_card("a", 101, PropertyChange::set(2i64))).unwrap();
    scenario.register(lane_card("c", 103, PropertyChange::set(2i64))).unwrap();

    // b waits for c; a and c keep registration order
    assert_eq!(scenario.queued_projects().unwrap(), names(&["a", "c", "b"]));
}

#[test]
fn test_duplicate_name_rejected() {
    let mut scenario = scenario();
    scenario.register(lane_card("widen", 101, PropertyChange::set(2i64))).unwrap();
    let result = scenario.register(lane_card("Widen", 102, PropertyChange::set(2i64)));
    assert!(matches!(
        result,
        Err(Error::Scenario(ScenarioError::DuplicateProjectName(_)))
    ));

    // applying then re-registering under the same name is still rejected
    scenario.apply_all_projects().unwrap();
    let result = scenario.register(lane_card("widen", 103, PropertyChange::set(2i64)));
    assert!(matches!(
        result,
        Err(Error::Scenario(ScenarioError::DuplicateProjectName(_)))
    ));
}

#[test]
fn test_applying_unqueued_project_rejected() {
    let mut scenario = scenario();
    scenario.register(lane_card("a", 101, PropertyChange::set(2i64))).unwrap();
    scenario.apply_projects(&["a"]).unwrap();

    assert!(matches!(
        scenario.apply_projects(&["a"]),
        Err(Error::Scenario(ScenarioError::NotQueued(_)))
    ));
    assert_eq!(scenario.applied_projects(), names(&["a"]).as_slice());
}

#[test]
fn test_conflicts_fail_symmetrically() {
    // only a declares the conflict; whichever applies second must fail
    let card_a = lane_card("a", 101, PropertyChange::set(2i64)).with_conflicts(&["b"]);
    let card_b = lane_card("b", 102, PropertyChange::set(2i64));

    let mut scenario_1 = scenario();
    scenario_1.register(card_a.clone()).unwrap();
    scenario_1.register(card_b.clone()).unwrap();
    scenario_1.apply_projects(&["b"]).unwrap();
    assert!(matches!(
        scenario_1.apply_projects(&["a"]),
        Err(Error::Scenario(ScenarioError::ConflictViolation(_)))
    ));

    let mut scenario_2 = scenario();
    scenario_2.register(card_a).unwrap();
    scenario_2.register(card_b).unwrap();
    scenario_2.apply_projects(&["a"]).unwrap();
    assert!(matches!(
        scenario_2.apply_projects(&["b"]),
        Err(Error::Scenario(ScenarioError::ConflictViolation(_)))
    ));
}

#[test]
fn test_conflicts_inherited_from_base_scenario() {
    let mut base = BaseScenario::new(SIXTH_STREET.clone());
    base.applied_projects = vec!["legacy".to_string()];
    base.conflicts
        .insert("legacy".to_string(), vec!["bypass".to_string()]);

    let mut scenario = Scenario::new(base, ScenarioConfig::default());
    scenario.register(lane_card("bypass", 101, PropertyChange::set(2i64))).unwrap();
    assert!(matches!(
        scenario.apply_projects(&["bypass"]),
        Err(Error::Scenario(ScenarioError::ConflictViolation(_)))
    ));
}

#[test]
fn test_missing_corequisite() {
    let mut scenario = scenario();
    scenario
        .register(lane_card("b", 102, PropertyChange::set(2i64)).with_corequisites(&["a"]))
        .unwrap();

    assert!(matches!(
        scenario.apply_projects(&["b"]),
        Err(Error::Scenario(ScenarioError::MissingCorequisite(_)))
    ));
    assert!(matches!(
        scenario.queued_projects(),
        Err(Error::Scenario(ScenarioError::MissingCorequisite(_)))
    ));

    // satisfied by the same batch
    scenario.register(lane_card("a", 101, PropertyChange::set(2i64))).unwrap();
    scenario.apply_projects(&["b", "a"]).unwrap();
    assert_eq!(scenario.applied_projects(), names(&["b", "a"]).as_slice());
}

#[test]
fn test_missing_prerequisite_fails_fast() {
    let mut scenario = scenario();
    scenario.register(lane_card("a", 101, PropertyChange::set(2i64))).unwrap();
    scenario
        .register(lane_card("b", 102, PropertyChange::set(2i64)).with_prerequisites(&["a"]))
        .unwrap();

    assert!(matches!(
        scenario.apply_projects(&["b"]),
        Err(Error::Scenario(ScenarioError::MissingPrerequisite(_)))
    ));
    // nothing was applied
    assert!(scenario.applied_projects().is_empty());
    assert_eq!(
        scenario.road_net().link(102).unwrap().prop("lanes"),
        Some(PropValue::Int(2))
    );
}

#[test]
fn test_dependency_cycle_detected() {
    let mut scenario = scenario();
    scenario
        .register(lane_card("a", 101, PropertyChange::set(2i64)).with_prerequisites(&["b"]))
        .unwrap();
    scenario
        .register(lane_card("b", 102, PropertyChange::set(2i64)).with_prerequisites(&["a"]))
        .unwrap();

    match scenario.queued_projects() {
        Err(Error::Scenario(ScenarioError::DependencyCycle(members))) => {
            assert_eq!(members, names(&["a", "b"]));
        }
        other => panic!("expected dependency cycle, got {:?}", other),
    }
}

#[test]
fn test_existing_value_error_leaves_project_unapplied() {
    let mut scenario = scenario();
    let change = PropertyChange::set(5i64)
        .with_existing(9i64)
        .on_existing_conflict(ExistingValueConflict::Error);
    scenario.register(lane_card("widen", 101, change)).unwrap();

    assert!(matches!(
        scenario.apply_projects(&["widen"]),
        Err(Error::Edit(_))
    ));
    assert_eq!(
        scenario.road_net().link(101).unwrap().prop("lanes"),
        Some(PropValue::Int(2))
    );
    assert!(scenario.applied_projects().is_empty());
    assert_eq!(scenario.queued_projects().unwrap(), names(&["widen"]));
    assert!(matches!(
        scenario.outcomes().last().unwrap().status,
        ProjectStatus::Failed(_)
    ));
}

#[test]
fn test_all_edits_skipped_records_skipped_status() {
    let mut scenario = scenario();
    let change = PropertyChange::set(5i64)
        .with_existing(9i64)
        .on_existing_conflict(ExistingValueConflict::Skip);
    scenario.register(lane_card("widen", 101, change)).unwrap();

    scenario.apply_projects(&["widen"]).unwrap();
    assert_eq!(
        scenario.road_net().link(101).unwrap().prop("lanes"),
        Some(PropValue::Int(2))
    );
    let outcome = scenario.outcomes().last().unwrap();
    assert_eq!(outcome.status, ProjectStatus::SkippedAllChanges);
    assert!(!outcome.warnings.is_empty());
    // the project still left the queue
    assert_eq!(scenario.applied_projects(), names(&["widen"]).as_slice());
}

#[test]
fn test_warn_policy_records_warnings_but_applies() {
    let mut scenario = scenario();
    let change = PropertyChange::set(5i64).with_existing(9i64);
    scenario.register(lane_card("widen", 101, change)).unwrap();

    scenario.apply_projects(&["widen"]).unwrap();
    assert_eq!(
        scenario.road_net().link(101).unwrap().prop("lanes"),
        Some(PropValue::Int(5))
    );
    let outcome = scenario.outcomes().last().unwrap();
    assert_eq!(outcome.status, ProjectStatus::Applied);
    assert!(!outcome.warnings.is_empty());
}

#[test]
fn test_failed_change_does_not_roll_back_earlier_ones() {
    let mut scenario = scenario();
    let bad_facility = Facility::links(LinkCriteria {
        model_link_id: vec![999],
        ignore_missing: false,
        ..LinkCriteria::default()
    });
    let card = ProjectCard::new("two-step")
        .with_change(ChangeOp::RoadwayPropertyChange {
            facility: link_facility(101),
            property_changes: btreemap! { "lanes".to_string() => PropertyChange::set(7i64) },
        })
        .with_change(ChangeOp::RoadwayPropertyChange {
            facility: bad_facility,
            property_changes: btreemap! { "lanes".to_string() => PropertyChange::set(1i64) },
        });
    scenario.register(card).unwrap();

    assert!(scenario.apply_projects(&["two-step"]).is_err());
    // the first change stays committed; the project does not
    assert_eq!(
        scenario.road_net().link(101).unwrap().prop("lanes"),
        Some(PropValue::Int(7))
    );
    assert!(scenario.applied_projects().is_empty());
}

#[test]
fn test_roadway_addition_and_deletion_cards() {
    let mut scenario = scenario();

    let addition = RoadwayAddition {
        nodes: vec![RoadwayNode::new(7, 6.0, 0.0)],
        links: vec![RoadwayLink::new(106, 6, 7).with_shape(500).with_prop("lanes", 1i64)],
        shapes: vec![RoadwayShape::new(500, vec![(5.0, 0.0), (6.0, 0.0)])],
    };
    scenario
        .register(ProjectCard::new("extend").with_change(ChangeOp::RoadwayAddition(addition)))
        .unwrap();
    scenario.apply_projects(&["extend"]).unwrap();
    assert!(scenario.road_net().link(106).is_some());
    assert!(scenario.road_net().node(7).is_some());

    let deletion = RoadwayDeletion {
        links: Some(LinkCriteria {
            model_link_id: vec![106],
            ..LinkCriteria::default()
        }),
        nodes: Some(crate::selection::NodeCriteria {
            model_node_id: vec![7],
            ..crate::selection::NodeCriteria::default()
        }),
        clean_shapes: true,
    };
    scenario
        .register(
            ProjectCard::new("retire")
                .with_prerequisites(&["extend"])
                .with_change(ChangeOp::RoadwayDeletion(deletion)),
        )
        .unwrap();
    scenario.apply_all_projects().unwrap();
    assert!(scenario.road_net().link(106).is_none());
    assert!(scenario.road_net().node(7).is_none());
    assert!(scenario.road_net().shape(500).is_none());
    assert_eq!(scenario.applied_projects(), names(&["extend", "retire"]).as_slice());
}

#[test]
fn test_cards_with_empty_changes_still_flow_through_queue() {
    let mut scenario = scenario();
    scenario.register(ProjectCard::new("placeholder")).unwrap();
    scenario.apply_all_projects().unwrap();
    assert_eq!(scenario.applied_projects(), names(&["placeholder"]).as_slice());
    assert_eq!(
        scenario.outcomes().last().unwrap().status,
        ProjectStatus::Applied
    );
}
