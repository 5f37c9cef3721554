//! Scenario-level tests exercising whole selection/apply flows. Leaf
//! modules carry their own unit tests inline.

mod test_scenario;
mod test_selection;
