//! Scenario-wide defaults, passed by value into a [`Scenario`] at
//! construction. Per-change overrides on a project card take precedence
//! over these without mutating them.
//!
//! [`Scenario`]: crate::scenario::Scenario

/// Category a scoped value applies to when none is given. The default
/// category overlaps every other category.
pub const DEFAULT_CATEGORY: &str = "any";

/// Total subnet expansions allowed before a facility search gives up.
pub const DEFAULT_MAX_SEARCH_BREADTH: usize = 10;

/// Expansions spent up-front pulling the from/to anchors into the subnet
/// before the first shortest-path attempt.
pub const INITIAL_SEARCH_BREADTH: usize = 5;

/// Weight penalty per expansion iteration, so the search prefers links
/// matched by the initial selection over links pulled in later.
pub const SUBNET_SP_WEIGHT_FACTOR: f64 = 100.0;

/// What to do when a property's current value does not match the
/// `existing` value stated on the project card.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExistingValueConflict {
    /// Abort the whole project.
    Error,
    /// Leave this property unmodified on this element; other edits proceed.
    Skip,
    /// Record a warning and edit anyway.
    Warn,
}

impl Default for ExistingValueConflict {
    fn default() -> Self {
        ExistingValueConflict::Warn
    }
}

/// How to treat existing scoped entries that overlap a scoped entry being
/// written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverwriteScoped {
    /// Replace only the overlapping entries; independent entries survive.
    Conflicting,
    /// Clear every existing scoped entry for the property first.
    All,
    /// Abort if any overlap is detected.
    Error,
}

impl Default for OverwriteScoped {
    fn default() -> Self {
        OverwriteScoped::Conflicting
    }
}

/// Immutable configuration for a scenario run.
#[derive(Debug, Clone)]
pub struct ScenarioConfig {
    pub existing_value_conflict: ExistingValueConflict,
    pub overwrite_scoped: OverwriteScoped,
    pub max_search_breadth: usize,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        ScenarioConfig {
            existing_value_conflict: ExistingValueConflict::default(),
            overwrite_scoped: OverwriteScoped::default(),
            max_search_breadth: DEFAULT_MAX_SEARCH_BREADTH,
        }
    }
}
