//! Predicates over scoped property values.
//!
//! Terminology follows the scoping rules of the applicator: two scopes
//! *collide* on category if the categories are equal or either is the
//! default (the default category overlaps everything); they *overlap*
//! if they collide on category and their timespans share a minute; an
//! entry *matches* a written scope exactly when both dimensions are equal.

use crate::config::DEFAULT_CATEGORY;
use crate::network::ScopedValue;
use crate::time::Timespan;

pub(crate) fn categories_collide(a: &str, b: &str) -> bool {
    a == b || a == DEFAULT_CATEGORY || b == DEFAULT_CATEGORY
}

pub(crate) fn scopes_overlap(value: &ScopedValue, category: &str, timespan: Timespan) -> bool {
    categories_collide(&value.category, category) && value.timespan.overlaps(&timespan)
}

pub(crate) fn scope_matches_exactly(
    value: &ScopedValue,
    category: &str,
    timespan: Timespan,
) -> bool {
    value.category == category && value.timespan == timespan
}

/// Returns the first overlapping pair in a scoped list, if any. A link's
/// scoped list must stay pairwise non-overlapping at all times.
pub(crate) fn find_overlap(values: &[ScopedValue]) -> Option<(String, String)> {
    for (i, a) in values.iter().enumerate() {
        for b in values.iter().skip(i + 1) {
            if categories_collide(&a.category, &b.category) && a.timespan.overlaps(&b.timespan) {
                return Some((
                    format!("{}/{}", a.category, a.timespan),
                    format!("{}/{}", b.category, b.timespan),
                ));
            }
        }
    }
    None
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::types::PropValue;

    fn scoped(category: &str, start: &str, end: &str, value: i64) -> ScopedValue {
        ScopedValue {
            category: category.to_string(),
            timespan: Timespan::parse(start, end).unwrap(),
            value: PropValue::Int(value),
        }
    }

    #[test]
    fn test_default_category_collides_with_everything() {
        assert!(categories_collide(DEFAULT_CATEGORY, "hov2"));
        assert!(categories_collide("hov2", DEFAULT_CATEGORY));
        assert!(categories_collide("hov2", "hov2"));
        assert!(!categories_collide("hov2", "truck"));
    }

    #[test]
    fn test_find_overlap() {
        let disjoint = vec![
            scoped("any", "06:00", "09:00", 5),
            scoped("any", "13:00", "16:00", 1),
        ];
        assert!(find_overlap(&disjoint).is_none());

        let overlapping = vec![
            scoped("any", "06:00", "09:00", 5),
            scoped("any", "08:00", "10:00", 1),
        ];
        assert!(find_overlap(&overlapping).is_some());

        // distinct non-default categories may share a timespan
        let categorized = vec![
            scoped("hov2", "06:00", "09:00", 2),
            scoped("truck", "06:00", "09:00", 1),
        ];
        assert!(find_overlap(&categorized).is_none());
    }
}
