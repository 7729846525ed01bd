use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::data::reader::EventId;

/// How the per-channel index sets combine into the coincident event set.
///
/// The configuration surface selects these by index (0, 1, 2), matching
/// the historical run scripts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoincidencePolicy {
    /// AND across every provided set (the default).
    IntersectAll,
    /// The substitutable channel contributes its secondary-peak indices
    /// instead of its primary ones.
    SecondaryOnly,
    /// The substitutable channel contributes primary OR secondary.
    PrimaryOrSecondary,
}

impl CoincidencePolicy {
    pub fn from_index(index: u8) -> Option<CoincidencePolicy> {
        match index {
            0 => Some(CoincidencePolicy::IntersectAll),
            1 => Some(CoincidencePolicy::SecondaryOnly),
            2 => Some(CoincidencePolicy::PrimaryOrSecondary),
            _ => None,
        }
    }

    pub fn index(&self) -> u8 {
        match self {
            CoincidencePolicy::IntersectAll => 0,
            CoincidencePolicy::SecondaryOnly => 1,
            CoincidencePolicy::PrimaryOrSecondary => 2,
        }
    }
}

/// Intersect index sets under `policy`.
///
/// `sets[0]` is the substitutable channel's primary set and `secondary`
/// its secondary-peak set (`None` when no secondary peak was found, which
/// behaves as the empty set); `sets[1..]` always intersect as-is.
pub fn select_coincident(
    sets: &[&HashSet<EventId>],
    secondary: Option<&HashSet<EventId>>,
    policy: CoincidencePolicy,
) -> HashSet<EventId> {
    if sets.is_empty() {
        return HashSet::new();
    }
    let empty = HashSet::new();
    let secondary = secondary.unwrap_or(&empty);

    let mut result: HashSet<EventId> = match policy {
        CoincidencePolicy::IntersectAll => sets[0].clone(),
        CoincidencePolicy::SecondaryOnly => secondary.clone(),
        CoincidencePolicy::PrimaryOrSecondary => sets[0].union(secondary).cloned().collect(),
    };
    for set in &sets[1..] {
        result.retain(|id| set.contains(id));
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(ids: &[&str]) -> HashSet<EventId> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_intersect_all() {
        let a = set(&["1", "2", "3"]);
        let b = set(&["2", "3", "4"]);
        let c = set(&["2", "3"]);
        let result = select_coincident(&[&a, &b, &c], None, CoincidencePolicy::IntersectAll);
        assert_eq!(result, set(&["2", "3"]));
    }

    #[test]
    fn test_primary_or_secondary() {
        let primary = set(&["1", "2"]);
        let secondary = set(&["3", "4"]);
        let rest = set(&["2", "3"]);
        let result = select_coincident(
            &[&primary, &rest],
            Some(&secondary),
            CoincidencePolicy::PrimaryOrSecondary,
        );
        assert_eq!(result, set(&["2", "3"]));
    }

    #[test]
    fn test_secondary_only_substitutes() {
        let primary = set(&["1", "2"]);
        let secondary = set(&["2", "3"]);
        let rest = set(&["2", "3", "4"]);
        let result = select_coincident(
            &[&primary, &rest],
            Some(&secondary),
            CoincidencePolicy::SecondaryOnly,
        );
        assert_eq!(result, set(&["2", "3"]));
    }

    #[test]
    fn test_missing_secondary_behaves_as_empty() {
        let primary = set(&["1", "2"]);
        let rest = set(&["1", "2"]);
        let result = select_coincident(&[&primary, &rest], None, CoincidencePolicy::SecondaryOnly);
        assert!(result.is_empty());
        let result = select_coincident(
            &[&primary, &rest],
            None,
            CoincidencePolicy::PrimaryOrSecondary,
        );
        assert_eq!(result, set(&["1", "2"]));
    }

    #[test]
    fn test_unknown_policy_index_rejected() {
        assert_eq!(CoincidencePolicy::from_index(0), Some(CoincidencePolicy::IntersectAll));
        assert_eq!(CoincidencePolicy::from_index(7), None);
    }
}
