// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use crate::matcher::MatchResult;
use crate::Tags;

/// Tags applied to candidate lines which don't match any original road:
/// `highway=unclassified`, `oneway=no`, `source=custom_geojson`.
pub fn default_fallback_tags() -> Tags {
    Tags::from_iter([
        ("highway".to_string(), "unclassified".to_string()),
        ("oneway".to_string(), "no".to_string()),
        ("source".to_string(), "custom_geojson".to_string()),
    ])
}

/// Tags chosen for a candidate line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution<'a> {
    /// All tags of the matched original way.
    Matched { way_id: i64, tags: &'a Tags },

    /// The configured fallback tags.
    Fallback(&'a Tags),
}

impl<'a> Resolution<'a> {
    pub fn tags(&self) -> &'a Tags {
        match *self {
            Self::Matched { tags, .. } => tags,
            Self::Fallback(tags) => tags,
        }
    }

    pub fn is_matched(&self) -> bool {
        matches!(self, Self::Matched { .. })
    }
}

/// Picks the tags for a candidate: either the matched way's tags, verbatim,
/// or exactly the `fallback` tags. Tag sets are never merged.
pub fn resolve<'a>(m: &MatchResult<'a>, fallback: &'a Tags) -> Resolution<'a> {
    match m.matched() {
        Some(segment) => Resolution::Matched {
            way_id: segment.id,
            tags: &segment.tags,
        },
        None => Resolution::Fallback(fallback),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::Overlap;
    use crate::network::OriginalSegment;
    use crate::Coordinate;

    fn original() -> OriginalSegment {
        OriginalSegment::new(
            42,
            vec![Coordinate::new(0.0, 0.0), Coordinate::new(1.0, 0.0)],
            Tags::from_iter([
                ("highway".to_string(), "residential".to_string()),
                ("surface".to_string(), "asphalt".to_string()),
            ]),
        )
    }

    #[test]
    fn matched_tags_are_copied_verbatim() {
        let s = original();
        let fallback = default_fallback_tags();
        let m = MatchResult {
            best: Some(Overlap {
                segment: &s,
                shared: 2,
                total: 3,
            }),
        };

        let r = resolve(&m, &fallback);
        assert_eq!(
            r,
            Resolution::Matched {
                way_id: 42,
                tags: &s.tags
            }
        );
        assert!(r.is_matched());
        assert_eq!(r.tags().get("highway").map(String::as_str), Some("residential"));
        assert!(!r.tags().contains_key("source"));
    }

    #[test]
    fn insufficient_overlap_falls_back() {
        let s = original();
        let fallback = default_fallback_tags();
        let m = MatchResult {
            best: Some(Overlap {
                segment: &s,
                shared: 1,
                total: 2,
            }),
        };

        let r = resolve(&m, &fallback);
        assert!(!r.is_matched());
        assert_eq!(r.tags(), &fallback);
    }

    #[test]
    fn no_overlap_falls_back() {
        let fallback = Tags::from_iter([("highway".to_string(), "track".to_string())]);
        let r = resolve(&MatchResult::default(), &fallback);
        assert_eq!(r, Resolution::Fallback(&fallback));
    }

    #[test]
    fn default_fallback() {
        let tags = default_fallback_tags();
        assert_eq!(tags.len(), 3);
        assert_eq!(tags.get("highway").map(String::as_str), Some("unclassified"));
        assert_eq!(tags.get("oneway").map(String::as_str), Some("no"));
        assert_eq!(tags.get("source").map(String::as_str), Some("custom_geojson"));
    }
}
