//! Route pattern compilation and matching.
//!
//! # Responsibilities
//! - Anchor a raw regex path pattern to the whole normalized path
//! - Allow a single optional trailing slash
//! - Extract positional captures on match
//!
//! # Design Decisions
//! - The pattern IS a regex fragment (`/offers/([0-9]+)`), not a placeholder syntax
//! - Captures are positional, never named
//! - Compilation happens once, at registration

use regex::Regex;

use crate::routing::error::RouteError;

/// A compiled route pattern.
#[derive(Debug, Clone)]
pub struct RoutePattern {
    source: String,
    regex: Regex,
}

impl RoutePattern {
    /// Compile a declarative pattern such as `/admin/members/edit/([0-9]+)`.
    pub fn compile(pattern: &str) -> Result<Self, RouteError> {
        let anchored = format!("^{}/?$", pattern);
        let regex = Regex::new(&anchored).map_err(|source| RouteError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;

        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    /// The pattern as it was registered.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Number of capture groups (the positional parameters a match yields).
    pub fn capture_count(&self) -> usize {
        self.regex.captures_len() - 1
    }

    /// Match a normalized path.
    ///
    /// Returns the captured groups in left-to-right order, without the
    /// whole-match group. A group that did not take part in the match
    /// yields an empty string so positions stay stable.
    pub fn captures(&self, path: &str) -> Option<Vec<String>> {
        let caps = self.regex.captures(path)?;
        Some(
            caps.iter()
                .skip(1)
                .map(|group| group.map(|m| m.as_str().to_string()).unwrap_or_default())
                .collect(),
        )
    }

    /// True if the path matches without extracting anything.
    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_capture() {
        let pattern = RoutePattern::compile("/offers/([0-9]+)").unwrap();
        assert_eq!(pattern.captures("/offers/42"), Some(vec!["42".to_string()]));
        assert_eq!(pattern.captures("/offers/abc"), None);
        assert_eq!(pattern.capture_count(), 1);
    }

    #[test]
    fn test_anchored_to_whole_path() {
        let pattern = RoutePattern::compile("/offers").unwrap();
        assert!(pattern.is_match("/offers"));
        assert!(!pattern.is_match("/offers/42"));
        assert!(!pattern.is_match("/admin/offers"));
    }

    #[test]
    fn test_optional_trailing_slash() {
        let pattern = RoutePattern::compile("/admin/members/edit/([0-9]+)").unwrap();
        assert_eq!(
            pattern.captures("/admin/members/edit/7/"),
            Some(vec!["7".to_string()])
        );
        assert!(!pattern.is_match("/admin/members/edit/7//"));
    }

    #[test]
    fn test_zero_captures_yield_empty_params() {
        let pattern = RoutePattern::compile("/about").unwrap();
        assert_eq!(pattern.captures("/about"), Some(Vec::new()));
        assert_eq!(pattern.capture_count(), 0);
    }

    #[test]
    fn test_captures_in_order() {
        let pattern = RoutePattern::compile("/a/([0-9]+)/b/([a-z]+)").unwrap();
        assert_eq!(
            pattern.captures("/a/1/b/xy"),
            Some(vec!["1".to_string(), "xy".to_string()])
        );
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let err = RoutePattern::compile("/broken/([0-9]+").unwrap_err();
        assert!(matches!(err, RouteError::InvalidPattern { .. }));
    }
}
