//! Path pattern parsing.
//!
//! # Responsibilities
//! - Validate route patterns before they reach the path router
//! - Detect pairs of patterns the path router cannot hold together
//!
//! # Design Decisions
//! - Literal segments are case-sensitive
//! - `{name}` captures one segment, `{*name}` captures the rest and must be last
//! - Static segments win over captures at lookup time
//! - Captures at the same position after the same prefix must agree: same
//!   kind, same name

use std::fmt;

use crate::routing::RouteError;

/// One segment of a parsed pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Param(String),
    CatchAll(String),
}

/// A validated path pattern such as `/rolldice/{player}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    /// Parse and validate a pattern.
    pub fn parse(raw: &str) -> Result<Self, RouteError> {
        let invalid = |reason: &str| RouteError::InvalidPattern {
            pattern: raw.to_string(),
            reason: reason.to_string(),
        };

        let rest = raw
            .strip_prefix('/')
            .ok_or_else(|| invalid("must start with '/'"))?;

        let mut segments = Vec::new();
        let mut names: Vec<&str> = Vec::new();
        let parts: Vec<&str> = if rest.is_empty() {
            Vec::new()
        } else {
            rest.split('/').collect()
        };
        let last = parts.len().saturating_sub(1);

        for (i, part) in parts.iter().enumerate() {
            if part.is_empty() && i != last {
                return Err(invalid("empty segment"));
            }
            let segment = match part.strip_prefix('{').and_then(|p| p.strip_suffix('}')) {
                Some(inner) => {
                    let (catch_all, name) = match inner.strip_prefix('*') {
                        Some(name) => (true, name),
                        None => (false, inner),
                    };
                    let identifier = name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
                    if name.is_empty() || !identifier {
                        return Err(invalid("parameter names must be non-empty identifiers"));
                    }
                    if names.contains(&name) {
                        return Err(invalid("duplicate parameter name"));
                    }
                    names.push(name);
                    if catch_all {
                        if i != last {
                            return Err(invalid("catch-all must be the last segment"));
                        }
                        Segment::CatchAll(name.to_string())
                    } else {
                        Segment::Param(name.to_string())
                    }
                }
                None => {
                    if part.contains('{') || part.contains('}') {
                        return Err(invalid("braces are only allowed around a whole segment"));
                    }
                    if part.starts_with(':') || part.starts_with('*') {
                        return Err(invalid("captures are written as {name}"));
                    }
                    Segment::Literal(part.to_string())
                }
            };
            segments.push(segment);
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    /// The pattern as registered.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Whether `self` and `other` would collide in the path router.
    ///
    /// Walks the shared prefix; at the first differing segment, a literal on
    /// either side is fine (static wins), two captures are not.
    pub fn conflicts_with(&self, other: &PathPattern) -> bool {
        for (a, b) in self.segments.iter().zip(&other.segments) {
            match (a, b) {
                _ if a == b => continue,
                (Segment::Literal(_), _) | (_, Segment::Literal(_)) => return false,
                _ => return true,
            }
        }
        false
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
