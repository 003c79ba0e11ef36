//! Route pattern compilation and matching.
//!
//! # Responsibilities
//! - Compile a path template once at registration
//! - Match request paths segment by segment
//! - Extract named parameters and the wildcard remainder
//!
//! # Pattern Syntax
//! ```text
//! /pages/:slug        `:name` matches exactly one non-empty segment
//! /images/*           trailing `*` matches everything after `/images/`
//! /                   root only
//! ```
//!
//! # Design Decisions
//! - No regex: segment comparison is O(segments)
//! - Path matching is case-sensitive
//! - Captured values are passed through raw (no percent-decoding)

use std::fmt;
use thiserror::Error;

/// Methods a route can be registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Options,
}

impl Method {
    /// Map an HTTP method onto a routable one. Anything else can never match.
    pub fn from_http(method: &axum::http::Method) -> Option<Self> {
        match *method {
            axum::http::Method::GET => Some(Method::Get),
            axum::http::Method::POST => Some(Method::Post),
            axum::http::Method::OPTIONS => Some(Method::Options),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised while compiling a path template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("pattern '{0}' must start with '/'")]
    MissingLeadingSlash(String),

    #[error("pattern '{0}' has an unnamed ':' segment")]
    EmptyParamName(String),

    #[error("pattern '{0}' uses '*' outside the final segment")]
    MisplacedWildcard(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Named(String),
}

/// A compiled path template.
#[derive(Debug, Clone)]
pub struct RoutePattern {
    source: String,
    segments: Vec<Segment>,
    wildcard: bool,
}

impl RoutePattern {
    pub fn compile(template: &str) -> Result<Self, PatternError> {
        let body = template
            .strip_prefix('/')
            .ok_or_else(|| PatternError::MissingLeadingSlash(template.to_string()))?;

        let mut parts: Vec<&str> = body.split('/').collect();
        let wildcard = parts.last() == Some(&"*");
        if wildcard {
            parts.pop();
        }

        let mut segments = Vec::with_capacity(parts.len());
        for part in parts {
            if part.contains('*') {
                return Err(PatternError::MisplacedWildcard(template.to_string()));
            }
            match part.strip_prefix(':') {
                Some("") => return Err(PatternError::EmptyParamName(template.to_string())),
                Some(name) => segments.push(Segment::Named(name.to_string())),
                None => segments.push(Segment::Literal(part.to_string())),
            }
        }

        Ok(Self {
            source: template.to_string(),
            segments,
            wildcard,
        })
    }

    /// The template text this pattern was compiled from.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Named segments in declaration order.
    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Named(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Match a request path, returning captured parameters on success.
    pub fn matches(&self, path: &str) -> Option<Params> {
        let mut remaining = Some(path.strip_prefix('/')?);
        let mut params = Params::default();

        for segment in &self.segments {
            let current = remaining?;
            let (head, tail) = match current.split_once('/') {
                Some((head, tail)) => (head, Some(tail)),
                None => (current, None),
            };

            match segment {
                Segment::Literal(literal) if literal == head => {}
                Segment::Literal(_) => return None,
                Segment::Named(_) if head.is_empty() => return None,
                Segment::Named(name) => params.named.push((name.clone(), head.to_string())),
            }
            remaining = tail;
        }

        if self.wildcard {
            params.wildcard = Some(remaining?.to_string());
            Some(params)
        } else if remaining.is_none() {
            Some(params)
        } else {
            None
        }
    }
}

/// Parameters captured by a matched pattern.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    named: Vec<(String, String)>,
    wildcard: Option<String>,
}

impl Params {
    /// Look up a named parameter. `"*"` returns the wildcard remainder.
    pub fn get(&self, name: &str) -> Option<&str> {
        if name == "*" {
            return self.wildcard();
        }
        self.named
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Everything matched by a trailing `*`.
    pub fn wildcard(&self) -> Option<&str> {
        self.wildcard.as_deref()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.named.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.named.is_empty() && self.wildcard.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_segment() {
        let pattern = RoutePattern::compile("/pages/:slug").unwrap();

        let params = pattern.matches("/pages/abc-2").unwrap();
        assert_eq!(params.get("slug"), Some("abc-2"));

        assert!(pattern.matches("/pages").is_none());
        assert!(pattern.matches("/pages/").is_none());
        assert!(pattern.matches("/pages/a/b").is_none());
        assert!(pattern.matches("/Pages/abc").is_none());
    }

    #[test]
    fn test_params_keep_declaration_order() {
        let pattern = RoutePattern::compile("/vault/:folder/note/:name").unwrap();
        assert_eq!(pattern.param_names().collect::<Vec<_>>(), vec!["folder", "name"]);

        let params = pattern.matches("/vault/daily/note/today").unwrap();
        assert_eq!(
            params.iter().collect::<Vec<_>>(),
            vec![("folder", "daily"), ("name", "today")]
        );
    }

    #[test]
    fn test_trailing_wildcard() {
        let pattern = RoutePattern::compile("/images/*").unwrap();

        let params = pattern.matches("/images/a/b/c.png").unwrap();
        assert_eq!(params.wildcard(), Some("a/b/c.png"));
        assert_eq!(params.get("*"), Some("a/b/c.png"));

        assert_eq!(pattern.matches("/images/").unwrap().wildcard(), Some(""));
        assert!(pattern.matches("/images").is_none());
        assert!(pattern.matches("/imagesx/a").is_none());
    }

    #[test]
    fn test_root_pattern() {
        let pattern = RoutePattern::compile("/").unwrap();
        assert!(pattern.matches("/").unwrap().is_empty());
        assert!(pattern.matches("/x").is_none());
    }

    #[test]
    fn test_invalid_templates() {
        assert_eq!(
            RoutePattern::compile("pages").unwrap_err(),
            PatternError::MissingLeadingSlash("pages".into())
        );
        assert!(matches!(
            RoutePattern::compile("/pages/:").unwrap_err(),
            PatternError::EmptyParamName(_)
        ));
        assert!(matches!(
            RoutePattern::compile("/a/*/b").unwrap_err(),
            PatternError::MisplacedWildcard(_)
        ));
    }
}
