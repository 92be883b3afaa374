use thiserror::Error;

/// Source location information for error reporting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    /// Line number (1-indexed)
    pub line: usize,
    /// Column number (1-indexed)
    pub column: usize,
}

impl SourceLocation {
    /// Create a new source location
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl std::fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Errors raised while converting between text, the generic tree and the document tree.
///
/// Every variant is fatal for the call that produced it; nothing is retried or
/// recovered locally.
#[derive(Debug, Error)]
pub enum RichmarkError {
    /// markdown-rs rejected the input text.
    #[error("Parse error at {location}: {message}")]
    MarkdownAdapter {
        /// Error message
        message: String,
        /// Source location
        location: SourceLocation,
    },
    /// A node kind has no mapping in the direction being converted.
    #[error("{scope} kind `{kind}` is not supported")]
    Unsupported {
        /// Where the node was found (block, inline, list item, ...).
        scope: &'static str,
        /// The offending node kind.
        kind: String,
    },
    /// The caller handed over something that is not a convertible input.
    #[error("Malformed call: {0}")]
    MalformedCall(String),
    /// Inline code was selected as the wrapper of more than one sibling.
    #[error("Marks inside inline code are not supported")]
    MarkConflict,
    /// Template configuration cannot be used for this call.
    #[error("Configuration error: {0}")]
    Config(String),
    /// An attribute value does not fit the field it is bound to.
    #[error("Invalid value for attribute `{name}`: {message}")]
    InvalidAttribute {
        /// Attribute (field) name
        name: String,
        /// What was wrong with the value
        message: String,
    },
    /// The input nests deeper than the configured recursion limit.
    #[error("Document nesting exceeds the limit of {limit} levels")]
    DepthLimit {
        /// The limit that was hit
        limit: usize,
    },
    /// JSON (de)serialization of a tree or expression failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// Internal logic error (unexpected state).
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl RichmarkError {
    /// Create a parse error with location
    pub fn parse_error(message: impl Into<String>, line: usize, column: usize) -> Self {
        Self::MarkdownAdapter {
            message: message.into(),
            location: SourceLocation::new(line, column),
        }
    }

    /// Create an unsupported-construct error for a node kind found in `scope`.
    pub fn unsupported(scope: &'static str, kind: impl Into<String>) -> Self {
        Self::Unsupported {
            scope,
            kind: kind.into(),
        }
    }

    /// Create an invalid attribute error
    pub fn invalid_attribute(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidAttribute {
            name: name.into(),
            message: message.into(),
        }
    }
}

/// Tracks nesting depth so deep inputs fail with [`RichmarkError::DepthLimit`]
/// instead of exhausting the call stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepthGuard {
    depth: usize,
    limit: usize,
}

/// Default nesting limit for containers (quotes, lists, components, marks).
pub const DEFAULT_MAX_DEPTH: usize = 128;

impl DepthGuard {
    /// Create a guard at depth zero with the given limit.
    pub fn new(limit: usize) -> Self {
        Self { depth: 0, limit }
    }

    /// Return a guard one level deeper, failing once the limit is exceeded.
    pub fn descend(self) -> Result<Self, RichmarkError> {
        if self.depth >= self.limit {
            return Err(RichmarkError::DepthLimit { limit: self.limit });
        }
        Ok(Self {
            depth: self.depth + 1,
            limit: self.limit,
        })
    }

    /// Current depth.
    pub fn depth(&self) -> usize {
        self.depth
    }
}

impl Default for DepthGuard {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DEPTH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_message_names_kind() {
        let err = RichmarkError::unsupported("block", "footnoteDefinition");
        assert_eq!(
            err.to_string(),
            "block kind `footnoteDefinition` is not supported"
        );
    }

    #[test]
    fn mark_conflict_message() {
        assert_eq!(
            RichmarkError::MarkConflict.to_string(),
            "Marks inside inline code are not supported"
        );
    }

    #[test]
    fn depth_guard_stops_at_limit() {
        let guard = DepthGuard::new(2);
        let one = guard.descend().unwrap();
        let two = one.descend().unwrap();
        assert_eq!(two.depth(), 2);
        assert!(matches!(
            two.descend(),
            Err(RichmarkError::DepthLimit { limit: 2 })
        ));
    }
}
