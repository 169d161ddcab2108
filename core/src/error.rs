use std::fmt;

/// Which resource limit was exhausted.
///
/// Distinguishes the process-wide simultaneous-pattern ceiling from the
/// per-entry matcher ceiling so callers can tell the two `ResourceExhausted`
/// cases apart without string matching.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResourceKind {
    /// `max_simultaneous_compiled_patterns` was reached.
    Pattern,
    /// `max_matchers_per_pattern` was reached for a single entry.
    Matcher,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Pattern => write!(f, "pattern"),
            ResourceKind::Matcher => write!(f, "matcher"),
        }
    }
}

/// Errors surfaced to callers of the pattern cache.
///
/// Internal invariant violations (refcount underflow) are deliberately not
/// a variant here: per the crate's error-handling design, those are logged
/// and clamped rather than propagated, so availability is preserved even
/// when an invariant is violated by a defect elsewhere.
#[derive(thiserror::Error, Debug)]
pub enum CacheError {
    /// The engine rejected the pattern at compile time.
    #[error("failed to compile pattern {pattern:?}: {message}")]
    CompileError { pattern: String, message: String },

    /// A hard resource limit was reached; the caller's request had no
    /// partial side effects.
    #[error("resource exhausted: {kind} limit reached")]
    ResourceExhausted { kind: ResourceKind },

    /// A match or capture operation reported a failure from the engine.
    #[error("engine failure during match: {message}")]
    EngineFailure { message: String },

    /// A configuration or API precondition was violated.
    #[error("invalid state: {reason}")]
    InvalidState { reason: &'static str },
}

impl CacheError {
    pub fn resource_exhausted(kind: ResourceKind) -> Self {
        CacheError::ResourceExhausted { kind }
    }
}
