//! The native-engine boundary.
//!
//! The pattern cache does not know how a regular expression is actually
//! matched; it only needs something that can compile text into a handle and
//! run match/capture operations against that handle. This module defines
//! that boundary as a trait so the cache's lifecycle logic (refcounting,
//! eviction, the deferred queue) stays independent of any one regex engine.
//! [`crate::re2_engine::Re2LikeEngine`] is the shipped default, built on
//! `regex-automata`'s meta engine.

use crate::error::CacheError;

/// A single capture group: its byte offsets into the subject and the
/// matched text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CaptureGroup {
    pub start: usize,
    pub end: usize,
    pub text: Vec<u8>,
}

/// An owning handle to one compiled program.
///
/// Implementors exclusively own whatever native (or native-equivalent)
/// resource backs the compiled program. The handle is destroyed exactly
/// once, when it is dropped — this crate never accesses a handle after the
/// last reference to its owning [`crate::entry::CachedEntry`] is gone,
/// because refcounting guarantees that never happens, not because a runtime
/// "is destroyed" check is performed on every call.
pub trait EngineHandle: Send + Sync {
    /// Returns `true` iff `input` matches the pattern over its entire
    /// length.
    fn full_match(&self, input: &[u8]) -> bool;

    /// Returns `true` iff some substring of `input` matches the pattern.
    fn partial_match(&self, input: &[u8]) -> bool;

    /// Returns the capture groups of the first match in `input`, or `None`
    /// if there is no match. Group 0 is the whole match.
    fn capture_groups(&self, input: &[u8]) -> Result<Option<Vec<CaptureGroup>>, CacheError>;

    /// Returns the capture groups of every non-overlapping match in
    /// `input`, in order.
    fn find_all(&self, input: &[u8]) -> Result<Vec<Vec<CaptureGroup>>, CacheError>;

    /// The number of capture groups the pattern declares (including group 0).
    fn group_count(&self) -> usize;

    /// The compiled program's size in bytes, as reported by the engine
    /// itself. Immutable after compilation.
    fn program_size_bytes(&self) -> usize;

    /// Whether the handle is still considered usable by the engine. Most
    /// engines never invalidate a handle spontaneously; this exists for
    /// engines that can (see `validate_cached_patterns` in
    /// [`crate::config::CacheConfig`]).
    fn is_valid(&self) -> bool {
        true
    }
}

/// A native regex engine: compiles pattern text into an [`EngineHandle`].
pub trait Engine: Send + Sync {
    type Handle: EngineHandle;

    /// Compiles `text` into a handle. `case_sensitive = false` must compile
    /// a pattern that matches case-insensitively.
    fn compile(&self, text: &[u8], case_sensitive: bool) -> Result<Self::Handle, CacheError>;
}
