//! `Pattern`/`Matcher`/`MatchResult`: the public, ergonomic surface over the
//! core crate's `PatternCache`.

use re2_pattern_cache_core::metrics::names;
use re2_pattern_cache_core::{CacheError, EngineHandle, MatcherHandle, MetricsSink, Re2LikeHandle};
use std::sync::Arc;
use std::time::Instant;

/// A single capture group's byte span and text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureGroup {
    pub start: usize,
    pub end: usize,
    pub text: Vec<u8>,
}

/// The result of a single match: the matched text's capture groups, group 0
/// being the whole match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    pub groups: Vec<CaptureGroup>,
}

impl MatchResult {
    pub fn whole_match(&self) -> &[u8] {
        &self.groups[0].text
    }

    pub fn group(&self, index: usize) -> Option<&CaptureGroup> {
        self.groups.get(index)
    }
}

fn convert_groups(groups: Vec<re2_pattern_cache_core::CaptureGroup>) -> Vec<CaptureGroup> {
    groups
        .into_iter()
        .map(|g| CaptureGroup {
            start: g.start,
            end: g.end,
            text: g.text,
        })
        .collect()
}

/// A compiled, cache-backed pattern. Constructed by [`crate::compile`] or
/// [`crate::compile_case_insensitive`].
pub struct Pattern {
    pub(crate) matcher: MatcherHandle<Re2LikeHandle>,
    pub(crate) metrics: Arc<dyn MetricsSink>,
}

impl Pattern {
    pub(crate) fn new(matcher: MatcherHandle<Re2LikeHandle>, metrics: Arc<dyn MetricsSink>) -> Self {
        Self { matcher, metrics }
    }

    /// Returns a fresh [`Matcher`] bound to this pattern's compiled program.
    ///
    /// Every `Pattern` already *is* a matcher (it owns a `MatcherHandle`);
    /// this exists for API symmetry with hosts that want to treat pattern
    /// acquisition and match-site binding as separate steps.
    pub fn matcher(&self) -> Matcher<'_> {
        Matcher { pattern: self }
    }

    pub fn matches(&self, input: &[u8]) -> bool {
        self.metrics
            .increment_counter(names::MATCHING_OPERATIONS_TOTAL, 1);
        let started = Instant::now();
        let result = self.matcher.handle().partial_match(input);
        self.metrics
            .record_timer(names::MATCHING_PARTIAL_MATCH_LATENCY, started.elapsed().as_nanos() as u64);
        result
    }

    pub fn full_match(&self, input: &[u8]) -> bool {
        self.metrics
            .increment_counter(names::MATCHING_OPERATIONS_TOTAL, 1);
        let started = Instant::now();
        let result = self.matcher.handle().full_match(input);
        self.metrics
            .record_timer(names::MATCHING_FULL_MATCH_LATENCY, started.elapsed().as_nanos() as u64);
        result
    }

    pub fn find(&self, input: &[u8]) -> Result<Option<MatchResult>, CacheError> {
        self.metrics
            .increment_counter(names::CAPTURE_OPERATIONS_TOTAL, 1);
        let started = Instant::now();
        let groups = self.matcher.handle().capture_groups(input)?;
        self.metrics
            .record_timer(names::CAPTURE_LATENCY, started.elapsed().as_nanos() as u64);
        Ok(groups.map(|groups| MatchResult {
            groups: convert_groups(groups),
        }))
    }

    pub fn find_all(&self, input: &[u8]) -> Result<Vec<MatchResult>, CacheError> {
        self.metrics
            .increment_counter(names::CAPTURE_OPERATIONS_TOTAL, 1);
        let started = Instant::now();
        let matches = self.matcher.handle().find_all(input)?;
        self.metrics
            .record_timer(names::CAPTURE_LATENCY, started.elapsed().as_nanos() as u64);
        self.metrics
            .increment_counter(names::CAPTURE_FINDALL_MATCHES_TOTAL, matches.len() as u64);
        Ok(matches
            .into_iter()
            .map(|groups| MatchResult {
                groups: convert_groups(groups),
            })
            .collect())
    }

    pub fn replace_first(&self, input: &[u8], replacement: &[u8]) -> Result<Vec<u8>, CacheError> {
        self.metrics
            .increment_counter(names::REPLACE_OPERATIONS_TOTAL, 1);
        let started = Instant::now();
        let out = match self.find(input)? {
            None => input.to_vec(),
            Some(m) => {
                let whole = &m.groups[0];
                let mut out = Vec::with_capacity(input.len());
                out.extend_from_slice(&input[..whole.start]);
                out.extend_from_slice(replacement);
                out.extend_from_slice(&input[whole.end..]);
                out
            }
        };
        self.metrics
            .record_timer(names::REPLACE_LATENCY, started.elapsed().as_nanos() as u64);
        Ok(out)
    }

    pub fn replace_all(&self, input: &[u8], replacement: &[u8]) -> Result<Vec<u8>, CacheError> {
        self.metrics
            .increment_counter(names::REPLACE_OPERATIONS_TOTAL, 1);
        let started = Instant::now();
        let matches = self.find_all(input)?;
        let out = if matches.is_empty() {
            input.to_vec()
        } else {
            let mut out = Vec::with_capacity(input.len());
            let mut cursor = 0usize;
            for m in &matches {
                let whole = &m.groups[0];
                out.extend_from_slice(&input[cursor..whole.start]);
                out.extend_from_slice(replacement);
                cursor = whole.end;
            }
            out.extend_from_slice(&input[cursor..]);
            out
        };
        self.metrics
            .record_timer(names::REPLACE_LATENCY, started.elapsed().as_nanos() as u64);
        Ok(out)
    }

    /// Matches every input in `inputs`, preserving order. Per §9's bulk-
    /// operation contract: one bulk-call increment plus one item increment
    /// per input, no additional cache interaction beyond the per-item match.
    pub fn match_all(&self, inputs: &[&[u8]]) -> Vec<bool> {
        self.metrics
            .increment_counter(names::MATCHING_BULK_OPERATIONS_TOTAL, 1);
        self.metrics
            .increment_counter(names::MATCHING_BULK_ITEMS_TOTAL, inputs.len() as u64);
        inputs.iter().map(|input| self.matches(input)).collect()
    }

    /// Like [`Self::match_all`], but returns each input's full capture
    /// groups instead of a boolean.
    pub fn match_all_with_groups(
        &self,
        inputs: &[&[u8]],
    ) -> Result<Vec<Option<MatchResult>>, CacheError> {
        self.metrics
            .increment_counter(names::CAPTURE_BULK_OPERATIONS_TOTAL, 1);
        self.metrics
            .increment_counter(names::CAPTURE_BULK_ITEMS_TOTAL, inputs.len() as u64);
        inputs.iter().map(|input| self.find(input)).collect()
    }

    /// Runs [`Self::replace_all`] over every input in `inputs`.
    pub fn replace_all_bulk(
        &self,
        inputs: &[&[u8]],
        replacement: &[u8],
    ) -> Result<Vec<Vec<u8>>, CacheError> {
        self.metrics
            .increment_counter(names::REPLACE_BULK_OPERATIONS_TOTAL, 1);
        self.metrics
            .increment_counter(names::REPLACE_BULK_ITEMS_TOTAL, inputs.len() as u64);
        inputs
            .iter()
            .map(|input| self.replace_all(input, replacement))
            .collect()
    }
}

/// A borrowed view over a [`Pattern`], distinguishing "the cached program"
/// from "a match-site using it". In this crate's design the two share an
/// implementation since a `Pattern` is already a refcounted, single-owner
/// matcher; `Matcher` exists so callers that explicitly want the narrower,
/// read-only surface can use it instead of the owning `Pattern`.
pub struct Matcher<'a> {
    pattern: &'a Pattern,
}

impl Matcher<'_> {
    pub fn matches(&self, input: &[u8]) -> bool {
        self.pattern.matches(input)
    }

    pub fn full_match(&self, input: &[u8]) -> bool {
        self.pattern.full_match(input)
    }

    pub fn find(&self, input: &[u8]) -> Result<Option<MatchResult>, CacheError> {
        self.pattern.find(input)
    }

    pub fn find_all(&self, input: &[u8]) -> Result<Vec<MatchResult>, CacheError> {
        self.pattern.find_all(input)
    }
}
