//! Default [`Engine`] adapter.
//!
//! RE2 itself has no safe, dependency-free Rust binding available, so this
//! adapter is built on `regex-automata`'s meta engine instead: like RE2, it
//! runs in linear time over a DFA/lazy-DFA (no backtracking), and — unlike
//! the higher-level `regex` crate — it exposes `memory_usage()` directly,
//! which maps exactly onto `program_size_bytes` with no heuristic
//! estimation needed.

use crate::engine::{CaptureGroup, Engine, EngineHandle};
use crate::error::CacheError;
use regex_automata::meta::Regex as MetaRegex;
use regex_automata::util::syntax;
use regex_automata::Input;

/// [`Engine`] implementation backed by `regex_automata::meta::Regex`.
#[derive(Debug, Default, Clone, Copy)]
pub struct Re2LikeEngine;

impl Engine for Re2LikeEngine {
    type Handle = Re2LikeHandle;

    fn compile(&self, text: &[u8], case_sensitive: bool) -> Result<Self::Handle, CacheError> {
        let pattern = std::str::from_utf8(text).map_err(|e| CacheError::CompileError {
            pattern: String::from_utf8_lossy(text).into_owned(),
            message: format!("pattern is not valid UTF-8: {e}"),
        })?;

        let config = syntax::Config::new().case_insensitive(!case_sensitive);
        let regex = MetaRegex::builder()
            .syntax(config)
            .build(pattern)
            .map_err(|e| CacheError::CompileError {
                pattern: pattern.to_string(),
                message: e.to_string(),
            })?;

        let group_count = regex.create_captures().group_len();
        Ok(Re2LikeHandle {
            regex,
            group_count,
        })
    }
}

/// An owned, compiled `regex_automata` program.
///
/// Dropping this handle drops the underlying `meta::Regex`, which frees its
/// DFA/lazy-DFA tables. There is no separate explicit destroy call because
/// Rust's `Drop` already guarantees it runs exactly once.
pub struct Re2LikeHandle {
    regex: MetaRegex,
    group_count: usize,
}

impl EngineHandle for Re2LikeHandle {
    fn full_match(&self, input: &[u8]) -> bool {
        match self.regex.find(Input::new(input).anchored(regex_automata::Anchored::Yes)) {
            Some(m) => m.start() == 0 && m.end() == input.len(),
            None => false,
        }
    }

    fn partial_match(&self, input: &[u8]) -> bool {
        self.regex.is_match(input)
    }

    fn capture_groups(&self, input: &[u8]) -> Result<Option<Vec<CaptureGroup>>, CacheError> {
        let mut caps = self.regex.create_captures();
        self.regex.captures(Input::new(input), &mut caps);
        if !caps.is_match() {
            return Ok(None);
        }
        Ok(Some(extract_groups(input, &caps)))
    }

    fn find_all(&self, input: &[u8]) -> Result<Vec<Vec<CaptureGroup>>, CacheError> {
        let mut out = Vec::new();
        for caps in self.regex.captures_iter(Input::new(input)) {
            out.push(extract_groups(input, &caps));
        }
        Ok(out)
    }

    fn group_count(&self) -> usize {
        self.group_count
    }

    fn program_size_bytes(&self) -> usize {
        self.regex.memory_usage()
    }
}

fn extract_groups(
    input: &[u8],
    caps: &regex_automata::util::captures::Captures,
) -> Vec<CaptureGroup> {
    let mut groups = Vec::with_capacity(caps.group_len());
    for i in 0..caps.group_len() {
        if let Some(span) = caps.get_group(i) {
            groups.push(CaptureGroup {
                start: span.start,
                end: span.end,
                text: input[span.start..span.end].to_vec(),
            });
        }
    }
    groups
}
