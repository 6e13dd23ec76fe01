//! Incremental extraction of issue records from a model response that is still
//! arriving.
//!
//! The response is expected to be a single JSON document, `{"errors": [...]}` or a
//! bare array. Each array element is scanned with a string-aware brace counter;
//! as soon as an object closes it is parsed on its own and, when usable, emitted.
//! Consumed objects are cut out of the live buffer and replaced by a single `null`
//! placeholder element, so memory stays proportional to the largest in-flight
//! object while the buffer remains a valid prefix of an equivalent document for
//! the authoritative parse in [`IncrementalExtractor::finish`].

use std::collections::VecDeque;
use std::fmt;

use futures::stream::{self, Stream, StreamExt};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::error::Result;
use crate::issue::Issue;
use crate::payload::{issue_from_value, normalize_elements, parse_elements};

static ERRORS_KEY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#""errors"\s*:\s*\["#).unwrap());

const PLACEHOLDER: &str = "null";
const ERRORS_KEY: &str = "\"errors\"";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Normal,
    InString,
    Escaped,
}

#[derive(Debug)]
pub struct IncrementalExtractor {
    buf: String,
    /// Byte offset just past the `[` that opens the issue array.
    array_start: Option<usize>,
    header_search_from: usize,
    cursor: usize,
    state: ScanState,
    /// Open `{` and `[` inside the current array element.
    depth: usize,
    object_start: Option<usize>,
    /// Index of the current element within the buffered array.
    element: usize,
    /// Where the text between the previous element and the next one begins.
    gap_start: usize,
    placeholder: bool,
    compact: bool,
    /// Array indices of objects consumed while compaction was off; they stay
    /// in the buffer.
    retained: Vec<usize>,
    array_closed: bool,
    next_seq: u64,
}

impl Default for IncrementalExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl IncrementalExtractor {
    pub fn new() -> Self {
        Self {
            buf: String::new(),
            array_start: None,
            header_search_from: 0,
            cursor: 0,
            state: ScanState::Normal,
            depth: 0,
            object_start: None,
            element: 0,
            gap_start: 0,
            placeholder: false,
            compact: true,
            retained: Vec::new(),
            array_closed: false,
            next_seq: 1,
        }
    }

    /// Appends a fragment and returns the issues whose objects completed in it.
    pub fn push(&mut self, fragment: &str) -> Vec<Issue> {
        self.buf.push_str(fragment);
        if self.array_start.is_none() {
            self.locate_array();
        }
        if self.array_start.is_none() || self.array_closed {
            return Vec::new();
        }
        self.scan()
    }

    /// Parses the whole document and returns the issues not emitted by [`push`].
    ///
    /// [`push`]: IncrementalExtractor::push
    pub fn finish(self) -> Result<Vec<Issue>> {
        let elements = parse_elements(&self.buf)?;
        let remaining: Vec<Value> = elements
            .into_iter()
            .enumerate()
            .filter(|(idx, _)| !(self.placeholder && *idx == 0) && !self.retained.contains(idx))
            .map(|(_, element)| element)
            .collect();
        Ok(normalize_elements(&remaining, self.next_seq))
    }

    pub fn emitted(&self) -> usize {
        (self.next_seq - 1) as usize
    }

    /// Bytes currently held in the live buffer.
    pub fn buffered_len(&self) -> usize {
        self.buf.len()
    }

    fn locate_array(&mut self) {
        if let Some(start) = bare_array_start(&self.buf) {
            self.open_array(start);
            return;
        }
        let from = self.header_search_from;
        if let Some(found) = ERRORS_KEY_RE.find(&self.buf[from..]) {
            self.open_array(from + found.end());
            return;
        }
        let next = match self.buf[from..].rfind(ERRORS_KEY) {
            Some(idx) => from + idx,
            None => floor_boundary(&self.buf, self.buf.len().saturating_sub(ERRORS_KEY.len())),
        };
        self.header_search_from = next.max(from);
    }

    fn open_array(&mut self, start: usize) {
        self.array_start = Some(start);
        self.cursor = start;
        self.gap_start = start;
    }

    fn scan(&mut self) -> Vec<Issue> {
        let mut out = Vec::new();
        while self.cursor < self.buf.len() {
            let at = self.cursor;
            let byte = self.buf.as_bytes()[at];
            self.cursor += 1;
            match self.state {
                ScanState::Escaped => self.state = ScanState::InString,
                ScanState::InString => match byte {
                    b'\\' => self.state = ScanState::Escaped,
                    b'"' => self.state = ScanState::Normal,
                    _ => {}
                },
                ScanState::Normal => match byte {
                    b'"' => self.state = ScanState::InString,
                    b'{' | b'[' => {
                        if self.depth == 0 && byte == b'{' {
                            self.object_start = Some(at);
                        }
                        self.depth += 1;
                    }
                    b']' if self.depth == 0 => {
                        self.array_closed = true;
                        break;
                    }
                    b'}' if self.depth == 0 => {
                        // stray closer between elements; the final parse decides
                        self.compact = false;
                    }
                    b'}' | b']' => {
                        self.depth -= 1;
                        if self.depth == 0 {
                            // a nested array element leaves object_start unset
                            if let Some(start) = self.object_start.take() {
                                if let Some(issue) = self.complete_object(start, at) {
                                    out.push(issue);
                                }
                            }
                        }
                    }
                    b',' if self.depth == 0 => self.element += 1,
                    _ => {}
                },
            }
        }
        out
    }

    fn complete_object(&mut self, start: usize, end: usize) -> Option<Issue> {
        match serde_json::from_str::<Value>(&self.buf[start..=end]) {
            Ok(value) => {
                let issue = issue_from_value(&value, self.next_seq);
                if issue.is_some() {
                    self.next_seq += 1;
                } else {
                    tracing::debug!("skipping issue object without word or suggestion");
                }
                self.consume(start, end, true);
                issue
            }
            Err(err) => {
                tracing::debug!(error = %err, "skipping unparsable issue object");
                self.consume(start, end, false);
                None
            }
        }
    }

    fn consume(&mut self, start: usize, end: usize, well_formed: bool) {
        let separator = separator_ok(&self.buf[self.gap_start..start], self.placeholder);
        match self.array_start {
            Some(array_start) if self.compact && well_formed && separator => {
                self.buf.replace_range(array_start..=end, PLACEHOLDER);
                self.cursor = array_start + PLACEHOLDER.len();
                self.gap_start = self.cursor;
                self.placeholder = true;
                self.element = 0;
            }
            _ => {
                self.compact = false;
                self.retained.push(self.element);
                self.gap_start = end + 1;
            }
        }
    }
}

fn separator_ok(gap: &str, after_element: bool) -> bool {
    let trimmed = gap.trim();
    if after_element {
        trimmed == ","
    } else {
        trimmed.is_empty()
    }
}

/// Start of a top-level array, allowing leading whitespace and a code fence.
fn bare_array_start(buf: &str) -> Option<usize> {
    let mut offset = buf.len() - buf.trim_start().len();
    let mut rest = &buf[offset..];
    if rest.starts_with("```") {
        let newline = rest.find('\n')?;
        let after = &rest[newline + 1..];
        let ws = after.len() - after.trim_start().len();
        offset += newline + 1 + ws;
        rest = &after[ws..];
    }
    rest.starts_with('[').then_some(offset + 1)
}

fn floor_boundary(text: &str, mut idx: usize) -> usize {
    while idx > 0 && !text.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExtractEvent {
    /// An issue recovered before the response finished.
    Issue(Issue),
    /// Every issue of the response, in array order.
    Done(Vec<Issue>),
    /// The response failed or was not valid JSON; issues already emitted stay valid.
    Failed(String),
}

enum Phase {
    Streaming,
    Draining,
    Finished,
}

struct StreamState<S> {
    fragments: S,
    extractor: Option<IncrementalExtractor>,
    pending: VecDeque<Issue>,
    emitted: Vec<Issue>,
    phase: Phase,
}

/// Drives an extractor over a fragment stream.
///
/// Yields one [`ExtractEvent::Issue`] per record, then either a single
/// [`ExtractEvent::Done`] or a single [`ExtractEvent::Failed`]. An upstream error
/// ends the stream with `Failed` and no `Done`.
pub fn extract_stream<S, E>(fragments: S) -> impl Stream<Item = ExtractEvent>
where
    S: Stream<Item = std::result::Result<String, E>> + Unpin,
    E: fmt::Display,
{
    let state = StreamState {
        fragments,
        extractor: Some(IncrementalExtractor::new()),
        pending: VecDeque::new(),
        emitted: Vec::new(),
        phase: Phase::Streaming,
    };
    stream::unfold(state, |mut st| async move {
        loop {
            if let Some(issue) = st.pending.pop_front() {
                st.emitted.push(issue.clone());
                return Some((ExtractEvent::Issue(issue), st));
            }
            match st.phase {
                Phase::Finished => return None,
                Phase::Draining => {
                    st.phase = Phase::Finished;
                    let all = std::mem::take(&mut st.emitted);
                    return Some((ExtractEvent::Done(all), st));
                }
                Phase::Streaming => {}
            }
            match st.fragments.next().await {
                Some(Ok(fragment)) => {
                    if let Some(extractor) = st.extractor.as_mut() {
                        st.pending.extend(extractor.push(&fragment));
                    }
                }
                Some(Err(err)) => {
                    st.phase = Phase::Finished;
                    tracing::warn!(error = %err, emitted = st.emitted.len(), "upstream stream aborted");
                    return Some((ExtractEvent::Failed(err.to_string()), st));
                }
                None => {
                    let Some(extractor) = st.extractor.take() else {
                        st.phase = Phase::Finished;
                        continue;
                    };
                    match extractor.finish() {
                        Ok(rest) => {
                            tracing::debug!(
                                incremental = st.emitted.len() + st.pending.len(),
                                final_pass = rest.len(),
                                "response complete"
                            );
                            st.pending.extend(rest);
                            st.phase = Phase::Draining;
                        }
                        Err(err) => {
                            st.phase = Phase::Finished;
                            tracing::warn!(error = %err, "final response did not parse");
                            return Some((ExtractEvent::Failed(err.to_string()), st));
                        }
                    }
                }
            }
        }
    })
}
