use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};

use crate::issue::Position;

static WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Za-z']+").unwrap());

/// A word-like unit. `start`/`end` are character offsets, `byte_start`/`byte_end`
/// index the same span in UTF-8 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub word: &'a str,
    pub start: usize,
    pub end: usize,
    pub byte_start: usize,
    pub byte_end: usize,
}

impl Token<'_> {
    pub fn position(&self) -> Position {
        Position {
            start: self.start,
            end: self.end,
        }
    }
}

pub fn tokenize(text: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut last_byte = 0usize;
    let mut last_char = 0usize;
    for m in WORD_RE.find_iter(text) {
        last_char += text[last_byte..m.start()].chars().count();
        let start = last_char;
        // the pattern only matches ASCII, so bytes and chars agree inside a match
        let end = start + m.len();
        tokens.push(Token {
            word: m.as_str(),
            start,
            end,
            byte_start: m.start(),
            byte_end: m.end(),
        });
        last_byte = m.end();
        last_char = end;
    }
    tokens
}

/// First case-insensitive whole-word occurrence of `word` in `text`.
pub fn locate_word(text: &str, word: &str) -> Option<Position> {
    let re = insensitive(word)?;
    let found = re
        .find_iter(text)
        .find(|m| is_boundary(text, m.start(), m.end()))
        .map(|m| to_position(text, m.start(), m.end()));
    found
}

/// Character offset used to order issues: whole-word match first, then any
/// case-insensitive substring match.
pub fn first_occurrence(text: &str, word: &str) -> Option<usize> {
    if let Some(position) = locate_word(text, word) {
        return Some(position.start);
    }
    let re = insensitive(word)?;
    re.find(text).map(|m| char_offset(text, m.start()))
}

/// The span of `position` widened by up to `radius` words on each side.
pub fn context_window(text: &str, position: Position, radius: usize) -> String {
    let tokens = tokenize(text);
    let Some(first) = tokens.iter().position(|t| t.end > position.start) else {
        return String::new();
    };
    let last = tokens
        .iter()
        .rposition(|t| t.start < position.end)
        .unwrap_or(first)
        .max(first);
    let from = first.saturating_sub(radius);
    let to = (last + radius).min(tokens.len() - 1);
    text[tokens[from].byte_start..tokens[to].byte_end].to_string()
}

/// Replaces every case-sensitive whole-word occurrence of `word`.
pub fn replace_word(text: &str, word: &str, replacement: &str) -> String {
    let trimmed = word.trim();
    if trimmed.is_empty() {
        return text.to_string();
    }
    let Ok(re) = Regex::new(&regex::escape(trimmed)) else {
        return text.to_string();
    };
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for m in re.find_iter(text) {
        if !is_boundary(text, m.start(), m.end()) {
            continue;
        }
        out.push_str(&text[last..m.start()]);
        out.push_str(replacement);
        last = m.end();
    }
    out.push_str(&text[last..]);
    out
}

pub(crate) fn char_offset(text: &str, byte: usize) -> usize {
    text[..byte].chars().count()
}

fn insensitive(word: &str) -> Option<Regex> {
    let trimmed = word.trim();
    if trimmed.is_empty() {
        return None;
    }
    RegexBuilder::new(&regex::escape(trimmed))
        .case_insensitive(true)
        .build()
        .ok()
}

fn is_boundary(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].chars().next_back();
    let after = text[end..].chars().next();
    !before.map(is_word_char).unwrap_or(false) && !after.map(is_word_char).unwrap_or(false)
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn to_position(text: &str, start: usize, end: usize) -> Position {
    let start_char = char_offset(text, start);
    Position {
        start: start_char,
        end: start_char + text[start..end].chars().count(),
    }
}
