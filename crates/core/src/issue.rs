use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize, Serializer};

use crate::error::CheckError;
use crate::tokenize::locate_word;

pub const DEFAULT_REASON: &str = "Potential issue";
pub const DICTIONARY_REASON: &str = "Not found in dictionary";
pub const DETERMINISTIC_SCORE: f32 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    Spelling,
    Terminology,
    Grammar,
}

impl IssueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueKind::Spelling => "spelling",
            IssueKind::Terminology => "terminology",
            IssueKind::Grammar => "grammar",
        }
    }

    /// Unknown or missing tags classify as spelling.
    pub fn from_tag(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "terminology" => IssueKind::Terminology,
            "grammar" => IssueKind::Grammar,
            _ => IssueKind::Spelling,
        }
    }

    /// Kinds where the generative checker's judgement supersedes the dictionary.
    pub fn is_contextual(&self) -> bool {
        matches!(self, IssueKind::Terminology | IssueKind::Grammar)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    Deterministic,
    Generative,
}

impl Origin {
    fn prefix(&self) -> &'static str {
        match self {
            Origin::Deterministic => "det",
            Origin::Generative => "gen",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceTag {
    Low,
    Medium,
    High,
}

impl ConfidenceTag {
    pub fn from_tag(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "low" => Some(ConfidenceTag::Low),
            "medium" => Some(ConfidenceTag::Medium),
            "high" => Some(ConfidenceTag::High),
            _ => None,
        }
    }

    pub fn score(&self) -> f32 {
        match self {
            ConfidenceTag::High => 0.95,
            ConfidenceTag::Medium => 0.8,
            ConfidenceTag::Low => 0.6,
        }
    }
}

/// Self-reported tag for generative issues, fixed score for dictionary issues.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Confidence {
    Tag(ConfidenceTag),
    Score(f32),
}

impl Confidence {
    pub fn score(&self) -> f32 {
        match self {
            Confidence::Tag(tag) => tag.score(),
            Confidence::Score(score) => *score,
        }
    }
}

/// Character offsets into the source text, `end` exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IssueId {
    origin: Origin,
    seq: u64,
}

impl IssueId {
    pub fn deterministic(seq: u64) -> Self {
        Self {
            origin: Origin::Deterministic,
            seq,
        }
    }

    pub fn generative(seq: u64) -> Self {
        Self {
            origin: Origin::Generative,
            seq,
        }
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }
}

impl fmt::Display for IssueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.origin.prefix(), self.seq)
    }
}

impl FromStr for IssueId {
    type Err = CheckError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let unknown = || CheckError::UnknownIssue(value.to_string());
        let (prefix, seq) = value.split_once('-').ok_or_else(unknown)?;
        let seq = seq.parse::<u64>().map_err(|_| unknown())?;
        match prefix {
            "det" => Ok(Self::deterministic(seq)),
            "gen" => Ok(Self::generative(seq)),
            _ => Err(unknown()),
        }
    }
}

impl Serialize for IssueId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Identity of an issue: its word compared case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IssueKey(String);

impl IssueKey {
    pub fn of(word: &str) -> Self {
        Self(word.to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Fields a generative producer reports for one flagged word.
#[derive(Debug, Clone, Default)]
pub struct GenerativeFields {
    pub word: String,
    pub kind: Option<IssueKind>,
    pub suggestions: Vec<String>,
    pub reason: Option<String>,
    pub confidence: Option<ConfidenceTag>,
}

/// One flagged word. Records are immutable once built; derive a new one
/// (see [`Issue::relocated`]) instead of editing in place.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Issue {
    id: IssueId,
    word: String,
    kind: IssueKind,
    suggestions: Vec<String>,
    reason: String,
    origin: Origin,
    confidence: Confidence,
    confidence_score: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    position: Option<Position>,
}

impl Issue {
    /// Returns `None` when the word is empty after trimming.
    pub fn deterministic(
        seq: u64,
        word: &str,
        position: Position,
        suggestions: Vec<String>,
    ) -> Option<Self> {
        let word = word.trim();
        if word.is_empty() {
            return None;
        }
        let confidence = Confidence::Score(DETERMINISTIC_SCORE);
        Some(Self {
            id: IssueId::deterministic(seq),
            word: word.to_string(),
            kind: IssueKind::Spelling,
            suggestions: dedup_suggestions(suggestions),
            reason: DICTIONARY_REASON.to_string(),
            origin: Origin::Deterministic,
            confidence,
            confidence_score: confidence.score(),
            position: Some(position),
        })
    }

    /// Returns `None` when the word is empty after trimming.
    pub fn generative(seq: u64, fields: GenerativeFields) -> Option<Self> {
        let word = fields.word.trim();
        if word.is_empty() {
            return None;
        }
        let reason = fields
            .reason
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| DEFAULT_REASON.to_string());
        let confidence = Confidence::Tag(fields.confidence.unwrap_or(ConfidenceTag::Medium));
        Some(Self {
            id: IssueId::generative(seq),
            word: word.to_string(),
            kind: fields.kind.unwrap_or(IssueKind::Spelling),
            suggestions: dedup_suggestions(fields.suggestions),
            reason,
            origin: Origin::Generative,
            confidence,
            confidence_score: confidence.score(),
            position: None,
        })
    }

    pub fn id(&self) -> IssueId {
        self.id
    }

    pub fn word(&self) -> &str {
        &self.word
    }

    pub fn kind(&self) -> IssueKind {
        self.kind
    }

    pub fn suggestions(&self) -> &[String] {
        &self.suggestions
    }

    pub fn primary_suggestion(&self) -> Option<&str> {
        self.suggestions.first().map(String::as_str)
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn confidence(&self) -> Confidence {
        self.confidence
    }

    pub fn confidence_score(&self) -> f32 {
        self.confidence_score
    }

    pub fn position(&self) -> Option<Position> {
        self.position
    }

    pub fn key(&self) -> IssueKey {
        IssueKey::of(&self.word)
    }

    pub fn same_issue(&self, other: &Issue) -> bool {
        self.key() == other.key()
    }

    /// A copy of this record positioned at the word's first whole-word match in `text`.
    pub fn relocated(&self, text: &str) -> Self {
        Self {
            position: locate_word(text, &self.word),
            ..self.clone()
        }
    }
}

fn dedup_suggestions(raw: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(raw.len());
    for suggestion in raw {
        let trimmed = suggestion.trim();
        if trimmed.is_empty() || out.iter().any(|s| s == trimmed) {
            continue;
        }
        out.push(trimmed.to_string());
    }
    out
}
