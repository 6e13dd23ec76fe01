mod affix;
mod deterministic;
mod dictionary;
mod error;
mod extract;
mod issue;
mod merge;
mod payload;
mod session;
mod tokenize;

pub use affix::AffixRules;
pub use deterministic::{CheckStats, DeterministicChecker, DeterministicReport, MAX_SUGGESTIONS};
pub use dictionary::{SpellOracle, WordList};
pub use error::{CheckError, Result};
pub use extract::{extract_stream, ExtractEvent, IncrementalExtractor};
pub use issue::{
    Confidence, ConfidenceTag, GenerativeFields, Issue, IssueId, IssueKey, IssueKind, Origin,
    Position, DEFAULT_REASON, DETERMINISTIC_SCORE, DICTIONARY_REASON,
};
pub use merge::{merge_issues, order_by_occurrence};
pub use payload::{parse_elements, parse_issues};
pub use session::ActiveIssues;
pub use tokenize::{context_window, first_occurrence, locate_word, replace_word, tokenize, Token};
