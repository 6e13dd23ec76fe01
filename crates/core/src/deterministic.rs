use std::path::Path;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use rustc_hash::FxHashSet;
use serde::Serialize;

use crate::dictionary::{SpellOracle, WordList};
use crate::issue::{Issue, IssueKey};
use crate::tokenize::{tokenize, Token};

pub const MAX_SUGGESTIONS: usize = 5;

static CAMEL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[a-z][A-Z]").unwrap());

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CheckStats {
    pub total_words: usize,
    pub correct_words: usize,
    /// Misspelled occurrences; repeated words count once per occurrence.
    pub error_count: usize,
    pub skipped: usize,
    pub custom_term_matches: usize,
}

/// Dictionary findings: one issue per distinct word, positioned at its first occurrence.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DeterministicReport {
    pub issues: Vec<Issue>,
    pub stats: CheckStats,
}

#[derive(Debug, PartialEq)]
enum Verdict {
    Skipped,
    CustomTerm,
    Correct,
    Misspelled,
}

#[derive(Clone)]
pub struct DeterministicChecker {
    oracle: Option<Arc<dyn SpellOracle>>,
}

impl DeterministicChecker {
    pub fn new(oracle: Arc<dyn SpellOracle>) -> Self {
        Self {
            oracle: Some(oracle),
        }
    }

    /// Every word is assumed correct.
    pub fn without_dictionary() -> Self {
        Self { oracle: None }
    }

    /// Loads a word list, degrading to [`DeterministicChecker::without_dictionary`]
    /// when the file is absent or unreadable.
    pub fn from_path(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            tracing::warn!("no dictionary configured, assuming all words are correct");
            return Self::without_dictionary();
        };
        match WordList::load(path) {
            Ok(list) => Self::new(Arc::new(list)),
            Err(err) => {
                tracing::warn!(error = %err, "dictionary unavailable, assuming all words are correct");
                Self::without_dictionary()
            }
        }
    }

    pub fn has_dictionary(&self) -> bool {
        self.oracle.is_some()
    }

    pub fn check(&self, text: &str, custom_terms: &[String]) -> DeterministicReport {
        let custom: FxHashSet<String> = custom_terms
            .iter()
            .map(|term| term.trim().to_lowercase())
            .filter(|term| !term.is_empty())
            .collect();
        let tokens = tokenize(text);
        let mut stats = CheckStats {
            total_words: tokens.len(),
            ..Default::default()
        };
        let mut seen: FxHashSet<IssueKey> = FxHashSet::default();
        let mut issues = Vec::new();
        for token in &tokens {
            match self.verdict(token, &custom) {
                Verdict::Skipped => {
                    stats.correct_words += 1;
                    stats.skipped += 1;
                }
                Verdict::CustomTerm => {
                    stats.correct_words += 1;
                    stats.custom_term_matches += 1;
                }
                Verdict::Correct => stats.correct_words += 1,
                Verdict::Misspelled => {
                    stats.error_count += 1;
                    if !seen.insert(IssueKey::of(token.word)) {
                        continue;
                    }
                    let suggestions = self
                        .oracle
                        .as_ref()
                        .map(|oracle| oracle.suggest(token.word, MAX_SUGGESTIONS))
                        .unwrap_or_default();
                    let seq = issues.len() as u64 + 1;
                    if let Some(issue) =
                        Issue::deterministic(seq, token.word, token.position(), suggestions)
                    {
                        issues.push(issue);
                    }
                }
            }
        }
        DeterministicReport { issues, stats }
    }

    fn verdict(&self, token: &Token<'_>, custom: &FxHashSet<String>) -> Verdict {
        let word = token.word;
        if should_skip(word) {
            return Verdict::Skipped;
        }
        if custom.contains(&word.to_lowercase()) {
            return Verdict::CustomTerm;
        }
        match &self.oracle {
            Some(oracle) if !oracle.is_correct(word) => Verdict::Misspelled,
            _ => Verdict::Correct,
        }
    }
}

/// Single letters, acronyms and camelCase identifiers are never flagged.
fn should_skip(word: &str) -> bool {
    if word.chars().count() <= 1 {
        return true;
    }
    if word == word.to_uppercase() {
        return true;
    }
    CAMEL_RE.is_match(word)
}
