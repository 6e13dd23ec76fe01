use std::fs;
use std::path::Path;

use rustc_hash::{FxHashMap, FxHashSet};
use strsim::damerau_levenshtein;

use crate::affix::AffixRules;
use crate::error::{CheckError, Result};

const MAX_EDIT_DISTANCE: usize = 2;

/// Word-level correctness oracle. Implementations are loaded once and shared
/// read-only across concurrent checks.
pub trait SpellOracle: Send + Sync {
    fn is_correct(&self, word: &str) -> bool;

    /// Replacement candidates, most preferred first.
    fn suggest(&self, word: &str, limit: usize) -> Vec<String>;
}

/// In-memory word list built from a plain list or a Hunspell `.dic` file.
///
/// Hunspell stems are expanded through the affix rules of the matching `.aff`
/// file, so inflected forms are known words.
#[derive(Debug, Clone, Default)]
pub struct WordList {
    words: FxHashSet<String>,
    by_len: FxHashMap<usize, Vec<String>>,
}

impl WordList {
    pub fn from_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut list = Self::default();
        for word in words {
            list.insert(word.as_ref());
        }
        list
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CheckError::DictionaryMissing(path.to_path_buf()));
        }
        let contents = fs::read_to_string(path)?;
        let aff_path = path.with_extension("aff");
        let affixes = if aff_path.is_file() {
            AffixRules::parse(&fs::read_to_string(&aff_path)?)
        } else {
            AffixRules::default()
        };
        let list = Self::parse_with_affixes(&contents, &affixes);
        if list.is_empty() {
            return Err(CheckError::DictionaryEmpty(path.to_path_buf()));
        }
        tracing::info!(
            path = %path.display(),
            words = list.len(),
            affix_classes = affixes.len(),
            "dictionary loaded"
        );
        Ok(list)
    }

    /// Parses a word list, keeping only the stems of flagged Hunspell entries.
    pub fn parse(contents: &str) -> Self {
        Self::parse_with_affixes(contents, &AffixRules::default())
    }

    pub fn parse_with_affixes(contents: &str, affixes: &AffixRules) -> Self {
        let mut list = Self::default();
        for (idx, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            // hunspell: first line is the entry count
            if idx == 0 && line.chars().all(|c| c.is_ascii_digit()) {
                continue;
            }
            let entry = line.split_whitespace().next().unwrap_or("");
            let (stem, flags) = entry.split_once('/').unwrap_or((entry, ""));
            list.insert(stem);
            if !flags.is_empty() {
                for form in affixes.expand(stem, flags) {
                    list.insert(&form);
                }
            }
        }
        list
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    fn insert(&mut self, word: &str) {
        let lower = word.trim().to_lowercase();
        if lower.is_empty() || !self.words.insert(lower.clone()) {
            return;
        }
        self.by_len
            .entry(lower.chars().count())
            .or_default()
            .push(lower);
    }
}

impl SpellOracle for WordList {
    fn is_correct(&self, word: &str) -> bool {
        let lower = word.to_lowercase();
        if self.words.contains(&lower) {
            return true;
        }
        let bare = lower.trim_matches('\'');
        if bare != lower && self.words.contains(bare) {
            return true;
        }
        // possessive forms of known words
        bare.strip_suffix("'s")
            .map(|stem| self.words.contains(stem))
            .unwrap_or(false)
    }

    fn suggest(&self, word: &str, limit: usize) -> Vec<String> {
        if limit == 0 {
            return Vec::new();
        }
        let lower = word.to_lowercase();
        let len = lower.chars().count();
        let mut ranked: Vec<(usize, usize, &str)> = Vec::new();
        for candidate_len in len.saturating_sub(MAX_EDIT_DISTANCE)..=len + MAX_EDIT_DISTANCE {
            let Some(bucket) = self.by_len.get(&candidate_len) else {
                continue;
            };
            for candidate in bucket {
                let distance = damerau_levenshtein(&lower, candidate);
                if distance == 0 || distance > MAX_EDIT_DISTANCE {
                    continue;
                }
                ranked.push((distance, candidate_len.abs_diff(len), candidate.as_str()));
            }
        }
        ranked.sort();
        let capitalized = word.chars().next().map(char::is_uppercase).unwrap_or(false);
        ranked
            .into_iter()
            .take(limit)
            .map(|(_, _, candidate)| {
                if capitalized {
                    capitalize(candidate)
                } else {
                    candidate.to_string()
                }
            })
            .collect()
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
