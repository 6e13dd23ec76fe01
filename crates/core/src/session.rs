use serde::Serialize;

use crate::error::{CheckError, Result};
use crate::issue::{Issue, IssueId};
use crate::tokenize::replace_word;

/// The issues a caller is currently showing. Every operation returns a new
/// list; records are never edited in place.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ActiveIssues {
    issues: Vec<Issue>,
}

impl ActiveIssues {
    pub fn new(issues: Vec<Issue>) -> Self {
        Self { issues }
    }

    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    pub fn into_issues(self) -> Vec<Issue> {
        self.issues
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn get(&self, id: IssueId) -> Option<&Issue> {
        self.issues.iter().find(|issue| issue.id() == id)
    }

    pub fn dismiss(&self, id: IssueId) -> Result<Self> {
        if self.get(id).is_none() {
            return Err(CheckError::UnknownIssue(id.to_string()));
        }
        Ok(Self::new(
            self.issues
                .iter()
                .filter(|issue| issue.id() != id)
                .cloned()
                .collect(),
        ))
    }

    /// Applies a suggestion (the issue's first one when `suggestion` is `None`).
    ///
    /// Every whole-word, case-sensitive occurrence of the word is replaced and all
    /// records for the same word are removed. Positioned records that remain are
    /// re-located against the returned text.
    pub fn accept(
        &self,
        text: &str,
        id: IssueId,
        suggestion: Option<&str>,
    ) -> Result<(String, Self)> {
        let target = self
            .get(id)
            .ok_or_else(|| CheckError::UnknownIssue(id.to_string()))?;
        let replacement = suggestion
            .or_else(|| target.primary_suggestion())
            .ok_or_else(|| CheckError::Other(format!("{id} has no suggestion to apply")))?;
        let updated = replace_word(text, target.word(), replacement);
        let key = target.key();
        let remaining = self
            .issues
            .iter()
            .filter(|issue| issue.key() != key)
            .map(|issue| {
                if issue.position().is_some() {
                    issue.relocated(&updated)
                } else {
                    issue.clone()
                }
            })
            .collect();
        Ok((updated, Self::new(remaining)))
    }
}
