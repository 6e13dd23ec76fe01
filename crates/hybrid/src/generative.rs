use std::sync::Arc;

use anyhow::Result;
use futures::stream::{self, BoxStream, StreamExt};
use notecheck_core::{extract_stream, parse_issues, ExtractEvent, Issue};
use notecheck_llm::LlmRequest;
use serde::Serialize;
use serde_json::Value;

use crate::backend::GenerativeBackend;
use crate::prompt::{check_prompt, terminology_prompt};

pub const DEFAULT_MIN_CHARS: usize = 10;
const CHECK_MAX_TOKENS: u32 = 2048;
const TERMS_MAX_TOKENS: u32 = 512;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

#[derive(Debug, Clone, Default)]
pub struct GenerativeReport {
    pub issues: Vec<Issue>,
    pub usage: Usage,
}

#[derive(Clone)]
pub struct GenerativeChecker {
    backend: Arc<dyn GenerativeBackend>,
    min_chars: usize,
}

impl GenerativeChecker {
    pub fn new(backend: Arc<dyn GenerativeBackend>) -> Self {
        Self {
            backend,
            min_chars: DEFAULT_MIN_CHARS,
        }
    }

    pub fn with_min_chars(mut self, min_chars: usize) -> Self {
        self.min_chars = min_chars;
        self
    }

    pub fn describe(&self) -> String {
        self.backend.describe()
    }

    /// Single-shot check. Texts shorter than the minimum are not sent.
    pub async fn check(
        &self,
        speaker_notes: &str,
        slide_content: &str,
        terminology: &[String],
    ) -> Result<GenerativeReport> {
        if self.too_short(speaker_notes) {
            return Ok(GenerativeReport::default());
        }
        let response = self
            .backend
            .complete(&check_request(speaker_notes, slide_content, terminology))
            .await?;
        let issues = parse_issues(&response.content)?;
        tracing::debug!(
            backend = %self.describe(),
            issues = issues.len(),
            "generative check complete"
        );
        Ok(GenerativeReport {
            issues,
            usage: Usage {
                input_tokens: response.prompt_tokens,
                output_tokens: response.completion_tokens,
            },
        })
    }

    /// Streaming check: issues as the model writes them, then the full list.
    pub async fn check_stream(
        &self,
        speaker_notes: &str,
        slide_content: &str,
        terminology: &[String],
    ) -> Result<BoxStream<'static, ExtractEvent>> {
        if self.too_short(speaker_notes) {
            return Ok(stream::iter([ExtractEvent::Done(Vec::new())]).boxed());
        }
        let fragments = self
            .backend
            .complete_stream(&check_request(speaker_notes, slide_content, terminology))
            .await?;
        Ok(extract_stream(fragments).boxed())
    }

    /// Terms from the slide that should be treated as correct. Unusable model
    /// output yields an empty list.
    pub async fn extract_terminology(&self, slide_content: &str) -> Result<Vec<String>> {
        if slide_content.trim().is_empty() {
            return Ok(Vec::new());
        }
        let response = self
            .backend
            .complete(&LlmRequest {
                system: None,
                user: terminology_prompt(slide_content),
                max_tokens: Some(TERMS_MAX_TOKENS),
                temperature: Some(0.1),
            })
            .await?;
        Ok(parse_terms(&response.content))
    }

    fn too_short(&self, text: &str) -> bool {
        text.trim().chars().count() < self.min_chars
    }
}

fn check_request(speaker_notes: &str, slide_content: &str, terminology: &[String]) -> LlmRequest {
    LlmRequest {
        system: None,
        user: check_prompt(speaker_notes, slide_content, terminology),
        max_tokens: Some(CHECK_MAX_TOKENS),
        temperature: Some(0.0),
    }
}

fn parse_terms(content: &str) -> Vec<String> {
    let Some(start) = content.find('[') else {
        return Vec::new();
    };
    let Some(end) = content.rfind(']').filter(|end| *end > start) else {
        return Vec::new();
    };
    match serde_json::from_str::<Vec<Value>>(&content[start..=end]) {
        Ok(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(term) if !term.trim().is_empty() => Some(term.trim().to_string()),
                _ => None,
            })
            .collect(),
        Err(err) => {
            tracing::debug!(error = %err, "terminology response was not a json array");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_terms_from_noisy_output() {
        assert_eq!(
            parse_terms("Here:\n```json\n[\"Acme\", 3, \" GTM \", \"\"]\n```"),
            ["Acme", "GTM"]
        );
        assert!(parse_terms("no terms").is_empty());
        assert!(parse_terms("[not json]").is_empty());
        assert!(parse_terms("] backwards [").is_empty());
    }
}
