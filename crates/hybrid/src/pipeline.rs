use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Result};
use futures::stream::{self, BoxStream, StreamExt};
use notecheck_core::{
    merge_issues, order_by_occurrence, CheckStats, DeterministicChecker, DeterministicReport,
    ExtractEvent,
};
use serde::{Deserialize, Serialize};

use crate::config::NotecheckConfig;
use crate::events::StreamEvent;
use crate::generative::{GenerativeChecker, Usage};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckRequest {
    pub speaker_notes: String,
    #[serde(default)]
    pub slide_content: String,
    #[serde(default)]
    pub terminology: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerativeStats {
    pub usage: Usage,
    pub error_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct FullCheckStats {
    pub deterministic: CheckStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generative: Option<GenerativeStats>,
    pub total_time_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FullCheckReport {
    pub errors: Vec<notecheck_core::Issue>,
    pub terminology: Vec<String>,
    /// True when the result holds dictionary findings only.
    pub fallback_mode: bool,
    pub stats: FullCheckStats,
}

/// Runs the dictionary checker and, when configured, the generative checker,
/// and merges their findings.
#[derive(Clone)]
pub struct HybridChecker {
    deterministic: DeterministicChecker,
    generative: Option<GenerativeChecker>,
}

impl HybridChecker {
    pub fn new(deterministic: DeterministicChecker, generative: Option<GenerativeChecker>) -> Self {
        Self {
            deterministic,
            generative,
        }
    }

    pub fn from_config(config: &NotecheckConfig) -> Result<Self> {
        let deterministic = DeterministicChecker::from_path(config.dictionary.as_deref());
        let generative = config.build_client()?.map(|client| {
            GenerativeChecker::new(Arc::new(client)).with_min_chars(config.min_chars)
        });
        match &generative {
            Some(checker) => tracing::info!(backend = %checker.describe(), "generative checker ready"),
            None => tracing::warn!("generative checker not configured, full checks use the dictionary only"),
        }
        Ok(Self::new(deterministic, generative))
    }

    pub fn ai_configured(&self) -> bool {
        self.generative.is_some()
    }

    pub fn quick_check(&self, text: &str, terminology: &[String]) -> DeterministicReport {
        self.deterministic.check(text, terminology)
    }

    pub async fn full_check(&self, req: &CheckRequest) -> FullCheckReport {
        let started = Instant::now();
        let report = self.deterministic.check(&req.speaker_notes, &req.terminology);
        let generative = match &self.generative {
            Some(checker) => match checker
                .check(&req.speaker_notes, &req.slide_content, &req.terminology)
                .await
            {
                Ok(found) => Some(found),
                Err(err) => {
                    tracing::warn!(error = %err, "generative check failed, using dictionary results");
                    None
                }
            },
            None => None,
        };
        let fallback_mode = generative.is_none();
        let (errors, generative_stats) = match generative {
            Some(found) => {
                let stats = GenerativeStats {
                    usage: found.usage,
                    error_count: found.issues.len(),
                };
                let merged = merge_issues(&req.speaker_notes, report.issues, found.issues);
                (merged, Some(stats))
            }
            None => (order_by_occurrence(&req.speaker_notes, report.issues), None),
        };
        FullCheckReport {
            errors,
            terminology: req.terminology.clone(),
            fallback_mode,
            stats: FullCheckStats {
                deterministic: report.stats,
                generative: generative_stats,
                total_time_ms: started.elapsed().as_millis() as u64,
            },
        }
    }

    /// Generative issues as they arrive, then one `Done` with the merged list.
    ///
    /// When the model is absent or its stream cannot be opened, the stream is a
    /// single `Done` carrying the dictionary findings.
    pub async fn stream_check(&self, req: CheckRequest) -> BoxStream<'static, StreamEvent> {
        let report = self.deterministic.check(&req.speaker_notes, &req.terminology);
        let Some(checker) = &self.generative else {
            return dictionary_only(&req.speaker_notes, report);
        };
        let events = match checker
            .check_stream(&req.speaker_notes, &req.slide_content, &req.terminology)
            .await
        {
            Ok(events) => events,
            Err(err) => {
                tracing::warn!(error = %err, "could not open generative stream, using dictionary results");
                return dictionary_only(&req.speaker_notes, report);
            }
        };
        let text = req.speaker_notes;
        let mut deterministic = Some(report.issues);
        events
            .map(move |event| match event {
                ExtractEvent::Issue(issue) => StreamEvent::Issue(issue),
                ExtractEvent::Done(generative) => {
                    let deterministic = deterministic.take().unwrap_or_default();
                    StreamEvent::Done(merge_issues(&text, deterministic, generative))
                }
                ExtractEvent::Failed(message) => StreamEvent::Failed(message),
            })
            .boxed()
    }

    pub async fn extract_terminology(&self, slide_content: &str) -> Result<Vec<String>> {
        let checker = self
            .generative
            .as_ref()
            .ok_or_else(|| anyhow!("generative model is not configured"))?;
        checker.extract_terminology(slide_content).await
    }
}

fn dictionary_only(text: &str, report: DeterministicReport) -> BoxStream<'static, StreamEvent> {
    let issues = order_by_occurrence(text, report.issues);
    stream::iter([StreamEvent::Done(issues)]).boxed()
}
