use serde_json::{Map, Value};

use crate::error::{CheckError, Result};
use crate::issue::{ConfidenceTag, GenerativeFields, Issue, IssueKind};

/// Parses a complete model response into issues numbered from 1.
///
/// Accepts `{"errors": [...]}` or a bare array, optionally wrapped in prose or a
/// Markdown code fence. Array entries that are not usable issue objects are dropped.
pub fn parse_issues(content: &str) -> Result<Vec<Issue>> {
    let elements = parse_elements(content)?;
    Ok(normalize_elements(&elements, 1))
}

/// The entries of the response's issue array.
pub fn parse_elements(content: &str) -> Result<Vec<Value>> {
    let value = parse_document(content)?;
    match value {
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => match map.remove("errors") {
            Some(Value::Array(items)) => Ok(items),
            Some(_) => Err(CheckError::UnexpectedShape("errors is not an array")),
            None => Err(CheckError::UnexpectedShape("missing errors array")),
        },
        _ => Err(CheckError::UnexpectedShape("expected an object or array")),
    }
}

pub(crate) fn normalize_elements(elements: &[Value], first_seq: u64) -> Vec<Issue> {
    let mut seq = first_seq;
    let mut issues = Vec::new();
    for element in elements {
        if let Some(issue) = issue_from_value(element, seq) {
            issues.push(issue);
            seq += 1;
        }
    }
    issues
}

/// Builds a generative issue when the object has a non-empty word and at least
/// one suggestion.
pub(crate) fn issue_from_value(value: &Value, seq: u64) -> Option<Issue> {
    let fields = fields_from_object(value.as_object()?)?;
    Issue::generative(seq, fields)
}

fn fields_from_object(obj: &Map<String, Value>) -> Option<GenerativeFields> {
    let word = obj.get("word").and_then(scalar_text)?;
    let mut suggestions = Vec::new();
    if let Some(single) = obj.get("suggestion").and_then(scalar_text) {
        suggestions.push(single);
    }
    if let Some(Value::Array(items)) = obj.get("suggestions") {
        suggestions.extend(items.iter().filter_map(scalar_text));
    }
    if suggestions.is_empty() {
        return None;
    }
    let kind = obj
        .get("type")
        .or_else(|| obj.get("kind"))
        .and_then(Value::as_str)
        .map(IssueKind::from_tag);
    let confidence = obj
        .get("confidence")
        .and_then(Value::as_str)
        .and_then(ConfidenceTag::from_tag);
    Some(GenerativeFields {
        word,
        kind,
        suggestions,
        reason: obj.get("reason").and_then(scalar_text),
        confidence,
    })
}

fn scalar_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn parse_document(content: &str) -> Result<Value> {
    let trimmed = content.trim();
    let err = match serde_json::from_str::<Value>(trimmed) {
        Ok(value) => return Ok(value),
        Err(err) => err,
    };
    let mut last_err = err.to_string();
    for span in embedded_json(trimmed) {
        match serde_json::from_str::<Value>(span) {
            Ok(value) => return Ok(value),
            Err(inner) => last_err = inner.to_string(),
        }
    }
    Err(CheckError::MalformedPayload(last_err))
}

/// Candidate JSON spans inside prose or fences: from the first `{` to the last
/// `}` and from the first `[` to the last `]`, earliest start first.
fn embedded_json(content: &str) -> Vec<&str> {
    let mut spans: Vec<(usize, &str)> = [('{', '}'), ('[', ']')]
        .into_iter()
        .filter_map(|(open, close)| {
            let start = content.find(open)?;
            let end = content.rfind(close)?;
            (end > start).then(|| (start, &content[start..=end]))
        })
        .collect();
    spans.sort_by_key(|(start, _)| *start);
    spans.into_iter().map(|(_, span)| span).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issue::{ConfidenceTag, Confidence, Origin, DEFAULT_REASON};
    use serde_json::json;

    #[test]
    fn parses_errors_object() {
        let input = json!({
            "errors": [
                {"word": "tset", "suggestion": "test", "reason": "typo", "type": "spelling"},
                {"word": "Im", "suggestion": "I'm", "reason": "grammar", "type": "grammar", "confidence": "high"},
            ]
        })
        .to_string();
        let issues = parse_issues(&input).unwrap();
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].word(), "tset");
        assert_eq!(issues[0].suggestions(), ["test"]);
        assert_eq!(issues[0].origin(), Origin::Generative);
        assert_eq!(issues[1].kind(), IssueKind::Grammar);
        assert_eq!(issues[1].confidence(), Confidence::Tag(ConfidenceTag::High));
        assert_eq!(issues[1].id().seq(), 2);
    }

    #[test]
    fn empty_errors_array_is_ok() {
        assert!(parse_issues(r#"{"errors": []}"#).unwrap().is_empty());
    }

    #[test]
    fn drops_items_without_word_or_suggestion() {
        let input = json!({
            "errors": [
                {"word": "valid", "suggestion": "ok"},
                {"word": "missing-suggestion"},
                {"suggestion": "missing-word"},
                {},
                "not an object",
                {"word": "", "suggestion": "x"},
            ]
        })
        .to_string();
        let issues = parse_issues(&input).unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].word(), "valid");
        assert_eq!(issues[0].id().seq(), 1);
    }

    #[test]
    fn invalid_json_is_an_error() {
        let err = parse_issues("not valid json").unwrap_err();
        assert!(matches!(err, CheckError::MalformedPayload(_)));
        let err = parse_issues(r#"{"errors": [{"word": "x""#).unwrap_err();
        assert!(matches!(err, CheckError::MalformedPayload(_)));
    }

    #[test]
    fn wrong_shape_is_an_error() {
        assert!(matches!(
            parse_issues(r#"{"issues": []}"#),
            Err(CheckError::UnexpectedShape(_))
        ));
        assert!(matches!(
            parse_issues(r#"{"errors": {}}"#),
            Err(CheckError::UnexpectedShape(_))
        ));
    }

    #[test]
    fn accepts_bare_array_and_code_fences() {
        let issues = parse_issues(r#"[{"word": "test", "suggestion": "fixed"}]"#).unwrap();
        assert_eq!(issues.len(), 1);
        let fenced = "Here you go:\n```json\n{\"errors\":[{\"word\":\"ppl\",\"suggestion\":\"people\",\"type\":\"terminology\"}]}\n```";
        let issues = parse_issues(fenced).unwrap();
        assert_eq!(issues[0].kind(), IssueKind::Terminology);
    }

    #[test]
    fn brackets_in_leading_prose_do_not_hide_the_object() {
        let text = r#"Note [1]: {"errors":[{"word":"teh","suggestion":"the"}]} (see [2])"#;
        let issues = parse_issues(text).unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].word(), "teh");
    }

    #[test]
    fn fills_defaults_and_merges_suggestion_fields() {
        let input = r#"{"errors":[{"word":"test","suggestion":"fixed","suggestions":["fixed","mended"],"type":"tone"}]}"#;
        let issue = &parse_issues(input).unwrap()[0];
        assert_eq!(issue.kind(), IssueKind::Spelling);
        assert_eq!(issue.reason(), DEFAULT_REASON);
        assert_eq!(issue.suggestions(), ["fixed", "mended"]);
        assert_eq!(issue.confidence(), Confidence::Tag(ConfidenceTag::Medium));
    }
}
