use notecheck_core::Issue;
use serde::ser::{Serialize, SerializeMap, Serializer};

/// One message of a streamed check.
///
/// Serializes as `{"type":"error","error":{..}}` for each issue,
/// `{"type":"done","errors":[..]}` for the final list and
/// `{"type":"error","message":".."}` for a failure. Nothing follows `Done` or
/// `Failed`.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Issue(Issue),
    Done(Vec<Issue>),
    Failed(String),
}

impl StreamEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StreamEvent::Issue(_))
    }
}

impl Serialize for StreamEvent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        match self {
            StreamEvent::Issue(issue) => {
                map.serialize_entry("type", "error")?;
                map.serialize_entry("error", issue)?;
            }
            StreamEvent::Done(issues) => {
                map.serialize_entry("type", "done")?;
                map.serialize_entry("errors", issues)?;
            }
            StreamEvent::Failed(message) => {
                map.serialize_entry("type", "error")?;
                map.serialize_entry("message", message)?;
            }
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notecheck_core::{GenerativeFields, IssueKind};
    use serde_json::json;

    fn issue() -> Issue {
        Issue::generative(
            1,
            GenerativeFields {
                word: "ppl".into(),
                kind: Some(IssueKind::Terminology),
                suggestions: vec!["people".into()],
                ..Default::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn serializes_wire_shapes() {
        let value = serde_json::to_value(StreamEvent::Issue(issue())).unwrap();
        assert_eq!(value["type"], "error");
        assert_eq!(value["error"]["word"], "ppl");
        assert_eq!(value["error"]["id"], "gen-1");

        let value = serde_json::to_value(StreamEvent::Done(vec![issue()])).unwrap();
        assert_eq!(value["type"], "done");
        assert_eq!(value["errors"].as_array().map(Vec::len), Some(1));

        let value = serde_json::to_value(StreamEvent::Failed("boom".into())).unwrap();
        assert_eq!(value, json!({ "type": "error", "message": "boom" }));
    }

    #[test]
    fn only_issues_are_non_terminal() {
        assert!(!StreamEvent::Issue(issue()).is_terminal());
        assert!(StreamEvent::Done(vec![]).is_terminal());
        assert!(StreamEvent::Failed(String::new()).is_terminal());
    }
}
