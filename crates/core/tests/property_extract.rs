use notecheck_core::{parse_issues, IncrementalExtractor, Issue};
use proptest::prelude::*;
use serde_json::{json, Value};

#[derive(Clone, Debug)]
struct ItemSpec {
    word: String,
    suggestion: Option<String>,
    reason: String,
    nested: bool,
}

impl ItemSpec {
    fn usable(&self) -> bool {
        !self.word.trim().is_empty()
            && self
                .suggestion
                .as_deref()
                .map(|s| !s.trim().is_empty())
                .unwrap_or(false)
    }

    fn to_value(&self) -> Value {
        let mut obj = json!({ "word": self.word, "reason": self.reason, "type": "spelling" });
        if let Some(suggestion) = &self.suggestion {
            obj["suggestion"] = json!(suggestion);
        }
        if self.nested {
            obj["meta"] = json!({ "span": { "note": "{not} a \"brace\"" } });
        }
        obj
    }
}

fn item_spec() -> impl Strategy<Value = ItemSpec> {
    (
        "[a-z{}\"\\\\ ]{0,8}",
        prop::option::of("[a-z{}\\[\\] ]{0,6}"),
        "[a-z{}\\[\\]\",:\\\\ ]{0,16}",
        any::<bool>(),
    )
        .prop_map(|(word, suggestion, reason, nested)| ItemSpec {
            word,
            suggestion,
            reason,
            nested,
        })
}

/// An array element that is not an issue object, possibly hiding one inside.
fn stray_element() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i32>().prop_map(|n| json!(n)),
        "[a-z\\[\\]{} ]{0,6}".prop_map(|s| json!(s)),
        item_spec().prop_map(|item| json!([item.to_value()])),
        Just(json!([[], {}])),
        Just(Value::Null),
    ]
}

fn payload(items: &[ItemSpec]) -> String {
    let values: Vec<Value> = items.iter().map(ItemSpec::to_value).collect();
    json!({ "errors": values }).to_string()
}

/// Feeds `payload` in fragments whose character lengths cycle through `sizes`.
fn run(payload: &str, sizes: &[usize]) -> (Vec<Issue>, Vec<Issue>) {
    let chars: Vec<char> = payload.chars().collect();
    let mut extractor = IncrementalExtractor::new();
    let mut incremental = Vec::new();
    let mut at = 0;
    for size in sizes.iter().cycle() {
        if at >= chars.len() {
            break;
        }
        let end = (at + size).min(chars.len());
        let fragment: String = chars[at..end].iter().collect();
        incremental.extend(extractor.push(&fragment));
        at = end;
    }
    let rest = extractor.finish().expect("payload is valid json");
    (incremental, rest)
}

fn words(issues: &[Issue]) -> Vec<String> {
    issues.iter().map(|i| i.word().to_string()).collect()
}

proptest! {
    #[test]
    fn every_valid_object_is_emitted_once(
        items in prop::collection::vec(item_spec(), 0..12),
        sizes in prop::collection::vec(1usize..9, 1..16),
    ) {
        let text = payload(&items);
        let (incremental, rest) = run(&text, &sizes);
        let expected: Vec<String> = items
            .iter()
            .filter(|item| item.usable())
            .map(|item| item.word.trim().to_string())
            .collect();

        prop_assert!(rest.is_empty());
        prop_assert_eq!(words(&incremental), expected);
        let seqs: Vec<u64> = incremental.iter().map(|i| i.id().seq()).collect();
        let contiguous: Vec<u64> = (1..=incremental.len() as u64).collect();
        prop_assert_eq!(seqs, contiguous);
    }

    #[test]
    fn fragmentation_does_not_change_the_result(
        items in prop::collection::vec(item_spec(), 0..10),
        sizes in prop::collection::vec(1usize..20, 1..8),
    ) {
        let text = payload(&items);
        let (whole_inc, whole_rest) = run(&text, &[text.chars().count().max(1)]);
        let (char_inc, char_rest) = run(&text, &[1]);
        let (some_inc, some_rest) = run(&text, &sizes);

        let whole: Vec<Issue> = whole_inc.into_iter().chain(whole_rest).collect();
        let by_char: Vec<Issue> = char_inc.into_iter().chain(char_rest).collect();
        let by_sizes: Vec<Issue> = some_inc.into_iter().chain(some_rest).collect();
        prop_assert_eq!(&whole, &by_char);
        prop_assert_eq!(&whole, &by_sizes);
        prop_assert_eq!(whole, parse_issues(&text).unwrap());
    }

    #[test]
    fn wrapped_payloads_reach_the_same_records(
        items in prop::collection::vec(item_spec(), 0..8),
        sizes in prop::collection::vec(1usize..12, 1..8),
    ) {
        let text = format!("Here are the issues:\n```json\n{}\n```", payload(&items));
        let (incremental, rest) = run(&text, &sizes);
        let all: Vec<Issue> = incremental.into_iter().chain(rest).collect();
        prop_assert_eq!(all, parse_issues(&text).unwrap());
    }

    #[test]
    fn stray_elements_do_not_change_the_result(
        elements in prop::collection::vec(
            prop_oneof![
                item_spec().prop_map(|item| item.to_value()),
                stray_element(),
            ],
            0..10,
        ),
        sizes in prop::collection::vec(1usize..12, 1..8),
    ) {
        let text = json!({ "errors": elements }).to_string();
        let (incremental, rest) = run(&text, &sizes);
        let all: Vec<Issue> = incremental.into_iter().chain(rest).collect();
        prop_assert_eq!(all, parse_issues(&text).unwrap());
    }
}
