use rustc_hash::{FxHashMap, FxHashSet};

use crate::issue::{Issue, IssueKey, IssueKind};
use crate::tokenize::first_occurrence;

/// Combines dictionary findings with model findings into one display list.
///
/// A model record of a contextual kind (terminology, grammar) replaces the
/// dictionary record for the same word; otherwise the dictionary record wins.
/// The result holds one record per word, ordered by where the word first
/// appears in `text`. Words that cannot be found go last, in input order.
pub fn merge_issues(text: &str, deterministic: Vec<Issue>, generative: Vec<Issue>) -> Vec<Issue> {
    let deterministic = dedup_first(deterministic);
    let generative = dedup_first(generative);

    let generative_kinds: FxHashMap<IssueKey, IssueKind> = generative
        .iter()
        .map(|issue| (issue.key(), issue.kind()))
        .collect();

    let kept: Vec<Issue> = deterministic
        .into_iter()
        .filter(|issue| {
            !generative_kinds
                .get(&issue.key())
                .is_some_and(IssueKind::is_contextual)
        })
        .collect();
    let kept_keys: FxHashSet<IssueKey> = kept.iter().map(Issue::key).collect();

    let before = generative.len();
    let mut merged = kept;
    merged.extend(
        generative
            .into_iter()
            .filter(|issue| !kept_keys.contains(&issue.key())),
    );
    tracing::debug!(
        deterministic = kept_keys.len(),
        generative = merged.len() - kept_keys.len(),
        superseded = before + kept_keys.len() - merged.len(),
        "merged issue lists"
    );

    order_by_occurrence(text, merged)
}

/// Stable sort by first occurrence of each word in `text`; unknown words last.
pub fn order_by_occurrence(text: &str, issues: Vec<Issue>) -> Vec<Issue> {
    let mut keyed: Vec<(Option<usize>, Issue)> = issues
        .into_iter()
        .map(|issue| (first_occurrence(text, issue.word()), issue))
        .collect();
    keyed.sort_by_key(|(offset, _)| offset.unwrap_or(usize::MAX));
    keyed.into_iter().map(|(_, issue)| issue).collect()
}

fn dedup_first(issues: Vec<Issue>) -> Vec<Issue> {
    let mut seen = FxHashSet::default();
    issues
        .into_iter()
        .filter(|issue| seen.insert(issue.key()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issue::{GenerativeFields, Origin, Position};

    fn det(seq: u64, word: &str) -> Issue {
        Issue::deterministic(seq, word, Position { start: 0, end: word.len() }, vec![]).unwrap()
    }

    fn gen(seq: u64, word: &str, kind: IssueKind, suggestion: &str) -> Issue {
        Issue::generative(
            seq,
            GenerativeFields {
                word: word.to_string(),
                kind: Some(kind),
                suggestions: vec![suggestion.to_string()],
                ..Default::default()
            },
        )
        .unwrap()
    }

    fn words(issues: &[Issue]) -> Vec<&str> {
        issues.iter().map(Issue::word).collect()
    }

    #[test]
    fn contextual_model_record_supersedes_dictionary() {
        let merged = merge_issues(
            "our gtm plan",
            vec![det(1, "gtm")],
            vec![gen(1, "gtm", IssueKind::Terminology, "go-to-market")],
        );
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].kind(), IssueKind::Terminology);
        assert_eq!(merged[0].origin(), Origin::Generative);
        assert_eq!(merged[0].primary_suggestion(), Some("go-to-market"));
    }

    #[test]
    fn grammar_also_supersedes() {
        let merged = merge_issues(
            "Im here",
            vec![det(1, "Im")],
            vec![gen(1, "im", IssueKind::Grammar, "I'm")],
        );
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].kind(), IssueKind::Grammar);
    }

    #[test]
    fn both_spelling_keeps_dictionary_record() {
        let merged = merge_issues(
            "a tset here",
            vec![det(1, "tset")],
            vec![gen(1, "TSET", IssueKind::Spelling, "test")],
        );
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].origin(), Origin::Deterministic);
        assert_eq!(merged[0].word(), "tset");
    }

    #[test]
    fn orders_by_first_occurrence() {
        let text = "alpha beta gamma";
        let cases = [
            (vec![det(1, "gamma")], vec![gen(1, "alpha", IssueKind::Spelling, "x")]),
            (vec![det(1, "alpha")], vec![gen(1, "gamma", IssueKind::Spelling, "x")]),
        ];
        for (a, b) in cases {
            assert_eq!(words(&merge_issues(text, a, b)), ["alpha", "gamma"]);
        }
    }

    #[test]
    fn unlocatable_words_go_last_in_input_order() {
        let merged = merge_issues(
            "beta alpha",
            vec![det(1, "zeta"), det(2, "alpha")],
            vec![gen(1, "omega", IssueKind::Spelling, "x"), gen(2, "beta", IssueKind::Spelling, "y")],
        );
        assert_eq!(words(&merged), ["beta", "alpha", "zeta", "omega"]);
    }

    #[test]
    fn substring_match_orders_by_its_offset() {
        // "alph" only appears inside "alphabet"
        let merged = merge_issues("zed alphabet", vec![det(1, "alph"), det(2, "zed")], vec![]);
        assert_eq!(words(&merged), ["zed", "alph"]);
    }

    #[test]
    fn duplicates_within_one_side_keep_the_first() {
        let merged = merge_issues(
            "teh cat",
            vec![],
            vec![
                gen(1, "teh", IssueKind::Spelling, "the"),
                gen(2, "Teh", IssueKind::Grammar, "The"),
            ],
        );
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].id().seq(), 1);
    }

    #[test]
    fn empty_sides_reorder_the_other() {
        let text = "one two three";
        let merged = merge_issues(text, vec![det(1, "three"), det(2, "one")], vec![]);
        assert_eq!(words(&merged), ["one", "three"]);
        let merged = merge_issues(
            text,
            vec![],
            vec![gen(1, "two", IssueKind::Spelling, "2"), gen(2, "one", IssueKind::Spelling, "1")],
        );
        assert_eq!(words(&merged), ["one", "two"]);
        assert!(merge_issues(text, vec![], vec![]).is_empty());
    }
}
