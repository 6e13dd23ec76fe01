//! Hunspell affix rules (`.aff`), enough to expand dictionary stems into their
//! inflected forms.
//!
//! Only `FLAG`, `PFX` and `SFX` are interpreted. Continuation flags on affixes
//! and the compounding directives are ignored.

use regex::Regex;
use rustc_hash::FxHashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum FlagMode {
    #[default]
    Char,
    Long,
    Num,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AffixKind {
    Prefix,
    Suffix,
}

#[derive(Debug, Clone)]
struct AffixRule {
    strip: String,
    add: String,
    /// `None` for the catch-all `.` condition.
    condition: Option<Regex>,
}

impl AffixRule {
    fn applies_to(&self, stem: &str) -> bool {
        self.condition
            .as_ref()
            .map(|cond| cond.is_match(stem))
            .unwrap_or(true)
    }

    fn attach_suffix(&self, word: &str) -> Option<String> {
        let base = word.strip_suffix(self.strip.as_str())?;
        let form = format!("{base}{}", self.add);
        (!form.is_empty()).then_some(form)
    }

    fn attach_prefix(&self, word: &str) -> Option<String> {
        let rest = word.strip_prefix(self.strip.as_str())?;
        let form = format!("{}{rest}", self.add);
        (!form.is_empty()).then_some(form)
    }
}

#[derive(Debug, Clone)]
struct AffixClass {
    kind: AffixKind,
    cross_product: bool,
    rules: Vec<AffixRule>,
}

#[derive(Debug, Clone, Default)]
pub struct AffixRules {
    mode: FlagMode,
    classes: FxHashMap<String, AffixClass>,
}

impl AffixRules {
    pub fn parse(contents: &str) -> Self {
        let mut rules = Self::default();
        for line in contents.lines() {
            let fields: Vec<&str> = line.split_whitespace().collect();
            match fields.as_slice() {
                [] => {}
                [first, ..] if first.starts_with('#') => {}
                ["FLAG", mode, ..] => {
                    rules.mode = match *mode {
                        "long" => FlagMode::Long,
                        "num" => FlagMode::Num,
                        _ => FlagMode::Char,
                    };
                }
                [tag @ ("PFX" | "SFX"), flag, rest @ ..] if rest.len() >= 2 => {
                    let kind = if *tag == "PFX" {
                        AffixKind::Prefix
                    } else {
                        AffixKind::Suffix
                    };
                    rules.add_line(kind, flag, rest);
                }
                _ => {}
            }
        }
        rules
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Number of affix classes (flags) defined.
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Every form produced by applying the affixes named in `flags` to `stem`,
    /// including prefix and suffix combinations allowed by cross product. The
    /// stem itself is not included.
    pub fn expand(&self, stem: &str, flags: &str) -> Vec<String> {
        let classes: Vec<&AffixClass> = self
            .split_flags(flags)
            .iter()
            .filter_map(|flag| self.classes.get(flag))
            .collect();
        let mut forms = Vec::new();
        let mut crossable = Vec::new();
        for class in classes.iter().filter(|c| c.kind == AffixKind::Suffix) {
            for rule in class.rules.iter().filter(|r| r.applies_to(stem)) {
                if let Some(form) = rule.attach_suffix(stem) {
                    if class.cross_product {
                        crossable.push(form.clone());
                    }
                    forms.push(form);
                }
            }
        }
        for class in classes.iter().filter(|c| c.kind == AffixKind::Prefix) {
            for rule in class.rules.iter().filter(|r| r.applies_to(stem)) {
                forms.extend(rule.attach_prefix(stem));
                if class.cross_product {
                    forms.extend(crossable.iter().filter_map(|word| rule.attach_prefix(word)));
                }
            }
        }
        forms
    }

    fn split_flags(&self, flags: &str) -> Vec<String> {
        match self.mode {
            FlagMode::Char => flags.chars().map(String::from).collect(),
            FlagMode::Long => {
                let chars: Vec<char> = flags.chars().collect();
                chars.chunks(2).map(|pair| pair.iter().collect()).collect()
            }
            FlagMode::Num => flags
                .split(',')
                .map(str::trim)
                .filter(|f| !f.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    fn add_line(&mut self, kind: AffixKind, flag: &str, rest: &[&str]) {
        if !self.classes.contains_key(flag) {
            // header: cross-product marker and rule count
            self.classes.insert(
                flag.to_string(),
                AffixClass {
                    kind,
                    cross_product: rest[0] == "Y",
                    rules: Vec::new(),
                },
            );
            return;
        }
        let strip = empty_if_zero(rest[0]);
        let add = empty_if_zero(rest[1].split('/').next().unwrap_or(""));
        let condition = match rest.get(2).copied() {
            None | Some(".") => None,
            Some(cond) => {
                let pattern = match kind {
                    AffixKind::Suffix => format!("(?:{cond})$"),
                    AffixKind::Prefix => format!("^(?:{cond})"),
                };
                match Regex::new(&pattern) {
                    Ok(re) => Some(re),
                    Err(err) => {
                        tracing::debug!(flag, condition = cond, error = %err, "skipping affix rule");
                        return;
                    }
                }
            }
        };
        if let Some(class) = self.classes.get_mut(flag) {
            class.rules.push(AffixRule {
                strip: strip.to_string(),
                add: add.to_string(),
                condition,
            });
        }
    }
}

fn empty_if_zero(field: &str) -> &str {
    if field == "0" {
        ""
    } else {
        field
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EN_AFF: &str = "\
SET UTF-8
TRY esianrtolcdugmphbyfvkwzESIANRTOLCDUGMPHBYFVKWZ'

PFX A Y 1
PFX A   0     re         .

SFX S Y 4
SFX S   y     ies        [^aeiou]y
SFX S   0     s          [aeiou]y
SFX S   0     es         [sxzh]
SFX S   0     s          [^sxzhy]

SFX G Y 2
SFX G   e     ing        e
SFX G   0     ing        [^e]

SFX N N 1
SFX N   0     ness/S     .
";

    fn sorted(mut forms: Vec<String>) -> Vec<String> {
        forms.sort();
        forms
    }

    #[test]
    fn expands_suffixes_by_condition() {
        let rules = AffixRules::parse(EN_AFF);
        assert_eq!(rules.len(), 4);
        assert_eq!(rules.expand("test", "S"), ["tests"]);
        assert_eq!(rules.expand("fly", "S"), ["flies"]);
        assert_eq!(rules.expand("day", "S"), ["days"]);
        assert_eq!(rules.expand("box", "S"), ["boxes"]);
        assert_eq!(rules.expand("make", "G"), ["making"]);
        assert_eq!(rules.expand("test", "G"), ["testing"]);
    }

    #[test]
    fn cross_product_combines_prefix_and_suffix() {
        let rules = AffixRules::parse(EN_AFF);
        assert_eq!(
            sorted(rules.expand("test", "ASG")),
            ["retest", "retesting", "retests", "testing", "tests"]
        );
        // N does not allow cross product, and its continuation flag is ignored
        assert_eq!(sorted(rules.expand("kind", "AN")), ["kindness", "rekind"]);
    }

    #[test]
    fn unknown_flags_expand_to_nothing() {
        let rules = AffixRules::parse(EN_AFF);
        assert!(rules.expand("test", "XYZ").is_empty());
        assert!(AffixRules::default().expand("test", "S").is_empty());
    }

    #[test]
    fn long_and_numeric_flags() {
        let long = AffixRules::parse("FLAG long\nSFX Aa Y 1\nSFX Aa 0 ed .\n");
        assert_eq!(long.expand("walk", "AaZz"), ["walked"]);

        let num = AffixRules::parse("FLAG num\nSFX 12 Y 1\nSFX 12 0 er .\n");
        assert_eq!(num.expand("walk", "7,12"), ["walker"]);
    }
}
