//! Prompt text for the generative checker.

const CHECK_INSTRUCTIONS: &str = "\
Review NOTES for spelling mistakes, informal terminology that should match the \
slide's wording, and grammar slips such as missing apostrophes in contractions.

- Report each distinct word or phrase once.
- For terminology, report the full phrase as written in NOTES.
- Give a short, specific reason for every finding.
- Use confidence \"high\", \"medium\" or \"low\".

Respond with JSON only, in exactly this shape:
{\"errors\":[{\"word\":\"...\",\"suggestion\":\"...\",\"reason\":\"...\",\"type\":\"spelling|terminology|grammar\",\"confidence\":\"high\"}]}
Use {\"errors\":[]} when NOTES has no issues.";

pub fn check_prompt(speaker_notes: &str, slide_content: &str, terminology: &[String]) -> String {
    let slide = slide_content.trim();
    let mut prompt = format!(
        "SLIDE: {}\n\nNOTES: {}\n\n",
        if slide.is_empty() { "None" } else { slide },
        speaker_notes
    );
    let terms: Vec<&str> = terminology
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .collect();
    if !terms.is_empty() {
        prompt.push_str(&format!("KNOWN TERMS (always correct): {}\n\n", terms.join(", ")));
    }
    prompt.push_str(CHECK_INSTRUCTIONS);
    prompt
}

pub fn terminology_prompt(slide_content: &str) -> String {
    format!(
        "List the terms in this slide that a spell checker must leave alone: brand names, \
         technical terms, acronyms, jargon and proper nouns.\n\nContent:\n{}\n\n\
         Respond with a JSON array of strings only, for example [\"term1\", \"term2\"].",
        slide_content.trim()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_prompt_includes_inputs() {
        let prompt = check_prompt("our gtm plan", "", &["Acme".into(), " ".into()]);
        assert!(prompt.starts_with("SLIDE: None\n\nNOTES: our gtm plan"));
        assert!(prompt.contains("KNOWN TERMS (always correct): Acme\n"));
        assert!(prompt.contains("{\"errors\":[]}"));
    }

    #[test]
    fn terminology_prompt_embeds_content() {
        assert!(terminology_prompt("  Acme Cloud  ").contains("Content:\nAcme Cloud\n"));
    }
}
