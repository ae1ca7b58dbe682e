//! Regexes used by the text extractor.
//!
//! Every pattern is compiled by the `regex` crate, which matches in linear time; repetition
//! counts are bounded so a single match never spans more than a handful of words.

use regex::Regex;
use std::sync::OnceLock;

/// Words considered on either side of a relationship verb before trimming to the configured
/// phrase length.
const WORD: &str = r"[\p{L}\p{N}][\p{L}\p{N}_./-]*";

pub(crate) fn verb_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let pattern = format!(
            r"(?i)((?:{WORD}[ \t]+){{0,7}}?{WORD})[ \t]+(connects[ \t]+to|talks[ \t]+to|calls|uses|accesses|queries|stores[ \t]+data[ \t]+in)[ \t]+({WORD}(?:[ \t]+{WORD}){{0,7}})"
        );
        Regex::new(&pattern).expect("valid regex")
    })
}

pub(crate) fn arrow_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"-->|->|→").expect("valid regex"))
}

/// `dependsOn: [ ... ]` (Bicep/ARM) and `depends_on = [ ... ]` (Terraform).
pub(crate) fn depends_on_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?:"?dependsOn"?[ \t]*:|depends_on[ \t]*=)[ \t]*\[([^\]]*)\]"#)
            .expect("valid regex")
    })
}

/// Provider resource-type literals: `Microsoft.Web/sites`, `azurerm_key_vault`.
pub(crate) fn resource_type_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(?:microsoft\.[a-z0-9]+(?:/[a-z0-9]+)+|azurerm_[a-z0-9_]+)")
            .expect("valid regex")
    })
}

pub(crate) fn parenthetical_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\([^()\n]*\)|\[[^\[\]\n]*\]").expect("valid regex"))
}

/// Splits a phrase into words with surrounding markdown/punctuation removed.
pub(crate) fn phrase_words(phrase: &str) -> Vec<&str> {
    phrase
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|w| !w.is_empty())
        .collect()
}

/// Entity phrase to the left of an arrow: the last clause of the segment.
pub(crate) fn left_entity(segment: &str) -> String {
    let cleaned = parenthetical_regex().replace_all(segment, " ");
    let clause = cleaned
        .rsplit(is_clause_break)
        .find(|piece| !phrase_words(piece).is_empty())
        .unwrap_or("");
    phrase_words(clause).join(" ")
}

/// Entity phrase to the right of an arrow: the first clause of the segment.
pub(crate) fn right_entity(segment: &str) -> String {
    let cleaned = parenthetical_regex().replace_all(segment, " ");
    let clause = cleaned
        .split(is_clause_break)
        .find(|piece| !phrase_words(piece).is_empty())
        .unwrap_or("");
    phrase_words(clause).join(" ")
}

fn is_clause_break(c: char) -> bool {
    matches!(c, '.' | ';' | ':' | '!' | '?' | ',' | '|' | '\n')
}

/// Mermaid-style edge label right after an arrow: `A -->|reads| B`.
pub(crate) fn arrow_label(segment: &str) -> (Option<String>, &str) {
    let trimmed = segment.trim_start();
    let Some(rest) = trimmed.strip_prefix('|') else {
        return (None, segment);
    };
    let Some(end) = rest.find('|') else {
        return (None, segment);
    };
    let label = rest[..end].trim();
    let label = (!label.is_empty()).then(|| label.to_string());
    (label, &rest[end + 1..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verb_regex_captures_subject_verb_object() {
        let caps = verb_regex()
            .captures("App Service talks to Cosmos DB")
            .unwrap();
        assert_eq!(&caps[1], "App Service");
        assert_eq!(&caps[2], "talks to");
        assert_eq!(&caps[3], "Cosmos DB");
    }

    #[test]
    fn verb_regex_stops_at_punctuation() {
        let caps = verb_regex()
            .captures("First, the API calls Key Vault. Then it retries.")
            .unwrap();
        assert_eq!(&caps[1], "the API");
        assert_eq!(&caps[3], "Key Vault.");
    }

    #[test]
    fn entities_drop_parentheticals_and_clauses() {
        assert_eq!(left_entity("Flow: App Service (web tier) "), "App Service");
        assert_eq!(right_entity(" **SQL Database**. Then more"), "SQL Database");
    }

    #[test]
    fn arrow_label_is_extracted() {
        let (label, rest) = arrow_label("|reads| Cosmos DB");
        assert_eq!(label.as_deref(), Some("reads"));
        assert_eq!(rest.trim(), "Cosmos DB");
        assert_eq!(arrow_label(" Cosmos DB").0, None);
    }

    #[test]
    fn resource_type_regex_finds_provider_literals() {
        let found: Vec<&str> = resource_type_regex()
            .find_iter("use Microsoft.Web/sites@2022-03-01 and azurerm_key_vault.")
            .map(|m| m.as_str())
            .collect();
        assert_eq!(found, vec!["Microsoft.Web/sites", "azurerm_key_vault"]);
    }
}
