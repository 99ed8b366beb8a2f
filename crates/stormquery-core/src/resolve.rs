use std::collections::BTreeMap;

/// Maps a user term onto a vocabulary entry. Exact (case-insensitive) match
/// wins, then the first entry that starts with or contains the term, else
/// the trimmed term itself so a cold vocabulary never drops the filter.
pub fn resolve_term(term: &str, vocabulary: &[String]) -> String {
    let t = term.trim();
    let needle = t.to_lowercase();
    if needle.is_empty() {
        return t.to_string();
    }
    if let Some(hit) = vocabulary.iter().find(|v| v.to_lowercase() == needle) {
        return hit.clone();
    }
    vocabulary
        .iter()
        .find(|v| {
            let v = v.to_lowercase();
            v.starts_with(&needle) || v.contains(&needle)
        })
        .cloned()
        .unwrap_or_else(|| t.to_string())
}

/// Alias keys are matched case-insensitively.
pub fn apply_alias(term: &str, aliases: &BTreeMap<String, String>) -> String {
    let t = term.trim();
    let key = t.to_lowercase();
    aliases
        .iter()
        .find(|(k, _)| k.to_lowercase() == key)
        .map(|(_, v)| v.clone())
        .unwrap_or_else(|| t.to_string())
}
