/// Quotes a text value for the service's SQL-92 where dialect. This is the
/// only place user text is turned into where-clause syntax.
pub fn quote_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        match c {
            '\'' => out.push_str("''"),
            c if c.is_control() => {}
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

/// Escape character for LIKE patterns built from caller terms.
pub const LIKE_ESCAPE: char = '\\';

/// Escapes LIKE wildcards so `term` matches literally. Returns `None` when
/// nothing needed escaping.
pub fn escape_like(term: &str) -> Option<String> {
    if !term.contains(['%', '_', LIKE_ESCAPE]) {
        return None;
    }
    let mut out = String::with_capacity(term.len() + 4);
    for c in term.chars() {
        if matches!(c, '%' | '_') || c == LIKE_ESCAPE {
            out.push(LIKE_ESCAPE);
        }
        out.push(c);
    }
    Some(out)
}

/// Field names are interpolated unquoted, so only plain identifiers pass.
pub fn is_field_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Trims a caller-supplied term; blank input counts as absent.
pub fn normalize_term(term: Option<&str>) -> Option<String> {
    let t = term?.trim();
    if t.is_empty() {
        None
    } else {
        Some(t.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_literal_doubles_single_quotes() {
        assert_eq!(quote_literal("O'Hare"), "'O''Hare'");
        assert_eq!(quote_literal("x'; DROP--"), "'x''; DROP--'");
    }

    #[test]
    fn quote_literal_strips_control_characters() {
        assert_eq!(quote_literal("Lake\nCounty\0"), "'LakeCounty'");
    }

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(escape_like("Zion"), None);
        assert_eq!(escape_like("50%_off"), Some("50\\%\\_off".to_string()));
        assert_eq!(escape_like("a\\b"), Some("a\\\\b".to_string()));
    }

    #[test]
    fn field_identifiers() {
        assert!(is_field_identifier("ProjectStatus"));
        assert!(is_field_identifier("status_CIRS"));
        assert!(!is_field_identifier("1abc"));
        assert!(!is_field_identifier("name) OR (1=1"));
        assert!(!is_field_identifier(""));
    }

    #[test]
    fn blank_terms_are_absent() {
        assert_eq!(normalize_term(Some("  Zion ")), Some("Zion".to_string()));
        assert_eq!(normalize_term(Some("   ")), None);
        assert_eq!(normalize_term(None), None);
    }
}
