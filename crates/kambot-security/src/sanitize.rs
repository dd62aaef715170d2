//! Character-level input rules.

/// Find the first character that must never appear in user input.
///
/// Control characters are forbidden except tab, newline and carriage
/// return. Invisible formatting characters (zero-width and bidirectional
/// overrides) are forbidden too, since they can hide instructions from a
/// human reviewer.
pub fn find_forbidden_char(text: &str) -> Option<char> {
    text.chars().find(|&c| is_forbidden(c))
}

fn is_forbidden(c: char) -> bool {
    if matches!(c, '\t' | '\n' | '\r') {
        return false;
    }
    c.is_control()
        || matches!(
            c,
            '\u{200B}'..='\u{200F}' | '\u{202A}'..='\u{202E}' | '\u{2066}'..='\u{2069}' | '\u{FEFF}'
        )
}

/// Normalize accepted input before it reaches any collaborator.
///
/// Angle brackets are dropped (no markup survives) and runs of whitespace
/// collapse to a single space. Apostrophes and quotes are kept: they are
/// ordinary in questions and the injection screen has already run.
pub fn sanitize(text: &str) -> String {
    let stripped: String = text.chars().filter(|c| !matches!(c, '<' | '>')).collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}
