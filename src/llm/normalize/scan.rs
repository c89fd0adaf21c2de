//! Escape-aware scanning for JSON string values that a model emitted with raw
//! control characters inside them.

/// Byte offset of the quote that terminates the string value starting at the
/// beginning of `s` (just past its opening quote).
///
/// A backslash escapes the character after it, so `\"` never terminates while
/// `\\"` does.
pub(crate) fn scan_string_end(s: &str) -> Option<usize> {
    let mut escaped = false;
    for (idx, ch) in s.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' => escaped = true,
            '"' => return Some(idx),
            _ => {}
        }
    }
    None
}

/// Make raw field content legal inside a JSON string.
///
/// Escaped quotes are left as they are so the value still parses to a quote;
/// every other backslash is doubled and control characters are escaped.
pub(crate) fn escape_raw_field(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 16);
    let mut chars = raw.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' if chars.peek() == Some(&'"') => {
                chars.next();
                out.push_str("\\\"");
            }
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                out.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out
}

/// Reverse [`escape_raw_field`] after parsing: turn the escape sequences the
/// model wrote literally back into the characters they stand for.
pub(crate) fn unescape_field(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        let replacement = match chars.peek() {
            Some('n') => '\n',
            Some('r') => '\r',
            Some('t') => '\t',
            Some('\\') => '\\',
            _ => {
                out.push('\\');
                continue;
            }
        };
        chars.next();
        out.push(replacement);
    }
    out
}
