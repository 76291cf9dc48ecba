//! Escaping for exported text.
//!
//! Rule names, comments and object names are free text entered by users.
//! Each target format gets a replacement table; characters without an
//! entry pass through unchanged.

/// Apply `replace` to every character, copying the rest.
fn escape_with(s: &str, replace: impl Fn(char) -> Option<&'static str>) -> String {
    let mut out = String::with_capacity(s.len() + s.len() / 8);
    for c in s.chars() {
        match replace(c) {
            Some(replacement) => out.push_str(replacement),
            None => out.push(c),
        }
    }
    out
}

/// Escape a string for a double-quoted CSV field.
///
/// Doubles embedded quotes and flattens line breaks so every entry stays on
/// one row.
///
/// ```
/// use matrix_history::reports::escape::escape_csv;
///
/// assert_eq!(escape_csv(r#"say "hi""#), r#"say ""hi"""#);
/// assert_eq!(escape_csv("a\r\nb"), "a b");
/// ```
#[must_use]
pub fn escape_csv(s: &str) -> String {
    escape_with(s, |c| match c {
        '"' => Some("\"\""),
        '\n' => Some(" "),
        '\r' => Some(""),
        _ => None,
    })
}

/// Escape text embedded in HTML, e.g. search snippets around `<mark>` tags.
///
/// ```
/// use matrix_history::reports::escape::escape_html;
///
/// assert_eq!(escape_html("<b>'a' & \"b\"</b>"), "&lt;b&gt;&#x27;a&#x27; &amp; &quot;b&quot;&lt;/b&gt;");
/// ```
#[must_use]
pub fn escape_html(s: &str) -> String {
    escape_with(s, |c| match c {
        '&' => Some("&amp;"),
        '<' => Some("&lt;"),
        '>' => Some("&gt;"),
        '"' => Some("&quot;"),
        '\'' => Some("&#x27;"),
        _ => None,
    })
}

/// Markdown punctuation that would start inline code or links.
const fn markdown_inline(c: char) -> Option<&'static str> {
    match c {
        '`' => Some("\\`"),
        '[' => Some("\\["),
        ']' => Some("\\]"),
        _ => None,
    }
}

/// Escape a Markdown table cell: pipes are escaped, newlines flattened.
///
/// ```
/// use matrix_history::reports::escape::escape_markdown_table;
///
/// assert_eq!(escape_markdown_table("dns | ntp\nsmtp"), "dns \\| ntp smtp");
/// ```
#[must_use]
pub fn escape_markdown_table(s: &str) -> String {
    escape_with(s, |c| match c {
        '|' => Some("\\|"),
        '\n' => Some(" "),
        '\r' => Some(""),
        other => markdown_inline(other),
    })
}

/// Escape a Markdown list item. Line breaks become `; `.
#[must_use]
pub fn escape_markdown_list(s: &str) -> String {
    escape_with(s, |c| match c {
        '*' => Some("\\*"),
        '<' => Some("\\<"),
        '>' => Some("\\>"),
        '\n' => Some("; "),
        '\r' => Some(""),
        other => markdown_inline(other),
    })
}
