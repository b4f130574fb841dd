// src/talent/html.rs
use scraper::Html;

/// Plain text from an HTML fragment: `<br>` becomes a newline, tags are
/// dropped, entities decoded and runs of blank lines collapsed.
pub fn html_to_text(raw: &str) -> String {
    let with_breaks = replace_line_breaks(raw);
    let fragment = Html::parse_fragment(&with_breaks);
    let text: String = fragment.root_element().text().collect();
    collapse_blank_lines(&text)
}

/// Collapse whitespace the way search snippets need it: trimmed lines, no
/// empties, single spaces.
pub fn clean_text(text: &str) -> String {
    text.lines()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn replace_line_breaks(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some(pos) = rest.find('<') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        match line_break_len(tail) {
            Some(len) => {
                out.push('\n');
                rest = &tail[len..];
            }
            None => {
                out.push('<');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Length of a `<br>`, `<br/>` or `<br />` tag at the start of `s`.
fn line_break_len(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    if bytes.len() < 4 || !bytes[1..3].eq_ignore_ascii_case(b"br") {
        return None;
    }
    let mut i = 3;
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    if i < bytes.len() && bytes[i] == b'/' {
        i += 1;
    }
    (i < bytes.len() && bytes[i] == b'>').then_some(i + 1)
}

fn collapse_blank_lines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut newlines = 0;

    for c in text.chars() {
        if c == '\n' {
            newlines += 1;
            if newlines <= 2 {
                out.push(c);
            }
        } else {
            newlines = 0;
            out.push(c);
        }
    }
    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_to_text() {
        let raw = "<p>3+ years of <b>Rust</b></p><br>Experience with AWS &amp; SQL<BR />Done";
        assert_eq!(
            html_to_text(raw),
            "3+ years of Rust\nExperience with AWS & SQL\nDone"
        );
    }

    #[test]
    fn test_blank_lines_collapse() {
        assert_eq!(html_to_text("a<br><br><br><br>b"), "a\n\nb");
    }

    #[test]
    fn test_other_tags_starting_with_b_are_not_breaks() {
        assert_eq!(html_to_text("<b>bold</b><br/>x"), "bold\nx");
    }

    #[test]
    fn test_clean_text() {
        assert_eq!(clean_text("  Senior   SDE \n\n  Seattle  "), "Senior SDE Seattle");
    }
}
