//! Plain-text import format.
//!
//! Two consecutive non-blank lines make one pair: the first is the front,
//! the second the back. Blank and whitespace-only lines are dropped before
//! pairing, and a trailing unpaired line is discarded.

fn is_line_break(c: char) -> bool {
    matches!(
        c,
        '\n' | '\u{0B}' | '\u{0C}' | '\r' | '\u{85}' | '\u{2028}' | '\u{2029}'
    )
}

/// Split `text` into `(front, back)` tuples in their original order.
pub fn parse_text(text: &str) -> Vec<(String, String)> {
    let lines: Vec<&str> = text
        .split(is_line_break)
        .filter(|line| !line.trim().is_empty())
        .collect();

    lines
        .chunks_exact(2)
        .map(|chunk| (chunk[0].to_string(), chunk[1].to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(f, b)| (f.to_string(), b.to_string()))
            .collect()
    }

    #[test]
    fn test_blank_lines_removed_before_pairing() {
        assert_eq!(
            parse_text("a\nb\n\nc\nd\n"),
            pairs(&[("a", "b"), ("c", "d")])
        );
        assert_eq!(parse_text("a\n\n   \nb\n\t\nc\nd"), pairs(&[("a", "b"), ("c", "d")]));
    }

    #[test]
    fn test_trailing_odd_line_discarded() {
        assert_eq!(parse_text("a\nb\nc"), pairs(&[("a", "b")]));
        assert!(parse_text("only").is_empty());
    }

    #[test]
    fn test_empty_input() {
        assert!(parse_text("").is_empty());
        assert!(parse_text("\n\n  \n").is_empty());
    }

    #[test]
    fn test_crlf_line_endings() {
        assert_eq!(
            parse_text("Haus\r\nhouse\r\nTier\r\nanimal\r\n"),
            pairs(&[("Haus", "house"), ("Tier", "animal")])
        );
    }

    #[test]
    fn test_unicode_line_breaks() {
        assert_eq!(
            parse_text("Haus\rhouse\u{2028}Tier\u{85}animal\u{2029}Baum\u{0B}tree\u{0C}"),
            pairs(&[("Haus", "house"), ("Tier", "animal"), ("Baum", "tree")])
        );
    }

    #[test]
    fn test_surviving_lines_kept_verbatim() {
        assert_eq!(
            parse_text("  der Hund \n the dog\n"),
            pairs(&[("  der Hund ", " the dog")])
        );
    }
}
