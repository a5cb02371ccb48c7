//! LaTeX escaping for poem text.
//!
//! Poem files are plain text, so any character with syntactic meaning in
//! LaTeX has to be neutralised before the text is dropped into the document
//! body. Escaping happens once, at load time; the rendered template only adds
//! line-break markers on top.
//!
//! ## Replacement Table
//!
//! | Char | Replacement |
//! |------|-------------|
//! | `\`  | `\textbackslash{}` |
//! | `{`  | `\{` |
//! | `}`  | `\}` |
//! | `#`  | `\#` |
//! | `$`  | `\$` |
//! | `%`  | `\%` |
//! | `&`  | `\&` |
//! | `_`  | `\_` |
//! | `~`  | `\textasciitilde{}` |
//! | `^`  | `\textasciicircum{}` |
//!
//! The input is walked exactly once and replacements are appended to the
//! output, never fed back through the scanner. That is what keeps
//! `\textbackslash{}` from turning into `\textbackslash\{\}`.

/// Characters that must be escaped in LaTeX body text.
pub const SPECIAL_CHARS: [char; 10] = ['\\', '{', '}', '#', '$', '%', '&', '_', '~', '^'];

/// Replacement for a single special character, `None` for ordinary text.
fn replacement(c: char) -> Option<&'static str> {
    match c {
        '\\' => Some(r"\textbackslash{}"),
        '{' => Some(r"\{"),
        '}' => Some(r"\}"),
        '#' => Some(r"\#"),
        '$' => Some(r"\$"),
        '%' => Some(r"\%"),
        '&' => Some(r"\&"),
        '_' => Some(r"\_"),
        '~' => Some(r"\textasciitilde{}"),
        '^' => Some(r"\textasciicircum{}"),
        _ => None,
    }
}

/// Escape every LaTeX special character in `s`.
///
/// ```
/// use anthology::escape::escape_latex;
/// assert_eq!(escape_latex("50% & $5 {ok}"), r"50\% \& \$5 \{ok\}");
/// ```
pub fn escape_latex(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + s.len() / 8);
    for c in s.chars() {
        match replacement(c) {
            Some(r) => out.push_str(r),
            None => out.push(c),
        }
    }
    out
}

/// Convert newlines into explicit LaTeX line breaks (`\\{}`).
///
/// Carriage returns are dropped and trailing newlines trimmed so the last
/// verse doesn't end in a dangling break. Each remaining `\n` becomes `\\{}`
/// followed by the newline, which keeps the `.tex` source readable. The
/// empty group stops `\\` from reading a following `[` or `*` as its own
/// argument.
pub fn line_breaks(text: &str) -> String {
    let normalized = text.replace('\r', "");
    normalized
        .trim_end_matches('\n')
        .replace('\n', LINE_BREAK)
}

const LINE_BREAK: &str = "\\\\{}\n";

#[cfg(test)]
mod tests {
    use super::*;

    /// True if `s` contains a special character that is not part of an
    /// escape sequence produced by [`escape_latex`].
    fn has_unescaped_special(s: &str) -> bool {
        let mut rest = s;
        while let Some(c) = rest.chars().next() {
            if c == '\\' {
                let consumed = SPECIAL_CHARS
                    .iter()
                    .filter_map(|&sc| replacement(sc))
                    .find(|r| rest.starts_with(r));
                match consumed {
                    Some(r) => {
                        rest = &rest[r.len()..];
                        continue;
                    }
                    None => return true,
                }
            }
            if SPECIAL_CHARS.contains(&c) {
                return true;
            }
            rest = &rest[c.len_utf8()..];
        }
        false
    }

    #[test]
    fn escapes_mixed_specials() {
        assert_eq!(escape_latex("50% & $5 {ok}"), r"50\% \& \$5 \{ok\}");
    }

    #[test]
    fn escapes_every_special_char() {
        assert_eq!(escape_latex(r"\"), r"\textbackslash{}");
        assert_eq!(escape_latex("{"), r"\{");
        assert_eq!(escape_latex("}"), r"\}");
        assert_eq!(escape_latex("#"), r"\#");
        assert_eq!(escape_latex("$"), r"\$");
        assert_eq!(escape_latex("%"), r"\%");
        assert_eq!(escape_latex("&"), r"\&");
        assert_eq!(escape_latex("_"), r"\_");
        assert_eq!(escape_latex("~"), r"\textasciitilde{}");
        assert_eq!(escape_latex("^"), r"\textasciicircum{}");
    }

    #[test]
    fn replacements_are_distinct() {
        let mut seen: Vec<&str> = SPECIAL_CHARS
            .iter()
            .map(|&c| replacement(c).unwrap())
            .collect();
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), SPECIAL_CHARS.len());
    }

    #[test]
    fn backslash_not_double_escaped() {
        // The braces emitted for `\` must not be escaped again
        assert_eq!(escape_latex(r"a\b"), r"a\textbackslash{}b");
    }

    #[test]
    fn plain_text_unchanged() {
        let text = "The woods are lovely, dark and deep.\nBut I have promises to keep.";
        assert_eq!(escape_latex(text), text);
    }

    #[test]
    fn unicode_passes_through() {
        assert_eq!(escape_latex("café — naïve 100%"), r"café — naïve 100\%");
    }

    #[test]
    fn empty_string() {
        assert_eq!(escape_latex(""), "");
    }

    #[test]
    fn escaped_output_has_no_unescaped_specials() {
        let inputs = [
            r"\{}#$%&_~^",
            "~~^^__",
            r"\\\\",
            "price: $5 {50%} #1 & more_stuff ~ ^",
            "nothing special",
        ];
        for input in inputs {
            let escaped = escape_latex(input);
            assert!(
                !has_unescaped_special(&escaped),
                "unescaped special left in {escaped:?} (from {input:?})"
            );
        }
    }

    #[test]
    fn detector_flags_raw_specials() {
        assert!(has_unescaped_special("50%"));
        assert!(has_unescaped_special(r"\foo"));
        assert!(!has_unescaped_special(r"50\%"));
    }

    #[test]
    fn escaping_is_stable_without_specials() {
        let text = "no specials here";
        assert_eq!(escape_latex(&escape_latex(text)), escape_latex(text));
    }

    #[test]
    fn line_breaks_marks_each_newline() {
        assert_eq!(line_breaks("one\ntwo\nthree"), "one\\\\{}\ntwo\\\\{}\nthree");
    }

    #[test]
    fn line_breaks_trims_trailing_newlines() {
        assert_eq!(line_breaks("one\ntwo\n\n"), "one\\\\{}\ntwo");
    }

    #[test]
    fn line_breaks_strips_carriage_returns() {
        assert_eq!(line_breaks("one\r\ntwo\r\n"), "one\\\\{}\ntwo");
    }

    #[test]
    fn line_breaks_keeps_stanza_gaps() {
        assert_eq!(line_breaks("a\n\nb"), "a\\\\{}\n\\\\{}\nb");
    }

    #[test]
    fn line_breaks_guard_bracket_and_star_lines() {
        let out = line_breaks("first\n[aside]\n*star");
        assert_eq!(out, "first\\\\{}\n[aside]\\\\{}\n*star");
    }

    #[test]
    fn line_breaks_single_line() {
        assert_eq!(line_breaks("alone"), "alone");
    }
}
