//! Percent-pattern helpers for rule templates.
//!
//! Pattern rules use `%` as the wildcard marker. This module finds the
//! first unescaped marker in a name, splits an unexpanded prerequisite
//! template into words without breaking inside `$(...)` calls, and
//! rewrites markers into stem references for the second-expansion pass.

/// Byte offset of the first unescaped `%` in `s`, if any.
///
/// A marker is escaped when preceded by an odd number of backslashes;
/// the backslashes themselves are left in place. Only the first marker
/// per word is ever substituted, so later markers are the caller's
/// concern.
#[must_use]
pub fn find_percent(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        if b != b'%' {
            continue;
        }
        let backslashes = bytes[..i].iter().rev().take_while(|&&c| c == b'\\').count();
        if backslashes % 2 == 0 {
            return Some(i);
        }
    }
    None
}

/// Iterate over the whitespace-separated words of an unexpanded
/// template.
///
/// Unlike a plain whitespace split this keeps `$(...)` and `${...}`
/// calls intact, so `$(strip pre-%.c)` comes back as one word. A
/// backslash carries the following character into the current word.
pub fn words(template: &str) -> impl Iterator<Item = &str> {
    let mut rest = template;
    std::iter::from_fn(move || {
        let trimmed = rest.trim_start();
        if trimmed.is_empty() {
            rest = "";
            return None;
        }
        let end = word_end(trimmed);
        let (word, tail) = trimmed.split_at(end);
        rest = tail;
        Some(word)
    })
}

fn word_end(s: &str) -> usize {
    let bytes = s.as_bytes();
    let mut depth = 0usize;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' if i + 1 < bytes.len() => i += 1,
            b'$' if i + 1 < bytes.len() && (bytes[i + 1] == b'(' || bytes[i + 1] == b'{') => {
                depth += 1;
                i += 1;
            }
            b')' | b'}' => depth = depth.saturating_sub(1),
            b' ' | b'\t' | b'\n' | b'\r' if depth == 0 => return i,
            _ => {}
        }
        i += 1;
    }
    bytes.len()
}

/// Rewrite the first unescaped `%` of each whitespace chunk in `word`
/// into a stem reference, returning the rewritten text and whether any
/// marker was found.
///
/// With a non-empty `dirname` the marker becomes `$(*F)` (the stem's
/// basename; the directory part is re-applied after expansion),
/// otherwise `$*`. When the marker directly follows a `$` the
/// replacement is parenthesised so the expander reads it as a single
/// reference. A word can contain embedded whitespace inside `$(...)`,
/// which is why substitution restarts per chunk.
#[must_use]
pub fn substitute_stem(word: &str, dirname: &str) -> (String, bool) {
    let mut out = String::with_capacity(word.len() + 8);
    let mut saw_percent = false;
    let mut done_in_chunk = false;
    let mut backslashes = 0usize;
    let mut prev_dollar = false;

    for c in word.chars() {
        if c.is_whitespace() {
            done_in_chunk = false;
        }
        if c == '%' && !done_in_chunk && backslashes % 2 == 0 {
            saw_percent = true;
            done_in_chunk = true;
            out.push_str(match (prev_dollar, dirname.is_empty()) {
                (true, false) => "($(*F))",
                (true, true) => "($*)",
                (false, false) => "$(*F)",
                (false, true) => "$*",
            });
        } else {
            out.push(c);
        }
        backslashes = if c == '\\' { backslashes + 1 } else { 0 };
        prev_dollar = c == '$';
    }
    (out, saw_percent)
}

#[cfg(test)]
mod tests {
    use super::{find_percent, substitute_stem, words};

    #[test]
    fn escaped_percent_is_skipped() {
        assert_eq!(find_percent(r"a\%b%c"), Some(4));
        assert_eq!(find_percent(r"a\\%b"), Some(3));
        assert_eq!(find_percent(r"a\%b"), None);
    }

    #[test]
    fn words_keep_function_calls_whole() {
        let got: Vec<&str> = words("$(strip pre-%.c) global.h | extra").collect();
        assert_eq!(got, ["$(strip pre-%.c)", "global.h", "|", "extra"]);
    }

    #[test]
    fn substitution_picks_stem_form_from_dirname() {
        assert_eq!(substitute_stem("pre-%.c", ""), ("pre-$*.c".to_owned(), true));
        assert_eq!(
            substitute_stem("pre-%.c", "lib/"),
            ("pre-$(*F).c".to_owned(), true)
        );
    }

    #[test]
    fn substitution_parenthesises_after_dollar() {
        assert_eq!(substitute_stem("a$%b", ""), ("a$($*)b".to_owned(), true));
        assert_eq!(
            substitute_stem("a$%b", "d/"),
            ("a$($(*F))b".to_owned(), true)
        );
    }

    #[test]
    fn only_first_marker_per_chunk_is_rewritten() {
        assert_eq!(
            substitute_stem("%-%.c", ""),
            ("$*-%.c".to_owned(), true)
        );
        // Embedded whitespace restarts the substitution.
        assert_eq!(
            substitute_stem("$(strip %.c %.h)", ""),
            ("$(strip $*.c $*.h)".to_owned(), true)
        );
    }

    #[test]
    fn marker_free_words_pass_through() {
        assert_eq!(substitute_stem("global.h", "lib/"), ("global.h".to_owned(), false));
    }
}
