//! Target name normalisation.
//!
//! Every name entering the database is canonicalised first so that
//! `./foo`, `.//foo` and `foo` all land on the same record. The rules
//! mirror what the prerequisite parser does to names read from build
//! files, and are applied again here for names arriving from other
//! sources (the command line, search-path rewrites).

use std::borrow::Cow;

/// Canonicalise a target name.
///
/// Strips repeated leading `./` segments together with any run of
/// slashes that follows them (`.//foo` is `foo`, not `/foo`), and
/// collapses every interior `/./` occurrence plus its trailing slash
/// run. A name consisting only of dots and slashes becomes `"./"`.
///
/// The function is idempotent and never case-folds; case handling for
/// case-insensitive targets happens at the database entry points.
///
/// # Examples
///
/// ```
/// use filedb::name::normalize;
///
/// assert_eq!(normalize("./foo"), "foo");
/// assert_eq!(normalize("foo/.///.///bar/"), "foo/bar/");
/// assert_eq!(normalize(".//"), "./");
/// ```
#[must_use]
pub fn normalize(name: &str) -> Cow<'_, str> {
    debug_assert!(!name.is_empty(), "target names must be non-empty");

    let bytes = name.as_bytes();
    let mut start = 0;
    // "./x" loses the dot-slash, but a bare "./" is kept as-is.
    while bytes.len() - start > 2 && bytes[start] == b'.' && bytes[start + 1] == b'/' {
        start += 2;
        while start < bytes.len() && bytes[start] == b'/' {
            start += 1;
        }
    }

    if start == bytes.len() {
        // It was all slashes after a dot.
        return Cow::Borrowed("./");
    }

    let rest = &name[start..];
    if !rest.contains("/./") {
        return if start == 0 {
            Cow::Borrowed(name)
        } else {
            Cow::Borrowed(rest)
        };
    }

    let rb = rest.as_bytes();
    let mut out = String::with_capacity(rest.len());
    let mut i = 0;
    while i < rb.len() {
        out.push(char::from(rb[i]));
        if rb[i] == b'/' {
            i += 1;
            // Swallow any chain of "./" segments and their slash runs.
            while i + 1 < rb.len() && rb[i] == b'.' && rb[i + 1] == b'/' {
                i += 2;
                while i < rb.len() && rb[i] == b'/' {
                    i += 1;
                }
            }
        } else {
            i += 1;
        }
    }
    Cow::Owned(out)
}
