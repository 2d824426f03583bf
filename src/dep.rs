//! Dependency edges and prerequisite splitting.
//!
//! A [`Dep`] is a non-owning reference from one record to another, plus
//! the edge-local flags that rule parsing and second expansion attach:
//! order-only, wait barriers, pending second expansion and the stem
//! captured from a pattern match. Before resolution an edge carries its
//! raw name; afterwards it carries a [`FileId`] instead.

use crate::file::FileId;

/// Hook for search-path (VPATH) rewriting of prerequisite names.
///
/// The real implementation lives with the directory-search subsystem;
/// the database only requires the rewrite to be deterministic per call.
pub trait SearchPath {
    /// Return the rewritten name, or `None` to keep `name` as-is.
    fn rewrite(&self, name: &str) -> Option<String>;
}

/// A [`SearchPath`] that never rewrites anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSearch;

impl SearchPath for NoSearch {
    fn rewrite(&self, _name: &str) -> Option<String> {
        None
    }
}

/// Stem text captured from a pattern match, with an optional
/// directory/basename split.
///
/// `basename` is a byte offset into `text`: `text[..basename]` is the
/// directory part and `text[basename..]` the basename part. An
/// unsplit stem has `basename == 0`, making the whole text the
/// basename. The offset must stay within the text; [`crate::FileDb::verify`]
/// checks this.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StemCapture {
    /// The matched stem text.
    pub text: String,
    /// Byte offset where the basename part begins.
    pub basename: usize,
}

impl StemCapture {
    /// A stem with no directory part.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            basename: 0,
        }
    }

    /// A directory-qualified stem split at `basename`.
    ///
    /// An out-of-bounds or non-boundary offset is clamped to the full
    /// text rather than accepted, keeping the capture well-formed.
    #[must_use]
    pub fn split(text: impl Into<String>, basename: usize) -> Self {
        let text = text.into();
        let basename = if text.is_char_boundary(basename.min(text.len())) {
            basename.min(text.len())
        } else {
            text.len()
        };
        Self { text, basename }
    }

    /// The directory part (may be empty).
    #[must_use]
    pub fn dir(&self) -> &str {
        self.text.get(..self.basename).unwrap_or("")
    }

    /// The basename part.
    #[must_use]
    pub fn base(&self) -> &str {
        self.text.get(self.basename..).unwrap_or("")
    }
}

/// One outgoing dependency edge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dep {
    /// Resolved prerequisite record; `None` until the edge is entered
    /// into the database.
    pub file: Option<FileId>,
    /// Raw prerequisite name; cleared when the edge is resolved, kept
    /// while the edge still needs second expansion.
    pub name: Option<String>,
    /// Order-only: the prerequisite satisfies the dependency by
    /// existing, its timestamp is ignored.
    pub ignore_mtime: bool,
    /// Parallelism barrier: earlier siblings must finish before this
    /// prerequisite starts.
    pub wait_here: bool,
    /// The name is a template awaiting deferred re-expansion.
    pub need_second_expansion: bool,
    /// The name is a static-pattern template still carrying `%`.
    pub static_pattern: bool,
    /// Hide this edge from the automatic variables.
    pub ignore_automatic_vars: bool,
    /// Stem captured for this edge by pattern matching.
    pub stem: Option<StemCapture>,
}

impl Dep {
    /// An unresolved edge for `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }
}

/// Split an already-expanded prerequisite blob into edges.
///
/// Names are whitespace-delimited. Everything before the first `|` is a
/// normal prerequisite, everything after is order-only; later `|`
/// characters are ordinary name characters and are not re-examined. A
/// standalone `.WAIT` word is not a prerequisite: it marks the next
/// edge as a wait barrier. With a `search_dir`, every name is prefixed
/// with it before the [`SearchPath`] rewrite runs.
#[must_use]
pub fn split_prereqs(text: &str, search_dir: Option<&str>, search: &dyn SearchPath) -> Vec<Dep> {
    let (normal, order_only) = match text.split_once('|') {
        Some((head, tail)) => (head, Some(tail)),
        None => (text, None),
    };

    let mut deps = Vec::new();
    collect_names(normal, false, search_dir, search, &mut deps);
    if let Some(tail) = order_only {
        collect_names(tail, true, search_dir, search, &mut deps);
    }
    deps
}

fn collect_names(
    text: &str,
    order_only: bool,
    search_dir: Option<&str>,
    search: &dyn SearchPath,
    out: &mut Vec<Dep>,
) {
    let mut wait_pending = false;
    for word in text.split_whitespace() {
        if word == ".WAIT" {
            wait_pending = true;
            continue;
        }
        let mut name = match search_dir {
            Some(dir) if !dir.is_empty() => format!("{dir}{word}"),
            _ => word.to_owned(),
        };
        if let Some(mapped) = search.rewrite(&name) {
            name = mapped;
        }
        let mut dep = Dep::new(name);
        dep.ignore_mtime = order_only;
        dep.wait_here = wait_pending;
        wait_pending = false;
        out.push(dep);
    }
}
