//! Deferred ("second") expansion of prerequisite templates.
//!
//! Prerequisite lists written with escaped references are re-expanded
//! once the owning target's automatic variables can be bound: after
//! pattern matching, when the stem is known. The pass runs at most once
//! per record, lazily, and splices the expansion results into the edge
//! list in place of the templates they came from.
//!
//! Re-entrancy contract: expanding one record's templates may resolve
//! or create other records through the expander's callbacks. The edge
//! list under mutation is therefore moved out of its record before any
//! callback runs and only written back once the splice is complete, so
//! nested database activity can never observe or corrupt a half-spliced
//! list.

use crate::db::FileDb;
use crate::dep::{Dep, SearchPath, split_prereqs};
use crate::file::FileId;
use crate::pattern::{substitute_stem, words};

/// Macro expansion as provided by the surrounding variable subsystem.
///
/// `bind_file` is invoked once per record before its first template is
/// expanded, giving the expander a chance to set up the record's
/// automatic-variable context. `expand` performs one full expansion of
/// `text` with `$*` bound to `stem`. Both callbacks receive the
/// database mutably: expansion is allowed to look up, create, and even
/// second-expand other records re-entrantly.
pub trait MacroExpander {
    /// Bind the automatic-variable context of `file`.
    fn bind_file(&mut self, db: &mut FileDb, file: FileId);

    /// Expand `text` for `file` (or globally when `file` is `None`)
    /// with the given stem binding.
    fn expand(
        &mut self,
        db: &mut FileDb,
        file: Option<FileId>,
        stem: Option<&str>,
        text: &str,
    ) -> String;
}

/// A [`MacroExpander`] that returns every template verbatim, for
/// drivers that run without a variable subsystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoExpansion;

impl MacroExpander for NoExpansion {
    fn bind_file(&mut self, _db: &mut FileDb, _file: FileId) {}

    fn expand(
        &mut self,
        _db: &mut FileDb,
        _file: Option<FileId>,
        _stem: Option<&str>,
        text: &str,
    ) -> String {
        text.to_owned()
    }
}

/// Run second expansion over the edge list of `file`, once.
///
/// Edges not flagged for second expansion pass through untouched. Each
/// template edge is replaced by the zero or more edges its expansion
/// parses into; a template expanding to nothing disappears without a
/// replacement and without complaint. When the list changed, any
/// alternate traversal order kept for it is invalidated.
pub fn expand_deps(
    db: &mut FileDb,
    file: FileId,
    expander: &mut dyn MacroExpander,
    search: &dyn SearchPath,
) {
    let file = db.resolve(file);
    if db.node(file).snapped {
        return;
    }
    db.node_mut(file).snapped = true;

    let old = std::mem::take(&mut db.node_mut(file).deps);
    let mut new_list = Vec::with_capacity(old.len());
    let mut bound = false;
    let mut changed = false;

    for dep in old {
        if dep.name.is_none() || !dep.need_second_expansion {
            // Already resolved.
            new_list.push(dep);
            continue;
        }
        changed = true;

        if !bound {
            expander.bind_file(db, file);
            bound = true;
        }

        if dep.static_pattern {
            expand_pattern_dep(db, file, expander, search, &dep, &mut new_list);
        } else if let Some(template) = dep.name.clone() {
            expand_one(db, file, expander, search, &dep, &template, false, None, &mut new_list);
        }
    }

    let node = db.node_mut(file);
    node.deps = new_list;
    if changed {
        // The alternate-order index may hold stale positions now.
        node.shuffled_order = None;
    }
}

/// Expand a static-pattern template: the unexpanded text is split into
/// words first, because the directory-prefix decision is per word. A
/// word without a marker must not inherit the stem's directory, or
/// `lib/hello.o: %.o: pre-%.c global.h` would wrongly demand
/// `lib/global.h`.
fn expand_pattern_dep(
    db: &mut FileDb,
    file: FileId,
    expander: &mut dyn MacroExpander,
    search: &dyn SearchPath,
    dep: &Dep,
    out: &mut Vec<Dep>,
) {
    let Some(template) = dep.name.clone() else {
        return;
    };
    if !template.contains('%') {
        expand_one(db, file, expander, search, dep, &template, false, None, out);
        return;
    }

    let dirname = dep.stem.as_ref().map(|cap| cap.dir().to_owned()).unwrap_or_default();
    let mut order_only = false;
    for word in words(&template) {
        if !order_only && word == "|" {
            order_only = true;
            continue;
        }
        let (substituted, saw_marker) = substitute_stem(word, &dirname);
        let dir = if saw_marker { Some(dirname.as_str()) } else { None };
        expand_one(db, file, expander, search, dep, &substituted, order_only, dir, out);
    }
}

/// Expand one template word, parse the result, and append the new
/// edges. A result parsing to nothing drops the placeholder silently.
#[expect(clippy::too_many_arguments, reason = "mirrors the per-word expansion context")]
fn expand_one(
    db: &mut FileDb,
    file: FileId,
    expander: &mut dyn MacroExpander,
    search: &dyn SearchPath,
    dep: &Dep,
    template: &str,
    order_only: bool,
    dirname: Option<&str>,
    out: &mut Vec<Dep>,
) {
    // The edge's own capture takes priority over the owner's stem.
    let stem = dep
        .stem
        .as_ref()
        .map(|cap| cap.text.clone())
        .or_else(|| db.node(file).stem.clone());

    let expanded = expander.expand(db, Some(file), stem.as_deref(), template);
    let mut new = split_prereqs(&expanded, dirname, search);
    if new.is_empty() {
        return;
    }

    for nd in &mut new {
        if let Some(nd_name) = nd.name.take() {
            let id = db.intern(&nd_name);
            nd.file = Some(id);
            nd.stem = dep.stem.clone();
            if dep.stem.is_none() {
                // Explicitly mentioned as a prerequisite.
                db.node_mut(id).is_explicit = true;
            }
            if order_only {
                nd.ignore_mtime = true;
            }
        }
    }
    out.extend(new);
}
