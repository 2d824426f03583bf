//! The file database: an identity-merging registry of file records.
//!
//! Records live in a stable-handle arena and are indexed by canonical
//! name. Independent double-colon rule bodies for one name form a chain
//! sharing the lookup key; renames either re-key a record or merge it
//! into the record already holding the new name, leaving a forwarding
//! stub behind so stale handles keep resolving. Records are never
//! destroyed.

use crate::dep::Dep;
use crate::error::FileDbError;
use crate::file::{CommandState, FileId, FileNode};
use crate::name::normalize;
use crate::pattern::find_percent;
use crate::snap::is_special_target;
use crate::vars::{self, VariableSet};
use indexmap::IndexMap;
use itertools::Itertools;
use std::borrow::Cow;

/// Run-wide policy flags and one-shot state.
///
/// Threaded through the database rather than held in globals so a
/// driver can run several databases side by side. The `snapped` flag is
/// the one-shot guard for the special-target pass; it never resets.
#[derive(Debug, Clone, Default)]
pub struct GlobalPolicy {
    /// `.SECONDARY` with no prerequisites: treat all files as secondary.
    pub all_secondary: bool,
    /// `.NOTINTERMEDIATE` with no prerequisites: no file is intermediate.
    pub no_intermediates: bool,
    /// `.NOTPARALLEL` with no prerequisites: serialise everything.
    pub not_parallel: bool,
    /// `.IGNORE` with no prerequisites: ignore all recipe errors.
    pub ignore_errors: bool,
    /// `.SILENT` with no prerequisites: echo no recipes.
    pub run_silent: bool,
    /// `.EXPORT_ALL_VARIABLES` was given as a real target.
    pub export_all_variables: bool,
    /// Deferred second expansion is enabled for this run.
    pub second_expansion: bool,
    /// Question mode (`-q`): report instead of building.
    pub question: bool,
    /// Touch mode (`-t`): update timestamps instead of building.
    pub touch: bool,
    /// Dry-run mode (`-n`): print recipes instead of running them.
    pub just_print: bool,
    pub(crate) snapped: bool,
}

impl GlobalPolicy {
    /// Whether the one-shot special-target pass has run.
    #[must_use]
    pub const fn snapped(&self) -> bool {
        self.snapped
    }
}

/// The target/prerequisite database.
#[derive(Debug, Default)]
pub struct FileDb {
    nodes: Vec<FileNode>,
    index: IndexMap<String, FileId>,
    /// Records merged away by [`FileDb::rehash`]; retained forever so
    /// stale handles resolve through their forwarding links instead of
    /// dangling.
    rehashed: Vec<FileId>,
    /// Run-wide policy and one-shot state.
    pub policy: GlobalPolicy,
    /// Global (non-target-specific) variables visible to this core,
    /// such as `.EXTRA_PREREQS`.
    pub global_vars: VariableSet,
    case_insensitive: bool,
}

impl FileDb {
    /// An empty database with case-sensitive target names.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty database that folds target-name case, as used on
    /// case-insensitive filesystems. Names with a leading `.` keep
    /// their case so special targets stay recognisable.
    #[must_use]
    pub fn new_case_insensitive() -> Self {
        Self {
            case_insensitive: true,
            ..Self::default()
        }
    }

    fn key_of(&self, name: &str) -> String {
        let normalized = normalize(name);
        if self.case_insensitive && !normalized.starts_with('.') {
            normalized.to_lowercase()
        } else {
            normalized.into_owned()
        }
    }

    /// Borrow a record.
    ///
    /// # Panics
    ///
    /// Panics if `id` did not come from this database.
    #[must_use]
    pub fn node(&self, id: FileId) -> &FileNode {
        &self.nodes[id.0]
    }

    /// Mutably borrow a record.
    ///
    /// # Panics
    ///
    /// Panics if `id` did not come from this database.
    #[must_use]
    pub fn node_mut(&mut self, id: FileId) -> &mut FileNode {
        &mut self.nodes[id.0]
    }

    /// Follow forwarding links to the live record for `id`.
    ///
    /// Handles held across a merge keep working through this; the stubs
    /// behind them are never reclaimed.
    #[must_use]
    pub fn resolve(&self, mut id: FileId) -> FileId {
        while let Some(next) = self.nodes[id.0].renamed {
            id = next;
        }
        id
    }

    /// Number of records, including chain members and forwarding stubs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the database holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Handles of the indexed chain heads, in registration order.
    #[must_use]
    pub fn head_ids(&self) -> Vec<FileId> {
        self.index.values().copied().collect()
    }

    /// All members of the double-colon chain containing `id`, head
    /// first. A single-colon record yields just itself.
    #[must_use]
    pub fn chain_ids(&self, id: FileId) -> Vec<FileId> {
        let head = self.nodes[id.0].double_colon.unwrap_or(id);
        self.chain_from(head)
    }

    /// Chain members starting at `id` and walking toward newer members.
    #[must_use]
    pub fn chain_from(&self, id: FileId) -> Vec<FileId> {
        let mut ids = Vec::new();
        let mut cur = Some(id);
        while let Some(c) = cur {
            ids.push(c);
            cur = self.nodes[c.0].prev;
        }
        ids
    }

    /// The display name an edge refers to, resolved or not.
    #[must_use]
    pub fn dep_name<'a>(&'a self, dep: &'a Dep) -> &'a str {
        match (&dep.name, dep.file) {
            (Some(name), _) => name,
            (None, Some(id)) => &self.nodes[id.0].name,
            (None, None) => "",
        }
    }

    /// Look up the record for `name`, normalising it first.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<FileId> {
        debug_assert!(!name.is_empty());
        self.index.get(&self.key_of(name)).copied()
    }

    fn alloc(&mut self, name: String, hname: String) -> FileId {
        let id = FileId(self.nodes.len());
        self.nodes.push(FileNode::new(name, hname, id));
        id
    }

    /// Return the record for `name`, creating one if needed.
    ///
    /// An existing single-colon record is returned as-is, with its
    /// `builtin` flag cleared: re-entry demotes builtin status. When the
    /// name is known only through a double-colon chain, a fresh chain
    /// member is allocated and linked instead of merging, and every
    /// member's `last` pointer is moved to it.
    pub fn intern(&mut self, name: &str) -> FileId {
        debug_assert!(!name.is_empty());
        let display = normalize(name).into_owned();
        let key = self.key_of(&display);

        if let Some(&head) = self.index.get(&key) {
            if !self.nodes[head.0].is_double_colon() {
                self.nodes[head.0].builtin = false;
                return head;
            }
            // Another independent rule body for a double-colon name.
            let id = self.alloc(display, key);
            let tail = self.nodes[head.0].last;
            self.nodes[id.0].double_colon = Some(head);
            self.nodes[tail.0].prev = Some(id);
            let mut cur = Some(head);
            while let Some(c) = cur {
                self.nodes[c.0].last = id;
                cur = self.nodes[c.0].prev;
            }
            return id;
        }

        let id = self.alloc(display, key.clone());
        self.index.insert(key, id);
        id
    }

    /// Mark a record as the head of a (new) double-colon chain.
    ///
    /// Rule recording calls this when it sees the first `::` rule for a
    /// name; subsequent [`FileDb::intern`] calls then allocate further
    /// chain members.
    pub fn set_double_colon(&mut self, id: FileId) {
        let id = self.resolve(id);
        if self.nodes[id.0].double_colon.is_none() {
            self.nodes[id.0].double_colon = Some(id);
        }
    }

    /// Re-key `from` (and its whole chain) under `to_name`, merging
    /// into an existing record of that name if there is one.
    ///
    /// Display names are untouched; [`FileDb::rename`] also rewrites
    /// them. See the merge rules on that method.
    ///
    /// # Errors
    ///
    /// Returns a colon-consistency error when the merge would flip an
    /// existing target between single- and double-colon, and
    /// [`FileDbError::Corrupt`] when the index disagrees with the
    /// record being moved. Both are checked before anything is
    /// mutated, so on the error path the database is untouched.
    pub fn rehash(&mut self, from: FileId, to_name: &str) -> Result<(), FileDbError> {
        let from = self.resolve(from);

        let to_key = self.key_of(to_name);
        if self.nodes[from.0].hname == to_key {
            self.nodes[from.0].builtin = false;
            return Ok(());
        }

        let merge_into = self.index.get(&to_key).copied();
        if let Some(to) = merge_into {
            let (from_n, to_n) = (&self.nodes[from.0], &self.nodes[to.0]);
            if to_n.is_double_colon() && from_n.is_target && !from_n.is_double_colon() {
                return Err(FileDbError::SingleToDoubleColon {
                    from: from_n.name.clone(),
                    to: to_name.to_owned(),
                });
            }
            if !to_n.is_double_colon() && from_n.is_double_colon() && to_n.is_target {
                return Err(FileDbError::DoubleToSingleColon {
                    from: from_n.name.clone(),
                    to: to_name.to_owned(),
                });
            }
        }

        let old_key = self.nodes[from.0].hname.clone();
        match self.index.shift_remove(&old_key) {
            Some(id) if id == from => {}
            other => {
                // Undo the removal before reporting, keeping the index
                // usable for the caller.
                if let Some(id) = other {
                    self.index.insert(old_key.clone(), id);
                }
                return Err(FileDbError::Corrupt {
                    detail: format!("index entry for '{old_key}' did not name the record being re-keyed"),
                });
            }
        }
        self.nodes[from.0].builtin = false;

        for id in self.chain_ids(from) {
            self.nodes[id.0].hname = to_key.clone();
        }

        if let Some(to) = merge_into {
            self.merge(from, to, to_name);
        } else {
            self.index.insert(to_key, from);
        }
        Ok(())
    }

    /// Rename `from` to `to_name`: re-key via [`FileDb::rehash`], then
    /// adopt the new key as the display name across the chain.
    ///
    /// # Errors
    ///
    /// Propagates the errors of [`FileDb::rehash`].
    pub fn rename(&mut self, from: FileId, to_name: &str) -> Result<(), FileDbError> {
        self.rehash(from, to_name)?;
        let mut cur = Some(self.resolve(from));
        while let Some(c) = cur {
            self.nodes[c.0].name = self.nodes[c.0].hname.clone();
            cur = self.nodes[c.0].prev;
        }
        Ok(())
    }

    fn pair_mut(&mut self, a: FileId, b: FileId) -> (&mut FileNode, &mut FileNode) {
        debug_assert_ne!(a, b);
        if a.0 < b.0 {
            let (lo, hi) = self.nodes.split_at_mut(b.0);
            (&mut lo[a.0], &mut hi[0])
        } else {
            let (lo, hi) = self.nodes.split_at_mut(a.0);
            let (from, to) = (&mut hi[0], &mut lo[b.0]);
            (from, to)
        }
    }

    /// Merge `from` into `to`, which already owns the destination key.
    /// Colon consistency has been checked by [`FileDb::rehash`].
    fn merge(&mut self, from: FileId, to: FileId, to_name: &str) {
        let (from_n, to_n) = self.pair_mut(from, to);

        if let Some(from_cmds) = from_n.cmds.clone() {
            match &to_n.cmds {
                None => to_n.cmds = Some(from_cmds),
                Some(to_cmds) if std::rc::Rc::ptr_eq(to_cmds, &from_cmds) => {}
                Some(_) => {
                    // Two distinct recipes: keep the destination's and
                    // tell the user which one loses.
                    match &from_cmds.file_name {
                        Some(file) => tracing::warn!(
                            "recipe was specified for file '{}' at {}:{},",
                            from_n.name,
                            file,
                            from_cmds.line,
                        ),
                        None => tracing::warn!(
                            "recipe for file '{}' was found by implicit rule search,",
                            from_n.name,
                        ),
                    }
                    tracing::warn!(
                        "but '{}' is now considered the same file as '{}'",
                        from_n.name,
                        to_name,
                    );
                    tracing::warn!(
                        "recipe for '{}' will be ignored in favor of the one for '{}'",
                        from_n.name,
                        to_name,
                    );
                }
            }
        }

        let moved = std::mem::take(&mut from_n.deps);
        to_n.deps.extend(moved);

        vars::merge_optional(&mut to_n.variables, from_n.variables.take());

        if !to_n.is_double_colon() && from_n.is_double_colon() {
            to_n.double_colon = from_n.double_colon;
        }

        // Larger raw timestamp wins, so a forced timestamp dominates
        // one discovered through directory search.
        if from_n.last_mtime > to_n.last_mtime {
            to_n.last_mtime = from_n.last_mtime;
        }
        to_n.mtime_before_update = from_n.mtime_before_update;

        to_n.precious |= from_n.precious;
        to_n.loaded |= from_n.loaded;
        to_n.tried_implicit |= from_n.tried_implicit;
        to_n.updating |= from_n.updating;
        to_n.updated |= from_n.updated;
        to_n.is_target |= from_n.is_target;
        to_n.cmd_target |= from_n.cmd_target;
        to_n.phony |= from_n.phony;
        // intermediate is deliberately not merged: a pre-existing file
        // must not become intermediate by absorbing a search-path
        // discovered duplicate.
        to_n.is_explicit |= from_n.is_explicit;
        to_n.secondary |= from_n.secondary;
        to_n.notintermediate |= from_n.notintermediate;
        to_n.ignore_vpath |= from_n.ignore_vpath;
        to_n.snapped |= from_n.snapped;
        to_n.suffix |= from_n.suffix;

        to_n.builtin = false;
        from_n.renamed = Some(to);

        self.rehashed.push(from);
    }

    /// Resolve parsed edges against the database for `owner`.
    ///
    /// When the edges carry pattern-match stems, each name containing a
    /// `%` first has the marker replaced by the captured stem text (the
    /// directory part of the stem is prepended for the substitution); a
    /// substitution yielding an empty name drops the edge silently.
    /// Remaining edges are resolved via [`FileDb::intern`], except those
    /// awaiting second expansion. Resolved prerequisites are marked
    /// explicit only when the owner has no stem, so literally-written
    /// prerequisites stay distinguishable from pattern-introduced ones.
    ///
    /// # Errors
    ///
    /// Returns [`FileDbError::DefineAfterSnap`] when the owner is a
    /// reserved special target and the special-target pass has already
    /// run.
    pub fn enter_prereqs(
        &mut self,
        deps: Vec<Dep>,
        owner: Option<FileId>,
    ) -> Result<Vec<Dep>, FileDbError> {
        let owner = owner.map(|o| self.resolve(o));
        if let Some(o) = owner {
            let owner_name = &self.nodes[o.0].name;
            if self.policy.snapped && is_special_target(owner_name) {
                return Err(FileDbError::DefineAfterSnap {
                    name: owner_name.clone(),
                });
            }
        }

        let mut deps = if deps.first().is_some_and(|d| d.stem.is_some()) {
            let mut kept = Vec::with_capacity(deps.len());
            for mut dep in deps {
                if let (Some(cap), Some(dep_name)) = (&dep.stem, dep.name.as_deref()) {
                    match stem_substitute(cap.dir(), cap.base(), dep_name) {
                        Some(new_name) if new_name.is_empty() => continue,
                        Some(new_name) => dep.name = Some(new_name),
                        None => {}
                    }
                }
                dep.static_pattern = true;
                kept.push(dep);
            }
            kept
        } else {
            deps
        };

        let owner_has_stem = owner.is_some_and(|o| self.nodes[o.0].stem.is_some());
        for dep in &mut deps {
            if dep.need_second_expansion {
                continue;
            }
            let Some(dep_name) = dep.name.take() else {
                continue;
            };
            let id = self.intern(&dep_name);
            dep.file = Some(id);
            dep.static_pattern = false;
            if !owner_has_stem {
                // Literally mentioned as a prerequisite.
                self.nodes[id.0].is_explicit = true;
            }
        }
        Ok(deps)
    }

    /// Set the recipe state of `file`, raising (never lowering) the
    /// state of every `also_make` sibling along with it.
    pub fn set_command_state(&mut self, file: FileId, state: CommandState) {
        let file = self.resolve(file);
        self.nodes[file.0].command_state = state;
        let siblings = self.nodes[file.0].also_make.clone();
        for sibling in siblings {
            let sibling = self.resolve(sibling);
            if state > self.nodes[sibling.0].command_state {
                self.nodes[sibling.0].command_state = state;
            }
        }
    }

    /// Space-joined names of all records that appear as targets.
    #[must_use]
    pub fn target_list(&self) -> String {
        self.nodes
            .iter()
            .filter(|n| n.is_target && n.renamed.is_none())
            .map(|n| n.name.as_str())
            .join(" ")
    }

    /// Check the structural invariants of every record.
    ///
    /// # Errors
    ///
    /// Returns [`FileDbError::Corrupt`] naming the first record whose
    /// names are empty or non-canonical, whose chain key disagrees with
    /// its head, whose edges point outside the arena, or whose stem
    /// captures carry an out-of-bounds basename offset.
    pub fn verify(&self) -> Result<(), FileDbError> {
        for node in &self.nodes {
            if node.name.is_empty() || node.hname.is_empty() {
                return Err(FileDbError::Corrupt {
                    detail: "record with an empty name".to_owned(),
                });
            }
            if normalize(&node.hname) != node.hname {
                return Err(FileDbError::Corrupt {
                    detail: format!("'{}': key is not canonical", node.hname),
                });
            }
            if let Some(head) = node.double_colon
                && self.nodes[head.0].hname != node.hname
            {
                return Err(FileDbError::Corrupt {
                    detail: format!("'{}': chain members disagree on the key", node.name),
                });
            }
            for dep in &node.deps {
                if let Some(id) = dep.file
                    && id.0 >= self.nodes.len()
                {
                    return Err(FileDbError::Corrupt {
                        detail: format!("'{}': edge points outside the arena", node.name),
                    });
                }
                if dep.need_second_expansion && dep.name.is_none() {
                    return Err(FileDbError::Corrupt {
                        detail: format!("'{}': unexpanded edge lost its template", node.name),
                    });
                }
                if let Some(cap) = &dep.stem
                    && (cap.basename > cap.text.len() || !cap.text.is_char_boundary(cap.basename))
                {
                    return Err(FileDbError::Corrupt {
                        detail: format!("'{}': stem basename offset out of bounds", node.name),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Substitute a captured stem into a prerequisite-template name.
///
/// The stem's directory part is prepended before searching for the
/// marker; without a marker the original name stays untouched (the
/// directory prefix is discarded with it). An empty stem basename
/// removes the marker outright, since substituting nothing through the
/// usual pattern path would always produce an empty result.
fn stem_substitute(dir: &str, base: &str, dep_name: &str) -> Option<String> {
    let full: Cow<'_, str> = if dir.is_empty() {
        Cow::Borrowed(dep_name)
    } else {
        Cow::Owned(format!("{dir}{dep_name}"))
    };
    let pos = find_percent(&full)?;
    let mut out = String::with_capacity(full.len() + base.len());
    out.push_str(full.get(..pos).unwrap_or(""));
    out.push_str(base);
    out.push_str(full.get(pos + 1..).unwrap_or(""));
    Some(out)
}
