//! Special-target resolution: the one-shot global finalisation pass.
//!
//! After all rule text has been read, reserved target names such as
//! `.PHONY` and `.SECONDARY` are folded into per-record flags and
//! run-wide policy. The pass runs exactly once; the ordering of its
//! steps matters because later steps read flags set by earlier ones,
//! and two pairs of steps enforce mutual-exclusion invariants.

use crate::db::FileDb;
use crate::dep::{Dep, SearchPath, split_prereqs};
use crate::error::FileDbError;
use crate::expand::MacroExpander;
use crate::file::FileId;
use crate::timestamp::FileTime;

/// Reserved special-target names interpreted by [`snap_deps`].
const SPECIAL_TARGETS: &[&str] = &[
    ".PRECIOUS",
    ".LOW_RESOLUTION_TIME",
    ".PHONY",
    ".NOTINTERMEDIATE",
    ".INTERMEDIATE",
    ".SECONDARY",
    ".EXPORT_ALL_VARIABLES",
    ".IGNORE",
    ".SILENT",
    ".NOTPARALLEL",
];

/// Whether `name` is one of the reserved special targets.
#[must_use]
pub fn is_special_target(name: &str) -> bool {
    SPECIAL_TARGETS.contains(&name)
}

/// Chain members of the special target `name`, oldest first.
fn special_members(db: &FileDb, name: &str) -> Vec<FileId> {
    db.lookup(name).map(|head| db.chain_from(head)).unwrap_or_default()
}

/// Every record (chain-expanded) named as a prerequisite of `member`.
fn member_dep_targets(db: &FileDb, member: FileId) -> Vec<FileId> {
    let mut out = Vec::new();
    for dep in &db.node(member).deps {
        if let Some(id) = dep.file {
            out.extend(db.chain_from(db.resolve(id)));
        }
    }
    out
}

/// All prerequisite records of the special target `name`.
fn special_dep_targets(db: &FileDb, name: &str) -> Vec<FileId> {
    special_members(db, name)
        .into_iter()
        .flat_map(|m| member_dep_targets(db, m))
        .collect()
}

/// Expand a `.EXTRA_PREREQS` value into resolved edges.
///
/// The added edges are hidden from the automatic variables so a
/// blanket extra prerequisite does not disturb `$^` and friends.
fn expand_extra_prereqs(
    db: &mut FileDb,
    expander: &mut dyn MacroExpander,
    search: &dyn SearchPath,
    value: &str,
) -> Vec<Dep> {
    let text = expander.expand(db, None, None, value);
    let mut deps = split_prereqs(&text, None, search);
    for dep in &mut deps {
        if let Some(dep_name) = dep.name.take() {
            dep.file = Some(db.intern(&dep_name));
        }
        dep.ignore_automatic_vars = true;
    }
    deps
}

/// Resolve all special targets into flags and policy, once.
///
/// # Errors
///
/// Returns [`FileDbError::AlreadySnapped`] on a second invocation, an
/// [`FileDbError::IntermediateConflict`] when a target is claimed by
/// both `.NOTINTERMEDIATE` and `.INTERMEDIATE`/`.SECONDARY`, and
/// [`FileDbError::PolicyConflict`] when the no-prerequisite forms of
/// `.NOTINTERMEDIATE` and `.SECONDARY` are both present.
pub fn snap_deps(
    db: &mut FileDb,
    expander: &mut dyn MacroExpander,
    search: &dyn SearchPath,
) -> Result<(), FileDbError> {
    if db.policy.snapped {
        return Err(FileDbError::AlreadySnapped);
    }
    // Once we start snapping, no new special-target membership may be
    // registered; enter_prereqs checks this flag.
    db.policy.snapped = true;

    for id in special_dep_targets(db, ".PRECIOUS") {
        db.node_mut(id).precious = true;
    }

    for id in special_dep_targets(db, ".LOW_RESOLUTION_TIME") {
        db.node_mut(id).low_resolution_time = true;
    }

    for id in special_dep_targets(db, ".PHONY") {
        let node = db.node_mut(id);
        node.phony = true;
        node.is_target = true;
        node.last_mtime = FileTime::NONEXISTENT;
        node.mtime_before_update = FileTime::NONEXISTENT;
    }

    for member in special_members(db, ".NOTINTERMEDIATE") {
        if db.node(member).deps.is_empty() {
            db.policy.no_intermediates = true;
        } else {
            for id in member_dep_targets(db, member) {
                db.node_mut(id).notintermediate = true;
            }
        }
    }

    // .INTERMEDIATE with no prerequisites is a no-op: marking every
    // file intermediate would delete the goals right after building.
    for member in special_members(db, ".INTERMEDIATE") {
        for id in member_dep_targets(db, member) {
            let node = db.node_mut(id);
            if node.notintermediate {
                return Err(FileDbError::IntermediateConflict {
                    name: node.name.clone(),
                    special: ".INTERMEDIATE",
                });
            }
            node.intermediate = true;
        }
    }

    for member in special_members(db, ".SECONDARY") {
        if db.node(member).deps.is_empty() {
            db.policy.all_secondary = true;
        } else {
            for id in member_dep_targets(db, member) {
                let node = db.node_mut(id);
                if node.notintermediate {
                    return Err(FileDbError::IntermediateConflict {
                        name: node.name.clone(),
                        special: ".SECONDARY",
                    });
                }
                node.intermediate = true;
                node.secondary = true;
            }
        }
    }

    if db.policy.no_intermediates && db.policy.all_secondary {
        return Err(FileDbError::PolicyConflict);
    }

    if let Some(id) = db.lookup(".EXPORT_ALL_VARIABLES")
        && db.node(id).is_target
    {
        db.policy.export_all_variables = true;
    }

    if let Some(id) = db.lookup(".IGNORE")
        && db.node(id).is_target
    {
        if db.node(id).deps.is_empty() {
            db.policy.ignore_errors = true;
        } else {
            for target in member_dep_targets(db, id) {
                db.node_mut(target).command_flags.no_error = true;
            }
        }
    }

    if let Some(id) = db.lookup(".SILENT")
        && db.node(id).is_target
    {
        if db.node(id).deps.is_empty() {
            db.policy.run_silent = true;
        } else {
            for target in member_dep_targets(db, id) {
                db.node_mut(target).command_flags.silent = true;
            }
        }
    }

    if let Some(id) = db.lookup(".NOTPARALLEL")
        && db.node(id).is_target
    {
        if db.node(id).deps.is_empty() {
            db.policy.not_parallel = true;
        } else {
            // Serialise only the named targets' own prerequisites: a
            // wait point before every sibling after the first.
            for target in member_dep_targets(db, id) {
                for dep in db.node_mut(target).deps.iter_mut().skip(1) {
                    dep.wait_here = true;
                }
            }
        }
    }

    let global_extra = match db.global_vars.get(".EXTRA_PREREQS").map(str::to_owned) {
        Some(value) => expand_extra_prereqs(db, expander, search, &value),
        None => Vec::new(),
    };

    for id in db.head_ids() {
        snap_file(db, id, &global_extra, expander, search);
    }

    Ok(())
}

/// Per-record finalisation: apply the global lifecycle defaults and
/// fold in `.EXTRA_PREREQS`.
fn snap_file(
    db: &mut FileDb,
    file: FileId,
    global_extra: &[Dep],
    expander: &mut dyn MacroExpander,
    search: &dyn SearchPath,
) {
    // Without second expansion the updating flag has served its
    // purpose during parsing; reset it for the update round.
    if !db.policy.second_expansion {
        db.node_mut(file).updating = false;
    }

    // More specific settings have priority over the global defaults.
    if db.policy.all_secondary && !db.node(file).notintermediate {
        db.node_mut(file).intermediate = true;
    }
    if db.policy.no_intermediates && !db.node(file).intermediate && !db.node(file).secondary {
        db.node_mut(file).notintermediate = true;
    }

    let own_extra = db
        .node(file)
        .variables
        .as_ref()
        .and_then(|vars| vars.get(".EXTRA_PREREQS"))
        .map(str::to_owned);

    let mut prereqs = if let Some(value) = own_extra {
        let mut deps = expand_extra_prereqs(db, expander, search, &value);
        if db.policy.second_expansion {
            for dep in &mut deps {
                if dep.name.is_none()
                    && let Some(id) = dep.file
                {
                    dep.name = Some(db.node(id).name.clone());
                }
                dep.need_second_expansion = true;
            }
        }
        deps
    } else if db.node(file).variables.is_none() && db.node(file).is_target {
        global_extra.to_vec()
    } else {
        Vec::new()
    };

    if prereqs.is_empty() {
        return;
    }

    // Coarse self-cycle guard: one self-reference discards the whole
    // added batch for this record.
    let own_name = db.node(file).name.clone();
    let cyclic = prereqs.iter().any(|d| db.dep_name(d) == own_name);
    if cyclic {
        prereqs.clear();
    } else {
        db.node_mut(file).deps.append(&mut prereqs);
    }
}
