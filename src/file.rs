//! File records: one entity serves as both target and prerequisite.
//!
//! Records live in the database's arena and are referred to by stable
//! [`FileId`] handles. All linkage between records (double-colon
//! chains, forwarding stubs, `also_make` siblings) is expressed through
//! handles, never references, so arena growth and merges can never
//! invalidate a live link.

use crate::timestamp::FileTime;
use crate::vars::VariableSet;
use std::rc::Rc;

/// Stable handle to a file record in the database arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FileId(pub(crate) usize);

impl FileId {
    /// Arena slot index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// Recipe state of a record, advanced by the surrounding scheduler.
///
/// States are ordered: `also_make` siblings are only ever raised to a
/// later state, never lowered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum CommandState {
    /// No recipe work has begun.
    #[default]
    NotStarted,
    /// Prerequisite recipes are running.
    DepsRunning,
    /// The record's own recipe is running.
    Running,
    /// Recipe work is complete.
    Finished,
}

/// Outcome of the most recent update attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UpdateStatus {
    /// No update was ever attempted.
    #[default]
    None,
    /// The update succeeded.
    Success,
    /// The record needs updating (question mode).
    Question,
    /// The update failed.
    Failed,
}

/// Per-record recipe execution modifiers set by `.SILENT` / `.IGNORE`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommandFlags {
    /// Run the recipe without echoing it.
    pub silent: bool,
    /// Ignore recipe errors for this record.
    pub no_error: bool,
}

/// A recipe with the source location it was defined at.
///
/// Recipes are shared between records after a merge, so they are held
/// behind `Rc`: the last referencing record would free the recipe, but
/// records are never destroyed, so in practice neither is it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commands {
    /// Raw recipe text.
    pub recipe: String,
    /// Build file the recipe was read from, if known.
    pub file_name: Option<String>,
    /// Line number within that file.
    pub line: u64,
}

impl Commands {
    /// A recipe with no recorded source location (implicit-rule search).
    #[must_use]
    pub fn new(recipe: impl Into<String>) -> Self {
        Self {
            recipe: recipe.into(),
            file_name: None,
            line: 0,
        }
    }

    /// A recipe located at `file_name:line`.
    #[must_use]
    pub fn located(recipe: impl Into<String>, file_name: impl Into<String>, line: u64) -> Self {
        Self {
            recipe: recipe.into(),
            file_name: Some(file_name.into()),
            line,
        }
    }
}

/// A target or prerequisite record.
///
/// Fields are deliberately public: the rule-recording and update layers
/// that surround this core mutate records freely during parsing, and
/// the database only enforces its invariants at the operations that
/// need them (merge, snap, second expansion).
#[derive(Debug, Clone)]
pub struct FileNode {
    /// Display name.
    pub name: String,
    /// Registry key; differs from `name` only on case-insensitive
    /// targets or between `rehash` and `rename`.
    pub hname: String,
    /// Ordered outgoing dependency edges.
    pub deps: Vec<crate::dep::Dep>,
    /// Other records made by the same recipe invocation.
    pub also_make: Vec<FileId>,
    /// Recipe, possibly shared with merged-away records.
    pub cmds: Option<Rc<Commands>>,
    /// Wildcard stem matched for this record by a pattern rule.
    pub stem: Option<String>,
    /// Target-specific variables, if any were defined.
    pub variables: Option<VariableSet>,
    /// Most recently retrieved modification time.
    pub last_mtime: FileTime,
    /// Modification time before the current update round.
    pub mtime_before_update: FileTime,
    /// Recipe progress state.
    pub command_state: CommandState,
    /// Outcome of the last update attempt.
    pub update_status: UpdateStatus,
    /// Per-record recipe modifiers.
    pub command_flags: CommandFlags,

    /// Head of this record's double-colon chain; a single-colon record
    /// carries `None`, a chain head points at itself.
    pub double_colon: Option<FileId>,
    /// Next-newer member of the double-colon chain.
    pub prev: Option<FileId>,
    /// Newest member of the chain (tracked on every member).
    pub last: FileId,
    /// Forwarding link left behind when this record was merged away.
    pub renamed: Option<FileId>,
    /// Alternate traversal order over `deps`, regenerated whenever the
    /// edge list changes.
    pub shuffled_order: Option<Vec<usize>>,

    /// The record appears as a rule target.
    pub is_target: bool,
    /// Never delete this file automatically.
    pub precious: bool,
    /// A loadable object was loaded for this record.
    pub loaded: bool,
    /// Always out of date; not backed by a real file.
    pub phony: bool,
    /// Created by rule chaining; deleted after the run.
    pub intermediate: bool,
    /// Kept after the run although intermediate.
    pub secondary: bool,
    /// Explicitly excluded from the intermediate lifecycle.
    pub notintermediate: bool,
    /// Failure to build this record is tolerated.
    pub dontcare: bool,
    /// Named on the command line.
    pub cmd_target: bool,
    /// Mentioned literally in a build file rather than introduced by
    /// pattern machinery.
    pub is_explicit: bool,
    /// Came from the builtin rule set; demoted on re-entry.
    pub builtin: bool,
    /// Implicit rule search has already run for this record.
    pub tried_implicit: bool,
    /// Update in progress (cycle detection).
    pub updating: bool,
    /// The update round has finished for this record.
    pub updated: bool,
    /// Second expansion has run for this record.
    pub snapped: bool,
    /// The backing filesystem has coarse timestamps.
    pub low_resolution_time: bool,
    /// Skip search-path rewriting for this record.
    pub ignore_vpath: bool,
    /// A suffix-rule pseudo-target.
    pub suffix: bool,
}

impl FileNode {
    pub(crate) fn new(name: String, hname: String, id: FileId) -> Self {
        Self {
            name,
            hname,
            deps: Vec::new(),
            also_make: Vec::new(),
            cmds: None,
            stem: None,
            variables: None,
            last_mtime: FileTime::UNKNOWN,
            mtime_before_update: FileTime::UNKNOWN,
            command_state: CommandState::NotStarted,
            update_status: UpdateStatus::None,
            command_flags: CommandFlags::default(),
            double_colon: None,
            prev: None,
            last: id,
            renamed: None,
            shuffled_order: None,
            is_target: false,
            precious: false,
            loaded: false,
            phony: false,
            intermediate: false,
            secondary: false,
            notintermediate: false,
            dontcare: false,
            cmd_target: false,
            is_explicit: false,
            builtin: false,
            tried_implicit: false,
            updating: false,
            updated: false,
            snapped: false,
            low_resolution_time: false,
            ignore_vpath: false,
            suffix: false,
        }
    }

    /// Whether this record belongs to a double-colon chain.
    #[must_use]
    pub const fn is_double_colon(&self) -> bool {
        self.double_colon.is_some()
    }
}
