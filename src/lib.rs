//! Target and prerequisite database core for a make-style build tool.
//!
//! This library tracks every target and prerequisite mentioned by build
//! rules: an identity-merging registry of file records, a two-phase
//! prerequisite-expansion pipeline for pattern rules, a one-shot
//! resolver for reserved special targets, and the end-of-run sweep that
//! deletes intermediate files. Recipe execution, scheduling and macro
//! expansion live outside; this core consumes them through the
//! [`expand::MacroExpander`] and [`dep::SearchPath`] traits.
//!
//! The database is single-threaded and synchronous. Records are held in
//! a stable-handle arena and never destroyed: a merged-away record
//! turns into a forwarding stub so stale handles keep resolving.

pub mod db;
pub mod dep;
pub mod error;
pub mod expand;
pub mod file;
pub mod name;
pub mod pattern;
pub mod print;
pub mod reap;
pub mod snap;
pub mod timestamp;
pub mod vars;

pub use db::{FileDb, GlobalPolicy};
pub use dep::{Dep, NoSearch, SearchPath, StemCapture};
pub use error::FileDbError;
pub use expand::{MacroExpander, NoExpansion, expand_deps};
pub use file::{CommandFlags, CommandState, Commands, FileId, FileNode, UpdateStatus};
pub use reap::remove_intermediates;
pub use snap::snap_deps;
pub use timestamp::FileTime;
pub use vars::VariableSet;
