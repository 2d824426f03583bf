//! Typed errors for the file database.
//!
//! Every fatal condition the database can hit is an explicit variant
//! here; recoverable conditions (a conflicting recipe discovered during
//! a merge, a failed deletion during the intermediate sweep) are
//! reported through `tracing` and never surface as errors.

use thiserror::Error;

/// Fatal conditions raised by the file database.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FileDbError {
    /// A merge would turn an existing single-colon target double-colon.
    #[error("can't rename single-colon '{from}' to double-colon '{to}'")]
    SingleToDoubleColon {
        /// Name of the record being merged away.
        from: String,
        /// Name the record was being merged into.
        to: String,
    },

    /// A merge would turn an existing double-colon target single-colon.
    #[error("can't rename double-colon '{from}' to single-colon '{to}'")]
    DoubleToSingleColon {
        /// Name of the record being merged away.
        from: String,
        /// Name the record was being merged into.
        to: String,
    },

    /// A target was claimed by `.NOTINTERMEDIATE` and an opposing
    /// special target at once.
    #[error("{name} cannot be both .NOTINTERMEDIATE and {special}")]
    IntermediateConflict {
        /// The doubly-claimed target.
        name: String,
        /// The opposing special target (`.INTERMEDIATE` or `.SECONDARY`).
        special: &'static str,
    },

    /// `.NOTINTERMEDIATE` and `.SECONDARY` were both given without
    /// prerequisites, which is contradictory as a global policy.
    #[error(".NOTINTERMEDIATE and .SECONDARY are mutually exclusive")]
    PolicyConflict,

    /// The one-shot special-target pass was invoked a second time.
    #[error("special targets have already been resolved")]
    AlreadySnapped,

    /// Special-target membership was registered after the one-shot
    /// special-target pass had run.
    #[error("'{name}': special-target prerequisites cannot be added after targets are resolved")]
    DefineAfterSnap {
        /// The special target whose membership changed too late.
        name: String,
    },

    /// An internal consistency check failed during a registry mutation.
    #[error("file database corrupted: {detail}")]
    Corrupt {
        /// Human-readable description of the failed check.
        detail: String,
    },
}
