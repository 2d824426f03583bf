//! End-of-run deletion of intermediate files.
//!
//! Files created only as stepping stones of rule chaining are removed
//! once the run finishes, unless something marked them worth keeping.
//! The sweep also runs when a fatal signal interrupts the build, in
//! which case it reports through the error channel instead of the
//! progress stream.

use crate::db::FileDb;
use crate::file::UpdateStatus;
use std::io::{self, Write};

/// Whether `file` qualifies for automatic deletion.
fn eligible(db: &FileDb, file: crate::file::FileId) -> bool {
    let f = db.node(file);
    f.intermediate
        && (f.dontcare || !f.precious)
        && !f.secondary
        && !f.notintermediate
        && !f.cmd_target
}

/// Delete all eligible intermediate files.
///
/// A fast no-op under question/touch modes and under the global
/// keep-everything policies. Files whose update was never attempted are
/// skipped: nothing can have created them. Deletion failures with
/// "not found" count as already satisfied; any other failure is
/// reported and the sweep continues. With `sig` set (fatal-signal
/// cleanup) each deletion is reported through the error channel;
/// otherwise a single `rm a b c` progress line goes to `out`, unless
/// the run is silent. Returns whether anything was printed.
///
/// # Errors
///
/// Only I/O errors from writing the progress line itself; filesystem
/// deletion failures are swept past by design.
pub fn remove_intermediates(db: &FileDb, sig: bool, out: &mut dyn Write) -> io::Result<bool> {
    let policy = &db.policy;
    if policy.question || policy.touch || policy.all_secondary || policy.no_intermediates {
        return Ok(false);
    }
    if sig && policy.just_print {
        return Ok(false);
    }

    let mut doneany = false;
    for id in db.head_ids() {
        if !eligible(db, id) {
            continue;
        }
        let f = db.node(id);
        if f.update_status == UpdateStatus::None {
            // Nothing would have created this file yet.
            continue;
        }

        let status = if policy.just_print {
            Ok(())
        } else {
            match std::fs::remove_file(&f.name) {
                Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
                other => other,
            }
        };

        if f.dontcare {
            continue;
        }

        if sig {
            tracing::error!("*** deleting intermediate file '{}'", f.name);
        } else if !policy.run_silent {
            if doneany {
                write!(out, " ")?;
            } else {
                write!(out, "rm ")?;
                doneany = true;
            }
            write!(out, "{}", f.name)?;
            out.flush()?;
        }

        if let Err(err) = status {
            tracing::error!("unlink: {}: {err}", f.name);
            // Start the progress line over.
            doneany = false;
        }
    }

    if doneany && !sig {
        writeln!(out)?;
        out.flush()?;
    }
    Ok(doneany)
}
