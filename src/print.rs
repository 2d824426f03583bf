//! Textual dump of the file database.
//!
//! One stanza per record: the rule header with its prerequisites,
//! followed by comment lines describing flags, timestamps and update
//! state. The output is byte-stable for a given database so diagnostic
//! tooling can diff it between runs.

use crate::db::FileDb;
use crate::dep::Dep;
use crate::file::{CommandState, FileId, UpdateStatus};
use crate::timestamp::FileTime;
use std::io::{self, Write};

fn print_prereqs(db: &FileDb, deps: &[Dep], out: &mut dyn Write) -> io::Result<()> {
    let mut order_only: Vec<&Dep> = Vec::new();
    for dep in deps {
        if dep.ignore_mtime {
            order_only.push(dep);
        } else {
            let wait = if dep.wait_here { ".WAIT " } else { "" };
            write!(out, " {wait}{}", db.dep_name(dep))?;
        }
    }
    if !order_only.is_empty() {
        write!(out, " |")?;
        for dep in order_only {
            let wait = if dep.wait_here { ".WAIT " } else { "" };
            write!(out, " {wait}{}", db.dep_name(dep))?;
        }
    }
    writeln!(out)
}

fn print_file(db: &FileDb, id: FileId, out: &mut dyn Write) -> io::Result<()> {
    let f = db.node(id);

    writeln!(out)?;
    if !f.is_target {
        writeln!(out, "# Not a target:")?;
    }
    let colon = if f.is_double_colon() { "::" } else { ":" };
    write!(out, "{}{colon}", f.name)?;
    print_prereqs(db, &f.deps, out)?;

    if f.precious {
        writeln!(out, "#  Precious file (prerequisite of .PRECIOUS).")?;
    }
    if f.phony {
        writeln!(out, "#  Phony target (prerequisite of .PHONY).")?;
    }
    if f.cmd_target {
        writeln!(out, "#  Command line target.")?;
    }
    if f.dontcare {
        writeln!(out, "#  A default or optionally-included makefile.")?;
    }
    if f.builtin {
        writeln!(out, "#  Builtin rule")?;
    }
    writeln!(
        out,
        "{}",
        if f.tried_implicit {
            "#  Implicit rule search has been done."
        } else {
            "#  Implicit rule search has not been done."
        }
    )?;
    if let Some(stem) = &f.stem {
        writeln!(out, "#  Implicit/static pattern stem: '{stem}'")?;
    }
    if f.intermediate {
        writeln!(out, "#  File is an intermediate prerequisite.")?;
    }
    if f.notintermediate {
        writeln!(out, "#  File is a prerequisite of .NOTINTERMEDIATE.")?;
    }
    if f.secondary {
        writeln!(out, "#  File is secondary (prerequisite of .SECONDARY).")?;
    }
    if !f.also_make.is_empty() {
        write!(out, "#  Also makes:")?;
        for &sibling in &f.also_make {
            write!(out, " {}", db.node(db.resolve(sibling)).name)?;
        }
        writeln!(out)?;
    }
    if f.last_mtime == FileTime::UNKNOWN {
        writeln!(out, "#  Modification time never checked.")?;
    } else if f.last_mtime == FileTime::NONEXISTENT {
        writeln!(out, "#  File does not exist.")?;
    } else if f.last_mtime == FileTime::OLD {
        writeln!(out, "#  File is very old.")?;
    } else {
        writeln!(out, "#  Last modified {}", f.last_mtime.render())?;
    }
    writeln!(
        out,
        "{}",
        if f.updated {
            "#  File has been updated."
        } else {
            "#  File has not been updated."
        }
    )?;
    match f.command_state {
        CommandState::Running => writeln!(out, "#  Recipe currently running (THIS IS A BUG).")?,
        CommandState::DepsRunning => {
            writeln!(out, "#  Dependencies recipe running (THIS IS A BUG).")?;
        }
        CommandState::NotStarted | CommandState::Finished => match f.update_status {
            UpdateStatus::None => {}
            UpdateStatus::Success => writeln!(out, "#  Successfully updated.")?,
            UpdateStatus::Question => writeln!(out, "#  Needs to be updated (-q is set).")?,
            UpdateStatus::Failed => writeln!(out, "#  Failed to be updated.")?,
        },
    }

    // Older double-colon siblings get their own stanzas.
    if let Some(prev) = f.prev {
        print_file(db, prev, out)?;
    }
    Ok(())
}

/// Write the full database dump.
///
/// # Errors
///
/// Propagates write failures from `out`.
pub fn print_file_data_base(db: &FileDb, out: &mut dyn Write) -> io::Result<()> {
    writeln!(out, "\n# Files")?;
    for id in db.head_ids() {
        print_file(db, id, out)?;
    }
    Ok(())
}

/// List the names of all real targets, one per line.
///
/// Suffix-rule pseudo-targets and reserved-style names (a leading dot
/// followed by nothing but uppercase letters) are skipped.
///
/// # Errors
///
/// Propagates write failures from `out`.
pub fn print_targets(db: &FileDb, out: &mut dyn Write) -> io::Result<()> {
    for id in db.head_ids() {
        let f = db.node(id);
        if !f.is_target || f.suffix {
            continue;
        }
        if let Some(rest) = f.name.strip_prefix('.')
            && !rest.is_empty()
            && rest.chars().all(|c| c.is_ascii_uppercase())
        {
            continue;
        }
        writeln!(out, "{}", f.name)?;
    }
    Ok(())
}
