//! Shared helpers for integration tests.
//!
//! Integration tests under `tests/` compile as independent crates. This
//! module is included via `mod common;` in individual test files to
//! share the deterministic expander fake standing in for the variable
//! subsystem, and a log-capture harness for diagnostics.

#![allow(
    dead_code,
    reason = "shared between test crates that each use a subset"
)]

use filedb::{FileDb, FileId, MacroExpander};
use std::collections::HashMap;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use tracing::Level;
use tracing_subscriber::fmt;

/// A deterministic [`MacroExpander`] for tests.
///
/// Handles the references the second-expansion engine produces: `$*`
/// (the bound stem), `$(*F)` (the stem's basename) and `$(NAME)` for
/// names present in the map; unknown references expand to nothing,
/// like an undefined variable would.
#[derive(Debug, Default)]
pub struct MapExpander {
    vars: HashMap<String, String>,
    /// Records the files whose automatic-variable context was bound.
    pub bound: Vec<FileId>,
}

impl MapExpander {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_var(mut self, name: &str, value: &str) -> Self {
        self.vars.insert(name.to_owned(), value.to_owned());
        self
    }
}

fn stem_basename(stem: &str) -> &str {
    stem.rsplit_once('/').map_or(stem, |(_, base)| base)
}

impl MacroExpander for MapExpander {
    fn bind_file(&mut self, _db: &mut FileDb, file: FileId) {
        self.bound.push(file);
    }

    fn expand(
        &mut self,
        _db: &mut FileDb,
        _file: Option<FileId>,
        stem: Option<&str>,
        text: &str,
    ) -> String {
        let stem = stem.unwrap_or("");
        let mut out = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(pos) = rest.find('$') {
            out.push_str(&rest[..pos]);
            let tail = &rest[pos + 1..];
            if let Some(after) = tail.strip_prefix('*') {
                out.push_str(stem);
                rest = after;
            } else if let Some(after) = tail.strip_prefix('(') {
                let Some(close) = after.find(')') else {
                    out.push('$');
                    rest = tail;
                    continue;
                };
                let name = &after[..close];
                if name == "*F" {
                    out.push_str(stem_basename(stem));
                } else if name == "*" {
                    out.push_str(stem);
                } else if let Some(value) = self.vars.get(name) {
                    out.push_str(value);
                }
                rest = &after[close + 1..];
            } else {
                out.push('$');
                rest = tail;
            }
        }
        out.push_str(rest);
        out
    }
}

#[derive(Clone)]
struct BufferWriter {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl Write for BufferWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.lock().expect("lock").write(data)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.buf.lock().expect("lock").flush()
    }
}

/// Capture logs emitted within the provided closure.
pub fn capture_logs<F>(level: Level, f: F) -> String
where
    F: FnOnce(),
{
    let buf = Arc::new(Mutex::new(Vec::new()));
    let writer = BufferWriter {
        buf: Arc::clone(&buf),
    };
    let subscriber = fmt()
        .with_max_level(level)
        .without_time()
        .with_writer(move || writer.clone())
        .finish();
    tracing::subscriber::with_default(subscriber, f);
    let locked = buf.lock().expect("lock");
    String::from_utf8(locked.clone()).expect("utf8")
}
