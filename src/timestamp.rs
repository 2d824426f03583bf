//! Packed file timestamps.
//!
//! Modification times are stored as a single ordered integer: the low
//! bits carry nanoseconds, the rest carry seconds since the epoch. Three
//! sentinel values sit below every ordinary time so that "never checked",
//! "does not exist" and "very old" order naturally before any real
//! timestamp. Comparing two [`FileTime`] values therefore compares the
//! raw packed representation, which is exactly what the registry's merge
//! rule relies on.

use std::time::{SystemTime, UNIX_EPOCH};
use time::OffsetDateTime;
use time::macros::format_description;

/// Number of low bits reserved for the nanosecond part.
const LO_BITS: u32 = 30;

/// Smallest packed value representing an ordinary time.
const ORDINARY_MIN: i64 = FileTime::OLD.0 + 1;

/// A packed file modification time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FileTime(i64);

impl FileTime {
    /// The file's timestamp has never been retrieved.
    pub const UNKNOWN: Self = Self(0);
    /// The file is known not to exist (also forced onto phony targets).
    pub const NONEXISTENT: Self = Self(1);
    /// The file is older than anything we can represent.
    pub const OLD: Self = Self(2);
    /// Largest representable ordinary time.
    pub const MAX: Self = Self(i64::MAX);

    /// Pack a wall-clock time.
    ///
    /// Out-of-range inputs are clamped to the nearest representable
    /// bound and reported; the run continues with the substitute.
    #[must_use]
    pub fn from_unix(fname: Option<&str>, secs: i64, nanos: u32) -> Self {
        let ns = i64::from(nanos.min((1 << LO_BITS) - 1));
        let packed = secs
            .checked_mul(1 << LO_BITS)
            .and_then(|p| p.checked_add(ORDINARY_MIN + ns))
            .filter(|&ts| ts >= ORDINARY_MIN);
        match packed {
            Some(ts) => Self(ts),
            None => {
                let substitute = if secs < 0 { Self(ORDINARY_MIN) } else { Self::MAX };
                tracing::error!(
                    "{}: timestamp out of range: substituting {}",
                    fname.unwrap_or("Current time"),
                    substitute.render(),
                );
                substitute
            }
        }
    }

    /// The current time as a packed timestamp.
    #[must_use]
    pub fn now() -> Self {
        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(d) => {
                let secs = i64::try_from(d.as_secs()).unwrap_or(i64::MAX >> LO_BITS);
                Self::from_unix(None, secs, d.subsec_nanos())
            }
            // A clock before the epoch is as good as "very old".
            Err(_) => Self::OLD,
        }
    }

    /// Whether this is an ordinary time rather than a sentinel.
    #[must_use]
    pub const fn is_ordinary(self) -> bool {
        self.0 >= ORDINARY_MIN
    }

    /// Seconds since the epoch; sentinels report zero.
    #[must_use]
    pub const fn seconds(self) -> i64 {
        if self.is_ordinary() {
            (self.0 - ORDINARY_MIN) >> LO_BITS
        } else {
            0
        }
    }

    /// Nanosecond part; sentinels report zero.
    #[must_use]
    pub const fn nanoseconds(self) -> i64 {
        if self.is_ordinary() {
            (self.0 - ORDINARY_MIN) & ((1 << LO_BITS) - 1)
        } else {
            0
        }
    }

    /// Raw packed representation, used for merge comparisons.
    #[must_use]
    pub const fn raw(self) -> i64 {
        self.0
    }

    /// Render an ordinary time as `YYYY-MM-DD HH:MM:SS[.fraction]`.
    ///
    /// The fractional part drops trailing zeros; a whole second renders
    /// with no fraction at all. Sentinels render their raw value, since
    /// callers are expected to describe those in prose instead.
    #[must_use]
    pub fn render(self) -> String {
        if !self.is_ordinary() {
            return self.0.to_string();
        }
        let secs = self.seconds();
        let format = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
        let mut out = OffsetDateTime::from_unix_timestamp(secs)
            .ok()
            .and_then(|dt| dt.format(format).ok())
            .unwrap_or_else(|| secs.to_string());

        let ns = self.nanoseconds();
        if ns != 0 {
            let mut frac = format!(".{ns:09}");
            while frac.ends_with('0') {
                frac.pop();
            }
            out.push_str(&frac);
        }
        out
    }
}

impl Default for FileTime {
    fn default() -> Self {
        Self::UNKNOWN
    }
}
