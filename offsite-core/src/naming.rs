//! Destination bucket naming.
//!
//! `<prefix>-YYYY-MM-DD`, optionally followed by `-<letter>`. The date is the
//! calendar date at the configured UTC offset.
//!
//! The clock letter is `a + (second_of_minute % 26)`. It is a deterministic
//! function of the start instant, not a random source: two runs that start on
//! the same second-of-minute of the same day get the same name.

use chrono::{DateTime, FixedOffset, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::BucketNameError;
use crate::types::BucketName;

/// Whether (and how) to append a suffix letter to the dated name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SuffixMode {
    #[default]
    None,
    ClockLetter,
}

/// Pure bucket-name generator.
#[derive(Debug, Clone)]
pub struct BucketNamer {
    prefix: String,
    offset: FixedOffset,
    suffix: SuffixMode,
}

impl BucketNamer {
    pub fn new(prefix: impl Into<String>, offset: FixedOffset, suffix: SuffixMode) -> Self {
        Self {
            prefix: prefix.into(),
            offset,
            suffix,
        }
    }

    /// Name for a run that started at `instant`.
    pub fn name_at(&self, instant: DateTime<Utc>) -> Result<BucketName, BucketNameError> {
        let local = instant.with_timezone(&self.offset);
        let mut name = format!("{}-{}", self.prefix, local.format("%Y-%m-%d"));
        if self.suffix == SuffixMode::ClockLetter {
            name.push('-');
            name.push(clock_letter(local.second()));
        }
        BucketName::parse(name)
    }
}

/// `a`..=`z` from a second-of-minute value.
pub fn clock_letter(second: u32) -> char {
    char::from(b'a' + (second % 26) as u8)
}
