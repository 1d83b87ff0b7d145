//! Time stamp values and their field binding
//!
//! A time stamp is stored in a record as a `timeStamp` structure with
//! `secondsPastEpoch` (long), `nanoseconds` (int) and optionally `userTag`
//! (int). [`TimeStamp`] reads and writes that layout.
//!
//! ```
//! use pvdatabase_core::TimeStamp;
//!
//! let ts = TimeStamp::new(1_000, 1_500_000_000);
//! assert_eq!(ts.seconds_past_epoch(), 1_001);
//! assert_eq!(ts.nanoseconds(), 500_000_000);
//! ```

use crate::error::{Error, Result};
use crate::field::{FieldMut, PvField, Scalar, ScalarType};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

const SECONDS_PAST_EPOCH: &str = "secondsPastEpoch";
const NANOSECONDS: &str = "nanoseconds";
const USER_TAG: &str = "userTag";

const NANOS_PER_SEC: i64 = 1_000_000_000;

/// Seconds and nanoseconds since the Unix epoch, plus a user tag
///
/// ## Invariants
///
/// - `0 <= nanoseconds < 1_000_000_000`
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct TimeStamp {
    seconds_past_epoch: i64,
    nanoseconds: i32,
    user_tag: i32,
}

impl TimeStamp {
    /// Create a time stamp, carrying excess nanoseconds into seconds
    pub fn new(seconds_past_epoch: i64, nanoseconds: i64) -> Self {
        let seconds = seconds_past_epoch + nanoseconds.div_euclid(NANOS_PER_SEC);
        let nanos = nanoseconds.rem_euclid(NANOS_PER_SEC);
        TimeStamp {
            seconds_past_epoch: seconds,
            nanoseconds: nanos as i32,
            user_tag: 0,
        }
    }

    /// Current wall clock time
    ///
    /// Returns the epoch if the system clock is before the Unix epoch.
    pub fn now() -> Self {
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        TimeStamp {
            seconds_past_epoch: duration.as_secs() as i64,
            nanoseconds: duration.subsec_nanos() as i32,
            user_tag: 0,
        }
    }

    /// Replace the user tag
    pub fn with_user_tag(mut self, user_tag: i32) -> Self {
        self.user_tag = user_tag;
        self
    }

    /// Whole seconds since the epoch
    pub fn seconds_past_epoch(&self) -> i64 {
        self.seconds_past_epoch
    }

    /// Nanoseconds within the second
    pub fn nanoseconds(&self) -> i32 {
        self.nanoseconds
    }

    /// User tag
    pub fn user_tag(&self) -> i32 {
        self.user_tag
    }

    /// Whether `field` has the layout of a time stamp structure
    pub fn is_time_stamp_field(field: &PvField) -> bool {
        let typed = |name: &str, t: ScalarType| {
            field
                .sub_field(name)
                .map(|f| f.scalar().map(Scalar::scalar_type) == Some(t))
                .unwrap_or(false)
        };
        field.is_structure()
            && typed(SECONDS_PAST_EPOCH, ScalarType::Long)
            && typed(NANOSECONDS, ScalarType::Int)
            && field
                .sub_field(USER_TAG)
                .map_or(true, |f| f.scalar().map(Scalar::scalar_type) == Some(ScalarType::Int))
    }

    /// Read a time stamp from a `timeStamp` structure
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTimeStamp`] if the field does not have the
    /// time stamp layout.
    pub fn from_field(field: &PvField) -> Result<Self> {
        if !Self::is_time_stamp_field(field) {
            return Err(Error::InvalidTimeStamp(field.name().to_string()));
        }
        let int = |name: &str| {
            field
                .sub_field(name)
                .and_then(PvField::scalar)
                .and_then(Scalar::as_i64)
                .unwrap_or(0)
        };
        Ok(TimeStamp {
            seconds_past_epoch: int(SECONDS_PAST_EPOCH),
            nanoseconds: int(NANOSECONDS) as i32,
            user_tag: int(USER_TAG) as i32,
        })
    }

    /// Write this time stamp into a `timeStamp` structure
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTimeStamp`] if the field does not have the
    /// time stamp layout.
    pub fn write_to(&self, field: &mut FieldMut<'_>) -> Result<()> {
        if !Self::is_time_stamp_field(&**field) {
            return Err(Error::InvalidTimeStamp(field.name().to_string()));
        }
        let missing = || Error::FieldNotFound(SECONDS_PAST_EPOCH.to_string());
        field
            .sub_field_mut(SECONDS_PAST_EPOCH)
            .ok_or_else(missing)?
            .set_scalar(self.seconds_past_epoch)?;
        field
            .sub_field_mut(NANOSECONDS)
            .ok_or_else(|| Error::FieldNotFound(NANOSECONDS.to_string()))?
            .set_scalar(self.nanoseconds)?;
        if let Some(mut tag) = field.sub_field_mut(USER_TAG) {
            tag.set_scalar(self.user_tag)?;
        }
        Ok(())
    }
}

impl fmt::Display for TimeStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match chrono::DateTime::from_timestamp(self.seconds_past_epoch, self.nanoseconds as u32) {
            Some(dt) => write!(f, "{}", dt.to_rfc3339()),
            None => write!(f, "{}.{:09}", self.seconds_past_epoch, self.nanoseconds),
        }
    }
}
