//! Attendance records and the collaborators that produce them
//!
//! The exchange pipeline only needs a handful of shapes from the attendance
//! domain: an employee's shift, a check-in to create, an open attendance to
//! close, and the status tags the [`TimeEngine`](crate::TimeEngine) hands back.
//! Stores and notifiers are traits in the crate root; this module carries the
//! data types plus the default implementations.

pub mod artifact;
pub mod memory;
pub mod notify;
pub mod time;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How an employee's working time is judged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NatureOfTime {
    /// Fixed shift start and end
    Fixed,
    /// A required number of working minutes, start time with grace
    Flexible,
}

/// Discrete status assigned at check-in or check-out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttendanceStatus {
    #[serde(rename = "onTime")]
    OnTime,
    #[serde(rename = "late")]
    Late,
    #[serde(rename = "full-day")]
    FullDay,
    #[serde(rename = "half-day")]
    HalfDay,
}

impl AttendanceStatus {
    /// The stored tag, e.g. `onTime`
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::OnTime => "onTime",
            AttendanceStatus::Late => "late",
            AttendanceStatus::FullDay => "full-day",
            AttendanceStatus::HalfDay => "half-day",
        }
    }

    /// Human readable label, e.g. `On Time`
    pub fn label(&self) -> &'static str {
        match self {
            AttendanceStatus::OnTime => "On Time",
            AttendanceStatus::Late => "Late",
            AttendanceStatus::FullDay => "Full Day",
            AttendanceStatus::HalfDay => "Half Day",
        }
    }

    /// Parses a stored tag
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "onTime" => Some(AttendanceStatus::OnTime),
            "late" => Some(AttendanceStatus::Late),
            "full-day" => Some(AttendanceStatus::FullDay),
            "half-day" => Some(AttendanceStatus::HalfDay),
            _ => None,
        }
    }
}

impl std::fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shift definition for one employee
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmployeeShift {
    pub employee_id: String,
    pub company_id: String,
    pub time_zone: Tz,
    /// Local wall-clock shift start
    pub check_in: NaiveTime,
    /// Local wall-clock shift end
    pub check_out: NaiveTime,
    /// Minutes that count as a full day for flexible employees
    pub required_minutes: u32,
    pub nature: NatureOfTime,
}

/// A check-in to be persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAttendance {
    pub employee_id: String,
    pub company_id: String,
    /// Local calendar date of the check-in
    pub date: NaiveDate,
    pub check_in_time: DateTime<Utc>,
    /// URL of the stored check-in photo
    pub check_in_pic: String,
    pub status: AttendanceStatus,
}

/// A persisted attendance, open until `check_out` is set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttendanceRecord {
    pub id: Uuid,
    pub employee_id: String,
    pub company_id: String,
    pub date: NaiveDate,
    pub check_in_time: DateTime<Utc>,
    pub check_in_pic: String,
    pub status: AttendanceStatus,
    pub check_out: Option<CheckOutUpdate>,
}

impl AttendanceRecord {
    pub(crate) fn open(id: Uuid, attendance: NewAttendance) -> Self {
        Self {
            id,
            employee_id: attendance.employee_id,
            company_id: attendance.company_id,
            date: attendance.date,
            check_in_time: attendance.check_in_time,
            check_in_pic: attendance.check_in_pic,
            status: attendance.status,
            check_out: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.check_out.is_none()
    }
}

/// Fields written when an attendance is closed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckOutUpdate {
    pub check_out_time: DateTime<Utc>,
    pub check_out_pic: String,
    /// Elapsed time as rendered by the time engine, e.g. `8hr 5m`
    pub time_spent: String,
    pub status: AttendanceStatus,
}

/// Check-out status together with the elapsed time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckOutClassification {
    pub status: AttendanceStatus,
    pub time_spent: String,
}

/// Result of an upsert-style write
///
/// `AlreadyExists` and `NotFound` are ordinary outcomes, not errors; the
/// exchange turns them into a failure screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOutcome {
    Written,
    AlreadyExists,
    NotFound,
}

impl StoreOutcome {
    pub fn is_written(&self) -> bool {
        matches!(self, StoreOutcome::Written)
    }
}

pub use artifact::FsArtifactStore;
pub use memory::MemoryAttendanceStore;
pub use notify::LogNotifier;
pub use time::{ShiftClock, SystemClock};
