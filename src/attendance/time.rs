use crate::attendance::{
    AttendanceRecord, AttendanceStatus, CheckOutClassification, EmployeeShift, NatureOfTime,
};
use crate::error::{Error, Result};
use crate::{Clock, TimeEngine};

use chrono::{DateTime, NaiveTime, Timelike, Utc};

/// Minutes after the shift start a flexible employee still counts as on time
pub const FLEXIBLE_GRACE_MINUTES: i64 = 5;

/// Default [`TimeEngine`]: compares local wall-clock times against the shift
///
/// Check-in and check-out are judged by time of day in the employee's zone,
/// so the calendar date of `at` does not matter. Night shifts that wrap past
/// midnight are not modelled.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShiftClock;

impl ShiftClock {
    pub fn new() -> Self {
        Self
    }
}

/// [`Clock`] backed by the system time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

fn seconds_of_day(time: NaiveTime) -> i64 {
    i64::from(time.num_seconds_from_midnight())
}

/// Renders elapsed minutes as `<h>hr <m>m`
pub fn format_elapsed(minutes: i64) -> String {
    format!("{}hr {}m", minutes / 60, minutes % 60)
}

impl TimeEngine for ShiftClock {
    fn check_in_status(
        &self,
        at: DateTime<Utc>,
        shift: &EmployeeShift,
    ) -> Result<AttendanceStatus> {
        let local = at.with_timezone(&shift.time_zone).time();

        // Whole minutes, truncated toward zero.
        let diff = (seconds_of_day(local) - seconds_of_day(shift.check_in)) / 60;

        let allowed = match shift.nature {
            NatureOfTime::Fixed => 0,
            NatureOfTime::Flexible => FLEXIBLE_GRACE_MINUTES,
        };

        if diff <= allowed {
            Ok(AttendanceStatus::OnTime)
        } else {
            Ok(AttendanceStatus::Late)
        }
    }

    fn check_out_status(
        &self,
        at: DateTime<Utc>,
        attendance: &AttendanceRecord,
        shift: &EmployeeShift,
    ) -> Result<CheckOutClassification> {
        let elapsed = at.signed_duration_since(attendance.check_in_time);
        if elapsed < chrono::Duration::zero() {
            return Err(Error::ClassificationFailure(format!(
                "check-out at {} precedes check-in at {}",
                at, attendance.check_in_time
            )));
        }
        let elapsed_minutes = elapsed.num_minutes();

        let status = match shift.nature {
            NatureOfTime::Flexible => {
                if elapsed_minutes >= i64::from(shift.required_minutes) {
                    AttendanceStatus::FullDay
                } else {
                    AttendanceStatus::HalfDay
                }
            }
            NatureOfTime::Fixed => {
                let local = at.with_timezone(&shift.time_zone).time();
                if attendance.status == AttendanceStatus::Late {
                    AttendanceStatus::HalfDay
                } else if local >= shift.check_out {
                    AttendanceStatus::FullDay
                } else {
                    AttendanceStatus::HalfDay
                }
            }
        };

        Ok(CheckOutClassification {
            status,
            time_spent: format_elapsed(elapsed_minutes),
        })
    }
}
