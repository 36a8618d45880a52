use crate::action::{
    echoed_fields, ActionKind, GenericPunch, ManualCheckIn, ManualPunch, RejectedAction,
    GENERIC_SEPARATOR,
};
use crate::attendance::{AttendanceStatus, CheckOutUpdate, NewAttendance, StoreOutcome};
use crate::error::{Error, Result};
use crate::exchange::screen::{
    punch_text, Punch, ScreenResponse, GENERIC_RESULT_SCREEN, MANUAL_PUNCHING_IN_SCREEN,
    MANUAL_PUNCHING_OUT_SCREEN,
};
use crate::exchange::ExchangeOrchestrator;
use crate::media::{MediaAttachment, MediaIntegrityMetadata};

use chrono::{DateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use log::{debug, info, warn};
use serde_json::{Map, Value};

impl ExchangeOrchestrator {
    pub(crate) async fn manual_check_in(
        &self,
        version: String,
        check_in: ManualCheckIn,
    ) -> ScreenResponse {
        let mut response = ScreenResponse::new(version, check_in.next_screen.clone());
        response.data.extend(check_in.echoed.clone());
        response
            .set("companyId", check_in.company.company_id.clone())
            .set("timeZone", check_in.company.time_zone_name.clone());

        let name = check_in.employee.name.clone();
        let succeeded = match self.record_manual_check_in(&check_in).await {
            Ok(Some((url, at))) => {
                let caption = format!(
                    "A quick update to let you know that {} has checked in at {}.",
                    name,
                    at.with_timezone(&check_in.company.time_zone).format("%-I:%M %p")
                );
                self.notify_owners(check_in.owner_numbers, url, caption);
                true
            }
            Ok(None) => false,
            Err(e) => {
                self.recovered(&e, "manual_checkin");
                false
            }
        };

        response.set("checkInResponseText", punch_text(Punch::CheckIn, succeeded, &name));
        response
    }

    /// Returns the stored photo URL and check-in instant when written
    async fn record_manual_check_in(
        &self,
        check_in: &ManualCheckIn,
    ) -> Result<Option<(String, DateTime<Utc>)>> {
        let status = AttendanceStatus::parse(&check_in.check_in_status).ok_or_else(|| {
            Error::InvalidPayload(format!(
                "unknown check-in status {:?}",
                check_in.check_in_status
            ))
        })?;

        let url = self.store_attachment(&check_in.image).await?;
        let tz = check_in.company.time_zone;
        let at = local_today(self.clock.now(), tz, check_in.check_in_time)?;

        let outcome = self
            .store
            .create_check_in(NewAttendance {
                employee_id: check_in.employee.id.clone(),
                company_id: check_in.company.company_id.clone(),
                date: at.with_timezone(&tz).date_naive(),
                check_in_time: at,
                check_in_pic: url.clone(),
                status,
            })
            .await
            .map_err(persistence)?;

        Ok(written(outcome, "manual check-in").then_some((url, at)))
    }

    pub(crate) fn manual_punch(&self, version: String, punch: ManualPunch) -> ScreenResponse {
        let (screen, attendance_type, time_label, photo_label) = if punch.is_check_in() {
            (
                MANUAL_PUNCHING_IN_SCREEN,
                "in",
                "Select Check In Time",
                "Upload Check In Photo",
            )
        } else {
            (
                MANUAL_PUNCHING_OUT_SCREEN,
                "out",
                "Check Out Time",
                "Upload Check Out Photo",
            )
        };

        let company_id = punch.data.get("companyId").cloned().unwrap_or(Value::Null);
        let time_zone = punch.data.get("timeZone").cloned().unwrap_or(Value::Null);

        let mut response = ScreenResponse::new(version, screen);
        response.data = punch.data;
        response
            .set(
                "employeeId",
                format!(
                    "{}{sep}{}{sep}{}",
                    punch.employee.id,
                    punch.employee.name,
                    punch.attendance_status,
                    sep = GENERIC_SEPARATOR
                ),
            )
            .set("employeeName", punch.employee.name)
            .set("companyId", company_id)
            .set("timeZone", time_zone)
            .set("attendanceType", attendance_type)
            .set("timeLabel", time_label)
            .set("photoLabel", photo_label)
            .set("checkInResponseText", "");
        response
    }

    pub(crate) async fn generic_in(&self, version: String, punch: GenericPunch) -> ScreenResponse {
        let succeeded = match self.record_generic_in(&punch).await {
            Ok(written) => written,
            Err(e) => {
                self.recovered(&e, "in");
                false
            }
        };
        generic_response(version, &punch, Punch::CheckIn, succeeded)
    }

    async fn record_generic_in(&self, punch: &GenericPunch) -> Result<bool> {
        let url = self.store_attachment(&punch.image).await?;

        let Some(shift) = self
            .store
            .find_employee(&punch.employee.id)
            .await
            .map_err(persistence)?
        else {
            warn!("check-in for unknown employee {}", punch.employee.id);
            return Ok(false);
        };

        let tz = punch.company.time_zone;
        let at = local_today(self.clock.now(), tz, punch.check_time)?;
        let status = self
            .time_engine
            .check_in_status(at, &shift)
            .map_err(classification)?;

        let outcome = self
            .store
            .create_check_in(NewAttendance {
                employee_id: punch.employee.id.clone(),
                company_id: punch.company.company_id.clone(),
                date: at.with_timezone(&tz).date_naive(),
                check_in_time: at,
                check_in_pic: url,
                status,
            })
            .await
            .map_err(persistence)?;

        Ok(written(outcome, "check-in"))
    }

    pub(crate) async fn generic_out(&self, version: String, punch: GenericPunch) -> ScreenResponse {
        let succeeded = match self.record_generic_out(&punch).await {
            Ok(written) => written,
            Err(e) => {
                self.recovered(&e, "out");
                false
            }
        };
        generic_response(version, &punch, Punch::CheckOut, succeeded)
    }

    async fn record_generic_out(&self, punch: &GenericPunch) -> Result<bool> {
        let url = self.store_attachment(&punch.image).await?;

        let tz = punch.company.time_zone;
        let at = local_today(self.clock.now(), tz, punch.check_time)?;

        let Some(attendance) = self
            .store
            .find_open_attendance(
                &punch.employee.id,
                &punch.company.company_id,
                at.with_timezone(&tz).date_naive(),
            )
            .await
            .map_err(persistence)?
        else {
            warn!("check-out without open attendance for {}", punch.employee.id);
            return Ok(false);
        };

        let Some(shift) = self
            .store
            .find_employee(&punch.employee.id)
            .await
            .map_err(persistence)?
        else {
            warn!("check-out for unknown employee {}", punch.employee.id);
            return Ok(false);
        };

        let classification = self
            .time_engine
            .check_out_status(at, &attendance, &shift)
            .map_err(classification)?;

        let outcome = self
            .store
            .record_check_out(
                attendance.id,
                CheckOutUpdate {
                    check_out_time: at,
                    check_out_pic: url,
                    time_spent: classification.time_spent,
                    status: classification.status,
                },
            )
            .await
            .map_err(persistence)?;

        Ok(written(outcome, "check-out"))
    }

    /// Downloads, verifies, decrypts and stores one attachment
    ///
    /// Returns the stored location. The stored file is kept even if a later
    /// step fails.
    async fn store_attachment(&self, image: &MediaAttachment) -> Result<String> {
        let metadata = MediaIntegrityMetadata::from_wire(&image.encryption_metadata)?;
        let blob = self.media_host.fetch(&image.cdn_url).await?;
        debug!("fetched {} encrypted bytes for {}", blob.len(), image.file_name);

        let plaintext = self
            .workers
            .decrypt(blob, metadata, self.config.digest_policy())
            .await?;

        self.artifacts
            .put(&image.file_name, &plaintext)
            .await
            .map_err(persistence)
    }

    /// Sends `caption` to each owner in turn, after the response
    ///
    /// Not part of the request's outcome: failures are logged and dropped.
    fn notify_owners(&self, owners: Vec<String>, url: String, caption: String) {
        if owners.is_empty() {
            return;
        }

        let notifier = self.notifier.clone();
        let delay = self.config.notification_delay;
        tokio::spawn(async move {
            for owner in owners {
                tokio::time::sleep(delay).await;
                match notifier.send_image(&owner, &url, &caption).await {
                    Ok(()) => info!("notified owner {}", owner),
                    Err(e) => warn!("failed to notify owner {}: {}", owner, e),
                }
            }
        });
    }
}

fn generic_response(
    version: String,
    punch: &GenericPunch,
    kind: Punch,
    succeeded: bool,
) -> ScreenResponse {
    let mut response = ScreenResponse::new(version, GENERIC_RESULT_SCREEN);
    response
        .set("companyId", punch.company.company_id.clone())
        .set("timeZone", punch.company.time_zone_name.clone())
        .set("responseText", punch_text(kind, succeeded, &punch.employee.name));
    response
}

/// Failure screen for a recognised action whose fields did not parse
///
/// Lands where the action would have on success, with the failure text the
/// handler would have produced.
pub(crate) fn rejected_response(
    version: String,
    current_screen: Option<String>,
    rejected: RejectedAction,
) -> ScreenResponse {
    let (screen, text_field, punch) = match rejected.kind {
        ActionKind::GenericIn => (
            Some(GENERIC_RESULT_SCREEN.to_string()),
            "responseText",
            Punch::CheckIn,
        ),
        ActionKind::GenericOut => (
            Some(GENERIC_RESULT_SCREEN.to_string()),
            "responseText",
            Punch::CheckOut,
        ),
        ActionKind::ManualCheckIn => (
            rejected.get_str("nextScreen").map(String::from).or(current_screen),
            "checkInResponseText",
            Punch::CheckIn,
        ),
        ActionKind::ManualPunch => (current_screen, "checkInResponseText", Punch::CheckIn),
    };

    let mut response = ScreenResponse {
        version,
        screen,
        data: Map::new(),
    };
    if rejected.kind == ActionKind::ManualCheckIn {
        response.data.extend(echoed_fields(&rejected.data));
    }
    for key in ["companyId", "timeZone"] {
        if let Some(value) = rejected.data.get(key) {
            response.set(key, value.clone());
        }
    }
    response.set(text_field, punch_text(punch, false, &rejected.employee_name));
    response
}

fn written(outcome: StoreOutcome, what: &str) -> bool {
    if !outcome.is_written() {
        warn!("{} not recorded: {:?}", what, outcome);
    }
    outcome.is_written()
}

/// The submitted wall-clock time on the date `now` falls on in `tz`
fn local_today(now: DateTime<Utc>, tz: Tz, time: NaiveTime) -> Result<DateTime<Utc>> {
    let today = now.with_timezone(&tz).date_naive();
    tz.from_local_datetime(&today.and_time(time))
        .earliest()
        .map(|local| local.with_timezone(&Utc))
        .ok_or_else(|| {
            Error::InvalidPayload(format!("{} does not exist on {} in {}", time, today, tz))
        })
}

fn persistence(e: Error) -> Error {
    match e {
        Error::DownstreamPersistenceFailure(_) | Error::InvalidPayload(_) => e,
        other => Error::DownstreamPersistenceFailure(other.to_string()),
    }
}

fn classification(e: Error) -> Error {
    match e {
        Error::ClassificationFailure(_) => e,
        other => Error::ClassificationFailure(other.to_string()),
    }
}
