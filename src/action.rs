//! Typed actions carried by a decrypted form payload
//!
//! `action == "ping"` is the platform health check. Every other submission is
//! dispatched on `data.type`, and each variant carries the fields its handler
//! needs, parsed up front so handlers never look at raw JSON.

use crate::envelope::DecryptedPayload;
use crate::error::{Error, Result};
use crate::media::MediaAttachment;

use chrono::NaiveTime;
use chrono_tz::Tz;
use serde_json::{Map, Value};

/// Separator in manual-flow employee references, `id_@_name[_@_status]`
pub const MANUAL_SEPARATOR: &str = "_@_";

/// Separator in generic in/out employee references, `id:name`
pub const GENERIC_SEPARATOR: &str = ":";

/// Prefix of form fields echoed back on the manual check-in screen
pub const EMPLOYEE_FIELD_PREFIX: &str = "employee";

/// One recognised submission
#[derive(Debug, Clone, PartialEq)]
pub enum FlowAction {
    Ping,
    ManualCheckIn(ManualCheckIn),
    ManualPunch(ManualPunch),
    GenericIn(GenericPunch),
    GenericOut(GenericPunch),
}

impl FlowAction {
    /// Interprets a decrypted payload
    pub fn parse(payload: &DecryptedPayload) -> Result<Self> {
        if payload.is_ping() {
            return Ok(FlowAction::Ping);
        }

        let data = payload
            .data
            .as_object()
            .ok_or_else(|| Error::InvalidPayload("data is not an object".into()))?;

        let kind = match data.get("type").and_then(Value::as_str) {
            Some(tag) => ActionKind::from_tag(tag)
                .ok_or_else(|| Error::UnsupportedAction(tag.to_string()))?,
            None => {
                return Err(Error::UnsupportedAction(format!(
                    "action {:?} without data.type",
                    payload.action
                )))
            }
        };

        match kind {
            ActionKind::ManualCheckIn => ManualCheckIn::parse(data).map(FlowAction::ManualCheckIn),
            ActionKind::ManualPunch => ManualPunch::parse(data).map(FlowAction::ManualPunch),
            ActionKind::GenericIn => GenericPunch::parse(data).map(FlowAction::GenericIn),
            ActionKind::GenericOut => GenericPunch::parse(data).map(FlowAction::GenericOut),
        }
    }

    /// Short name for logs and metric labels
    pub fn name(&self) -> &'static str {
        match self {
            FlowAction::Ping => "ping",
            FlowAction::ManualCheckIn(_) => "manual_checkin",
            FlowAction::ManualPunch(_) => "manual_punching",
            FlowAction::GenericIn(_) => "in",
            FlowAction::GenericOut(_) => "out",
        }
    }
}

/// The `data.type` tags this service handles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    ManualCheckIn,
    ManualPunch,
    GenericIn,
    GenericOut,
}

impl ActionKind {
    /// The `data.type` tag
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::ManualCheckIn => "manual_checkin",
            ActionKind::ManualPunch => "manual_punching",
            ActionKind::GenericIn => "in",
            ActionKind::GenericOut => "out",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "manual_checkin" => Some(ActionKind::ManualCheckIn),
            "manual_punching" => Some(ActionKind::ManualPunch),
            "in" => Some(ActionKind::GenericIn),
            "out" => Some(ActionKind::GenericOut),
            _ => None,
        }
    }
}

/// A recognised submission whose fields could not be parsed
///
/// Carries what can still be read leniently, so the reply can name the
/// employee and land on the screen a successful submission would.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedAction {
    pub kind: ActionKind,
    /// Empty when no employee reference could be read
    pub employee_name: String,
    pub data: Map<String, Value>,
}

impl RejectedAction {
    /// Returns `None` unless `data.type` names a handled action
    pub fn from_payload(payload: &DecryptedPayload) -> Option<Self> {
        let data = payload.data.as_object()?;
        let kind = ActionKind::from_tag(data.get("type").and_then(Value::as_str)?)?;

        let employee_name = match kind {
            ActionKind::GenericIn | ActionKind::GenericOut => data
                .get("employeeId")
                .and_then(Value::as_str)
                .map(|raw| EmployeeRef::name_of(raw, GENERIC_SEPARATOR)),
            ActionKind::ManualCheckIn => data
                .get("employeeId")
                .and_then(Value::as_str)
                .map(|raw| EmployeeRef::name_of(raw, MANUAL_SEPARATOR)),
            ActionKind::ManualPunch => ManualPunch::selection(data)
                .map(|raw| EmployeeRef::name_of(raw, MANUAL_SEPARATOR)),
        }
        .unwrap_or_default();

        Some(Self {
            kind,
            employee_name,
            data: data.clone(),
        })
    }

    /// Raw string field, if present
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }
}

/// `employee*` fields, echoed on the manual check-in screen
pub(crate) fn echoed_fields(data: &Map<String, Value>) -> Map<String, Value> {
    data.iter()
        .filter(|(key, _)| key.starts_with(EMPLOYEE_FIELD_PREFIX))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Employee reference split out of a form field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmployeeRef {
    pub id: String,
    pub name: String,
}

impl EmployeeRef {
    /// Takes the first two segments; anything after a second separator is
    /// ignored, so `id:name:status` yields `id` and `name`
    fn split(raw: &str, separator: &str) -> Result<Self> {
        let mut parts = raw.split(separator);
        match (parts.next(), parts.next()) {
            (Some(id), Some(name)) if !id.is_empty() => Ok(Self {
                id: id.to_string(),
                name: name.to_string(),
            }),
            _ => Err(Error::InvalidPayload(format!(
                "employee reference {:?} is not id and name",
                raw
            ))),
        }
    }

    /// Name segment of a reference, or empty when there is none
    fn name_of(raw: &str, separator: &str) -> String {
        raw.split(separator).nth(1).unwrap_or_default().to_string()
    }
}

/// Location and time zone shared by the attachment-bearing actions
#[derive(Debug, Clone, PartialEq)]
pub struct CompanyContext {
    pub company_id: String,
    /// Zone name as submitted, echoed back unchanged
    pub time_zone_name: String,
    pub time_zone: Tz,
}

impl CompanyContext {
    fn parse(data: &Map<String, Value>) -> Result<Self> {
        let time_zone_name = required_str(data, "timeZone")?.to_string();
        let time_zone = time_zone_name.parse::<Tz>().map_err(|e| {
            Error::InvalidPayload(format!("unknown time zone {:?}: {}", time_zone_name, e))
        })?;

        Ok(Self {
            company_id: required_str(data, "companyId")?.to_string(),
            time_zone_name,
            time_zone,
        })
    }
}

/// Supervisor-submitted check-in on behalf of an employee
#[derive(Debug, Clone, PartialEq)]
pub struct ManualCheckIn {
    pub employee: EmployeeRef,
    pub company: CompanyContext,
    /// Local wall-clock check-in time
    pub check_in_time: NaiveTime,
    /// Status chosen on the form, stored as is
    pub check_in_status: String,
    pub next_screen: String,
    pub owner_numbers: Vec<String>,
    /// `employee*` fields, echoed on the next screen
    pub echoed: Map<String, Value>,
    pub image: MediaAttachment,
}

impl ManualCheckIn {
    fn parse(data: &Map<String, Value>) -> Result<Self> {
        let owner_numbers = data
            .get("ownerNumbers")
            .and_then(Value::as_str)
            .map(|raw| {
                raw.split(MANUAL_SEPARATOR)
                    .map(str::trim)
                    .filter(|n| !n.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            employee: EmployeeRef::split(required_str(data, "employeeId")?, MANUAL_SEPARATOR)?,
            company: CompanyContext::parse(data)?,
            check_in_time: parse_clock(required_str(data, "checkInTime")?)?,
            check_in_status: data
                .get("checkInStatus")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            next_screen: required_str(data, "nextScreen")?.to_string(),
            owner_numbers,
            echoed: echoed_fields(data),
            image: first_image(data)?,
        })
    }
}

/// Selection of an employee from the manual punching list
#[derive(Debug, Clone, PartialEq)]
pub struct ManualPunch {
    pub employee: EmployeeRef,
    /// Today's status; empty when the employee has not checked in yet
    pub attendance_status: String,
    /// The submitted form data, echoed on the next screen
    pub data: Map<String, Value>,
}

impl ManualPunch {
    const LIST_FIELDS: [&'static str; 4] = ["employee1", "employee2", "employee3", "employee4"];

    /// First non-empty `employee1..employee4` value
    fn selection(data: &Map<String, Value>) -> Option<&str> {
        Self::LIST_FIELDS
            .iter()
            .filter_map(|field| data.get(*field).and_then(Value::as_str))
            .find(|value| !value.is_empty())
    }

    fn parse(data: &Map<String, Value>) -> Result<Self> {
        let raw = Self::selection(data)
            .ok_or_else(|| Error::InvalidPayload("no employee selected".into()))?;

        let mut parts = raw.splitn(3, MANUAL_SEPARATOR);
        let id = parts.next().unwrap_or_default();
        let name = parts.next();
        let status = parts.next().unwrap_or_default();

        match name {
            Some(name) if !id.is_empty() => Ok(Self {
                employee: EmployeeRef {
                    id: id.to_string(),
                    name: name.to_string(),
                },
                attendance_status: status.to_string(),
                data: data.clone(),
            }),
            _ => Err(Error::InvalidPayload(format!(
                "employee selection {:?} is not id, name and status",
                raw
            ))),
        }
    }

    /// True when the employee still needs to check in today
    pub fn is_check_in(&self) -> bool {
        self.attendance_status.is_empty()
    }
}

/// Employee-submitted check-in or check-out with a photo
#[derive(Debug, Clone, PartialEq)]
pub struct GenericPunch {
    pub employee: EmployeeRef,
    pub company: CompanyContext,
    /// Local wall-clock time of the punch
    pub check_time: NaiveTime,
    pub image: MediaAttachment,
}

impl GenericPunch {
    fn parse(data: &Map<String, Value>) -> Result<Self> {
        Ok(Self {
            employee: EmployeeRef::split(required_str(data, "employeeId")?, GENERIC_SEPARATOR)?,
            company: CompanyContext::parse(data)?,
            check_time: parse_clock(required_str(data, "checkTime")?)?,
            image: first_image(data)?,
        })
    }
}

fn required_str<'a>(data: &'a Map<String, Value>, key: &str) -> Result<&'a str> {
    data.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| Error::InvalidPayload(format!("missing string field {}", key)))
}

/// Parses `HH:MM`
fn parse_clock(raw: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .map_err(|e| Error::InvalidPayload(format!("time {:?}: {}", raw, e)))
}

fn first_image(data: &Map<String, Value>) -> Result<MediaAttachment> {
    let image = data
        .get("images")
        .and_then(Value::as_array)
        .and_then(|images| images.first())
        .ok_or_else(|| Error::InvalidPayload("no image attached".into()))?;

    serde_json::from_value(image.clone())
        .map_err(|e| Error::InvalidPayload(format!("image reference: {}", e)))
}
