use crate::error::Error;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Version always reported by the health check
pub const PING_VERSION: &str = "3.0";

/// Screen shown after a generic in/out submission
pub const GENERIC_RESULT_SCREEN: &str = "Screen_Eight";

pub const MANUAL_PUNCHING_IN_SCREEN: &str = "MANUAL_PUNCHING_IN";
pub const MANUAL_PUNCHING_OUT_SCREEN: &str = "MANUAL_PUNCHING_OUT";

/// Plaintext of every encrypted reply
///
/// Never carries key material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenResponse {
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screen: Option<String>,
    pub data: Map<String, Value>,
}

impl ScreenResponse {
    pub fn new(version: impl Into<String>, screen: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            screen: Some(screen.into()),
            data: Map::new(),
        }
    }

    /// `{version: "3.0", data: {status: "active"}}`
    pub fn ping() -> Self {
        let mut data = Map::new();
        data.insert("status".into(), Value::from("active"));
        Self {
            version: PING_VERSION.to_string(),
            screen: None,
            data,
        }
    }

    /// Generic failure screen for requests that could not be interpreted
    pub fn error(version: impl Into<String>, screen: Option<String>, error: &Error) -> Self {
        let mut data = Map::new();
        data.insert("error_message".into(), Value::from(error_message(error)));
        Self {
            version: version.into(),
            screen,
            data,
        }
    }

    /// Sets a data field, replacing any previous value
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.data.insert(key.into(), value.into());
        self
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }
}

/// Text shown to the user for an unusable request
fn error_message(error: &Error) -> &'static str {
    match error {
        Error::UnsupportedAction(_) => "This request type is not supported.",
        Error::InvalidPayload(_) => "The submitted form is incomplete.",
        _ => "Something went wrong. Please try again.",
    }
}

/// Which punch a response text describes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Punch {
    CheckIn,
    CheckOut,
}

impl Punch {
    fn label(&self) -> &'static str {
        match self {
            Punch::CheckIn => "Check In",
            Punch::CheckOut => "Check Out",
        }
    }
}

/// `✅️ Check In Success - <name>` or `❌ Check In Failed - <name>`
pub fn punch_text(punch: Punch, succeeded: bool, name: &str) -> String {
    if succeeded {
        format!("\u{2705}\u{fe0f} {} Success - {}", punch.label(), name)
    } else {
        format!("\u{274c} {} Failed - {}", punch.label(), name)
    }
}
