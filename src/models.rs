use serde::Serialize;
use std::fmt;

/// Shown in place of an empty idea name.
pub const NO_NAME: &str = "no name";
/// Shown in place of an empty category.
pub const NO_CATEGORY: &str = "no category";

/// Canonical idea status.
///
/// Older exports spell these in other ways ("progreso", "pausado",
/// "in-progress"); everything is folded into one of the two variants when a
/// record is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Progress,
    Paused,
}

impl Status {
    /// Resolve any known spelling to a canonical status.
    ///
    /// Anything that is not recognisably "in progress" counts as paused,
    /// which is how the board has always sorted unknown values.
    pub fn from_legacy(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "progress" | "progreso" | "in-progress" | "in_progress" | "en-progreso" => {
                Status::Progress
            }
            _ => Status::Paused,
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Status::Progress => Status::Paused,
            Status::Paused => Status::Progress,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Progress => "progress",
            Status::Paused => "paused",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single idea on the board.
///
/// Serialization always writes the canonical field names. Deserialization goes
/// through [`crate::legacy`] so that records written under older field names
/// load transparently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, serde::Deserialize)]
#[serde(try_from = "serde_json::Value")]
pub struct Idea {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: String,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>, // ISO 8601, as entered
    pub notify: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>, // data URI
    pub timestamp: i64,        // milliseconds since the Unix epoch
}

impl Idea {
    /// A new idea with no id yet; the store mints one on first save.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            name: name.into(),
            description: String::new(),
            category: String::new(),
            status: Status::Progress,
            date: None,
            notify: false,
            image: None,
            timestamp: now_millis(),
        }
    }

    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            NO_NAME
        } else {
            &self.name
        }
    }

    pub fn display_category(&self) -> &str {
        if self.category.trim().is_empty() {
            NO_CATEGORY
        } else {
            &self.category
        }
    }
}

/// Current time in milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
