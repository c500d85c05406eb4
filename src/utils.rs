use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, Utc};
use directories::{BaseDirs, ProjectDirs};
use std::path::PathBuf;

/// Profile mode for the application (dev or prod)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    Dev,
    Prod,
}

impl Profile {
    fn app_name(self) -> &'static str {
        match self {
            Profile::Dev => "ideaboard-dev",
            Profile::Prod => "ideaboard",
        }
    }
}

/// Get the configuration directory path
/// If profile is Dev, uses "ideaboard-dev" instead of "ideaboard"
pub fn get_config_dir(profile: Profile) -> Option<PathBuf> {
    ProjectDirs::from("com", "ideaboard", profile.app_name())
        .map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the data directory path
pub fn get_data_dir(profile: Profile) -> Option<PathBuf> {
    ProjectDirs::from("com", "ideaboard", profile.app_name())
        .map(|dirs| dirs.data_dir().to_path_buf())
}

/// Expand `~` in a path string to the user's home directory
pub fn expand_path(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = BaseDirs::new().map(|d| d.home_dir().to_path_buf()) {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Parse a scheduling date as local wall-clock time.
///
/// Accepts RFC 3339, the `YYYY-MM-DDTHH:MM[:SS]` form a datetime-local input
/// produces, `YYYY-MM-DD HH:MM[:SS]`, and a bare `YYYY-MM-DD` (midnight).
pub fn parse_schedule(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Local).naive_local());
    }

    const FORMATS: &[&str] = &[
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%d %H:%M:%S",
    ];
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Get the current UTC date as an ISO 8601 string (YYYY-MM-DD)
pub fn get_current_date_string() -> String {
    Utc::now().format("%Y-%m-%d").to_string()
}

/// Current local wall-clock time, comparable with [`parse_schedule`] output
pub fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn parses_datetime_local_form() {
        let dt = parse_schedule("2024-03-05T14:30").unwrap();
        assert_eq!((dt.year(), dt.month(), dt.day()), (2024, 3, 5));
        assert_eq!((dt.hour(), dt.minute()), (14, 30));
    }

    #[test]
    fn parses_bare_date_as_midnight() {
        let dt = parse_schedule("2024-03-05").unwrap();
        assert_eq!((dt.hour(), dt.minute(), dt.second()), (0, 0, 0));
    }

    #[test]
    fn parses_space_separated_and_rfc3339() {
        assert!(parse_schedule("2024-03-05 08:15").is_some());
        assert!(parse_schedule("2024-03-05T08:15:00Z").is_some());
        assert!(parse_schedule("2024-03-05T08:15:00.123").is_some());
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_schedule("next tuesday").is_none());
        assert!(parse_schedule("").is_none());
        assert!(parse_schedule("2024-13-40").is_none());
    }

    #[test]
    fn expands_home_prefix_only() {
        assert_eq!(expand_path("/tmp/x"), PathBuf::from("/tmp/x"));
        assert_eq!(expand_path("relative/x"), PathBuf::from("relative/x"));
        if let Some(home) = BaseDirs::new().map(|d| d.home_dir().to_path_buf()) {
            assert_eq!(expand_path("~/ideas.db"), home.join("ideas.db"));
        }
    }
}
