use crate::domain::models::WorkingHours;
use crate::infrastructure::error::InfraError;
use chrono::NaiveTime;
use chrono_tz::Tz;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

const APP_JSON: &str = "app.json";
const CALENDARS_JSON: &str = "calendars.json";
const SCHEDULING_JSON: &str = "scheduling.json";

pub const DEFAULT_EVENT_MARKER: &str = "⭐";
const DEFAULT_SWEEP_INTERVAL_MINUTES: u64 = 30;

fn default_files() -> HashMap<&'static str, serde_json::Value> {
    HashMap::from([
        (
            APP_JSON,
            serde_json::json!({
                "schema": 1,
                "appName": "QuestCal",
                "timezone": "UTC",
                "eventMarker": DEFAULT_EVENT_MARKER
            }),
        ),
        (
            CALENDARS_JSON,
            serde_json::json!({
                "schema": 1,
                "questsCalendarId": "primary",
                "busyCalendarIds": ["primary"]
            }),
        ),
        (
            SCHEDULING_JSON,
            serde_json::json!({
                "schema": 1,
                "workHours": {
                    "start": "08:00",
                    "end": "22:00"
                },
                "sweepIntervalMinutes": DEFAULT_SWEEP_INTERVAL_MINUTES,
                "suggestionCount": 5,
                "lookaheadDays": 30
            }),
        ),
    ])
}

pub fn ensure_default_configs(config_dir: &Path) -> Result<(), InfraError> {
    for (name, value) in default_files() {
        let path = config_dir.join(name);
        if !path.exists() {
            let formatted = serde_json::to_string_pretty(&value)?;
            fs::write(path, format!("{formatted}\n"))?;
        }
    }
    Ok(())
}

fn read_config(path: &Path) -> Result<serde_json::Value, InfraError> {
    let raw = fs::read_to_string(path)?;
    let parsed: serde_json::Value = serde_json::from_str(&raw)?;
    let schema = parsed
        .get("schema")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| InfraError::InvalidConfig(format!("missing schema in {}", path.display())))?;
    if schema != 1 {
        return Err(InfraError::InvalidConfig(format!(
            "unsupported schema {} in {}",
            schema,
            path.display()
        )));
    }
    Ok(parsed)
}

pub fn read_timezone(config_dir: &Path) -> Result<Tz, InfraError> {
    let app = read_config(&config_dir.join(APP_JSON))?;
    let name = app
        .get("timezone")
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or("UTC");
    name.parse::<Tz>()
        .map_err(|_| InfraError::InvalidConfig(format!("unknown timezone '{name}' in app.json")))
}

pub fn read_event_marker(config_dir: &Path) -> Result<String, InfraError> {
    let app = read_config(&config_dir.join(APP_JSON))?;
    Ok(app
        .get("eventMarker")
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(DEFAULT_EVENT_MARKER)
        .to_string())
}

pub fn read_quests_calendar_id(config_dir: &Path) -> Result<String, InfraError> {
    let calendars = read_config(&config_dir.join(CALENDARS_JSON))?;
    Ok(calendars
        .get("questsCalendarId")
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or("primary")
        .to_string())
}

pub fn read_busy_calendar_ids(config_dir: &Path) -> Result<Vec<String>, InfraError> {
    let calendars = read_config(&config_dir.join(CALENDARS_JSON))?;
    Ok(calendars
        .get("busyCalendarIds")
        .and_then(serde_json::Value::as_array)
        .map(|values| {
            values
                .iter()
                .filter_map(serde_json::Value::as_str)
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(ToOwned::to_owned)
                .collect()
        })
        .unwrap_or_else(|| vec!["primary".to_string()]))
}

pub fn read_working_hours(config_dir: &Path) -> Result<WorkingHours, InfraError> {
    let scheduling = read_config(&config_dir.join(SCHEDULING_JSON))?;
    let hours = scheduling.get("workHours");
    let start = parse_hhmm_field(hours, "start", "08:00")?;
    let end = parse_hhmm_field(hours, "end", "22:00")?;
    let timezone = read_timezone(config_dir)?;

    let working_hours = WorkingHours { start, end, timezone };
    working_hours
        .validate()
        .map_err(InfraError::InvalidConfig)?;
    Ok(working_hours)
}

pub fn read_sweep_interval_minutes(config_dir: &Path) -> Result<u64, InfraError> {
    let scheduling = read_config(&config_dir.join(SCHEDULING_JSON))?;
    let minutes = scheduling
        .get("sweepIntervalMinutes")
        .and_then(serde_json::Value::as_u64)
        .unwrap_or(DEFAULT_SWEEP_INTERVAL_MINUTES);
    if minutes == 0 {
        return Err(InfraError::InvalidConfig(
            "sweepIntervalMinutes must be > 0".to_string(),
        ));
    }
    Ok(minutes)
}

fn parse_hhmm_field(
    hours: Option<&serde_json::Value>,
    field: &str,
    default: &str,
) -> Result<NaiveTime, InfraError> {
    let raw = hours
        .and_then(|value| value.get(field))
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(default);
    NaiveTime::parse_from_str(raw, "%H:%M").map_err(|error| {
        InfraError::InvalidConfig(format!("workHours.{field} must be HH:MM, got '{raw}': {error}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_written_once_and_parse() {
        let dir = tempfile::tempdir().expect("tempdir");
        ensure_default_configs(dir.path()).expect("write defaults");

        let hours = read_working_hours(dir.path()).expect("working hours");
        assert_eq!(hours.start, NaiveTime::from_hms_opt(8, 0, 0).expect("valid time"));
        assert_eq!(hours.end, NaiveTime::from_hms_opt(22, 0, 0).expect("valid time"));
        assert_eq!(hours.timezone, chrono_tz::UTC);

        assert_eq!(read_sweep_interval_minutes(dir.path()).expect("interval"), 30);
        assert_eq!(read_quests_calendar_id(dir.path()).expect("calendar"), "primary");
        assert_eq!(
            read_busy_calendar_ids(dir.path()).expect("busy"),
            vec!["primary".to_string()]
        );
        assert_eq!(read_event_marker(dir.path()).expect("marker"), DEFAULT_EVENT_MARKER);

        // a second run must not overwrite user edits
        let scheduling_path = dir.path().join("scheduling.json");
        fs::write(
            &scheduling_path,
            "{\"schema\":1,\"workHours\":{\"start\":\"09:30\",\"end\":\"18:00\"}}\n",
        )
        .expect("edit config");
        ensure_default_configs(dir.path()).expect("second run");
        let hours = read_working_hours(dir.path()).expect("working hours");
        assert_eq!(hours.start, NaiveTime::from_hms_opt(9, 30, 0).expect("valid time"));
    }

    #[test]
    fn unknown_schema_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("app.json"), "{\"schema\":2}\n").expect("write config");
        assert!(read_timezone(dir.path()).is_err());
    }

    #[test]
    fn unknown_timezone_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(
            dir.path().join("app.json"),
            "{\"schema\":1,\"timezone\":\"Mars/Olympus\"}\n",
        )
        .expect("write config");
        assert!(read_timezone(dir.path()).is_err());
    }
}
