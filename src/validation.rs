//! Insert-payload checks run at the route boundary before any storage call.

use chrono::{NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use utoipa::ToSchema;

use crate::models::{AnalyticsPayload, NewActivityLog, NewInjury, NewPainEntry, PainMarker};

pub const MIN_INTENSITY: u8 = 1;
pub const MAX_INTENSITY: u8 = 5;
pub const MIN_BRUSH_SIZE: u32 = 1;
pub const MAX_BRUSH_SIZE: u32 = 200;
pub const MAX_PAIN_LEVEL: f64 = 5.0;
pub const MAX_TEXT_LEN: usize = 2000;
pub const MAX_NOTES_LEN: usize = 5000;
pub const MAX_NAME_LEN: usize = 200;
pub const MAX_EVENT_LEN: usize = 100;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("static email pattern"));

/// A single rejected field, addressed by a dotted path (`painMarkers.0.intensity`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct FieldIssue {
    pub path: String,
    pub message: String,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ValidationError {
    pub message: String,
    pub issues: Vec<FieldIssue>,
}

impl ValidationError {
    pub fn single(message: &str, path: &str, issue: &str) -> Self {
        Self {
            message: message.to_string(),
            issues: vec![FieldIssue { path: path.to_string(), message: issue.to_string() }],
        }
    }
}

/// Accumulates issues so a client sees every problem in one response.
struct Issues {
    message: &'static str,
    issues: Vec<FieldIssue>,
}

impl Issues {
    fn new(message: &'static str) -> Self {
        Self { message, issues: Vec::new() }
    }

    fn push(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.issues.push(FieldIssue { path: path.into(), message: message.into() });
    }

    fn finish(self) -> Result<(), ValidationError> {
        if self.issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { message: self.message.to_string(), issues: self.issues })
        }
    }
}

pub fn validate_marker(marker: &PainMarker) -> Result<(), ValidationError> {
    let mut issues = Issues::new("Invalid pain marker");
    check_marker("", marker, &mut issues);
    issues.finish()
}

fn check_marker(prefix: &str, marker: &PainMarker, issues: &mut Issues) {
    if !(MIN_INTENSITY..=MAX_INTENSITY).contains(&marker.intensity) {
        issues.push(
            format!("{prefix}intensity"),
            format!("must be between {MIN_INTENSITY} and {MAX_INTENSITY}"),
        );
    }
    if marker.points.is_empty() {
        issues.push(format!("{prefix}points"), "must contain at least one point");
    }
    for (i, p) in marker.points.iter().enumerate() {
        if !p.x.is_finite() || !p.y.is_finite() {
            issues.push(format!("{prefix}points.{i}"), "coordinates must be finite numbers");
        }
    }
    if !(MIN_BRUSH_SIZE..=MAX_BRUSH_SIZE).contains(&marker.brush_size) {
        issues.push(
            format!("{prefix}brushSize"),
            format!("must be between {MIN_BRUSH_SIZE} and {MAX_BRUSH_SIZE}"),
        );
    }
}

pub fn validate_pain_entry(new: &NewPainEntry) -> Result<(), ValidationError> {
    let mut issues = Issues::new("Invalid pain entry data");
    if new.image_url.trim().is_empty() {
        issues.push("imageUrl", "is required");
    }
    for (i, marker) in new.pain_markers.iter().enumerate() {
        check_marker(&format!("painMarkers.{i}."), marker, &mut issues);
    }
    if new.notes.as_ref().is_some_and(|n| n.chars().count() > MAX_NOTES_LEN) {
        issues.push("notes", format!("must be at most {MAX_NOTES_LEN} characters"));
    }
    issues.finish()
}

pub fn validate_activity_log(new: &NewActivityLog) -> Result<(), ValidationError> {
    let mut issues = Issues::new("Invalid activity log data");
    if new.steps < 0 {
        issues.push("steps", "must not be negative");
    }
    if !new.pain_level.is_finite() || !(0.0..=MAX_PAIN_LEVEL).contains(&new.pain_level) {
        issues.push("painLevel", format!("must be between 0 and {MAX_PAIN_LEVEL}"));
    }
    if new.activity.chars().count() > MAX_TEXT_LEN {
        issues.push("activity", format!("must be at most {MAX_TEXT_LEN} characters"));
    }
    if new.symptoms.chars().count() > MAX_TEXT_LEN {
        issues.push("symptoms", format!("must be at most {MAX_TEXT_LEN} characters"));
    }
    issues.finish()
}

pub fn validate_injury(new: &NewInjury) -> Result<(), ValidationError> {
    validate_injury_on(new, Utc::now().date_naive())
}

/// `today` is injected so the future-date rule is testable.
pub fn validate_injury_on(new: &NewInjury, today: NaiveDate) -> Result<(), ValidationError> {
    let mut issues = Issues::new("Invalid injury data");
    let name_len = new.name.trim().chars().count();
    if name_len == 0 {
        issues.push("name", "is required");
    } else if name_len > MAX_NAME_LEN {
        issues.push("name", format!("must be at most {MAX_NAME_LEN} characters"));
    }
    if new.description.as_ref().is_some_and(|d| d.chars().count() > MAX_TEXT_LEN) {
        issues.push("description", format!("must be at most {MAX_TEXT_LEN} characters"));
    }
    if new.date_of_injury > today {
        issues.push("dateOfInjury", "must not be in the future");
    }
    issues.finish()
}

pub fn validate_analytics(payload: &AnalyticsPayload) -> Result<(), ValidationError> {
    let mut issues = Issues::new("Invalid analytics event");
    let len = payload.event.trim().chars().count();
    if len == 0 {
        issues.push("event", "is required");
    } else if len > MAX_EVENT_LEN {
        issues.push("event", format!("must be at most {MAX_EVENT_LEN} characters"));
    }
    if !(payload.metadata.is_null() || payload.metadata.is_object()) {
        issues.push("metadata", "must be an object");
    }
    issues.finish()
}

/// Returns the trimmed, lower-cased address.
pub fn normalize_email(raw: &str) -> Result<String, ValidationError> {
    let email = raw.trim().to_lowercase();
    if email.len() > 254 || !EMAIL_RE.is_match(&email) {
        return Err(ValidationError::single("Invalid email address", "email", "must be a valid email address"));
    }
    Ok(email)
}

/// Parses a `YYYY-MM-DD` path segment.
pub fn parse_date(raw: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| ValidationError::single("Invalid date", "date", "expected YYYY-MM-DD"))
}
