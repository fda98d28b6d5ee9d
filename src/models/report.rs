use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const LOW_ACCURACY_NOTE: &str = "(Location Accuracy Low - Reported Offline)";
pub const REFRESHED_NOTE: &str = "(Location Updated on Reconnect)";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    #[default]
    Fire,
    Flood,
    Accident,
    Medical,
    NaturalDisaster,
    Crime,
    Other,
}


#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    #[default]
    Medium,
    High,
}


/// How much the stored coordinates of a report can be trusted.
///
/// `Low` and `Refreshed` are mutually exclusive: a refresh replaces the low
/// accuracy marker rather than adding a second one.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LocationAccuracy {
    #[default]
    None,
    Low,
    Refreshed,
}

impl LocationAccuracy {
    pub fn note(&self) -> Option<&'static str> {
        match self {
            LocationAccuracy::None => None,
            LocationAccuracy::Low => Some(LOW_ACCURACY_NOTE),
            LocationAccuracy::Refreshed => Some(REFRESHED_NOTE),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// What the user filled in before a location was attached.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportDraft {
    pub description: String,
    pub category: Category,
    pub severity: Severity,
}

/// Identity used to correlate a report across retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReportKey {
    pub submitted_at: DateTime<Utc>,
    pub id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QueuedReport {
    /// Nil for entries written before ids existed; see [`Self::backfill_id`].
    #[serde(default)]
    pub id: Uuid,
    pub latitude: f64,
    pub longitude: f64,
    pub description: String,
    #[serde(default)]
    pub location_accuracy: LocationAccuracy,
    pub category: Category,
    pub severity: Severity,
    pub submitted_at: DateTime<Utc>,
}

impl QueuedReport {
    pub fn new(
        draft: ReportDraft,
        position: Coordinates,
        accuracy: LocationAccuracy,
        submitted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            latitude: position.latitude,
            longitude: position.longitude,
            description: draft.description,
            location_accuracy: accuracy,
            category: draft.category,
            severity: draft.severity,
            submitted_at,
        }
    }

    pub fn key(&self) -> ReportKey {
        ReportKey {
            submitted_at: self.submitted_at,
            id: self.id,
        }
    }

    /// Gives an id-less entry an id derived from its contents, so every load
    /// of the same stored entry yields the same key.
    pub fn backfill_id(&mut self) {
        if !self.id.is_nil() {
            return;
        }
        let seed = format!(
            "{}|{}|{}|{}",
            self.submitted_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            self.latitude,
            self.longitude,
            self.description
        );
        self.id = Uuid::new_v5(&Uuid::NAMESPACE_OID, seed.as_bytes());
    }

    pub fn position(&self) -> Coordinates {
        Coordinates::new(self.latitude, self.longitude)
    }

    /// Move the report to a fresh fix. Repeating this is a no-op on the
    /// annotation.
    pub fn apply_refreshed_location(&mut self, position: Coordinates) {
        self.latitude = position.latitude;
        self.longitude = position.longitude;
        self.location_accuracy = LocationAccuracy::Refreshed;
    }

    /// Description as the remote service sees it, with the accuracy note appended.
    pub fn rendered_description(&self) -> String {
        match self.location_accuracy.note() {
            Some(note) if self.description.is_empty() => note.to_string(),
            Some(note) => format!("{} {}", self.description, note),
            None => self.description.clone(),
        }
    }

    pub fn to_payload(&self) -> ReportPayload {
        ReportPayload {
            lat: self.latitude,
            lng: self.longitude,
            description: self.rendered_description(),
            tag: self.category,
            severity: self.severity,
            timestamp: self
                .submitted_at
                .to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

/// Body of `POST /api/report_emergency`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportPayload {
    pub lat: f64,
    pub lng: f64,
    pub description: String,
    pub tag: Category,
    pub severity: Severity,
    pub timestamp: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample(accuracy: LocationAccuracy) -> QueuedReport {
        QueuedReport::new(
            ReportDraft {
                description: "smoke on 3rd floor".into(),
                category: Category::Fire,
                severity: Severity::High,
            },
            Coordinates::new(20.5937, 78.9629),
            accuracy,
            Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap(),
        )
    }

    #[test]
    fn low_accuracy_becomes_refreshed_not_both() {
        let mut report = sample(LocationAccuracy::Low);
        assert!(report.rendered_description().ends_with(LOW_ACCURACY_NOTE));

        report.apply_refreshed_location(Coordinates::new(12.9, 77.6));
        let rendered = report.rendered_description();
        assert!(rendered.ends_with(REFRESHED_NOTE));
        assert!(!rendered.contains(LOW_ACCURACY_NOTE));
    }

    #[test]
    fn refresh_twice_keeps_a_single_note() {
        let mut report = sample(LocationAccuracy::None);
        report.apply_refreshed_location(Coordinates::new(12.9, 77.6));
        report.apply_refreshed_location(Coordinates::new(13.0, 77.7));

        let rendered = report.rendered_description();
        assert_eq!(rendered.matches(REFRESHED_NOTE).count(), 1);
        assert_eq!(report.position(), Coordinates::new(13.0, 77.7));
    }

    #[test]
    fn payload_uses_backend_field_names() {
        let report = sample(LocationAccuracy::None);
        let json = serde_json::to_value(report.to_payload()).unwrap();

        assert_eq!(json["lat"], 20.5937);
        assert_eq!(json["lng"], 78.9629);
        assert_eq!(json["tag"], "fire");
        assert_eq!(json["severity"], "high");
        assert_eq!(json["timestamp"], "2024-05-01T10:00:00.000Z");
    }

    #[test]
    fn legacy_entries_without_id_still_parse() {
        let raw = r#"{
            "latitude": 1.0,
            "longitude": 2.0,
            "description": "flooded underpass",
            "category": "natural_disaster",
            "severity": "low",
            "submittedAt": "2024-05-01T10:00:00Z"
        }"#;

        let mut report: QueuedReport = serde_json::from_str(raw).unwrap();
        assert_eq!(report.category, Category::NaturalDisaster);
        assert_eq!(report.location_accuracy, LocationAccuracy::None);
        assert!(report.id.is_nil());

        report.backfill_id();
        let mut again: QueuedReport = serde_json::from_str(raw).unwrap();
        again.backfill_id();
        assert!(!report.id.is_nil());
        assert_eq!(report.key(), again.key());
    }

    #[test]
    fn backfill_keeps_existing_ids() {
        let mut report = sample(LocationAccuracy::Low);
        let id = report.id;
        report.backfill_id();
        assert_eq!(report.id, id);
    }
}
