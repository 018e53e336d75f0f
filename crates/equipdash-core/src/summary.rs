use std::fmt;
use std::path::Path;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryPayload {
    pub filename: String,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub uploaded_at: Option<DateTime<Utc>>,
    pub stats: Stats,
    #[serde(default)]
    pub distribution: Vec<DistributionEntry>,
    #[serde(default)]
    pub data: Vec<RecordRow>,
}

/// Aggregates computed by the service. Averages over an empty upload come back
/// as `null` and are read as zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub total_count: u64,
    #[serde(deserialize_with = "null_as_zero")]
    pub avg_flow: f64,
    #[serde(deserialize_with = "null_as_zero")]
    pub avg_pressure: f64,
    #[serde(deserialize_with = "null_as_zero")]
    pub avg_temp: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionEntry {
    pub equipment_type: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordRow {
    pub equipment_name: String,
    pub equipment_type: String,
    pub flowrate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadRecord {
    pub id: u64,
    pub file_name: String,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub uploaded_at: Option<DateTime<Utc>>,
}

/// A CSV file staged for upload.
#[derive(Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl fmt::Debug for UploadFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadFile")
            .field("filename", &self.filename)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl UploadFile {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            bytes: bytes.into(),
        }
    }

    pub async fn read(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let filename = path
            .file_name()
            .and_then(|v| v.to_str())
            .unwrap_or("upload.csv")
            .to_string();
        Ok(Self { filename, bytes })
    }
}

fn null_as_zero<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(0.0))
}

/// Timestamps without an offset are taken as UTC; anything unparseable is dropped
/// rather than failing the whole payload.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = match Option::<serde_json::Value>::deserialize(deserializer)? {
        Some(serde_json::Value::String(raw)) => raw,
        _ => return Ok(None),
    };
    Ok(parse_timestamp(raw.trim()))
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_tolerates_null_averages_and_extra_row_fields() {
        let json = serde_json::json!({
            "filename": "plant.csv",
            "uploaded_at": "2026-02-15T10:30:00.123456Z",
            "stats": { "total_count": 0, "avg_flow": null, "avg_pressure": null, "avg_temp": null },
            "distribution": [],
            "data": [{
                "id": 1,
                "upload": 3,
                "equipment_name": "Pump-1",
                "equipment_type": "Pump",
                "flowrate": 120,
                "pressure": 5.2,
                "temperature": 110
            }]
        });

        let payload: SummaryPayload = serde_json::from_value(json).expect("decode payload");

        assert_eq!(payload.stats.avg_flow, 0.0);
        assert_eq!(payload.stats.avg_temp, 0.0);
        assert_eq!(payload.data[0].flowrate, 120.0);
        assert!(payload.uploaded_at.is_some());
    }

    #[test]
    fn payload_defaults_missing_collections_to_empty() {
        let json = serde_json::json!({
            "filename": "plant.csv",
            "stats": { "total_count": 3, "avg_flow": 1.0, "avg_pressure": 2.0, "avg_temp": 3.0 }
        });

        let payload: SummaryPayload = serde_json::from_value(json).expect("decode payload");

        assert!(payload.distribution.is_empty());
        assert!(payload.data.is_empty());
        assert!(payload.uploaded_at.is_none());
    }

    fn with_timestamp(uploaded_at: serde_json::Value) -> SummaryPayload {
        let json = serde_json::json!({
            "filename": "plant.csv",
            "uploaded_at": uploaded_at,
            "stats": { "total_count": 1, "avg_flow": 1.0, "avg_pressure": 2.0, "avg_temp": 3.0 }
        });
        serde_json::from_value(json).expect("decode payload")
    }

    #[test]
    fn naive_timestamp_is_read_as_utc() {
        let payload = with_timestamp(serde_json::json!("2026-02-15T10:30:00.123456"));

        let ts = payload.uploaded_at.expect("timestamp");
        assert_eq!(ts.to_rfc3339(), "2026-02-15T10:30:00.123456+00:00");
    }

    #[test]
    fn offset_timestamp_is_converted_to_utc() {
        let payload = with_timestamp(serde_json::json!("2026-02-15T12:30:00+02:00"));

        let ts = payload.uploaded_at.expect("timestamp");
        assert_eq!(ts.to_rfc3339(), "2026-02-15T10:30:00+00:00");
    }

    #[test]
    fn unparseable_timestamp_does_not_fail_the_payload() {
        assert_eq!(with_timestamp(serde_json::json!("yesterday")).uploaded_at, None);
        assert_eq!(with_timestamp(serde_json::json!(1_700_000_000)).uploaded_at, None);
        assert_eq!(with_timestamp(serde_json::Value::Null).uploaded_at, None);
    }

    #[test]
    fn history_record_tolerates_naive_timestamp() {
        let json = serde_json::json!([
            { "id": 1, "file_name": "a.csv", "uploaded_at": "2026-02-14 08:00:00" },
            { "id": 2, "file_name": "b.csv", "uploaded_at": "not a date" }
        ]);

        let records: Vec<UploadRecord> = serde_json::from_value(json).expect("decode history");

        assert!(records[0].uploaded_at.is_some());
        assert_eq!(records[1].uploaded_at, None);
    }

    #[tokio::test]
    async fn upload_file_reads_name_and_bytes_from_disk() {
        let mut path = std::env::temp_dir();
        path.push(format!("equipdash-upload-{}.csv", std::process::id()));
        std::fs::write(&path, b"Equipment Name,Type\n").expect("write csv");

        let file = UploadFile::read(&path).await.expect("read csv");

        assert_eq!(file.bytes, b"Equipment Name,Type\n");
        assert!(file.filename.starts_with("equipdash-upload-"));
        let _ = std::fs::remove_file(path);
    }
}
