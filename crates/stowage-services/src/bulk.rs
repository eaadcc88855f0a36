//! CSV and JSON encodings for bulk configuration export and import.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::str::FromStr;
use stowage_core::models::{BackendKind, StorageConfig};
use stowage_core::AppError;

const CSV_HEADER: [&str; 13] = [
    "id",
    "user_id",
    "name",
    "access_key",
    "secret_key",
    "region",
    "bucket_name",
    "endpoint_url",
    "use_ssl",
    "storage_type",
    "is_default",
    "created_at",
    "updated_at",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BulkFormat {
    #[default]
    Csv,
    Json,
}

impl BulkFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            BulkFormat::Csv => "text/csv",
            BulkFormat::Json => "application/json",
        }
    }

    pub fn file_name(&self) -> &'static str {
        match self {
            BulkFormat::Csv => "configs.csv",
            BulkFormat::Json => "configs.json",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BulkFormat::Csv => "csv",
            BulkFormat::Json => "json",
        }
    }
}

impl FromStr for BulkFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "csv" => Ok(BulkFormat::Csv),
            "json" => Ok(BulkFormat::Json),
            other => Err(AppError::InvalidInput(format!(
                "Unsupported format '{}', expected csv or json",
                other
            ))),
        }
    }
}

pub fn encode(records: &[StorageConfig], format: BulkFormat) -> Result<Vec<u8>, AppError> {
    match format {
        BulkFormat::Json => Ok(serde_json::to_vec_pretty(records)?),
        BulkFormat::Csv => encode_csv(records),
    }
}

fn encode_csv(records: &[StorageConfig]) -> Result<Vec<u8>, AppError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CSV_HEADER).map_err(csv_error)?;
    for record in records {
        let created_at = record.created_at.to_rfc3339();
        let updated_at = record.updated_at.to_rfc3339();
        writer
            .write_record([
                record.id.as_str(),
                record.owner_id.as_str(),
                record.name.as_str(),
                record.access_key_id.as_str(),
                record.secret_access_key.as_str(),
                record.region.as_str(),
                record.bucket_name.as_str(),
                record.endpoint_url.as_deref().unwrap_or(""),
                bool_str(record.use_tls),
                record.backend_kind.export_name(),
                bool_str(record.is_default),
                created_at.as_str(),
                updated_at.as_str(),
            ])
            .map_err(csv_error)?;
    }
    writer
        .into_inner()
        .map_err(|e| AppError::Internal(format!("Failed to flush CSV export: {}", e)))
}

/// Parse an import payload. Missing timestamps default to `now`.
pub fn decode(
    payload: &[u8],
    format: BulkFormat,
    now: DateTime<Utc>,
) -> Result<Vec<StorageConfig>, AppError> {
    match format {
        BulkFormat::Json => decode_json(payload, now),
        BulkFormat::Csv => decode_csv(payload, now),
    }
}

/// JSON import record. Accepts both the export field names and the legacy CSV-style names.
#[derive(Debug, Deserialize)]
struct ImportRecord {
    #[serde(default)]
    id: String,
    #[serde(alias = "user_id")]
    owner_id: String,
    #[serde(default)]
    name: String,
    #[serde(default, alias = "storage_type")]
    backend_kind: Option<String>,
    #[serde(alias = "access_key")]
    access_key_id: String,
    #[serde(alias = "secret_key")]
    secret_access_key: String,
    #[serde(default)]
    region: String,
    bucket_name: String,
    #[serde(default)]
    endpoint_url: Option<String>,
    #[serde(default = "default_true", alias = "use_ssl")]
    use_tls: bool,
    #[serde(default)]
    is_default: bool,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
}

fn default_true() -> bool {
    true
}

fn decode_json(payload: &[u8], now: DateTime<Utc>) -> Result<Vec<StorageConfig>, AppError> {
    let records: Vec<ImportRecord> = serde_json::from_slice(payload)
        .map_err(|e| AppError::InvalidInput(format!("Invalid JSON: {}", e)))?;

    records
        .into_iter()
        .map(|r| {
            Ok(StorageConfig {
                id: r.id,
                owner_id: r.owner_id,
                name: r.name,
                backend_kind: BackendKind::from_str(r.backend_kind.as_deref().unwrap_or(""))?,
                access_key_id: r.access_key_id,
                secret_access_key: r.secret_access_key,
                region: r.region,
                bucket_name: r.bucket_name,
                endpoint_url: r.endpoint_url.filter(|e| !e.trim().is_empty()),
                use_tls: r.use_tls,
                is_default: r.is_default,
                created_at: r.created_at.unwrap_or(now),
                updated_at: r.updated_at.unwrap_or(now),
            })
        })
        .collect()
}

fn decode_csv(payload: &[u8], now: DateTime<Utc>) -> Result<Vec<StorageConfig>, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(payload);

    let mut records = Vec::new();
    for (index, row) in reader.records().enumerate() {
        let row = row.map_err(csv_error)?;
        if row.len() < CSV_HEADER.len() {
            tracing::debug!(row = index + 2, columns = row.len(), "Skipping short CSV row");
            continue;
        }
        let field = |i: usize| row.get(i).unwrap_or("").to_string();
        let endpoint = field(7);
        records.push(StorageConfig {
            id: field(0),
            owner_id: field(1),
            name: field(2),
            access_key_id: field(3),
            secret_access_key: field(4),
            region: field(5),
            bucket_name: field(6),
            endpoint_url: (!endpoint.trim().is_empty()).then_some(endpoint),
            use_tls: parse_bool(&field(8)),
            backend_kind: BackendKind::from_str(&field(9))?,
            is_default: parse_bool(&field(10)),
            created_at: parse_time(&field(11)).unwrap_or(now),
            updated_at: parse_time(&field(12)).unwrap_or(now),
        });
    }

    if records.is_empty() {
        return Err(AppError::InvalidInput(
            "CSV import contains no records".to_string(),
        ));
    }
    Ok(records)
}

fn bool_str(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

fn parse_bool(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("true")
}

fn parse_time(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

fn csv_error(err: csv::Error) -> AppError {
    AppError::InvalidInput(format!("Invalid CSV: {}", err))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> StorageConfig {
        let now = DateTime::parse_from_rfc3339("2024-03-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        StorageConfig {
            id: "cfg-1".to_string(),
            owner_id: "alice".to_string(),
            name: "Local, minio".to_string(),
            backend_kind: BackendKind::SelfHosted,
            access_key_id: "minioadmin".to_string(),
            secret_access_key: "s3cr3t".to_string(),
            region: "us-east-1".to_string(),
            bucket_name: "files".to_string(),
            endpoint_url: Some("http://localhost:9000".to_string()),
            use_tls: false,
            is_default: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("".parse::<BulkFormat>().unwrap(), BulkFormat::Csv);
        assert_eq!("JSON".parse::<BulkFormat>().unwrap(), BulkFormat::Json);
        assert!("xml".parse::<BulkFormat>().is_err());
    }

    #[test]
    fn test_csv_export_layout() {
        let bytes = encode(&[record()], BulkFormat::Csv).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next().unwrap(), CSV_HEADER.join(","));
        let row = lines.next().unwrap();
        assert!(row.starts_with("cfg-1,alice,\"Local, minio\",minioadmin,s3cr3t,"));
        assert!(row.contains(",false,minio,true,2024-03-01T12:00:00+00:00,"));
    }

    #[test]
    fn test_csv_import_preserves_records() {
        let now = Utc::now();
        let bytes = encode(&[record()], BulkFormat::Csv).unwrap();
        let decoded = decode(&bytes, BulkFormat::Csv, now).unwrap();
        assert_eq!(decoded, vec![record()]);
    }

    #[test]
    fn test_csv_import_skips_short_rows_and_defaults_times() {
        let now = Utc::now();
        let payload = format!(
            "{}\nonly,three,columns\n,bob,n,ak,sk,eu-west-1,b,,true,aws,false,,\n",
            CSV_HEADER.join(",")
        );
        let decoded = decode(payload.as_bytes(), BulkFormat::Csv, now).unwrap();
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].owner_id, "bob");
        assert_eq!(decoded[0].backend_kind, BackendKind::Cloud);
        assert!(decoded[0].endpoint_url.is_none());
        assert_eq!(decoded[0].created_at, now);
    }

    #[test]
    fn test_json_import_accepts_legacy_names() {
        let now = Utc::now();
        let payload = br#"[{
            "user_id": "carol",
            "name": "legacy",
            "access_key": "ak",
            "secret_key": "sk",
            "bucket_name": "b",
            "endpoint_url": "http://minio:9000",
            "storage_type": "minio",
            "use_ssl": false
        }]"#;
        let decoded = decode(payload, BulkFormat::Json, now).unwrap();
        assert_eq!(decoded[0].owner_id, "carol");
        assert_eq!(decoded[0].backend_kind, BackendKind::SelfHosted);
        assert!(decoded[0].id.is_empty());
        assert!(!decoded[0].use_tls);
        assert_eq!(decoded[0].updated_at, now);
    }

    #[test]
    fn test_json_export_round_trips() {
        let bytes = encode(&[record()], BulkFormat::Json).unwrap();
        assert_eq!(decode(&bytes, BulkFormat::Json, Utc::now()).unwrap(), vec![record()]);
    }

    #[test]
    fn test_invalid_payloads() {
        assert!(matches!(
            decode(b"not json", BulkFormat::Json, Utc::now()),
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            decode(CSV_HEADER.join(",").as_bytes(), BulkFormat::Csv, Utc::now()),
            Err(AppError::InvalidInput(_))
        ));
    }
}
