//! Training-data log.
//!
//! Every successful exchange is appended as one JSON line to
//! `<dir>/training_<YYYYMMDD>.jsonl`, one file per UTC day. Appends are not
//! locked; a single `write_all` per line keeps concurrent writers from
//! interleaving partial records in practice.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{RelayError, Result};
use crate::prompt::Conversation;

/// Date format used in file names and in the `date` query parameter.
pub const DATE_FORMAT: &str = "%Y%m%d";

/// One logged request/response exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TrainingRecord {
    pub id: Uuid,
    /// ISO-8601 UTC timestamp of when the reply was received.
    pub timestamp: String,
    pub user_message: String,
    /// Schema name the caller asked for; empty when none.
    pub schema_used: String,
    pub assistant_response: String,
    /// The conversation as sent upstream, followed by the reply.
    pub full_conversation: Conversation,
}

impl TrainingRecord {
    pub fn new(
        user_message: impl Into<String>,
        schema_used: Option<&str>,
        assistant_response: impl Into<String>,
        full_conversation: Conversation,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
            user_message: user_message.into(),
            schema_used: schema_used.unwrap_or_default().to_owned(),
            assistant_response: assistant_response.into(),
            full_conversation,
        }
    }
}

/// Parse a `YYYYMMDD` date.
///
/// Only digits are accepted, so the value is always safe to splice into a
/// file name.
pub fn parse_date(raw: &str) -> Result<NaiveDate> {
    let raw = raw.trim();
    let invalid = || RelayError::Validation(format!("invalid date '{raw}'; expected YYYYMMDD"));
    if raw.len() != 8 || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|_| invalid())
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Current UTC day.
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Append-only JSONL log partitioned by UTC day.
#[derive(Debug, Clone)]
pub struct TrainingLog {
    dir: PathBuf,
}

impl TrainingLog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the log file for `date`.
    pub fn file_for(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(format!("training_{}.jsonl", format_date(date)))
    }

    /// Append `record` to today's file.
    pub async fn append(&self, record: &TrainingRecord) -> Result<PathBuf> {
        self.append_on(today(), record).await
    }

    /// Append `record` to the file for `date`, creating directory and file as
    /// needed.
    pub async fn append_on(&self, date: NaiveDate, record: &TrainingRecord) -> Result<PathBuf> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.file_for(date);
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;

        debug!(id = %record.id, path = %path.display(), "training record appended");
        Ok(path)
    }

    /// All records logged on `date`, in write order.
    ///
    /// Lines that do not parse as a record are skipped with a warning.
    pub async fn read(&self, date: NaiveDate) -> Result<Vec<TrainingRecord>> {
        let path = self.file_for(date);
        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(RelayError::TrainingDataNotFound {
                    date: format_date(date),
                });
            }
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        for (idx, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<TrainingRecord>(line) {
                Ok(record) => records.push(record),
                Err(e) => warn!(
                    path = %path.display(),
                    line = idx + 1,
                    error = %e,
                    "skipping malformed training record"
                ),
            }
        }
        Ok(records)
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod test {
    use super::*;
    use crate::prompt::PromptComposer;

    fn record(question: &str, answer: &str) -> TrainingRecord {
        let conv = PromptComposer::new()
            .compose(question, &[], None)
            .unwrap()
            .with_reply(answer);
        TrainingRecord::new(question, None, answer, conv)
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn date_parsing() {
        assert_eq!(parse_date("20200101").unwrap(), day(2020, 1, 1));
        assert_eq!(format_date(day(2024, 2, 29)), "20240229");
        assert!(parse_date("2020-01-01").is_err());
        assert!(parse_date("20201301").is_err());
        assert!(parse_date("../../x").is_err());
        assert!(parse_date("+2020101").is_err());
    }

    #[test]
    fn record_defaults() {
        let r = record("q", "a");
        assert_eq!(r.schema_used, "");
        assert!(r.timestamp.ends_with('Z'));
        assert_eq!(r.full_conversation.len(), 3);
    }

    #[tokio::test]
    async fn append_then_read_one_line_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let log = TrainingLog::new(dir.path().join("training_data"));
        let date = day(2025, 3, 14);

        let first = record("loans per branch", "SELECT branch_id, COUNT(*) FROM loans GROUP BY 1;");
        let second = record("par30", "SELECT ...;");
        let path = log.append_on(date, &first).await.unwrap();
        log.append_on(date, &second).await.unwrap();

        assert!(path.ends_with("training_20250314.jsonl"));
        let raw = std::fs::read_to_string(&path).unwrap();
        assert_eq!(raw.lines().count(), 2);

        let records = log.read(date).await.unwrap();
        assert_eq!(records, vec![first, second]);
    }

    #[tokio::test]
    async fn missing_day_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let log = TrainingLog::new(dir.path());
        let err = log.read(day(2020, 1, 1)).await.unwrap_err();
        assert!(matches!(err, RelayError::TrainingDataNotFound { date } if date == "20200101"));
    }

    #[tokio::test]
    async fn malformed_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let log = TrainingLog::new(dir.path());
        let date = day(2025, 1, 2);
        let good = record("q", "a");
        log.append_on(date, &good).await.unwrap();

        let mut raw = std::fs::read_to_string(log.file_for(date)).unwrap();
        raw.push_str("{not json\n\n");
        std::fs::write(log.file_for(date), raw).unwrap();

        assert_eq!(log.read(date).await.unwrap(), vec![good]);
    }
}
