use std::io::Read;

use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::checkin::{default_label, MOOD_RANGE};
use crate::models::Identity;

#[derive(Debug, Deserialize)]
struct CsvRow {
    user_id: Option<Uuid>,
    session_id: Option<String>,
    mood_value: i32,
    mood_label: Option<String>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    source_key: Option<String>,
}

/// A validated row from a mood check-in export.
#[derive(Debug, Clone)]
pub struct ImportedMoodEntry {
    pub identity: Identity,
    pub mood_value: i32,
    pub mood_label: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub source_key: Option<String>,
}

pub fn read_mood_csv<R: Read>(input: R) -> anyhow::Result<Vec<ImportedMoodEntry>> {
    let mut reader = csv::Reader::from_reader(input);
    let mut entries = Vec::new();

    for (index, result) in reader.deserialize::<CsvRow>().enumerate() {
        let line = index + 2;
        let row = result.with_context(|| format!("row {line}: malformed record"))?;

        let session = row.session_id.filter(|s| !s.trim().is_empty());
        let identity = match (row.user_id, session) {
            (Some(user), None) => Identity::User(user),
            (None, Some(session)) => Identity::Session(session),
            (Some(_), Some(_)) => bail!("row {line}: both user_id and session_id are set"),
            (None, None) => bail!("row {line}: user_id or session_id is required"),
        };

        if !MOOD_RANGE.contains(&row.mood_value) {
            bail!("row {line}: mood_value {} is outside 1-5", row.mood_value);
        }

        entries.push(ImportedMoodEntry {
            identity,
            mood_value: row.mood_value,
            mood_label: row
                .mood_label
                .filter(|l| !l.trim().is_empty())
                .unwrap_or_else(|| default_label(row.mood_value).to_string()),
            notes: row.notes.filter(|n| !n.trim().is_empty()),
            created_at: row.created_at,
            source_key: row.source_key.filter(|k| !k.trim().is_empty()),
        });
    }

    Ok(entries)
}

pub fn read_mood_csv_file(path: &std::path::Path) -> anyhow::Result<Vec<ImportedMoodEntry>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    read_mood_csv(file)
}
