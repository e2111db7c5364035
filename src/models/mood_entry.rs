use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::AppError;

pub const MOOD_MIN: i32 = 0;
pub const MOOD_MAX: i32 = 4;

pub const MAX_NOTE_CHARS: usize = 500;
pub const MAX_SONG_CHARS: usize = 200;

/// One journaled mood: a 0–4 affect rating plus optional context.
/// Immutable after creation — the only write operations are insert and
/// delete.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MoodEntry {
    pub id: Uuid,
    pub mood: i32,
    pub timestamp: DateTime<Utc>,
    pub note: Option<String>,
    pub song: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateMoodEntryRequest {
    pub mood: i32,
    pub timestamp: Option<DateTime<Utc>>,
    pub note: Option<String>,
    pub song: Option<String>,
}

/// 5-point affect scale. Out-of-range values only appear pre-validation;
/// callers that already validated get a sensible label regardless.
pub fn mood_label(mood: i32) -> &'static str {
    match mood {
        0 => "Very Sad",
        1 => "Sad",
        2 => "Neutral",
        3 => "Happy",
        _ => "Very Happy",
    }
}

pub fn validate_mood(mood: i32) -> Result<(), AppError> {
    if !(MOOD_MIN..=MOOD_MAX).contains(&mood) {
        return Err(AppError::Validation(format!(
            "mood must be an integer between {} and {}",
            MOOD_MIN, MOOD_MAX
        )));
    }
    Ok(())
}

/// Empty and whitespace-only strings are stored as NULL, never as "".
pub fn normalize_text(
    value: Option<String>,
    field: &str,
    max_chars: usize,
) -> Result<Option<String>, AppError> {
    match value {
        None => Ok(None),
        Some(raw) => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            if trimmed.chars().count() > max_chars {
                return Err(AppError::Validation(format!(
                    "{} must be at most {} characters",
                    field, max_chars
                )));
            }
            Ok(Some(trimmed.to_string()))
        }
    }
}
