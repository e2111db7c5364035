use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppJson, AppResult};
use crate::models::mood_entry::{
    mood_label, normalize_text, validate_mood, CreateMoodEntryRequest, MoodEntry, MAX_NOTE_CHARS,
    MAX_SONG_CHARS,
};
use crate::AppState;

const MAX_LIST_LIMIT: i64 = 50;

#[derive(Debug, Deserialize)]
pub struct ListMoodsQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMoodResponse {
    pub entry: MoodEntry,
    pub ai_insight: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DeleteMoodResponse {
    pub message: String,
    pub entry: MoodEntry,
}

pub async fn list_moods(
    State(state): State<AppState>,
    Query(query): Query<ListMoodsQuery>,
) -> AppResult<Json<Vec<MoodEntry>>> {
    let limit = query.limit.unwrap_or(MAX_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT);

    let entries = sqlx::query_as::<_, MoodEntry>(
        r#"
        SELECT * FROM mood_entries
        ORDER BY "timestamp" DESC
        LIMIT $1
        "#,
    )
    .bind(limit)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(entries))
}

pub async fn create_mood(
    State(state): State<AppState>,
    AppJson(body): AppJson<CreateMoodEntryRequest>,
) -> AppResult<Json<CreateMoodResponse>> {
    validate_mood(body.mood)?;
    let note = normalize_text(body.note, "note", MAX_NOTE_CHARS)?;
    let song = normalize_text(body.song, "song", MAX_SONG_CHARS)?;
    let timestamp = body.timestamp.unwrap_or_else(Utc::now);

    let entry = sqlx::query_as::<_, MoodEntry>(
        r#"
        INSERT INTO mood_entries (id, mood, "timestamp", note, song)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(body.mood)
    .bind(timestamp)
    .bind(&note)
    .bind(&song)
    .fetch_one(&state.db)
    .await?;

    // The entry is already saved; a failed AI call degrades to a null
    // insight instead of failing the request.
    let ai_insight = match state
        .ai
        .generate_text(&insight_prompt(entry.mood, entry.note.as_deref()))
        .await
    {
        Ok(text) => Some(text),
        Err(e) => {
            tracing::warn!(error = %e, "AI insight unavailable, returning entry without one");
            None
        }
    };

    Ok(Json(CreateMoodResponse { entry, ai_insight }))
}

pub async fn delete_mood(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<DeleteMoodResponse>> {
    let entry = sqlx::query_as::<_, MoodEntry>(
        "DELETE FROM mood_entries WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .fetch_optional(&state.db)
    .await?
    .ok_or(AppError::NotFound("Mood entry not found".into()))?;

    Ok(Json(DeleteMoodResponse {
        message: "Mood entry deleted".into(),
        entry,
    }))
}

fn insight_prompt(mood: i32, note: Option<&str>) -> String {
    let mut prompt = format!(
        "You are a warm, supportive mood-journal companion. The user just logged their mood as \"{}\".",
        mood_label(mood)
    );
    if let Some(note) = note {
        prompt.push_str(&format!(" They wrote: \"{}\".", note));
    }
    prompt.push_str(
        " Reply with one short, encouraging sentence addressed to them. Plain text only, no quotes.",
    );
    prompt
}
