use axum::{extract::State, Json};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppJson, AppResult};
use crate::handlers::round2;
use crate::AppState;

const FALLBACK_MOOD: &str = "Neutral";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeSongRequest {
    pub song_url: Option<String>,
    pub title: Option<String>,
    pub artist: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeSongResponse {
    pub title: String,
    pub artist: String,
    pub energy: f64,
    pub valence: f64,
    pub danceability: f64,
    pub tempo: f64,
    pub mood_prediction: String,
}

#[derive(Debug)]
struct AudioFeatures {
    energy: f64,
    valence: f64,
    danceability: f64,
    tempo: f64,
}

pub async fn analyze_song(
    State(state): State<AppState>,
    AppJson(body): AppJson<AnalyzeSongRequest>,
) -> AppResult<Json<AnalyzeSongResponse>> {
    let song_url = body.song_url.as_deref().map(str::trim).unwrap_or("");
    if song_url.is_empty() {
        return Err(AppError::Validation("songUrl is required".into()));
    }

    // Placeholder values; nothing here analyzes the actual audio. The
    // response shape is the contract, the numbers are not.
    let features = synthetic_audio_features(&mut rand::thread_rng());

    let mood_prediction = match state.ai.generate_text(&prediction_prompt(&features)).await {
        Ok(text) => clean_mood_word(&text).unwrap_or_else(|| FALLBACK_MOOD.into()),
        Err(e) => {
            tracing::warn!(error = %e, "AI mood prediction unavailable, using fallback");
            FALLBACK_MOOD.into()
        }
    };

    Ok(Json(AnalyzeSongResponse {
        title: non_empty_or(body.title, "Unknown Title"),
        artist: non_empty_or(body.artist, "Unknown Artist"),
        energy: features.energy,
        valence: features.valence,
        danceability: features.danceability,
        tempo: features.tempo,
        mood_prediction,
    }))
}

fn synthetic_audio_features<R: Rng>(rng: &mut R) -> AudioFeatures {
    AudioFeatures {
        energy: round2(rng.gen_range(0.0..=1.0)),
        valence: round2(rng.gen_range(0.0..=1.0)),
        danceability: round2(rng.gen_range(0.0..=1.0)),
        tempo: rng.gen_range(60.0..=180.0_f64).round(),
    }
}

fn prediction_prompt(features: &AudioFeatures) -> String {
    format!(
        "A song has these audio features: energy {:.2}, valence {:.2}, danceability {:.2}, tempo {:.0} BPM. \
         Respond with a single word naming the mood this song most likely evokes.",
        features.energy, features.valence, features.danceability, features.tempo
    )
}

/// The model is asked for one word; take the first and drop punctuation
/// or quoting it adds anyway.
fn clean_mood_word(raw: &str) -> Option<String> {
    let word = raw.split_whitespace().next()?;
    let cleaned: String = word.chars().filter(|c| c.is_alphabetic()).collect();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

fn non_empty_or(value: Option<String>, default: &str) -> String {
    match value {
        Some(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => default.to_string(),
    }
}
