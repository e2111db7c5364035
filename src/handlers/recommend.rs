use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::error::{AppJson, AppResult};
use crate::models::mood_entry::{mood_label, validate_mood};
use crate::services::ai::{parse_json_reply, AiJson};
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendSongsRequest {
    pub mood: i32,
    pub note: Option<String>,
    pub genre: Option<String>,
    pub previous_songs: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SongRecommendation {
    pub title: String,
    pub artist: String,
    pub reason: String,
}

// `playlist_vibe` is snake_case on the wire; it mirrors the JSON the
// model is asked to emit.
#[derive(Debug, Serialize, Deserialize)]
pub struct RecommendSongsResponse {
    pub recommendations: Vec<SongRecommendation>,
    pub playlist_vibe: String,
}

pub async fn recommend_songs(
    State(state): State<AppState>,
    AppJson(body): AppJson<RecommendSongsRequest>,
) -> AppResult<Json<RecommendSongsResponse>> {
    validate_mood(body.mood)?;

    let prompt = recommendation_prompt(
        body.mood,
        body.note.as_deref(),
        body.genre.as_deref(),
        body.previous_songs.as_deref().unwrap_or(&[]),
    );

    let response = match state.ai.generate_text(&prompt).await {
        Ok(text) => match parse_json_reply::<RecommendSongsResponse>(&text) {
            AiJson::Parsed(parsed) if !parsed.recommendations.is_empty() => parsed,
            AiJson::Parsed(_) => {
                tracing::warn!("AI returned no recommendations, using fallback list");
                fallback_recommendations(body.mood)
            }
            AiJson::ParseFailure(_) => {
                tracing::warn!("AI recommendations were not valid JSON, using fallback list");
                fallback_recommendations(body.mood)
            }
        },
        Err(e) => {
            tracing::warn!(error = %e, "AI recommendations unavailable, using fallback list");
            fallback_recommendations(body.mood)
        }
    };

    Ok(Json(response))
}

fn recommendation_prompt(
    mood: i32,
    note: Option<&str>,
    genre: Option<&str>,
    previous_songs: &[String],
) -> String {
    let mut prompt = format!(
        "You are a thoughtful music curator. Suggest 5 songs for someone feeling {} right now.",
        mood_label(mood).to_lowercase()
    );
    if let Some(note) = note {
        prompt.push_str(&format!(" Context from their journal: \"{}\".", note));
    }
    if let Some(genre) = genre {
        prompt.push_str(&format!(" They prefer {} music.", genre));
    }
    if !previous_songs.is_empty() {
        prompt.push_str(&format!(
            " Do not suggest these again: {}.",
            previous_songs.join(", ")
        ));
    }
    prompt.push_str(
        r#" Respond with JSON only, exactly this schema: {"recommendations": [{"title": "...", "artist": "...", "reason": "..."}], "playlist_vibe": "one short phrase"}"#,
    );
    prompt
}

fn fallback_recommendations(mood: i32) -> RecommendSongsResponse {
    RecommendSongsResponse {
        recommendations: vec![
            SongRecommendation {
                title: "Here Comes the Sun".into(),
                artist: "The Beatles".into(),
                reason: "A warm, steady lift for almost any state of mind.".into(),
            },
            SongRecommendation {
                title: "Weightless".into(),
                artist: "Marconi Union".into(),
                reason: "Slow and ambient, built to lower the pulse.".into(),
            },
            SongRecommendation {
                title: "Three Little Birds".into(),
                artist: "Bob Marley & The Wailers".into(),
                reason: "A gentle reminder that things tend to work out.".into(),
            },
        ],
        playlist_vibe: format!("Comfort picks for a {} day", mood_label(mood).to_lowercase()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_is_never_empty() {
        for mood in 0..=4 {
            let fallback = fallback_recommendations(mood);
            assert!(!fallback.recommendations.is_empty());
            assert!(!fallback.playlist_vibe.is_empty());
        }
    }

    #[test]
    fn test_fallback_vibe_tracks_mood() {
        assert!(fallback_recommendations(0)
            .playlist_vibe
            .contains("very sad"));
        assert!(fallback_recommendations(4)
            .playlist_vibe
            .contains("very happy"));
    }

    #[test]
    fn test_prompt_includes_optional_context() {
        let previous = vec!["Holocene".to_string(), "Skinny Love".to_string()];
        let prompt = recommendation_prompt(1, Some("rough week"), Some("folk"), &previous);
        assert!(prompt.contains("sad"));
        assert!(prompt.contains("rough week"));
        assert!(prompt.contains("folk music"));
        assert!(prompt.contains("Holocene, Skinny Love"));
    }

    #[test]
    fn test_prompt_omits_absent_context() {
        let prompt = recommendation_prompt(2, None, None, &[]);
        assert!(!prompt.contains("journal"));
        assert!(!prompt.contains("prefer"));
        assert!(!prompt.contains("Do not suggest"));
    }

    #[test]
    fn test_response_round_trips_ai_schema() {
        let raw = r#"{"recommendations": [{"title": "Motion Sickness", "artist": "Phoebe Bridgers", "reason": "Cathartic."}], "playlist_vibe": "Bittersweet indie"}"#;
        let parsed: RecommendSongsResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.recommendations.len(), 1);
        assert_eq!(parsed.playlist_vibe, "Bittersweet indie");

        let json = serde_json::to_value(&parsed).unwrap();
        assert!(json.get("playlist_vibe").is_some());
        assert!(json.get("playlistVibe").is_none());
    }
}
