use std::collections::HashSet;

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppJson, AppResult};
use crate::handlers::round2;
use crate::services::ai::{parse_json_reply, AiJson};
use crate::services::catalog::{
    extract_playlist_id, CatalogError, Track, MAX_ANALYZED_TRACKS,
};
use crate::AppState;

const MIN_MANUAL_TRACKS: usize = 3;

/// Track summary lines embedded in the prompt; anything past this still
/// counts toward the metadata.
const MAX_PROMPT_TRACKS: usize = 30;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzePlaylistRequest {
    pub spotify_url: Option<String>,
    pub tracks: Option<Vec<Track>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PersonalityTraits {
    pub openness: f64,
    pub conscientiousness: f64,
    pub extraversion: f64,
    pub agreeableness: f64,
    pub neuroticism: f64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalityProfile {
    pub traits: PersonalityTraits,
    pub summary: String,
    #[serde(default)]
    pub music_preferences: Vec<String>,
    #[serde(default)]
    pub insights: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub playlist_name: Option<String>,
    pub source: String,
    pub analyzed_tracks: i64,
    pub total_tracks: i64,
    pub unique_artists: i64,
    pub artist_diversity: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year_span: Option<i32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzePlaylistResponse {
    #[serde(flatten)]
    pub profile: PersonalityProfile,
    pub playlist_metadata: PlaylistMetadata,
}

enum PlaylistInput {
    Url(String),
    Manual(Vec<Track>),
}

pub async fn analyze_playlist(
    State(state): State<AppState>,
    AppJson(body): AppJson<AnalyzePlaylistRequest>,
) -> AppResult<Json<AnalyzePlaylistResponse>> {
    let (tracks, total_tracks, playlist_name, source) = match resolve_input(body)? {
        PlaylistInput::Manual(tracks) => {
            let total = tracks.len() as i64;
            let mut tracks = tracks;
            tracks.truncate(MAX_ANALYZED_TRACKS);
            (tracks, total, None, "manual")
        }
        PlaylistInput::Url(url) => {
            let playlist_id = extract_playlist_id(&url).ok_or_else(|| {
                AppError::Validation(
                    "spotifyUrl is not a recognized playlist link, URI, or id".into(),
                )
            })?;

            let token = state
                .catalog
                .get_access_token()
                .await
                .map_err(catalog_error)?;
            let playlist = state
                .catalog
                .get_playlist_tracks(&playlist_id, &token)
                .await
                .map_err(catalog_error)?;

            if playlist.tracks.is_empty() {
                return Err(AppError::Validation(
                    "playlist has no analyzable tracks".into(),
                ));
            }

            (
                playlist.tracks,
                playlist.total_tracks,
                playlist.playlist_name,
                "spotify",
            )
        }
    };

    let metadata = playlist_metadata(&tracks, total_tracks, playlist_name, source);

    if !state.ai.is_configured() {
        return Err(AppError::ServiceUnavailable("AI service"));
    }

    let text = state
        .ai
        .generate_text(&personality_prompt(&tracks, &metadata))
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;

    // No fallback payload on this route: an unparsable profile is a 500.
    let profile = match parse_json_reply::<PersonalityProfile>(&text) {
        AiJson::Parsed(profile) => profile,
        AiJson::ParseFailure(raw) => {
            tracing::error!(raw = %raw, "Personality profile was not valid JSON");
            return Err(AppError::Parse(
                "AI returned an unparsable personality profile".into(),
            ));
        }
    };

    Ok(Json(AnalyzePlaylistResponse {
        profile,
        playlist_metadata: metadata,
    }))
}

fn resolve_input(body: AnalyzePlaylistRequest) -> Result<PlaylistInput, AppError> {
    match (body.spotify_url, body.tracks) {
        (Some(_), Some(_)) => Err(AppError::Validation(
            "provide either spotifyUrl or tracks, not both".into(),
        )),
        (None, None) => Err(AppError::Validation(
            "either spotifyUrl or tracks is required".into(),
        )),
        (Some(url), None) => Ok(PlaylistInput::Url(url)),
        (None, Some(tracks)) => {
            if tracks.len() < MIN_MANUAL_TRACKS {
                return Err(AppError::Validation(format!(
                    "at least {} tracks are required",
                    MIN_MANUAL_TRACKS
                )));
            }
            Ok(PlaylistInput::Manual(tracks))
        }
    }
}

/// Catalog failures on this route are the user's problem to fix (bad
/// link, missing credentials, upstream refusal) and surface as 400s.
fn catalog_error(e: CatalogError) -> AppError {
    match e {
        CatalogError::NotConfigured => {
            AppError::Validation("music catalog credentials are not configured".into())
        }
        CatalogError::Upstream(msg) => AppError::Upstream(format!("playlist fetch failed: {}", msg)),
    }
}

fn playlist_metadata(
    tracks: &[Track],
    total_tracks: i64,
    playlist_name: Option<String>,
    source: &str,
) -> PlaylistMetadata {
    let unique: HashSet<String> = tracks.iter().map(|t| t.artist.to_lowercase()).collect();
    let unique_artists = unique.len() as i64;

    let artist_diversity = if tracks.is_empty() {
        0.0
    } else {
        round2(unique_artists as f64 / tracks.len() as f64)
    };

    let years: Vec<i32> = tracks.iter().filter_map(|t| t.year).collect();
    let year_span = match (years.iter().max(), years.iter().min()) {
        (Some(max), Some(min)) => Some(max - min),
        _ => None,
    };

    PlaylistMetadata {
        playlist_name,
        source: source.into(),
        analyzed_tracks: tracks.len() as i64,
        total_tracks,
        unique_artists,
        artist_diversity,
        year_span,
    }
}

fn personality_prompt(tracks: &[Track], metadata: &PlaylistMetadata) -> String {
    let lines: Vec<String> = tracks
        .iter()
        .take(MAX_PROMPT_TRACKS)
        .enumerate()
        .map(|(i, t)| {
            let mut line = format!("{}. {} — {}", i + 1, t.title, t.artist);
            match (&t.album, t.year) {
                (Some(album), Some(year)) => line.push_str(&format!(" ({}, {})", album, year)),
                (Some(album), None) => line.push_str(&format!(" ({})", album)),
                (None, Some(year)) => line.push_str(&format!(" ({})", year)),
                (None, None) => {}
            }
            line
        })
        .collect();

    let span = metadata
        .year_span
        .map(|s| format!(" The release years span {} years.", s))
        .unwrap_or_default();

    format!(
        r#"You are a music psychologist. Infer a listener's personality from their playlist.
The playlist has {} tracks in total; {} were analyzed, with {} unique artists (diversity ratio {:.2}).{}

Tracks:
{}

Respond with JSON only, exactly this schema:
{{"traits": {{"openness": 1-10, "conscientiousness": 1-10, "extraversion": 1-10, "agreeableness": 1-10, "neuroticism": 1-10}}, "summary": "2-3 sentences about this listener", "musicPreferences": ["..."], "insights": ["..."], "recommendations": ["..."]}}"#,
        metadata.total_tracks,
        metadata.analyzed_tracks,
        metadata.unique_artists,
        metadata.artist_diversity,
        span,
        lines.join("\n")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(title: &str, artist: &str, year: Option<i32>) -> Track {
        Track {
            title: title.into(),
            artist: artist.into(),
            album: None,
            year,
            duration: None,
        }
    }

    // ── resolve_input ────────────────────────────────────────────────────

    #[test]
    fn test_resolve_rejects_both_inputs() {
        let body = AnalyzePlaylistRequest {
            spotify_url: Some("spotify:playlist:37i9dQZF1DXcBWIGoYBM5M".into()),
            tracks: Some(vec![track("a", "b", None)]),
        };
        assert!(resolve_input(body).is_err());
    }

    #[test]
    fn test_resolve_rejects_neither_input() {
        let body = AnalyzePlaylistRequest {
            spotify_url: None,
            tracks: None,
        };
        assert!(resolve_input(body).is_err());
    }

    #[test]
    fn test_resolve_rejects_short_manual_list() {
        let body = AnalyzePlaylistRequest {
            spotify_url: None,
            tracks: Some(vec![track("a", "x", None), track("b", "y", None)]),
        };
        assert!(resolve_input(body).is_err());
    }

    #[test]
    fn test_resolve_accepts_three_manual_tracks() {
        let body = AnalyzePlaylistRequest {
            spotify_url: None,
            tracks: Some(vec![
                track("a", "x", None),
                track("b", "y", None),
                track("c", "z", None),
            ]),
        };
        assert!(matches!(
            resolve_input(body),
            Ok(PlaylistInput::Manual(tracks)) if tracks.len() == 3
        ));
    }

    // ── playlist_metadata ────────────────────────────────────────────────

    #[test]
    fn test_metadata_unique_artists_case_insensitive() {
        let tracks = vec![
            track("a", "Radiohead", Some(1997)),
            track("b", "radiohead", Some(2007)),
            track("c", "Portishead", Some(1994)),
        ];
        let meta = playlist_metadata(&tracks, 3, None, "manual");
        assert_eq!(meta.unique_artists, 2);
        assert_eq!(meta.artist_diversity, 0.67);
        assert_eq!(meta.year_span, Some(13));
    }

    #[test]
    fn test_metadata_no_years() {
        let tracks = vec![track("a", "x", None), track("b", "y", None)];
        let meta = playlist_metadata(&tracks, 2, None, "manual");
        assert_eq!(meta.year_span, None);
    }

    #[test]
    fn test_metadata_reports_true_total() {
        let tracks = vec![track("a", "x", None)];
        let meta = playlist_metadata(&tracks, 120, Some("Liked Songs".into()), "spotify");
        assert_eq!(meta.analyzed_tracks, 1);
        assert_eq!(meta.total_tracks, 120);
        assert_eq!(meta.playlist_name.as_deref(), Some("Liked Songs"));
    }

    // ── prompt ───────────────────────────────────────────────────────────

    #[test]
    fn test_prompt_caps_track_lines() {
        let tracks: Vec<Track> = (0..40)
            .map(|i| track(&format!("song{}", i), "artist", None))
            .collect();
        let meta = playlist_metadata(&tracks, 40, None, "manual");
        let prompt = personality_prompt(&tracks, &meta);
        assert!(prompt.contains("30. song29"));
        assert!(!prompt.contains("31. song30"));
    }

    #[test]
    fn test_prompt_embeds_metadata_and_schema() {
        let tracks = vec![
            track("a", "x", Some(1990)),
            track("b", "y", Some(2020)),
            track("c", "z", None),
        ];
        let meta = playlist_metadata(&tracks, 3, None, "manual");
        let prompt = personality_prompt(&tracks, &meta);
        assert!(prompt.contains("span 30 years"));
        assert!(prompt.contains("\"openness\""));
        assert!(prompt.contains("JSON only"));
    }

    // ── response shape ───────────────────────────────────────────────────

    #[test]
    fn test_profile_parses_ai_schema() {
        let raw = r#"{"traits": {"openness": 8, "conscientiousness": 5, "extraversion": 6.5, "agreeableness": 7, "neuroticism": 3}, "summary": "An open listener.", "musicPreferences": ["indie"], "insights": ["varied"], "recommendations": ["Big Thief"]}"#;
        let profile: PersonalityProfile = serde_json::from_str(raw).unwrap();
        assert_eq!(profile.traits.openness, 8.0);
        assert_eq!(profile.traits.extraversion, 6.5);
        assert_eq!(profile.music_preferences, vec!["indie"]);
    }

    #[test]
    fn test_response_flattens_profile_and_merges_metadata() {
        let profile = PersonalityProfile {
            traits: PersonalityTraits {
                openness: 8.0,
                conscientiousness: 5.0,
                extraversion: 6.0,
                agreeableness: 7.0,
                neuroticism: 3.0,
            },
            summary: "An open listener.".into(),
            music_preferences: vec![],
            insights: vec![],
            recommendations: vec![],
        };
        let tracks = vec![
            track("a", "x", None),
            track("b", "y", None),
            track("c", "z", None),
        ];
        let response = AnalyzePlaylistResponse {
            profile,
            playlist_metadata: playlist_metadata(&tracks, 3, None, "manual"),
        };
        let json = serde_json::to_value(&response).unwrap();
        // Profile fields sit at the top level next to the metadata
        assert_eq!(json["summary"], "An open listener.");
        assert_eq!(json["traits"]["openness"], 8.0);
        assert_eq!(json["playlistMetadata"]["uniqueArtists"], 3);
        assert_eq!(json["playlistMetadata"]["source"], "manual");
    }
}
