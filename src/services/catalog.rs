use regex::Regex;
use serde::{Deserialize, Serialize};

/// Tracks fetched for analysis are capped here while the true playlist
/// length is still reported.
pub const MAX_ANALYZED_TRACKS: usize = 50;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Music catalog credentials are not configured")]
    NotConfigured,

    #[error("Music catalog request failed: {0}")]
    Upstream(String),
}

/// A normalized track, whether it came from the catalog or was supplied
/// directly by the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub title: String,
    pub artist: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    /// Seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<i64>,
}

#[derive(Debug)]
pub struct PlaylistTracks {
    pub playlist_name: Option<String>,
    pub total_tracks: i64,
    pub tracks: Vec<Track>,
}

// Spotify playlist object, reduced to the fields we read. Removed or
// local tracks come back as null track objects and are skipped.
#[derive(Debug, Deserialize)]
struct PlaylistResponse {
    name: Option<String>,
    tracks: PlaylistPage,
}

#[derive(Debug, Deserialize)]
struct PlaylistPage {
    total: i64,
    items: Vec<PlaylistItem>,
}

#[derive(Debug, Deserialize)]
struct PlaylistItem {
    track: Option<TrackObject>,
}

#[derive(Debug, Deserialize)]
struct TrackObject {
    name: String,
    artists: Vec<ArtistObject>,
    album: Option<AlbumObject>,
    duration_ms: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ArtistObject {
    name: String,
}

#[derive(Debug, Deserialize)]
struct AlbumObject {
    name: Option<String>,
    release_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Client-credentials adapter for the Spotify Web API.
#[derive(Clone)]
pub struct CatalogGateway {
    client: reqwest::Client,
    client_id: String,
    client_secret: String,
}

impl CatalogGateway {
    pub fn new(config: &crate::config::Config) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            client_id: config.spotify_client_id.clone(),
            client_secret: config.spotify_client_secret.clone(),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.client_id.is_empty() && !self.client_secret.is_empty()
    }

    /// Exchange client credentials for a bearer token. No caching; every
    /// request pays for its own token.
    pub async fn get_access_token(&self) -> Result<String, CatalogError> {
        if !self.is_configured() {
            return Err(CatalogError::NotConfigured);
        }

        let response = self
            .client
            .post("https://accounts.spotify.com/api/token")
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| CatalogError::Upstream(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CatalogError::Upstream(format!(
                "token exchange failed {}: {}",
                status, body
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| CatalogError::Upstream(e.to_string()))?;

        Ok(token.access_token)
    }

    pub async fn get_playlist_tracks(
        &self,
        playlist_id: &str,
        token: &str,
    ) -> Result<PlaylistTracks, CatalogError> {
        let url = format!("https://api.spotify.com/v1/playlists/{}", playlist_id);
        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| CatalogError::Upstream(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CatalogError::Upstream(format!(
                "playlist fetch failed {}: {}",
                status, body
            )));
        }

        let playlist: PlaylistResponse = response
            .json()
            .await
            .map_err(|e| CatalogError::Upstream(e.to_string()))?;

        let tracks: Vec<Track> = playlist
            .tracks
            .items
            .into_iter()
            .filter_map(|item| item.track)
            .take(MAX_ANALYZED_TRACKS)
            .map(normalize_track)
            .collect();

        Ok(PlaylistTracks {
            playlist_name: playlist.name,
            total_tracks: playlist.tracks.total,
            tracks,
        })
    }
}

/// Pull a playlist id out of user input. Ordered patterns, first match
/// wins: URI form, web-link form, then a bare 22-char id.
pub fn extract_playlist_id(input: &str) -> Option<String> {
    let patterns = [
        r"^spotify:playlist:([A-Za-z0-9]+)",
        r"open\.spotify\.com/playlist/([A-Za-z0-9]+)",
        r"^([A-Za-z0-9]{22})$",
    ];

    let input = input.trim();
    for pattern in patterns {
        let re = Regex::new(pattern).expect("valid regex");
        if let Some(caps) = re.captures(input) {
            return Some(caps[1].to_string());
        }
    }
    None
}

fn normalize_track(track: TrackObject) -> Track {
    let artist = track
        .artists
        .first()
        .map(|a| a.name.clone())
        .unwrap_or_else(|| "Unknown Artist".into());

    let (album, year) = match &track.album {
        Some(album) => (
            album.name.clone(),
            album.release_date.as_deref().and_then(release_year),
        ),
        None => (None, None),
    };

    Track {
        title: track.name,
        artist,
        album,
        year,
        duration: track.duration_ms.map(|ms| ms / 1000),
    }
}

/// Spotify release dates come in "2019", "2019-03" and "2019-03-08"
/// precision; the leading year is always there.
fn release_year(release_date: &str) -> Option<i32> {
    release_date.get(..4)?.parse().ok()
}
