//! Caption listing and download via the YouTube Data API v3.
//!
//! Two calls are involved: `captions.list` to discover the tracks of a
//! video and `captions.download` to fetch one track. Both authenticate with
//! whichever [`Credential`] the session holds: an API key travels as the
//! `key` query parameter, an OAuth bundle as a bearer token.
//!
//! # Example
//!
//! ```rust,no_run
//! use capgrab::youtube::{CaptionService, YouTubeApi};
//! use capgrab::{video_id, Credential};
//!
//! # async fn example() -> capgrab::Result<()> {
//! let api = YouTubeApi::new(capgrab::http_client::build_client()?, capgrab::config::DEFAULT_API_BASE)?;
//! let credential = Credential::ApiKey("AIza...".into());
//! let video = video_id::resolve("https://youtu.be/dQw4w9WgXcQ")?;
//!
//! for track in api.list_tracks(&video, &credential).await? {
//!     println!("{}", track.label());
//! }
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use reqwest::{Client, Request, RequestBuilder};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};
use url::Url;

use crate::credential::Credential;
use crate::error::{CaptionError, Result};
use crate::video_id::VideoId;

/// Format requested from `captions.download`. Never negotiated.
pub const SUBRIP_FORMAT: &str = "srt";

/// One caption track of a video, in the order the API returned it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaptionTrack {
    pub id: String,
    pub name: String,
    pub language: String,
    /// `standard`, `asr` (auto-generated) or `forced`, when reported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track_kind: Option<String>,
}

impl CaptionTrack {
    /// Label shown to the user, e.g. `English (en)`.
    #[must_use]
    pub fn label(&self) -> String {
        format!("{} ({})", self.name, self.language)
    }

    #[must_use]
    pub fn is_auto_generated(&self) -> bool {
        self.track_kind.as_deref() == Some("asr")
    }
}

/// SubRip text of a single track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptionContent {
    pub track_id: String,
    pub srt: String,
}

/// Caption catalog and content retrieval.
#[async_trait]
pub trait CaptionService: Send + Sync {
    /// List the caption tracks of a video. Zero tracks is `Ok(vec![])`.
    async fn list_tracks(&self, video: &VideoId, credential: &Credential) -> Result<Vec<CaptionTrack>>;

    /// Download one track as SubRip.
    async fn download_track(&self, track_id: &str, credential: &Credential) -> Result<CaptionContent>;
}

/// HTTP client for the caption endpoints.
#[derive(Debug)]
pub struct YouTubeApi {
    client: Client,
    base: Url,
}

impl YouTubeApi {
    /// `base` is the API root, normally [`crate::config::DEFAULT_API_BASE`].
    pub fn new(client: Client, base: &str) -> Result<Self> {
        let base = Url::parse(base.trim_end_matches('/'))
            .map_err(|e| CaptionError::config(format!("invalid api_base '{base}': {e}")))?;
        if base.cannot_be_a_base() {
            return Err(CaptionError::config(format!("api_base '{base}' cannot be a base URL")));
        }
        Ok(Self { client, base })
    }

    fn captions_url(&self, track_id: Option<&str>) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("captions");
            if let Some(id) = track_id {
                segments.push(id);
            }
        }
        url
    }

    /// Build the `captions.list` request for `video`.
    pub fn list_request(&self, video: &VideoId, credential: &Credential) -> Result<Request> {
        let builder = self
            .client
            .get(self.captions_url(None))
            .query(&[("part", "snippet"), ("videoId", video.as_str())]);
        Ok(authorize(builder, credential).build()?)
    }

    /// Build the `captions.download` request for `track_id`.
    pub fn download_request(&self, track_id: &str, credential: &Credential) -> Result<Request> {
        if track_id.trim().is_empty() {
            return Err(CaptionError::input("caption track id is empty"));
        }
        let builder = self
            .client
            .get(self.captions_url(Some(track_id)))
            .query(&[("tfmt", SUBRIP_FORMAT)]);
        Ok(authorize(builder, credential).build()?)
    }

    async fn execute(&self, request: Request) -> Result<(u16, String)> {
        let response = self.client.execute(request).await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        debug!(status, bytes = body.len(), "Caption API responded");
        Ok((status, body))
    }
}

#[async_trait]
impl CaptionService for YouTubeApi {
    #[instrument(skip(self, video, credential), fields(video = %video, auth = credential.kind()))]
    async fn list_tracks(&self, video: &VideoId, credential: &Credential) -> Result<Vec<CaptionTrack>> {
        let request = self.list_request(video, credential)?;
        let (status, body) = self.execute(request).await?;
        let tracks = parse_track_list(status, &body)?;
        info!(count = tracks.len(), "Caption tracks listed");
        Ok(tracks)
    }

    #[instrument(skip(self, credential), fields(auth = credential.kind()))]
    async fn download_track(&self, track_id: &str, credential: &Credential) -> Result<CaptionContent> {
        let request = self.download_request(track_id, credential)?;
        let (status, body) = self.execute(request).await?;
        let content = parse_track_content(status, body, track_id)?;
        info!(bytes = content.srt.len(), "Caption track downloaded");
        Ok(content)
    }
}

fn authorize(builder: RequestBuilder, credential: &Credential) -> RequestBuilder {
    match credential {
        Credential::ApiKey(key) => builder.query(&[("key", key.as_str())]),
        Credential::OAuth(bundle) => builder.bearer_auth(&bundle.access_token),
    }
}

fn ensure_success(status: u16, body: &str) -> Result<()> {
    if (200..300).contains(&status) {
        Ok(())
    } else {
        Err(CaptionError::Api {
            status,
            body: body.to_string(),
        })
    }
}

/// Turn a `captions.list` reply into tracks.
fn parse_track_list(status: u16, body: &str) -> Result<Vec<CaptionTrack>> {
    ensure_success(status, body)?;

    let response: CaptionListResponse =
        serde_json::from_str(body).map_err(|_| CaptionError::Api {
            status,
            body: body.to_string(),
        })?;

    Ok(response
        .items
        .into_iter()
        .map(|item| CaptionTrack {
            id: item.id,
            name: non_empty(item.snippet.name).unwrap_or_else(|| "Default".to_string()),
            language: non_empty(item.snippet.language).unwrap_or_else(|| "unknown".to_string()),
            track_kind: non_empty(item.snippet.track_kind),
        })
        .collect())
}

fn parse_track_content(status: u16, body: String, track_id: &str) -> Result<CaptionContent> {
    ensure_success(status, &body)?;
    Ok(CaptionContent {
        track_id: track_id.to_string(),
        srt: body,
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

// ============================================================================
// YouTube Data API Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct CaptionListResponse {
    #[serde(default)]
    items: Vec<CaptionItem>,
}

#[derive(Debug, Deserialize)]
struct CaptionItem {
    id: String,
    #[serde(default)]
    snippet: CaptionSnippet,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CaptionSnippet {
    name: Option<String>,
    language: Option<String>,
    track_kind: Option<String>,
}
