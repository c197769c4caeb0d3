//! Per-session retrieval workflow.
//!
//! A [`Session`] owns one credential store and, in OAuth mode, one
//! authorization negotiator. The presentation layer feeds it discrete
//! events (a URL, an authorization code, a track selection, a download
//! trigger) and renders the [`Step`] or error each one returns. Nothing
//! blocks waiting for the user: when a code is needed the session returns
//! [`Step::AuthorizationRequired`] and resumes the pending URL once
//! [`Session::submit_code`] succeeds.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use tracing::{debug, info};

use crate::config::{AuthMode, Config};
use crate::credential::{Credential, CredentialStore};
use crate::error::{CaptionError, Result};
use crate::http_client::build_client;
use crate::oauth::{AuthorizationNegotiator, HttpTokenExchanger, NegotiationStatus, TokenExchanger};
use crate::video_id;
use crate::youtube::{CaptionContent, CaptionService, CaptionTrack, YouTubeApi};

/// Suggested file name for downloaded captions.
pub const DOWNLOAD_FILE_NAME: &str = "captions.srt";
/// MIME type offered with the download.
pub const DOWNLOAD_MIME: &str = "text/plain";

/// Outcome of a workflow step that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// The user must visit `url` and come back with a code.
    AuthorizationRequired { url: String },
    /// Authorization finished and no URL was waiting for it.
    Authorized,
    /// Tracks available for selection, in API order.
    TracksReady(Vec<CaptionTrack>),
}

/// Final artifact handed to the download affordance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadArtifact {
    pub track_id: String,
    pub content: String,
    pub file_name: &'static str,
    pub mime: &'static str,
}

impl From<CaptionContent> for DownloadArtifact {
    fn from(content: CaptionContent) -> Self {
        Self {
            track_id: content.track_id,
            content: content.srt,
            file_name: DOWNLOAD_FILE_NAME,
            mime: DOWNLOAD_MIME,
        }
    }
}

/// How the user picked a track: 1-based position in the list or track id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackSelector {
    Index(usize),
    Id(String),
}

impl FromStr for TrackSelector {
    type Err = CaptionError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(CaptionError::input("empty track selection"));
        }
        Ok(s.parse::<usize>()
            .map_or_else(|_| Self::Id(s.to_string()), Self::Index))
    }
}

/// State and collaborators of one interactive session.
pub struct Session {
    store: CredentialStore,
    negotiator: Option<AuthorizationNegotiator>,
    service: Arc<dyn CaptionService>,
    exchanger: Arc<dyn TokenExchanger>,
    pending_url: Option<String>,
    tracks: Vec<CaptionTrack>,
    selected: Option<usize>,
}

impl Session {
    /// Create a session for `auth`. In API-key mode the key is installed
    /// immediately; OAuth mode starts unauthorized.
    pub fn new(
        auth: &AuthMode,
        service: Arc<dyn CaptionService>,
        exchanger: Arc<dyn TokenExchanger>,
    ) -> Result<Self> {
        let mut store = CredentialStore::new();
        let negotiator = match auth {
            AuthMode::ApiKey(key) => {
                store.set_api_key(key.clone())?;
                None
            }
            AuthMode::OAuth(client) => Some(AuthorizationNegotiator::new(client.clone())),
        };

        Ok(Self {
            store,
            negotiator,
            service,
            exchanger,
            pending_url: None,
            tracks: Vec::new(),
            selected: None,
        })
    }

    /// Create a session talking to the real API endpoints.
    pub fn connect(config: &Config) -> Result<Self> {
        let client = build_client()?;
        let service = Arc::new(YouTubeApi::new(client.clone(), &config.api_base)?);
        let exchanger = Arc::new(HttpTokenExchanger::new(client));
        Self::new(&config.auth, service, exchanger)
    }

    #[must_use]
    pub fn credential(&self) -> Option<&Credential> {
        self.store.active()
    }

    /// `None` in API-key mode.
    #[must_use]
    pub fn negotiation_status(&self) -> Option<NegotiationStatus> {
        self.negotiator.as_ref().map(AuthorizationNegotiator::status)
    }

    /// Issue the authorization URL if the session still needs one.
    ///
    /// Returns `None` when a credential is already active.
    pub fn begin_authorization(&mut self) -> Result<Option<String>> {
        if !self.store.is_empty() {
            return Ok(None);
        }
        match &mut self.negotiator {
            Some(negotiator) => negotiator.begin().map(Some),
            None => Err(CaptionError::config("no API key configured")),
        }
    }

    /// Handle a submitted video URL.
    pub async fn submit_url(&mut self, url: &str) -> Result<Step> {
        self.tracks.clear();
        self.selected = None;
        self.pending_url = None;

        let video = video_id::resolve(url)?;
        debug!(video = %video, "Video identifier resolved");

        if self.store.is_empty() {
            let Some(auth_url) = self.begin_authorization()? else {
                return Err(CaptionError::config("credential store is unexpectedly empty"));
            };
            self.pending_url = Some(url.to_string());
            return Ok(Step::AuthorizationRequired { url: auth_url });
        }

        let credential = self
            .store
            .active()
            .ok_or_else(|| CaptionError::config("no credential available"))?;
        let tracks = self.service.list_tracks(&video, credential).await?;
        if tracks.is_empty() {
            return Err(CaptionError::EmptyResult);
        }

        info!(video = %video, count = tracks.len(), "Tracks ready for selection");
        self.tracks.clone_from(&tracks);
        Ok(Step::TracksReady(tracks))
    }

    /// Handle a submitted authorization code (or redirect URL).
    ///
    /// On success any URL that was waiting for authorization is resumed.
    pub async fn submit_code(&mut self, code: &str) -> Result<Step> {
        let negotiator = self
            .negotiator
            .as_mut()
            .ok_or_else(|| CaptionError::config("API-key sessions have no authorization step"))?;
        negotiator
            .exchange(code, self.exchanger.as_ref(), &mut self.store)
            .await?;

        match self.pending_url.take() {
            Some(url) => self.submit_url(&url).await,
            None => Ok(Step::Authorized),
        }
    }

    /// Tracks from the last successful listing.
    #[must_use]
    pub fn tracks(&self) -> &[CaptionTrack] {
        &self.tracks
    }

    pub fn select_track(&mut self, selector: &TrackSelector) -> Result<&CaptionTrack> {
        if self.tracks.is_empty() {
            return Err(CaptionError::input("no caption tracks listed yet; submit a video URL first"));
        }

        let index = match selector {
            TrackSelector::Index(n) if (1..=self.tracks.len()).contains(n) => n - 1,
            TrackSelector::Index(n) => {
                return Err(CaptionError::input(format!(
                    "track {n} is out of range (1-{})",
                    self.tracks.len()
                )));
            }
            TrackSelector::Id(id) => self
                .tracks
                .iter()
                .position(|t| &t.id == id)
                .ok_or_else(|| CaptionError::input(format!("no listed track has id '{id}'")))?,
        };

        self.selected = Some(index);
        Ok(&self.tracks[index])
    }

    #[must_use]
    pub fn selected_track(&self) -> Option<&CaptionTrack> {
        self.selected.and_then(|i| self.tracks.get(i))
    }

    /// Fetch the selected track as SubRip.
    pub async fn download(&self) -> Result<DownloadArtifact> {
        let track = self
            .selected_track()
            .ok_or_else(|| CaptionError::input("select a caption track before downloading"))?;
        let credential = self
            .store
            .active()
            .ok_or_else(|| CaptionError::config("no credential available"))?;

        let content = self.service.download_track(&track.id, credential).await?;
        Ok(content.into())
    }
}

/// Sessions keyed by an identifier chosen by the presentation layer.
pub struct SessionRegistry {
    auth: AuthMode,
    service: Arc<dyn CaptionService>,
    exchanger: Arc<dyn TokenExchanger>,
    sessions: HashMap<String, Session>,
}

impl SessionRegistry {
    #[must_use]
    pub fn new(
        auth: AuthMode,
        service: Arc<dyn CaptionService>,
        exchanger: Arc<dyn TokenExchanger>,
    ) -> Self {
        Self {
            auth,
            service,
            exchanger,
            sessions: HashMap::new(),
        }
    }

    /// The session for `key`, created on first use.
    pub fn session(&mut self, key: &str) -> Result<&mut Session> {
        match self.sessions.entry(key.to_string()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let session = Session::new(
                    &self.auth,
                    Arc::clone(&self.service),
                    Arc::clone(&self.exchanger),
                )?;
                debug!(key, "Session created");
                Ok(entry.insert(session))
            }
        }
    }

    /// Drop a session and its ephemeral state. Returns whether it existed.
    pub fn end(&mut self, key: &str) -> bool {
        self.sessions.remove(key).is_some()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use url::Url;

    use super::*;
    use crate::config::OAuthClientConfig;
    use crate::oauth::TokenResponse;
    use crate::video_id::VideoId;

    const SRT: &str = "1\n00:00:00,000 --> 00:00:01,000\nHello\n";

    #[derive(Default)]
    struct FakeService {
        tracks: Vec<CaptionTrack>,
        list_error: Option<u16>,
        download_error: Option<u16>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeService {
        fn with_tracks(tracks: Vec<CaptionTrack>) -> Self {
            Self {
                tracks,
                ..Self::default()
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CaptionService for FakeService {
        async fn list_tracks(&self, video: &VideoId, credential: &Credential) -> Result<Vec<CaptionTrack>> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("list {video} via {}", credential.kind()));
            match self.list_error {
                Some(status) => Err(CaptionError::Api {
                    status,
                    body: "rejected".into(),
                }),
                None => Ok(self.tracks.clone()),
            }
        }

        async fn download_track(&self, track_id: &str, credential: &Credential) -> Result<CaptionContent> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("download {track_id} via {}", credential.kind()));
            match self.download_error {
                Some(status) => Err(CaptionError::Api {
                    status,
                    body: "forbidden".into(),
                }),
                None => Ok(CaptionContent {
                    track_id: track_id.to_string(),
                    srt: SRT.to_string(),
                }),
            }
        }
    }

    struct FakeExchanger;

    #[async_trait]
    impl TokenExchanger for FakeExchanger {
        async fn exchange_code(&self, _client: &OAuthClientConfig, code: &str) -> Result<TokenResponse> {
            if code == "good" {
                Ok(TokenResponse {
                    access_token: "ya29.token".into(),
                    refresh_token: None,
                    token_type: None,
                    scope: None,
                })
            } else {
                Err(CaptionError::Exchange("invalid_grant".into()))
            }
        }
    }

    fn track(id: &str, name: &str, language: &str) -> CaptionTrack {
        CaptionTrack {
            id: id.into(),
            name: name.into(),
            language: language.into(),
            track_kind: None,
        }
    }

    fn oauth_mode() -> AuthMode {
        AuthMode::OAuth(OAuthClientConfig {
            client_id: "client".into(),
            client_secret: "secret".into(),
            redirect_uri: "http://localhost:8501".into(),
            auth_uri: "https://accounts.google.com/o/oauth2/auth".into(),
            token_uri: "https://oauth2.googleapis.com/token".into(),
            scopes: vec!["https://www.googleapis.com/auth/youtube.force-ssl".into()],
        })
    }

    fn api_key_session(service: &Arc<FakeService>) -> Session {
        Session::new(
            &AuthMode::ApiKey("k1".into()),
            Arc::clone(service) as Arc<dyn CaptionService>,
            Arc::new(FakeExchanger),
        )
        .unwrap()
    }

    fn oauth_session(service: &Arc<FakeService>) -> Session {
        Session::new(
            &oauth_mode(),
            Arc::clone(service) as Arc<dyn CaptionService>,
            Arc::new(FakeExchanger),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn api_key_end_to_end() {
        let service = Arc::new(FakeService::with_tracks(vec![track("capA", "English", "en")]));
        let mut session = api_key_session(&service);

        let step = session
            .submit_url("https://www.youtube.com/watch?v=abc12345678")
            .await
            .unwrap();
        let Step::TracksReady(tracks) = step else {
            panic!("expected tracks, got {step:?}");
        };
        assert_eq!(tracks.iter().map(CaptionTrack::label).collect::<Vec<_>>(), vec!["English (en)"]);

        let selected = session.select_track(&"1".parse().unwrap()).unwrap();
        assert_eq!(selected.id, "capA");

        let artifact = session.download().await.unwrap();
        assert_eq!(artifact.content, SRT);
        assert_eq!(artifact.file_name, "captions.srt");
        assert_eq!(artifact.mime, "text/plain");
        assert_eq!(
            service.calls(),
            vec!["list abc12345678 via api key", "download capA via api key"]
        );
    }

    #[tokio::test]
    async fn invalid_url_fails_before_any_call() {
        let service = Arc::new(FakeService::with_tracks(vec![track("capA", "English", "en")]));
        let mut session = api_key_session(&service);

        let err = session.submit_url("https://example.com/").await.unwrap_err();
        assert!(matches!(err, CaptionError::InvalidInput(_)));
        assert!(service.calls().is_empty());
    }

    #[tokio::test]
    async fn zero_tracks_is_reported_as_empty_result() {
        let service = Arc::new(FakeService::default());
        let mut session = api_key_session(&service);

        let err = session.submit_url("https://youtu.be/dQw4w9WgXcQ").await.unwrap_err();
        assert!(matches!(err, CaptionError::EmptyResult));
        assert!(session.tracks().is_empty());
    }

    #[tokio::test]
    async fn api_error_is_passed_through() {
        let service = Arc::new(FakeService {
            list_error: Some(404),
            ..FakeService::default()
        });
        let mut session = api_key_session(&service);

        let err = session.submit_url("https://youtu.be/dQw4w9WgXcQ").await.unwrap_err();
        assert!(matches!(err, CaptionError::Api { status: 404, .. }));
        assert!(!err.is_fatal());
    }

    #[tokio::test]
    async fn api_key_download_failure_is_not_retried() {
        let service = Arc::new(FakeService {
            tracks: vec![track("asr1", "", "en")],
            download_error: Some(403),
            ..FakeService::default()
        });
        let mut session = api_key_session(&service);
        session.submit_url("https://youtu.be/dQw4w9WgXcQ").await.unwrap();
        session.select_track(&TrackSelector::Id("asr1".into())).unwrap();

        let err = session.download().await.unwrap_err();
        assert!(matches!(err, CaptionError::Api { status: 403, .. }));
        assert_eq!(service.calls().len(), 2);
    }

    #[tokio::test]
    async fn download_requires_selection() {
        let service = Arc::new(FakeService::with_tracks(vec![track("capA", "English", "en")]));
        let mut session = api_key_session(&service);
        session.submit_url("https://youtu.be/dQw4w9WgXcQ").await.unwrap();

        assert!(matches!(session.download().await, Err(CaptionError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn selection_must_refer_to_listed_track() {
        let service = Arc::new(FakeService::with_tracks(vec![
            track("capA", "English", "en"),
            track("capB", "Deutsch", "de"),
        ]));
        let mut session = api_key_session(&service);

        assert!(session.select_track(&TrackSelector::Index(1)).is_err());
        session.submit_url("https://youtu.be/dQw4w9WgXcQ").await.unwrap();

        assert!(session.select_track(&TrackSelector::Index(0)).is_err());
        assert!(session.select_track(&TrackSelector::Index(3)).is_err());
        assert!(session.select_track(&TrackSelector::Id("capZ".into())).is_err());
        assert_eq!(session.select_track(&TrackSelector::Index(2)).unwrap().id, "capB");
    }

    #[tokio::test]
    async fn new_url_clears_selection() {
        let service = Arc::new(FakeService::with_tracks(vec![track("capA", "English", "en")]));
        let mut session = api_key_session(&service);
        session.submit_url("https://youtu.be/dQw4w9WgXcQ").await.unwrap();
        session.select_track(&TrackSelector::Index(1)).unwrap();

        let _ = session.submit_url("https://example.com/").await;
        assert!(session.selected_track().is_none());
        assert!(session.tracks().is_empty());
    }

    #[tokio::test]
    async fn oauth_session_asks_for_authorization_then_resumes() {
        let service = Arc::new(FakeService::with_tracks(vec![track("capA", "English", "en")]));
        let mut session = oauth_session(&service);
        assert!(session.credential().is_none());

        let step = session.submit_url("https://youtu.be/dQw4w9WgXcQ").await.unwrap();
        let Step::AuthorizationRequired { url } = step else {
            panic!("expected authorization step, got {step:?}");
        };
        assert!(Url::parse(&url).is_ok());
        assert_eq!(session.negotiation_status(), Some(NegotiationStatus::AwaitingCode));
        assert!(service.calls().is_empty());

        let err = session.submit_code("stale").await.unwrap_err();
        assert!(matches!(err, CaptionError::Exchange(_)));

        let step = session.submit_code("good").await.unwrap();
        assert!(matches!(step, Step::TracksReady(ref t) if t.len() == 1));
        assert_eq!(service.calls(), vec!["list dQw4w9WgXcQ via oauth"]);

        session.select_track(&TrackSelector::Index(1)).unwrap();
        session.download().await.unwrap();
        assert_eq!(service.calls()[1], "download capA via oauth");
    }

    #[tokio::test]
    async fn code_without_pending_url_just_authorizes() {
        let service = Arc::new(FakeService::default());
        let mut session = oauth_session(&service);

        assert!(session.begin_authorization().unwrap().is_some());
        assert_eq!(session.submit_code("good").await.unwrap(), Step::Authorized);
        assert!(session.begin_authorization().unwrap().is_none());
        assert!(matches!(
            session.submit_code("good").await,
            Err(CaptionError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn api_key_session_has_no_authorization_step() {
        let service = Arc::new(FakeService::default());
        let mut session = api_key_session(&service);

        assert_eq!(session.negotiation_status(), None);
        assert!(session.begin_authorization().unwrap().is_none());
        assert!(session.submit_code("good").await.unwrap_err().is_fatal());
    }

    #[test]
    fn blank_api_key_fails_session_creation() {
        let result = Session::new(
            &AuthMode::ApiKey(String::new()),
            Arc::new(FakeService::default()),
            Arc::new(FakeExchanger),
        );
        assert!(matches!(result, Err(CaptionError::Configuration(_))));
    }

    #[tokio::test]
    async fn registry_keeps_sessions_apart() {
        let service = Arc::new(FakeService::default());
        let mut registry = SessionRegistry::new(oauth_mode(), service, Arc::new(FakeExchanger));

        registry.session("alice").unwrap().begin_authorization().unwrap();
        registry.session("alice").unwrap().submit_code("good").await.unwrap();

        assert!(registry.session("alice").unwrap().credential().is_some());
        assert!(registry.session("bob").unwrap().credential().is_none());
        assert_eq!(registry.len(), 2);

        assert!(registry.end("alice"));
        assert!(!registry.end("alice"));
        assert!(registry.session("alice").unwrap().credential().is_none());
    }

    #[test]
    fn selector_parsing() {
        assert_eq!("2".parse::<TrackSelector>().unwrap(), TrackSelector::Index(2));
        assert_eq!(
            " AUieDaZ ".parse::<TrackSelector>().unwrap(),
            TrackSelector::Id("AUieDaZ".into())
        );
        assert!("".parse::<TrackSelector>().is_err());
    }
}
