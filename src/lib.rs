//! `capgrab` - YouTube caption discovery and SubRip download
//!
//! # Features
//!
//! - **Two auth modes**: static API key, or OAuth2 authorization-code grant
//! - **Caption catalog**: list the tracks of a video with language labels
//! - **SubRip download**: fetch any accessible track as `.srt`
//! - **Re-entrant sessions**: the workflow pauses for user input by
//!   returning, never by blocking
//!
//! # Example
//!
//! ```rust,no_run
//! use capgrab::{Config, Session, Step, TrackSelector};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::with_api_key("AIza...");
//!     let mut session = Session::connect(&config)?;
//!
//!     if let Step::TracksReady(tracks) = session.submit_url("https://youtu.be/dQw4w9WgXcQ").await? {
//!         println!("{} tracks", tracks.len());
//!         session.select_track(&TrackSelector::Index(1))?;
//!         let artifact = session.download().await?;
//!         std::fs::write(artifact.file_name, artifact.content)?;
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod credential;
pub mod error;
pub mod http_client;
pub mod oauth;
pub mod session;
pub mod video_id;
pub mod youtube;

pub use config::{AuthMode, Config, OAuthClientConfig};
pub use credential::{Credential, CredentialStore, OAuthBundle};
pub use error::{CaptionError, Result};
pub use oauth::{AuthorizationNegotiator, HttpTokenExchanger, NegotiationStatus, TokenExchanger};
pub use session::{DownloadArtifact, Session, SessionRegistry, Step, TrackSelector};
pub use video_id::VideoId;
pub use youtube::{CaptionContent, CaptionService, CaptionTrack, YouTubeApi};

/// Version of capgrab
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
