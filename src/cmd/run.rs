use std::path::Path;

use anyhow::Result;
use tokio::io::{AsyncBufRead, Lines};

use capgrab::{Session, TrackSelector, session::DOWNLOAD_FILE_NAME};

use super::output::{print_tracks, save_artifact};
use super::{is_fatal, obtain_tracks, prompt, stdin_lines};

/// Interactive loop: URL, authorization when needed, selection, download.
///
/// Errors end the current round only; configuration errors end the session.
pub async fn cmd_run(session: &mut Session) -> Result<()> {
    let mut input = stdin_lines();
    println!("🎬 Enter a YouTube video URL to fetch its caption tracks (Ctrl-D to quit)");

    loop {
        let Some(url) = prompt(&mut input, "YouTube video URL").await? else {
            break;
        };
        if url.is_empty() {
            continue;
        }

        let tracks = match obtain_tracks(session, &url, &mut input).await {
            Ok(tracks) => tracks,
            Err(e) if is_fatal(&e) => return Err(e),
            Err(e) => {
                eprintln!("❌ {e}");
                continue;
            }
        };
        print_tracks(&tracks);

        if !choose_track(session, &mut input).await? {
            break;
        }

        let Some(target) = prompt(&mut input, &format!("Save as [{DOWNLOAD_FILE_NAME}]")).await?
        else {
            break;
        };
        match session.download().await {
            Ok(artifact) => {
                let target = (!target.is_empty()).then(|| Path::new(target.as_str()));
                if let Err(e) = save_artifact(&artifact, target) {
                    eprintln!("❌ {e:#}");
                }
            }
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => eprintln!("❌ Error downloading caption: {e}"),
        }
    }

    println!("👋 Bye");
    Ok(())
}

/// Ask until the answer names one of the listed tracks.
///
/// Returns `false` when input ends first.
async fn choose_track<R: AsyncBufRead + Unpin>(
    session: &mut Session,
    input: &mut Lines<R>,
) -> Result<bool> {
    loop {
        let Some(choice) = prompt(input, "Select a caption track [1]").await? else {
            return Ok(false);
        };
        let selector = if choice.is_empty() {
            Ok(TrackSelector::Index(1))
        } else {
            choice.parse::<TrackSelector>()
        };
        match selector.and_then(|selector| session.select_track(&selector).map(|_| ())) {
            Ok(()) => return Ok(true),
            Err(e) => eprintln!("❌ {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use tokio::io::AsyncBufReadExt;

    use capgrab::oauth::TokenResponse;
    use capgrab::{
        AuthMode, CaptionContent, CaptionError, CaptionService, CaptionTrack, Credential,
        OAuthClientConfig, TokenExchanger, VideoId,
    };

    use super::*;

    struct TwoTracks;

    #[async_trait]
    impl CaptionService for TwoTracks {
        async fn list_tracks(
            &self,
            _video: &VideoId,
            _credential: &Credential,
        ) -> capgrab::Result<Vec<CaptionTrack>> {
            Ok(["capA", "capB"]
                .iter()
                .map(|id| CaptionTrack {
                    id: (*id).to_string(),
                    name: "English".into(),
                    language: "en".into(),
                    track_kind: None,
                })
                .collect())
        }

        async fn download_track(
            &self,
            track_id: &str,
            _credential: &Credential,
        ) -> capgrab::Result<CaptionContent> {
            Ok(CaptionContent {
                track_id: track_id.to_string(),
                srt: String::new(),
            })
        }
    }

    struct NoExchange;

    #[async_trait]
    impl TokenExchanger for NoExchange {
        async fn exchange_code(
            &self,
            _client: &OAuthClientConfig,
            _code: &str,
        ) -> capgrab::Result<TokenResponse> {
            Err(CaptionError::Exchange("unused".into()))
        }
    }

    async fn listed_session() -> Session {
        let mut session = Session::new(
            &AuthMode::ApiKey("k".into()),
            Arc::new(TwoTracks),
            Arc::new(NoExchange),
        )
        .unwrap();
        session.submit_url("https://youtu.be/dQw4w9WgXcQ").await.unwrap();
        session
    }

    #[tokio::test]
    async fn invalid_choice_asks_again_for_the_same_listing() {
        let mut session = listed_session().await;
        let mut input = (&b"9\nnope\n2\n"[..]).lines();

        assert!(choose_track(&mut session, &mut input).await.unwrap());
        assert_eq!(session.selected_track().unwrap().id, "capB");
        assert_eq!(session.tracks().len(), 2);
    }

    #[tokio::test]
    async fn empty_choice_picks_first_track() {
        let mut session = listed_session().await;
        let mut input = (&b"\n"[..]).lines();

        assert!(choose_track(&mut session, &mut input).await.unwrap());
        assert_eq!(session.selected_track().unwrap().id, "capA");
    }

    #[tokio::test]
    async fn end_of_input_stops_choosing() {
        let mut session = listed_session().await;
        let mut input = (&b"0\n"[..]).lines();

        assert!(!choose_track(&mut session, &mut input).await.unwrap());
        assert!(session.selected_track().is_none());
    }
}
