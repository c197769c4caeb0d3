use std::path::Path;

use anyhow::Result;

use capgrab::{Session, TrackSelector};

use super::output::save_artifact;
use super::{obtain_tracks, stdin_lines};

/// List the tracks of `url`, pick one (first by default), and save it.
pub async fn cmd_download(
    session: &mut Session,
    url: &str,
    track: Option<&str>,
    output: Option<&Path>,
) -> Result<()> {
    let mut input = stdin_lines();
    let tracks = obtain_tracks(session, url, &mut input).await?;
    eprintln!("📝 Found {} caption track(s)", tracks.len());

    let selector = match track {
        Some(choice) => choice.parse::<TrackSelector>()?,
        None => TrackSelector::Index(1),
    };
    let label = session.select_track(&selector)?.label();
    eprintln!("⬇️  Downloading {label}");

    let artifact = session.download().await?;
    save_artifact(&artifact, output)
}
