use std::fs::File;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};

use capgrab::{CaptionTrack, DownloadArtifact};

pub fn print_authorization_prompt(url: &str) {
    eprintln!("🔐 Authorization required");
    eprintln!("   Open this link, approve access, and paste the code shown:");
    eprintln!("\n{url}\n");
}

pub fn print_tracks(tracks: &[CaptionTrack]) {
    println!("📝 {} caption track(s):", tracks.len());
    for (i, track) in tracks.iter().enumerate() {
        let auto = if track.is_auto_generated() { "  [auto]" } else { "" };
        println!("   {:>2}. {}{auto}", i + 1, track.label());
        println!("       id: {}", track.id);
    }
}

pub fn print_tracks_json(tracks: &[CaptionTrack]) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(tracks)?);
    Ok(())
}

/// Write the artifact to `target`, its suggested file name, or stdout (`-`).
pub fn save_artifact(artifact: &DownloadArtifact, target: Option<&Path>) -> Result<()> {
    let path = target.unwrap_or_else(|| Path::new(artifact.file_name));

    if path == Path::new("-") {
        print!("{}", artifact.content);
        std::io::stdout().flush()?;
        return Ok(());
    }

    let mut file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    file.write_all(artifact.content.as_bytes())?;
    eprintln!(
        "💾 Saved {} bytes ({}) to {}",
        artifact.content.len(),
        artifact.mime,
        path.display()
    );
    Ok(())
}
