use anyhow::Result;

use capgrab::Session;

use super::output::{print_tracks, print_tracks_json};
use super::{is_empty_result, obtain_tracks, stdin_lines};

pub async fn cmd_tracks(session: &mut Session, url: &str, json: bool) -> Result<()> {
    let mut input = stdin_lines();

    let tracks = match obtain_tracks(session, url, &mut input).await {
        Ok(tracks) => tracks,
        Err(e) if is_empty_result(&e) => {
            if json {
                println!("[]");
            } else {
                println!("❌ {e}");
            }
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    if json {
        print_tracks_json(&tracks)
    } else {
        print_tracks(&tracks);
        Ok(())
    }
}
