mod auth;
mod download;
mod output;
mod run;
mod tracks;

use std::io::Write;
use std::path::Path;

use anyhow::{bail, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};

use capgrab::{CaptionError, CaptionTrack, Config, Session, Step};

pub use auth::cmd_auth;
pub use download::cmd_download;
pub use run::cmd_run;
pub use tracks::cmd_tracks;

/// Line-oriented reader over stdin used for every prompt.
pub type Input = Lines<BufReader<Stdin>>;

pub fn stdin_lines() -> Input {
    BufReader::new(tokio::io::stdin()).lines()
}

/// Load configuration and open a session against the real API.
pub fn open_session(config: Option<&Path>, api_key: Option<String>) -> Result<Session> {
    let config = Config::load(config, api_key)?;
    Ok(Session::connect(&config)?)
}

/// Print `label` and read one trimmed line. `None` on end of input.
pub async fn prompt<R: AsyncBufRead + Unpin>(
    input: &mut Lines<R>,
    label: &str,
) -> Result<Option<String>> {
    eprint!("{label}: ");
    std::io::stderr().flush()?;
    Ok(input.next_line().await?.map(|line| line.trim().to_string()))
}

/// Whether an error ends the session rather than the current action.
pub fn is_fatal(err: &anyhow::Error) -> bool {
    err.downcast_ref::<CaptionError>()
        .is_some_and(CaptionError::is_fatal)
}

pub fn is_empty_result(err: &anyhow::Error) -> bool {
    matches!(err.downcast_ref::<CaptionError>(), Some(CaptionError::EmptyResult))
}

/// Read codes from `input` until one exchanges successfully.
pub async fn authorize(session: &mut Session, input: &mut Input) -> Result<Step> {
    loop {
        let Some(code) = prompt(input, "Enter the authorization code").await? else {
            bail!("authorization cancelled: no code entered");
        };
        match session.submit_code(&code).await {
            Err(e @ (CaptionError::Exchange(_) | CaptionError::InvalidInput(_))) => {
                eprintln!("❌ {e}");
                eprintln!("   Authorize again if needed and paste the new code.");
            }
            other => return Ok(other?),
        }
    }
}

/// Submit `url`, completing the authorization step on the way if needed.
pub async fn obtain_tracks(
    session: &mut Session,
    url: &str,
    input: &mut Input,
) -> Result<Vec<CaptionTrack>> {
    let mut step = session.submit_url(url).await?;
    loop {
        step = match step {
            Step::TracksReady(tracks) => return Ok(tracks),
            Step::AuthorizationRequired { url: auth_url } => {
                output::print_authorization_prompt(&auth_url);
                authorize(session, input).await?
            }
            Step::Authorized => session.submit_url(url).await?,
        };
    }
}
