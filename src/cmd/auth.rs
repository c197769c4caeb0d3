use anyhow::Result;

use capgrab::{Credential, Session};

use super::output::print_authorization_prompt;
use super::{authorize, stdin_lines};

pub async fn cmd_auth(session: &mut Session) -> Result<()> {
    let Some(url) = session.begin_authorization()? else {
        println!("✅ Using an API key, no authorization needed");
        return Ok(());
    };

    print_authorization_prompt(&url);
    let mut input = stdin_lines();
    authorize(session, &mut input).await?;

    if let Some(Credential::OAuth(bundle)) = session.credential() {
        println!("✅ Authorized");
        println!("   Token type: {}", bundle.token_type);
        println!("   Scopes: {}", bundle.scopes.join(" "));
        println!("   Obtained: {}", bundle.obtained_at.to_rfc3339());
        if bundle.refresh_token.is_some() {
            println!("   Refresh token: [present, not used]");
        }
    }

    Ok(())
}
