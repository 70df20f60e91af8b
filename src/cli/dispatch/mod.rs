use crate::{
    cli::actions::{Action, server::Args},
    upstream::{Credentials, UpstreamKind},
};
use anyhow::{Context, Result};
use secrecy::SecretString;
use std::time::Duration;

/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    crate::cli::commands::validate(matches).map_err(|e| anyhow::anyhow!(e))?;

    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);

    let upstream = matches
        .get_one::<String>("upstream")
        .context("missing required argument: --upstream")?
        .parse::<UpstreamKind>()?;

    let base_url = matches
        .get_one::<String>("base-url")
        .cloned()
        .unwrap_or_else(|| upstream.default_base_url().to_string());

    let path_template = matches
        .get_one::<String>("path-template")
        .cloned()
        .context("missing required argument: --path-template")?;

    let credentials = if matches.get_flag("sign-requests") {
        let client_id = matches
            .get_one::<String>("client-id")
            .cloned()
            .context("missing required argument: --client-id")?;
        let client_secret = matches
            .get_one::<String>("client-secret")
            .cloned()
            .context("missing required argument: --client-secret")?;

        Some(Credentials::new(client_id, SecretString::from(client_secret)))
    } else {
        None
    };

    let timeout = Duration::from_secs(matches.get_one::<u64>("timeout").copied().unwrap_or(10));

    Ok(Action::Server(Args {
        port,
        upstream,
        base_url,
        path_template,
        credentials,
        timeout,
    }))
}
