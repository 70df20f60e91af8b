mod logging;
mod upstream;

use clap::{
    Arg, ColorChoice, Command,
    builder::styling::{AnsiColor, Effects, Styles},
};

/// Signing needs both halves of the client credentials.
///
/// # Errors
/// Returns an error string if `--sign-requests` is set without `--client-id`
/// and `--client-secret`.
pub fn validate(matches: &clap::ArgMatches) -> Result<(), String> {
    if !matches.get_flag("sign-requests") {
        return Ok(());
    }

    for id in ["client-id", "client-secret"] {
        let present = matches
            .get_one::<String>(id)
            .is_some_and(|value| !value.trim().is_empty());

        if !present {
            return Err(format!(
                "Missing required argument: --{id} (required with --sign-requests)"
            ));
        }
    }

    Ok(())
}

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::GIT_COMMIT_HASH).into_boxed_str(),
    );

    let command = Command::new("usef-validator")
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .help("Port to listen on")
                .default_value("8080")
                .env("USEF_PORT")
                .value_parser(clap::value_parser!(u16)),
        );

    let command = upstream::with_args(command);
    logging::with_args(command)
}
