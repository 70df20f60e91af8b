use crate::upstream::registry::DEFAULT_PATH_TEMPLATE;
use clap::{
    Arg, ArgAction, Command,
    builder::{FalseyValueParser, PossibleValuesParser},
};

pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("upstream")
                .long("upstream")
                .help("Membership registry to query")
                .long_help(
                    "Membership registry to query. `registry` is the USEF member API, `placeholder` a public JSON test API whose responses are flagged with testMode.",
                )
                .env("USEF_UPSTREAM")
                .default_value("registry")
                .value_parser(PossibleValuesParser::new(["registry", "placeholder"])),
        )
        .arg(
            Arg::new("base-url")
                .long("base-url")
                .help("Upstream base URL (defaults to the selected upstream's public URL)")
                .env("USEF_BASE_URL"),
        )
        .arg(
            Arg::new("path-template")
                .long("path-template")
                .help("Registry path placed before /{membershipId}/{lastName}")
                .env("USEF_PATH_TEMPLATE")
                .default_value(DEFAULT_PATH_TEMPLATE),
        )
        .arg(
            Arg::new("sign-requests")
                .long("sign-requests")
                .help("Attach the HMAC-SHA256 signed Authorization header to registry calls")
                .env("USEF_SIGN_REQUESTS")
                .action(ArgAction::SetTrue)
                .value_parser(FalseyValueParser::new()),
        )
        .arg(
            Arg::new("client-id")
                .long("client-id")
                .help("Registry client id (required with --sign-requests)")
                .env("USEF_CLIENT_ID"),
        )
        .arg(
            Arg::new("client-secret")
                .long("client-secret")
                .help("Registry client secret (required with --sign-requests)")
                .env("USEF_CLIENT_SECRET")
                .hide_env_values(true),
        )
        .arg(
            Arg::new("timeout")
                .long("timeout")
                .help("Upstream request timeout in seconds")
                .env("USEF_TIMEOUT")
                .default_value("10")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
}
