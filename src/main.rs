//! check_crl_url: active check for the remaining validity of a CRL.
//!
//! Fetches the revocation list from the given URL, decodes it and compares
//! the time until its next update against lower bound levels. Prints one
//! result line to stdout and exits with the matching plugin code; all
//! diagnostics go to stderr and only when asked for.

use std::process;
use std::time::Duration;

use chrono::Utc;
use clap::Parser;
use clap::error::ErrorKind;
use log::{LevelFilter, debug, info};

use check_crl_url::check::{self, CheckResult};
use check_crl_url::config::{CheckConfig, scrub_url};
use check_crl_url::crl;
use check_crl_url::fetch;

#[derive(Parser, Debug)]
#[command(
    name = "check_crl_url",
    version,
    about = "Check the remaining validity of a CRL published at an URL"
)]
struct Args {
    /// URL of the CRL distribution point
    #[arg(long)]
    url: String,

    /// Route the request through this HTTP/HTTPS proxy
    #[arg(long)]
    proxy: Option<String>,

    /// Warn if the CRL expires within this many seconds
    #[arg(long)]
    warning: Option<u32>,

    /// Critical if the CRL expires within this many seconds
    #[arg(long)]
    critical: Option<u32>,

    /// Connect and read timeout in seconds
    #[arg(long, default_value_t = 10)]
    timeout: u64,

    /// Log progress to stderr (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) {
                err.exit();
            }
            let result =
                CheckResult::unknown(format!("invalid arguments: {}", clap_error_summary(&err)));
            println!("{result}");
            process::exit(result.state.exit_code());
        }
    };

    init_logger(args.verbose);

    let result = run(&args);
    println!("{result}");
    process::exit(result.state.exit_code());
}

fn run(args: &Args) -> CheckResult {
    let config = match CheckConfig::new(
        &args.url,
        args.proxy.as_deref(),
        args.warning,
        args.critical,
        Duration::from_secs(args.timeout),
    ) {
        Ok(config) => config,
        Err(err) => return CheckResult::unknown(format!("invalid arguments: {err}")),
    };

    info!("checking CRL at {}", scrub_url(&config.url));
    let fetched = match fetch::fetch_crl(&config) {
        Ok(fetched) => fetched,
        Err(err) => return CheckResult::unknown(format!("fetching CRL failed: {err}")),
    };

    let crl = match crl::decode_crl(&fetched.bytes) {
        Ok(crl) => crl,
        Err(err) => return CheckResult::unknown(format!("decoding CRL failed: {err}")),
    };
    debug!("CRL issued by {}", crl.issuer);

    check::evaluate(&crl, config.levels, Utc::now())
}

fn init_logger(verbosity: u8) {
    let level = match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .format_timestamp(None)
        .init();
}

// clap renders usage errors over several lines; the output contract allows
// exactly one.
fn clap_error_summary(err: &clap::Error) -> String {
    let rendered = err.to_string();
    let mut parts = Vec::new();
    for line in rendered.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with("Usage:") {
            break;
        }
        parts.push(line);
    }
    if parts.is_empty() {
        return "invalid arguments".to_string();
    }
    parts.join(" ").trim_start_matches("error: ").to_string()
}
