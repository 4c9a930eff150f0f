//! Command-line client for the TraderEdge session and payment core.
//!
//! Each invocation opens the shared state file as its own client tab, runs
//! one command and exits. `watch` keeps the tab open and prints session
//! changes made by other invocations.

use anyhow::{Context, Result};
use pico_args::Arguments;
use std::ffi::OsString;
use std::io::{self, Write};
use std::path::PathBuf;

use traderedge_cli::{app::App, commands::Command, commands::parse_command};
use traderedge_core::config::CoreConfig;

const HELP: &str = "\
Manage TraderEdge sessions and reconcile payments

USAGE:
  traderedge [OPTIONS] COMMAND [ARGS]

COMMANDS:
  register FIRST LAST EMAIL [PLAN]           Create an account and log in
  login EMAIL                                Log in through the identity service
  admin-login admin|customer-service PIN     Open a staff session
  logout [user|admin|customer-service]       Close one session  [default: user]
  status                                     Show the effective session
  refresh                                    Extend the effective session
  pay card INTENT PLAN                       Reconcile a card payment
  pay alt ORDER PLAN                         Reconcile an alternative processor order
  pay crypto TX ETH|SOL|BTC AMOUNT PLAN      Reconcile an on-chain transfer
  receipt PAYMENT_ID                         Print a receipt for a recorded payment
  history                                    List recorded payments
  export                                     Print a JSON backup of the user record
  import FILE                                Restore the user record from a backup
  watch                                      Print session changes until Ctrl+C

OPTIONS:
  --state      PATH        State file  [default: env TRADEREDGE_STATE_PATH or traderedge_state.json]
  --password   PASS        Account password for register/login  [default: prompt]

FLAGS:
  -h, --help               Print help information

ENVIRONMENT:
  ADMIN_PIN                      Admin staff PIN (admin login disabled if unset)
  CUSTOMER_SERVICE_PIN           Customer service staff PIN
  SESSION_LIFETIME_HOURS         Session lifetime  [default: 24]
  SESSION_POLL_INTERVAL_SECS     Expiry poll period  [default: 60]
  PAYMENT_API_URL                Payment Verification Service base URL
  PAYMENT_NOTIFICATION_URL       Payment confirmation endpoint
  IDENTITY_API_URL               Identity Service base URL
  CARD_PUBLIC_KEY, CARD_ACCOUNT_ID, ALT_CLIENT_ID, ALT_MERCHANT_ID
  ETH_WALLET, SOL_WALLET, BTC_WALLET
  (A .env file in the working directory is loaded first)
";

struct Args {
    state: Option<PathBuf>,
    password: Option<String>,
    words: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    env_logger::builder().format_target(false).init();

    let mut pargs = Arguments::from_env();

    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let args = Args {
        state: pargs.opt_value_from_str("--state")?,
        password: pargs.opt_value_from_str("--password")?,
        words: pargs
            .finish()
            .into_iter()
            .map(OsString::into_string)
            .collect::<Result<_, _>>()
            .map_err(|arg| anyhow::anyhow!("Argument is not valid UTF-8: {:?}", arg))?,
    };

    run(args).await
}

async fn run(args: Args) -> Result<()> {
    let command = parse_command(&args.words)?;

    let mut config = CoreConfig::from_env().context("Invalid configuration")?;
    if let Some(path) = args.state {
        config.storage.path = path;
    }
    let app = App::open(&config)?;

    if command == Command::Watch {
        return app.watch(shutdown_signal()).await;
    }

    let password = match args.password {
        Some(password) => Some(password),
        None if command.needs_password() => Some(prompt("Password: ")?),
        None => None,
    };

    let output = app.execute(command, password).await?;
    println!("{}", output);
    Ok(())
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for Ctrl+C: {}", e);
        return;
    }
    log::info!("Stopping watch");
}
