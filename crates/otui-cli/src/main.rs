mod context;
mod error;
mod providers;
mod repl;

use std::path::PathBuf;

use clap::Parser;
use secrecy::SecretString;
use tracing::info;

use context::AppContext;

#[derive(Parser)]
#[command(name = "otui", about = "Terminal multi-provider LLM chat client")]
struct Cli {
    /// Log level (trace, debug, info, warn, error). Overridden by `RUST_LOG`.
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Enable debug-level logging (equivalent to OTUI_DEBUG=1).
    #[arg(long, default_value_t = false)]
    debug: bool,

    /// Custom data directory, overriding `settings.toml`'s `data_directory`.
    #[arg(long, env = "OTUI_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Passphrase for an encrypted SSH key, when the vault is in `ssh_key`
    /// mode. Prefer `OTUI_SSH_PASSPHRASE` over this flag on shared machines.
    #[arg(long, env = "OTUI_SSH_PASSPHRASE")]
    ssh_passphrase: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let debug = cli.debug || otui_config::env_subst::debug_enabled() || cli.log_level == "debug";
    otui_config::logging::init(debug);

    info!(version = env!("CARGO_PKG_VERSION"), "otui starting");

    let passphrase = cli.ssh_passphrase.map(SecretString::from);
    let mut ctx = AppContext::bootstrap(cli.data_dir, passphrase).await?;

    ctx.start_session_plugins().await?;
    repl::run(&mut ctx).await?;

    Ok(())
}
