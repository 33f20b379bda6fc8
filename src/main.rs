//! lb-proxy
//!
//! Accepts HTTP requests and assigns each one a backend server.
//!
//! ```text
//!     Client Request
//!     ─────────▶ http server ─▶ load_balancer ─▶ JSON decision
//!                                   ▲
//!        config (hot reload) ───────┤
//!        health monitor ────────────┘
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "lb-proxy", version, about = "Multi-algorithm HTTP load balancer")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(default_value = "config.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match lb_proxy::lifecycle::run(&cli.config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Fatal error");
            eprintln!("lb-proxy: {e}");
            ExitCode::FAILURE
        }
    }
}
