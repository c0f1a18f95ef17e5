//! Sandbox process for one isolated plugin context.
//!
//! Spawned by the host with piped stdin and stdout. Logs and anything the
//! plugin prints go to stderr; stdout carries protocol frames only.

use std::io::{self, BufWriter};
use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use jobhost_plugin::sandbox::channel::claim_stdout;
use jobhost_plugin::sandbox::{SandboxRuntime, SandboxSettings, SearchPath, ShadowCopy};

/// Hosts a single plugin module for the JobHost scheduler.
#[derive(Debug, Parser)]
#[command(name = "jobhost-sandbox", version)]
struct Args {
    /// Unique context name.
    #[arg(long)]
    context: String,

    /// Host base path.
    #[arg(long)]
    base: PathBuf,

    /// Plugin directory, relative to the base path when under it.
    #[arg(long)]
    private: Option<PathBuf>,

    /// Directory to shadow-copy modules into.
    #[arg(long, conflicts_with = "no_shadow_copy")]
    shadow_dir: Option<PathBuf>,

    /// Load modules in place.
    #[arg(long)]
    no_shadow_copy: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let shadow = match args.shadow_dir {
        Some(dir) if !args.no_shadow_copy => ShadowCopy::into_dir(dir),
        _ => ShadowCopy::disabled(),
    };
    let settings = SandboxSettings {
        context: args.context,
        search_path: SearchPath::from_parts(args.base, args.private.unwrap_or_default()),
        shadow,
    };

    let protocol = match claim_stdout() {
        Ok(out) => BufWriter::new(out),
        Err(e) => {
            tracing::error!(error = %e, "Cannot set up the protocol channel");
            std::process::exit(1);
        }
    };

    if let Err(e) = SandboxRuntime::new(settings).serve(io::stdin().lock(), protocol) {
        tracing::error!(error = %e, "Sandbox stopped on a broken pipe");
        std::process::exit(1);
    }
}
