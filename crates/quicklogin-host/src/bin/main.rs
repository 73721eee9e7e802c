//! Quick Login Manager background host
//!
//! Launched by the browser as a native-messaging host (stdio), or run by
//! hand with `--http` for local tooling. Logs go to stderr so they never
//! mix with framed messages on stdout.
//!
//! Browsers append their own arguments when launching a host: Chrome passes
//! the caller origin (`chrome-extension://<id>/`, plus `--parent-window=<n>`
//! on Windows), Firefox passes the manifest path and the add-on id.

use clap::Parser;
use std::path::PathBuf;
use tracing::{debug, info};

use quicklogin_core::{default_data_dir, Background};
use quicklogin_host::origin::extension_id_from_origin;
use quicklogin_host::{HostServer, ServerMode};

/// Quick Login Manager - background host for the browser extension
#[derive(Parser, Debug)]
#[command(name = "quicklogin-host")]
#[command(version)]
#[command(about = "Quick Login Manager - credential storage and autofill matching host")]
struct Args {
    /// Run in stdio mode (native messaging, the default)
    #[arg(long)]
    stdio: bool,

    /// Run in HTTP mode with specified port
    #[arg(long)]
    http: bool,

    /// Port for HTTP server
    #[arg(long, default_value = "3917")]
    port: u16,

    /// Directory holding settings and storage files
    #[arg(long, env = "QUICKLOGIN_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Extension id mixed into the device key
    #[arg(long, env = "QUICKLOGIN_EXTENSION_ID")]
    extension_id: Option<String>,

    /// Native window handle of the calling browser (Chrome on Windows)
    #[arg(long = "parent-window", hide = true)]
    parent_window: Option<String>,

    /// Arguments appended by the launching browser
    #[arg(hide = true)]
    browser_args: Vec<String>,
}

impl Args {
    /// Configured extension id, else the one in the caller origin Chrome passed
    fn extension_id(&self) -> Option<String> {
        self.extension_id.clone().or_else(|| {
            self.browser_args
                .iter()
                .find_map(|arg| extension_id_from_origin(arg))
                .map(str::to_string)
        })
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    if !args.browser_args.is_empty() {
        debug!("Launched with browser arguments {:?}", args.browser_args);
    }

    let data_dir = match args.data_dir.clone() {
        Some(dir) => dir,
        None => default_data_dir()
            .map_err(|e| format!("Failed to locate data directory: {}", e))?,
    };

    let background = Background::open(&data_dir, args.extension_id());

    let mode = if args.http && !args.stdio {
        ServerMode::Http { port: args.port }
    } else {
        ServerMode::Stdio
    };

    info!("Using data directory {:?}", data_dir);

    HostServer::new(background).with_mode(mode).run().await?;

    Ok(())
}
