//! Host orchestration

use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

use crate::protocol::RequestHandler;
use crate::transport::{HttpTransport, StdioTransport};
use quicklogin_core::Background;

/// Server mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServerMode {
    /// Native messaging on stdio (launched by the browser)
    #[default]
    Stdio,
    /// HTTP on localhost
    Http { port: u16 },
}

/// Background host serving extension messages
pub struct HostServer {
    background: Arc<Mutex<Background>>,
    mode: ServerMode,
}

impl HostServer {
    /// Create a new host server
    pub fn new(background: Background) -> Self {
        Self {
            background: Arc::new(Mutex::new(background)),
            mode: ServerMode::default(),
        }
    }

    /// Set the server mode
    pub fn with_mode(mut self, mode: ServerMode) -> Self {
        self.mode = mode;
        self
    }

    /// Run the server
    pub async fn run(&self) -> Result<(), Box<dyn std::error::Error>> {
        let handler = RequestHandler::new(self.background.clone());

        match self.mode {
            ServerMode::Stdio => {
                info!("Starting host in stdio mode");
                StdioTransport::new(handler).run().await
            }
            ServerMode::Http { port } => {
                info!("Starting host in HTTP mode on port {}", port);
                HttpTransport::new(handler, port).run().await
            }
        }
    }
}
