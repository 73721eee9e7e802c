//! # quicklogin-host
//!
//! Background host for Quick Login Manager. Serves the extension's
//! action-keyed messages over native messaging (stdio) or local HTTP.

pub mod origin;
pub mod protocol;
mod server;
pub mod transport;

pub use protocol::{Request, RequestHandler, Response};
pub use server::{HostServer, ServerMode};
pub use transport::{HttpTransport, StdioTransport};
