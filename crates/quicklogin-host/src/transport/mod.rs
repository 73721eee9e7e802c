//! Transport implementations for the background host

mod http;
mod stdio;

pub use http::{router, HttpTransport};
pub use stdio::{read_message, write_message, StdioTransport, TransportError};
