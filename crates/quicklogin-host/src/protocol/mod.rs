//! Extension message protocol and dispatch

mod handler;
mod types;

pub use handler::RequestHandler;
pub use types::*;
