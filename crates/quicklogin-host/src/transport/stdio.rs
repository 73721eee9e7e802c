//! stdio transport using the browser native-messaging framing
//!
//! Each message is a 32-bit length in native byte order followed by that
//! many bytes of UTF-8 JSON, in both directions.

use serde::Serialize;
use std::io;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, error, info, warn};

use crate::protocol::{RequestHandler, StatusResponse};

/// Largest message the browser accepts from a native host
pub const MAX_OUTGOING_MESSAGE: usize = 1024 * 1024;

/// Largest incoming message we are willing to buffer
pub const MAX_INCOMING_MESSAGE: usize = 64 * 1024 * 1024;

/// Framing errors
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Message of {0} bytes exceeds the size limit")]
    MessageTooLarge(usize),
}

/// Read one framed message. Returns `None` only when input ends on a frame
/// boundary; a partial header or body is an error.
pub async fn read_message<R>(reader: &mut R) -> Result<Option<Vec<u8>>, TransportError>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; 4];
    let first = reader.read(&mut header).await?;
    if first == 0 {
        return Ok(None);
    }
    reader.read_exact(&mut header[first..]).await?;

    let len = u32::from_ne_bytes(header) as usize;
    if len > MAX_INCOMING_MESSAGE {
        return Err(TransportError::MessageTooLarge(len));
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    Ok(Some(body))
}

/// Serialize `message` and write it as one frame
pub async fn write_message<W, T>(writer: &mut W, message: &T) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
    T: Serialize + ?Sized,
{
    let body = serde_json::to_vec(message)?;
    if body.len() > MAX_OUTGOING_MESSAGE {
        return Err(TransportError::MessageTooLarge(body.len()));
    }

    writer.write_all(&(body.len() as u32).to_ne_bytes()).await?;
    writer.write_all(&body).await?;
    writer.flush().await?;
    Ok(())
}

/// stdio transport for the extension's native-messaging port
pub struct StdioTransport {
    handler: RequestHandler,
}

impl StdioTransport {
    /// Create a new stdio transport
    pub fn new(handler: RequestHandler) -> Self {
        Self { handler }
    }

    /// Serve stdin/stdout until the browser closes the port
    pub async fn run(&self) -> Result<(), Box<dyn std::error::Error>> {
        info!("Starting native messaging host on stdio");

        let mut stdin = tokio::io::stdin();
        let mut stdout = tokio::io::stdout();
        self.serve(&mut stdin, &mut stdout).await?;
        Ok(())
    }

    /// Answer every framed message from `reader` on `writer`, in order
    pub async fn serve<R, W>(
        &self,
        reader: &mut R,
        writer: &mut W,
    ) -> Result<(), TransportError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        while let Some(body) = read_message(reader).await? {
            debug!("Received {} byte message", body.len());

            let response = match serde_json::from_slice(&body) {
                Ok(message) => self.handler.handle(message).await,
                Err(e) => {
                    error!("Failed to parse message: {}", e);
                    StatusResponse::failed(format!("Parse error: {}", e)).into()
                }
            };

            match write_message(writer, &response).await {
                Err(TransportError::MessageTooLarge(len)) => {
                    warn!("Response of {} bytes is too large for the browser", len);
                    let fallback = StatusResponse::failed("Response too large");
                    write_message(writer, &fallback).await?;
                }
                other => other?,
            }
        }

        info!("Port closed, shutting down");
        Ok(())
    }
}
