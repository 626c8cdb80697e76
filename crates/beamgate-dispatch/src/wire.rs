//! Wire protocol of the manager transport.
//!
//! Frames carry a u32 big-endian length prefix and are capped at 16 MiB.
//! Each frame body is a codec-processed JSON document: requests are
//! `{"method": …, "params": …}`, replies are arbitrary JSON. A reply
//! object carrying `"success": false` is a manager-side rejection.

use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

use crate::error::DispatchError;

/// Maximum frame size on the wire.
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// A framed manager connection.
pub type ManagerFrames = Framed<TcpStream, LengthDelimitedCodec>;

/// Wraps a connected stream in the length-delimited framing.
pub fn frame_stream<T>(io: T) -> Framed<T, LengthDelimitedCodec>
where
    T: AsyncRead + AsyncWrite,
{
    LengthDelimitedCodec::builder()
        .length_field_type::<u32>()
        .max_frame_length(MAX_FRAME_SIZE)
        .new_framed(io)
}

/// One request to the manager.
#[derive(Debug, Clone, Serialize)]
pub struct Request {
    pub method: String,
    pub params: Value,
}

impl Request {
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self {
            method: method.into(),
            params,
        }
    }

    /// The JSON frame body for this request.
    pub fn to_bytes(&self) -> Result<Vec<u8>, DispatchError> {
        serde_json::to_vec(self)
            .map_err(|error| DispatchError::transport(format!("request not serializable: {error}")))
    }
}

/// Interprets a reply frame body.
///
/// # Errors
///
/// A body that is not JSON is a [`DispatchError::TransportError`]; the
/// connection that produced it can no longer be trusted. A JSON object
/// with `"success": false` is a [`DispatchError::RemoteError`] carrying
/// the manager's `"msg"` text.
pub fn parse_reply(body: &[u8]) -> Result<Value, DispatchError> {
    let reply: Value = serde_json::from_slice(body)
        .map_err(|error| DispatchError::transport(format!("malformed reply: {error}")))?;

    if let Some(object) = reply.as_object() {
        if object.get("success").and_then(Value::as_bool) == Some(false) {
            let message = object
                .get("msg")
                .and_then(Value::as_str)
                .unwrap_or("manager reported failure without a message");
            return Err(DispatchError::remote(message));
        }
    }
    Ok(reply)
}
