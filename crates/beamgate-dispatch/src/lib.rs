#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod wire;
pub mod worker;

pub use crate::client::ManagerClient;
pub use crate::codec::{CodecError, PayloadCodec, PlainCodec, SealedCodec, TransportKey};
pub use crate::config::DispatchConfig;
pub use crate::error::DispatchError;
pub use crate::worker::DispatchWorker;

/// Tracing target for the transport worker.
pub const TRACING_TARGET_WORKER: &str = "beamgate_dispatch::worker";
/// Tracing target for the caller-side client.
pub const TRACING_TARGET_CLIENT: &str = "beamgate_dispatch::client";
