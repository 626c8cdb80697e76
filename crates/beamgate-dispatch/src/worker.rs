//! The transport worker.
//!
//! The manager speaks strict alternation: one request on the wire, then
//! exactly one reply, before the next request may be sent. The worker is
//! the sole owner of that connection. Callers never touch it; they queue
//! a [`PendingCall`] and await its oneshot.

use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, timeout_at};
use tokio_util::sync::CancellationToken;

use crate::TRACING_TARGET_WORKER;
use crate::client::ManagerClient;
use crate::codec::PayloadCodec;
use crate::config::DispatchConfig;
use crate::error::DispatchError;
use crate::wire::{self, ManagerFrames, Request};

/// One queued call awaiting the transport.
pub(crate) struct PendingCall {
    /// Correlation id, for tracing only.
    pub(crate) id: uuid::Uuid,
    pub(crate) request: Request,
    /// Deadline span covering connect, send, and reply.
    pub(crate) timeout: Duration,
    pub(crate) reply: oneshot::Sender<Result<Value, DispatchError>>,
}

/// What the worker observed while waiting for work.
enum Step {
    Cancelled,
    Call(PendingCall),
    /// Every client handle is gone.
    Closed,
    /// The idle connection produced a frame, an error, or EOF.
    Idle(Option<Result<BytesMut, std::io::Error>>),
}

/// Sole owner of the manager connection.
///
/// Serves queued calls strictly in submission order, one in flight at a
/// time. Any fault that leaves the connection in an unknown state drops
/// it, and the next call dials anew.
pub struct DispatchWorker {
    config: DispatchConfig,
    codec: Arc<dyn PayloadCodec>,
    queue: mpsc::Receiver<PendingCall>,
    cancel_token: CancellationToken,
}

impl DispatchWorker {
    /// Creates a worker and the client handle feeding it.
    pub fn new(
        config: DispatchConfig,
        codec: Arc<dyn PayloadCodec>,
        cancel_token: CancellationToken,
    ) -> (Self, ManagerClient) {
        let (sender, receiver) = mpsc::channel(config.queue_capacity);
        let client = ManagerClient::new(sender, config.request_timeout);
        let worker = Self {
            config,
            codec,
            queue: receiver,
            cancel_token,
        };
        (worker, client)
    }

    /// Spawns the worker as a background task.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move { self.run().await })
    }

    /// Runs the worker loop, serving calls as they arrive.
    async fn run(mut self) {
        tracing::info!(
            target: TRACING_TARGET_WORKER,
            address = %self.config.address,
            "starting transport worker"
        );

        // Connected lazily, dropped on any fault.
        let mut connection: Option<ManagerFrames> = None;

        loop {
            let step = if let Some(frames) = connection.as_mut() {
                tokio::select! {
                    biased;

                    () = self.cancel_token.cancelled() => Step::Cancelled,

                    call = self.queue.recv() => match call {
                        Some(call) => Step::Call(call),
                        None => Step::Closed,
                    },

                    frame = frames.next() => Step::Idle(frame),
                }
            } else {
                tokio::select! {
                    biased;

                    () = self.cancel_token.cancelled() => Step::Cancelled,

                    call = self.queue.recv() => match call {
                        Some(call) => Step::Call(call),
                        None => Step::Closed,
                    },
                }
            };

            let call = match step {
                Step::Cancelled => {
                    tracing::info!(
                        target: TRACING_TARGET_WORKER,
                        "shutdown requested, stopping transport worker"
                    );
                    break;
                }
                Step::Closed => {
                    tracing::debug!(
                        target: TRACING_TARGET_WORKER,
                        "all client handles dropped, stopping transport worker"
                    );
                    break;
                }
                Step::Idle(frame) => {
                    // Nothing is in flight, so any traffic means the peer
                    // and the worker disagree about whose turn it is.
                    self.log_idle_traffic(frame);
                    connection = None;
                    continue;
                }
                Step::Call(call) => call,
            };

            // The caller may have given up while queued.
            if call.reply.is_closed() {
                tracing::debug!(
                    target: TRACING_TARGET_WORKER,
                    call_id = %call.id,
                    method = %call.request.method,
                    "caller gone before send, skipping"
                );
                continue;
            }

            let outcome = self.serve(&mut connection, &call.request, call.timeout).await;

            // Timeout and transport faults leave the connection in an
            // unknown state; a late reply must die with the socket
            // rather than be matched to the next call.
            if matches!(
                outcome,
                Err(DispatchError::Timeout { .. } | DispatchError::TransportError { .. })
            ) && connection.take().is_some()
            {
                tracing::warn!(
                    target: TRACING_TARGET_WORKER,
                    call_id = %call.id,
                    method = %call.request.method,
                    "transport fault, dropping manager connection"
                );
            }

            if let Err(ref error) = outcome {
                tracing::debug!(
                    target: TRACING_TARGET_WORKER,
                    call_id = %call.id,
                    method = %call.request.method,
                    error = %error,
                    "call failed"
                );
            }

            // A dropped receiver means nobody is waiting anymore.
            let _ = call.reply.send(outcome);
        }

        self.drain();
    }

    /// Sends one request and waits for exactly one reply, connecting on
    /// demand. The deadline spans connect, send, and reply.
    async fn serve(
        &self,
        connection: &mut Option<ManagerFrames>,
        request: &Request,
        timeout: Duration,
    ) -> Result<Value, DispatchError> {
        let body = request.to_bytes()?;
        let sealed = self.codec.seal(&body)?;
        let deadline = Instant::now() + timeout;

        let frames = match connection {
            Some(frames) => frames,
            None => connection.insert(self.connect(deadline, timeout).await?),
        };

        timeout_at(deadline, frames.send(Bytes::from(sealed)))
            .await
            .map_err(|_| DispatchError::timeout(timeout))??;

        let frame = timeout_at(deadline, frames.next())
            .await
            .map_err(|_| DispatchError::timeout(timeout))?
            .ok_or_else(|| DispatchError::transport("connection closed by the manager"))??;

        let body = self.codec.open(&frame)?;
        wire::parse_reply(&body)
    }

    async fn connect(
        &self,
        deadline: Instant,
        timeout: Duration,
    ) -> Result<ManagerFrames, DispatchError> {
        let stream = timeout_at(deadline, TcpStream::connect(&self.config.address))
            .await
            .map_err(|_| DispatchError::timeout(timeout))?
            .map_err(|error| {
                DispatchError::transport(format!("connect to {}: {error}", self.config.address))
            })?;

        tracing::debug!(
            target: TRACING_TARGET_WORKER,
            address = %self.config.address,
            "connected to manager"
        );
        Ok(wire::frame_stream(stream))
    }

    fn log_idle_traffic(&self, frame: Option<Result<BytesMut, std::io::Error>>) {
        match frame {
            Some(Ok(frame)) => tracing::warn!(
                target: TRACING_TARGET_WORKER,
                bytes = frame.len(),
                "unsolicited frame while idle, resetting connection"
            ),
            Some(Err(error)) => tracing::debug!(
                target: TRACING_TARGET_WORKER,
                error = %error,
                "idle connection failed, resetting"
            ),
            None => tracing::debug!(
                target: TRACING_TARGET_WORKER,
                "manager closed the idle connection"
            ),
        }
    }

    /// Fails every call still queued at shutdown.
    fn drain(mut self) {
        self.queue.close();
        while let Ok(call) = self.queue.try_recv() {
            let _ = call
                .reply
                .send(Err(DispatchError::transport("shutting down")));
        }
        tracing::info!(target: TRACING_TARGET_WORKER, "transport worker stopped");
    }
}
