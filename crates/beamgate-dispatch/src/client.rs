//! Caller-side handle for the dispatcher.

use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use crate::TRACING_TARGET_CLIENT;
use crate::error::DispatchError;
use crate::wire::Request;
use crate::worker::PendingCall;

/// Cheap, cloneable handle submitting calls to the transport worker.
///
/// Any number of tasks may hold one; the worker serves their calls
/// strictly in submission order.
#[derive(Debug, Clone)]
pub struct ManagerClient {
    queue: mpsc::Sender<PendingCall>,
    request_timeout: Duration,
}

impl ManagerClient {
    pub(crate) fn new(queue: mpsc::Sender<PendingCall>, request_timeout: Duration) -> Self {
        Self {
            queue,
            request_timeout,
        }
    }

    /// Calls a manager method with the configured deadline.
    ///
    /// # Errors
    ///
    /// [`DispatchError::Busy`] when the queue is full, [`DispatchError::Timeout`]
    /// when no reply arrived in time, [`DispatchError::TransportError`] when the
    /// connection failed, and [`DispatchError::RemoteError`] when the manager
    /// rejected the call.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value, DispatchError> {
        self.call_with_timeout(method, params, self.request_timeout)
            .await
    }

    /// Calls a manager method with a caller-supplied deadline.
    pub async fn call_with_timeout(
        &self,
        method: &str,
        params: Value,
        timeout: Duration,
    ) -> Result<Value, DispatchError> {
        let id = Uuid::new_v4();
        let (reply, receiver) = oneshot::channel();
        let call = PendingCall {
            id,
            request: Request::new(method, params),
            timeout,
            reply,
        };

        self.queue.try_send(call).map_err(|error| match error {
            TrySendError::Full(_) => {
                tracing::debug!(
                    target: TRACING_TARGET_CLIENT,
                    call_id = %id,
                    method,
                    "dispatch queue is full"
                );
                DispatchError::Busy
            }
            TrySendError::Closed(_) => DispatchError::transport("dispatcher is shut down"),
        })?;

        // The worker drops the sender only when it stops between the
        // submission and the send.
        receiver
            .await
            .map_err(|_| DispatchError::transport("dispatcher is shut down"))?
    }
}
