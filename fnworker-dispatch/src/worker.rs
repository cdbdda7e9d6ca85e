//! The receive loop.
//!
//! [`Worker::run`] reads [`StreamingMessage`]s from the inbound channel
//! until the host sends a terminate message or closes the channel. Each
//! invocation runs on its own task so a slow handler never holds up the
//! stream; every other message is handled in arrival order, which keeps
//! a load ahead of the invocations that depend on it.

use crate::dispatch::Dispatcher;
use crate::error::DispatchError;
use fnworker_proto::{Content, DurationMs, StreamingMessage};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

/// Owns a [`Dispatcher`] and drives it from a message channel.
#[derive(Debug, Clone)]
pub struct Worker {
    dispatcher: Arc<Dispatcher>,
}

impl Worker {
    /// Wrap `dispatcher`.
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
        }
    }

    /// The shared dispatcher.
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// An inbound channel sized from the worker options.
    pub fn inbound_channel(&self) -> (mpsc::Sender<StreamingMessage>, mpsc::Receiver<StreamingMessage>) {
        mpsc::channel(self.dispatcher.options().inbound_capacity)
    }

    /// Run until terminated.
    ///
    /// On [`WorkerTerminate`](fnworker_proto::WorkerTerminate) the loop
    /// stops reading and waits up to the message's grace period for
    /// in-flight invocations; if the inbound channel simply closes, the
    /// configured shutdown grace period applies instead. Invocations
    /// still running after the grace period are abandoned.
    pub async fn run(
        self,
        mut inbound: mpsc::Receiver<StreamingMessage>,
        outbound: mpsc::Sender<StreamingMessage>,
    ) -> Result<(), DispatchError> {
        let worker_id = self.dispatcher.options().worker_id.clone();
        tracing::info!(worker_id = %worker_id, "worker started");

        let mut invocations = JoinSet::new();
        let grace_period = loop {
            tokio::select! {
                message = inbound.recv() => match message {
                    None => {
                        tracing::info!("inbound channel closed");
                        break self.dispatcher.options().shutdown_grace_period;
                    }
                    Some(StreamingMessage { content: Content::WorkerTerminate(terminate), .. }) => {
                        tracing::info!(grace_period = %terminate.grace_period, "terminate requested");
                        break terminate.grace_period;
                    }
                    Some(message @ StreamingMessage { content: Content::InvocationRequest(_), .. }) => {
                        let dispatcher = Arc::clone(&self.dispatcher);
                        let outbound = outbound.clone();
                        invocations.spawn(async move {
                            if let Some(reply) = dispatcher.handle(message).await {
                                if outbound.send(reply).await.is_err() {
                                    tracing::warn!("outbound channel closed before invocation reply was sent");
                                }
                            }
                        });
                    }
                    Some(message) => {
                        if let Some(reply) = self.dispatcher.handle(message).await {
                            outbound.send(reply).await.map_err(|_| DispatchError::OutboundClosed)?;
                        }
                    }
                },
                Some(joined) = invocations.join_next() => {
                    if let Err(e) = joined {
                        tracing::error!(error = %e, "invocation task failed");
                    }
                }
            }
        };

        drain(&mut invocations, grace_period).await;
        tracing::info!(worker_id = %worker_id, "worker stopped");
        Ok(())
    }
}

async fn drain(invocations: &mut JoinSet<()>, grace_period: DurationMs) {
    if invocations.is_empty() {
        return;
    }

    let deadline = tokio::time::sleep(grace_period.to_std());
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            joined = invocations.join_next() => match joined {
                None => return,
                Some(Err(e)) => tracing::error!(error = %e, "invocation task failed"),
                Some(Ok(())) => {}
            },
            _ = &mut deadline => {
                tracing::warn!(
                    remaining = invocations.len(),
                    "grace period elapsed with invocations still running"
                );
                invocations.shutdown().await;
                return;
            }
        }
    }
}
