//! Coordinator actor
//!
//! Runs a `QueryCoordinator` on its own tokio task so brush events from the
//! UI and results from the engine connection are serialized through one
//! queue. Nothing inside the coordinator needs a lock.
//!
//! ```text
//! brush events ──┐
//!                ├──► CoordinatorActor ──► Transport ──► engine
//! results ───────┘          │
//!                           └──► ResultConsumer
//! ```

use super::error::CoordinatorError;
use super::message::{ResolutionSpec, ResultMessage};
use super::query::{LoadOutcome, QueryCoordinator, Resolution, ResultOutcome};
use super::transport::Transport;
use crate::dimension::Interval;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

type Reply<T> = oneshot::Sender<Result<T, CoordinatorError>>;

/// Messages for the coordinator actor
pub enum CoordinatorMessage {
    Init {
        resolutions: Vec<ResolutionSpec>,
        response_tx: Reply<()>,
    },
    /// Brush moved. `forward` also sends `setRange` to the engine.
    SetState {
        dimension: String,
        range: Interval,
        forward: bool,
        response_tx: Option<Reply<Resolution>>,
    },
    /// Point request. `background` sends a preload hint instead of a load.
    Load {
        dimension: String,
        value: f64,
        background: bool,
        response_tx: Option<Reply<LoadOutcome>>,
    },
    /// Result from the engine
    Result(Box<ResultMessage>),
    /// Graceful shutdown
    Shutdown { response_tx: oneshot::Sender<()> },
}

struct CoordinatorActor<T: Transport> {
    coordinator: QueryCoordinator<T>,
    rx: mpsc::UnboundedReceiver<CoordinatorMessage>,
}

impl<T: Transport> CoordinatorActor<T> {
    /// Run until shutdown or until every handle is dropped; hands the
    /// coordinator back so callers can inspect its final state.
    async fn run(mut self) -> QueryCoordinator<T> {
        while let Some(msg) = self.rx.recv().await {
            if self.handle_message(msg) {
                break;
            }
        }
        self.coordinator
    }

    /// Returns true on shutdown
    fn handle_message(&mut self, msg: CoordinatorMessage) -> bool {
        match msg {
            CoordinatorMessage::Init {
                resolutions,
                response_tx,
            } => {
                let _ = response_tx.send(self.coordinator.init(&resolutions));
                false
            }
            CoordinatorMessage::SetState {
                dimension,
                range,
                forward,
                response_tx,
            } => {
                let result = if forward {
                    self.coordinator.set_range(&dimension, range)
                } else {
                    self.coordinator.set_state(&dimension, range)
                };
                reply(response_tx, result);
                false
            }
            CoordinatorMessage::Load {
                dimension,
                value,
                background,
                response_tx,
            } => {
                let result = if background {
                    self.coordinator.preload(&dimension, value)
                } else {
                    self.coordinator.load(&dimension, value)
                };
                reply(response_tx, result);
                false
            }
            CoordinatorMessage::Result(result) => {
                match self.coordinator.handle_result(*result) {
                    Ok(ResultOutcome::Stale) => debug!("Result dropped as stale"),
                    Ok(_) => {}
                    Err(e) => error!("Result intake failed: {}", e),
                }
                false
            }
            CoordinatorMessage::Shutdown { response_tx } => {
                info!("Coordinator actor shutting down");
                let _ = response_tx.send(());
                true
            }
        }
    }
}

fn reply<R>(response_tx: Option<Reply<R>>, result: Result<R, CoordinatorError>) {
    match response_tx {
        Some(tx) => {
            let _ = tx.send(result);
        }
        None => {
            if let Err(e) = result {
                error!("Fire-and-forget request failed: {}", e);
            }
        }
    }
}

/// Handle for sending messages to the coordinator actor
#[derive(Clone)]
pub struct CoordinatorHandle {
    tx: mpsc::UnboundedSender<CoordinatorMessage>,
}

impl CoordinatorHandle {
    async fn request<R>(
        &self,
        build: impl FnOnce(Reply<R>) -> CoordinatorMessage,
    ) -> Result<R, CoordinatorError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.tx
            .send(build(response_tx))
            .map_err(|_| CoordinatorError::ActorClosed)?;
        response_rx.await.unwrap_or(Err(CoordinatorError::ActorClosed))
    }

    pub async fn init(&self, resolutions: Vec<ResolutionSpec>) -> Result<(), CoordinatorError> {
        self.request(|response_tx| CoordinatorMessage::Init {
            resolutions,
            response_tx,
        })
        .await
    }

    /// Brush moved; also asks the engine to compute the range
    pub async fn set_range(
        &self,
        dimension: impl Into<String>,
        range: Interval,
    ) -> Result<Resolution, CoordinatorError> {
        let dimension = dimension.into();
        self.request(|response_tx| CoordinatorMessage::SetState {
            dimension,
            range,
            forward: true,
            response_tx: Some(response_tx),
        })
        .await
    }

    /// Brush moved; answer from cache only
    pub async fn set_state(
        &self,
        dimension: impl Into<String>,
        range: Interval,
    ) -> Result<Resolution, CoordinatorError> {
        let dimension = dimension.into();
        self.request(|response_tx| CoordinatorMessage::SetState {
            dimension,
            range,
            forward: false,
            response_tx: Some(response_tx),
        })
        .await
    }

    pub async fn load(
        &self,
        dimension: impl Into<String>,
        value: f64,
    ) -> Result<LoadOutcome, CoordinatorError> {
        let dimension = dimension.into();
        self.request(|response_tx| CoordinatorMessage::Load {
            dimension,
            value,
            background: false,
            response_tx: Some(response_tx),
        })
        .await
    }

    pub async fn preload(
        &self,
        dimension: impl Into<String>,
        value: f64,
    ) -> Result<LoadOutcome, CoordinatorError> {
        let dimension = dimension.into();
        self.request(|response_tx| CoordinatorMessage::Load {
            dimension,
            value,
            background: true,
            response_tx: Some(response_tx),
        })
        .await
    }

    /// Brush moved, without waiting for the outcome (mouse-move path)
    pub fn set_range_nowait(&self, dimension: impl Into<String>, range: Interval) {
        let _ = self.tx.send(CoordinatorMessage::SetState {
            dimension: dimension.into(),
            range,
            forward: true,
            response_tx: None,
        });
    }

    /// Hand an engine result to the actor (fire-and-forget)
    pub fn deliver_result(&self, result: ResultMessage) {
        if self
            .tx
            .send(CoordinatorMessage::Result(Box::new(result)))
            .is_err()
        {
            debug!("Coordinator actor gone, dropping result");
        }
    }

    /// Graceful shutdown; returns once every earlier message was processed
    pub async fn shutdown(&self) {
        let (response_tx, response_rx) = oneshot::channel();
        if self
            .tx
            .send(CoordinatorMessage::Shutdown { response_tx })
            .is_ok()
        {
            let _ = response_rx.await;
        }
    }
}

/// Spawn a coordinator actor and return its handle + join handle. The join
/// handle resolves to the coordinator once the actor stops.
pub fn spawn_coordinator<T>(
    coordinator: QueryCoordinator<T>,
) -> (CoordinatorHandle, tokio::task::JoinHandle<QueryCoordinator<T>>)
where
    T: Transport + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    let actor = CoordinatorActor { coordinator, rx };
    let task = tokio::spawn(actor.run());
    (CoordinatorHandle { tx }, task)
}
