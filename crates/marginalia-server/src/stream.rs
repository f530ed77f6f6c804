//! Coalescing task update streams
//!
//! A subscriber gets the current snapshot at once, then one event per
//! distinct `(progress, stage)` observation made at each poll. Updates between
//! two polls collapse to the latest. The stream ends when the result is
//! cached, the task fails, or the cancellation token fires. Ending a stream
//! never affects the worker.

use crate::orchestrator::{Observation, TaskKind, TaskOrchestrator};
use futures::{stream, Stream};
use marginalia_domain::{BookId, TaskSnapshot, TaskStatus};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// One event on an update stream
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// A task snapshot, or the synthetic `complete` once the result is cached
    Update(TaskSnapshot),
    /// Nothing is known about the book; always the only event
    NotFound,
}

type Observed = (Option<u8>, Option<String>);

enum Phase {
    Start,
    Polling { last: Observed, sleep_first: bool },
    Done,
}

struct Subscription {
    orchestrator: Arc<TaskOrchestrator>,
    kind: TaskKind,
    id: BookId,
    cancel: CancellationToken,
    phase: Phase,
}

impl Subscription {
    fn complete_event(&self) -> StreamEvent {
        StreamEvent::Update(TaskSnapshot {
            stage: None,
            ..TaskSnapshot::complete(self.kind.stream_complete_message())
        })
    }

    /// Sleep one poll interval; `false` if cancelled meanwhile
    async fn wait(&self) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(self.orchestrator.config().stream_poll) => true,
        }
    }

    async fn next_event(&mut self) -> Option<StreamEvent> {
        loop {
            match std::mem::replace(&mut self.phase, Phase::Done) {
                Phase::Done => return None,

                Phase::Start => {
                    return match self.orchestrator.observe(self.kind, &self.id) {
                        Observation::Cached => Some(self.complete_event()),
                        Observation::Missing => Some(StreamEvent::NotFound),
                        Observation::Live(snapshot) => {
                            if snapshot.status != TaskStatus::Error {
                                self.phase = Phase::Polling {
                                    last: observed(&snapshot),
                                    sleep_first: false,
                                };
                            }
                            Some(StreamEvent::Update(snapshot))
                        }
                    };
                }

                Phase::Polling { last, sleep_first } => {
                    if (sleep_first && !self.wait().await) || self.cancel.is_cancelled() {
                        debug!("Update stream for book {} cancelled", self.id);
                        return None;
                    }

                    match self.orchestrator.observe(self.kind, &self.id) {
                        Observation::Cached => return Some(self.complete_event()),
                        Observation::Live(snapshot) if snapshot.status == TaskStatus::Error => {
                            return Some(StreamEvent::Update(snapshot));
                        }
                        Observation::Live(snapshot) if observed(&snapshot) != last => {
                            self.phase = Phase::Polling {
                                last: observed(&snapshot),
                                sleep_first: true,
                            };
                            return Some(StreamEvent::Update(snapshot));
                        }
                        Observation::Live(_) | Observation::Missing => {
                            self.phase = Phase::Polling {
                                last,
                                sleep_first: true,
                            };
                        }
                    }
                }
            }
        }
    }
}

fn observed(snapshot: &TaskSnapshot) -> Observed {
    let (progress, stage) = snapshot.observation();
    (progress, stage.map(str::to_string))
}

/// Coalesced updates for one task
pub fn task_updates(
    orchestrator: Arc<TaskOrchestrator>,
    kind: TaskKind,
    id: BookId,
    cancel: CancellationToken,
) -> impl Stream<Item = StreamEvent> + Send + 'static {
    let subscription = Subscription {
        orchestrator,
        kind,
        id,
        cancel,
        phase: Phase::Start,
    };

    stream::unfold(subscription, |mut subscription| async move {
        let event = subscription.next_event().await?;
        Some((event, subscription))
    })
}
