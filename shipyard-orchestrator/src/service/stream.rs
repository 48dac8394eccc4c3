//! Stream Publisher
//!
//! One task per subscription samples the pipeline record on a fixed
//! interval and pushes an event per sample into the subscriber's channel:
//! `pipeline_started` right away, `agent_progress` on every tick, and a
//! single terminal event once the pipeline completes or fails. Dropping the
//! receiver cancels the task before its next tick.

use shipyard_core::domain::PipelineState;
use shipyard_core::event::{EventClock, StreamEvent};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use uuid::Uuid;

use crate::error::Result;
use crate::repository::PipelineRepository;

/// Events buffered per subscriber before sampling waits on the consumer
const CHANNEL_CAPACITY: usize = 16;

#[derive(Clone)]
pub struct StreamPublisher {
    pipelines: PipelineRepository,
    poll_interval: Duration,
}

impl StreamPublisher {
    pub fn new(pipelines: PipelineRepository, poll_interval: Duration) -> Self {
        Self {
            pipelines,
            poll_interval,
        }
    }

    /// Open a subscription. Fails with `NotFound` if the pipeline does not
    /// exist at subscribe time.
    pub async fn subscribe(&self, id: Uuid) -> Result<mpsc::Receiver<StreamEvent>> {
        let initial = self.pipelines.get(id).await?;
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);

        tracing::debug!("Stream subscription opened for pipeline {}", id);
        tokio::spawn(self.clone().publish(id, initial, tx));

        Ok(rx)
    }

    async fn publish(self, id: Uuid, initial: PipelineState, tx: mpsc::Sender<StreamEvent>) {
        let mut clock = EventClock::new();
        if tx
            .send(StreamEvent::pipeline_started(&initial, clock.now()))
            .await
            .is_err()
        {
            return;
        }

        let mut ticks = tokio::time::interval_at(Instant::now() + self.poll_interval, self.poll_interval);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_revision = None;

        loop {
            let sample = tokio::select! {
                _ = tx.closed() => {
                    tracing::debug!("Stream subscription for pipeline {} cancelled", id);
                    return;
                }
                _ = ticks.tick() => {
                    tokio::select! {
                        _ = tx.closed() => {
                            tracing::debug!("Stream subscription for pipeline {} cancelled", id);
                            return;
                        }
                        sample = self.pipelines.snapshot(id) => sample,
                    }
                }
            };

            let timestamp = clock.now();
            let event = match sample {
                Ok(snapshot) => {
                    if last_revision != Some(snapshot.revision) {
                        tracing::debug!(
                            "Pipeline {} at revision {} ({})",
                            id,
                            snapshot.revision,
                            snapshot.state.status
                        );
                        last_revision = Some(snapshot.revision);
                    }

                    if let Some(terminal) = StreamEvent::terminal(&snapshot.state, timestamp) {
                        let _ = tx.send(terminal).await;
                        tracing::debug!(
                            "Stream subscription for pipeline {} closed ({})",
                            id,
                            snapshot.state.status
                        );
                        return;
                    }
                    StreamEvent::agent_progress(&snapshot.state, timestamp)
                }
                Err(err) if err.is_not_found() => {
                    tracing::warn!("Pipeline {} vanished while streaming", id);
                    let _ = tx.send(StreamEvent::error(err.to_string(), timestamp)).await;
                    return;
                }
                Err(err) => {
                    tracing::warn!("Stream sample of pipeline {} failed: {}", id, err);
                    StreamEvent::error(format!("failed to read pipeline state: {}", err), timestamp)
                }
            };

            if tx.send(event).await.is_err() {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryKv;
    use crate::repository::KvHandle;
    use crate::repository::testing::FaultyKv;
    use shipyard_core::domain::{Mode, PipelineFailure};
    use shipyard_core::event::EventType;
    use std::sync::Arc;

    const TICK: Duration = Duration::from_millis(10);

    fn publisher() -> (StreamPublisher, PipelineRepository) {
        let kv = KvHandle::new(Arc::new(MemoryKv::new()), Duration::from_secs(1));
        let pipelines = PipelineRepository::new(kv);
        (StreamPublisher::new(pipelines.clone(), TICK), pipelines)
    }

    async fn next(rx: &mut mpsc::Receiver<StreamEvent>) -> Option<StreamEvent> {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("stream stalled")
    }

    #[tokio::test]
    async fn test_started_then_progress_every_tick() {
        let (publisher, pipelines) = publisher();
        let state = PipelineState::new(Uuid::new_v4(), Mode::Hackathon);
        pipelines.create(&state).await.unwrap();

        let mut rx = publisher.subscribe(state.id).await.unwrap();

        let started = next(&mut rx).await.unwrap();
        assert_eq!(started.event_type, EventType::PipelineStarted);
        assert_eq!(started.data["id"], state.id.to_string());
        assert_eq!(started.data["mode"], "hackathon");

        // Unchanged state still produces a progress event per tick
        for _ in 0..3 {
            let event = next(&mut rx).await.unwrap();
            assert_eq!(event.event_type, EventType::AgentProgress);
            assert_eq!(event.data["status"], "initializing");
        }
    }

    #[tokio::test]
    async fn test_subscribe_unknown_pipeline() {
        let (publisher, _) = publisher();
        let err = publisher.subscribe(Uuid::new_v4()).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_terminal_event_is_last() {
        let (publisher, pipelines) = publisher();
        let state = PipelineState::new(Uuid::new_v4(), Mode::Hackathon);
        pipelines.create(&state).await.unwrap();
        let mut rx = publisher.subscribe(state.id).await.unwrap();
        next(&mut rx).await.unwrap();

        pipelines
            .update(state.id, |s| Ok(s.fail(PipelineFailure::new("needs rework"))?))
            .await
            .unwrap();

        let mut events = Vec::new();
        while let Some(event) = next(&mut rx).await {
            events.push(event);
        }

        let last = events.last().unwrap();
        assert_eq!(last.event_type, EventType::PipelineFailed);
        assert_eq!(last.data["error"]["message"], "needs rework");
        assert_eq!(events.iter().filter(|e| e.event_type.is_terminal()).count(), 1);
        assert!(events.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[tokio::test]
    async fn test_transient_read_failure_keeps_stream_open() {
        let kv = FaultyKv::new();
        let pipelines = PipelineRepository::new(KvHandle::new(kv.clone(), Duration::from_secs(1)));
        let publisher = StreamPublisher::new(pipelines.clone(), TICK);
        let state = PipelineState::new(Uuid::new_v4(), Mode::Refactor);
        pipelines.create(&state).await.unwrap();

        let mut rx = publisher.subscribe(state.id).await.unwrap();
        assert_eq!(next(&mut rx).await.unwrap().event_type, EventType::PipelineStarted);

        kv.fail_next_reads(1);
        let error = next(&mut rx).await.unwrap();
        assert_eq!(error.event_type, EventType::Error);

        let progress = next(&mut rx).await.unwrap();
        assert_eq!(progress.event_type, EventType::AgentProgress);
    }

    #[tokio::test]
    async fn test_vanished_pipeline_closes_stream() {
        let (publisher, _) = publisher();
        // Record that was never stored: every sample reports it missing
        let state = PipelineState::new(Uuid::new_v4(), Mode::Hackathon);
        let (tx, mut rx) = mpsc::channel(CHANNEL_CAPACITY);

        tokio::spawn(publisher.publish(state.id, state, tx));

        assert_eq!(next(&mut rx).await.unwrap().event_type, EventType::PipelineStarted);
        assert_eq!(next(&mut rx).await.unwrap().event_type, EventType::Error);
        assert!(next(&mut rx).await.is_none());
    }

    #[tokio::test]
    async fn test_dropping_receiver_stops_sampling() {
        let (publisher, pipelines) = publisher();
        let state = PipelineState::new(Uuid::new_v4(), Mode::Hackathon);
        pipelines.create(&state).await.unwrap();
        let (tx, mut rx) = mpsc::channel(CHANNEL_CAPACITY);

        let task = tokio::spawn(publisher.publish(state.id, state, tx));
        next(&mut rx).await.unwrap();
        drop(rx);

        tokio::time::timeout(TICK * 5, task)
            .await
            .expect("publisher kept running after cancellation")
            .unwrap();
    }
}
