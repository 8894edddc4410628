//! Round ingestion plumbing.
//!
//! Producers (a log reader, a socket task) hold a [`FeedSender`] and may
//! live on any task. The session itself is single-threaded, so only the
//! owner of the [`Simulation`] drains the feed and applies payloads, one at
//! a time, in arrival order.

use std::collections::BTreeMap;

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tracing::debug;

use crate::config::OrderingPolicy;
use crate::error::{EngineError, EngineResult};
use crate::simulation::{IngestOutcome, Simulation};
use crate::snapshot::RoundPayload;

#[derive(Debug, Clone, PartialEq)]
pub enum Admission {
    Ready(RoundPayload),
    Buffered(u32),
}

/// Holds payloads that arrived ahead of the expected round.
#[derive(Debug, Clone, Default)]
pub struct ReorderBuffer {
    policy: OrderingPolicy,
    pending: BTreeMap<u32, RoundPayload>,
}

impl ReorderBuffer {
    pub fn new(policy: OrderingPolicy) -> Self {
        Self {
            policy,
            pending: BTreeMap::new(),
        }
    }

    pub fn policy(&self) -> OrderingPolicy {
        self.policy
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Decides what to do with `payload` while the timeline waits for `expected`.
    pub fn admit(&mut self, expected: u32, payload: RoundPayload) -> EngineResult<Admission> {
        let received = payload.round;
        if received == expected {
            return Ok(Admission::Ready(payload));
        }
        let out_of_order = EngineError::Sequence { expected, received };
        match self.policy {
            OrderingPolicy::Reject => Err(out_of_order),
            OrderingPolicy::Reorder { window } => {
                if received < expected
                    || received - expected > window
                    || self.pending.contains_key(&received)
                {
                    return Err(out_of_order);
                }
                self.pending.insert(received, payload);
                Ok(Admission::Buffered(received))
            }
        }
    }

    /// Releases the buffered payload for `expected`, if it already arrived.
    pub fn take(&mut self, expected: u32) -> Option<RoundPayload> {
        self.pending.remove(&expected)
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

pub type FeedSender = mpsc::Sender<RoundPayload>;

/// Tally of one drain or run.
#[derive(Debug, Default)]
pub struct FeedReport {
    pub applied: usize,
    pub buffered: usize,
    pub ignored: usize,
    pub games_opened: usize,
    pub rejected: Vec<EngineError>,
}

impl FeedReport {
    fn ingest(&mut self, simulation: &mut Simulation, payload: RoundPayload) {
        match simulation.ingest(payload) {
            Ok(IngestOutcome::Applied(_)) => self.applied += 1,
            Ok(IngestOutcome::Buffered(_)) => self.buffered += 1,
            Ok(IngestOutcome::GameOpened(_)) => self.games_opened += 1,
            Ok(IngestOutcome::Ignored) => self.ignored += 1,
            Err(error) => self.rejected.push(error),
        }
        // Buffered rounds released by this payload may have failed on their own.
        self.rejected.extend(simulation.take_late_rejections());
    }

    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }
}

pub struct RoundFeed {
    tx: FeedSender,
    rx: mpsc::Receiver<RoundPayload>,
}

impl RoundFeed {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self { tx, rx }
    }

    pub fn sender(&self) -> FeedSender {
        self.tx.clone()
    }

    /// Applies whatever is queued right now without waiting.
    pub fn drain(&mut self, simulation: &mut Simulation) -> FeedReport {
        let mut report = FeedReport::default();
        while let Ok(payload) = self.rx.try_recv() {
            report.ingest(simulation, payload);
        }
        report
    }

    /// Applies payloads until every sender handed out has been dropped.
    pub async fn run(self, simulation: &mut Simulation) -> FeedReport {
        let Self { tx, rx } = self;
        drop(tx);
        let mut stream = ReceiverStream::new(rx);
        let mut report = FeedReport::default();
        while let Some(payload) = stream.next().await {
            report.ingest(simulation, payload);
        }
        debug!(applied = report.applied, "round feed closed");
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::snapshot::{AgentSnapshot, WorldSnapshot};

    fn payload(round: u32) -> RoundPayload {
        RoundPayload {
            event_type: "Round".into(),
            round,
            after_world: WorldSnapshot::default(),
            groups_data: Vec::new(),
        }
    }

    #[test]
    fn reject_policy_only_admits_expected_round() {
        let mut buffer = ReorderBuffer::new(OrderingPolicy::Reject);
        assert!(matches!(buffer.admit(2, payload(2)), Ok(Admission::Ready(_))));
        assert_eq!(
            buffer.admit(2, payload(3)),
            Err(EngineError::Sequence {
                expected: 2,
                received: 3
            })
        );
        assert!(buffer.is_empty());
    }

    #[test]
    fn reorder_policy_buffers_within_window() {
        let mut buffer = ReorderBuffer::new(OrderingPolicy::Reorder { window: 2 });
        assert_eq!(buffer.admit(1, payload(3)), Ok(Admission::Buffered(3)));
        assert!(buffer.admit(1, payload(3)).is_err());
        assert!(buffer.admit(1, payload(4)).is_err());
        assert!(buffer.admit(1, payload(0)).is_err());
        assert_eq!(buffer.len(), 1);

        assert!(buffer.take(2).is_none());
        assert_eq!(buffer.take(3).map(|payload| payload.round), Some(3));
        assert!(buffer.is_empty());
    }

    #[tokio::test]
    async fn drain_applies_queued_payloads_in_order() {
        let mut simulation = Simulation::new(ClientConfig::default());
        let mut feed = RoundFeed::new(8);
        let sender = feed.sender();
        for round in [0, 1, 3] {
            sender.send(payload(round)).await.unwrap();
        }

        let report = feed.drain(&mut simulation);
        assert_eq!(report.applied, 2);
        assert_eq!(
            report.rejected,
            vec![EngineError::Sequence {
                expected: 2,
                received: 3
            }]
        );
        assert_eq!(simulation.state().max_rounds, 1);
    }

    #[tokio::test]
    async fn failed_buffered_round_is_reported_once() {
        let mut config = ClientConfig::default();
        config.editor.width = 3;
        config.editor.height = 3;
        config.playback.ordering = OrderingPolicy::Reorder { window: 2 };
        let mut simulation = Simulation::new(config);
        let mut feed = RoundFeed::new(8);
        let sender = feed.sender();

        let mut stray = payload(2);
        stray.after_world.agent_data.push(AgentSnapshot {
            id: 1,
            gid: 1,
            x: 9,
            y: 9,
            energy_level: 10,
            command_sent: String::new(),
            steps_taken: 0,
        });
        for payload in [payload(0), stray, payload(1)] {
            sender.send(payload).await.unwrap();
        }

        let report = feed.drain(&mut simulation);
        assert_eq!(report.applied, 2);
        assert_eq!(report.buffered, 1);
        assert_eq!(report.rejected.len(), 1);
        assert!(matches!(
            report.rejected[0],
            EngineError::OutOfBounds { x: 9, y: 9, .. }
        ));
        assert_eq!(simulation.state().max_rounds, 1);
    }

    #[tokio::test]
    async fn run_finishes_when_producers_hang_up() {
        let mut simulation = Simulation::new(ClientConfig::default());
        let feed = RoundFeed::new(2);
        let sender = feed.sender();
        let producer = tokio::spawn(async move {
            for round in 0..4 {
                sender.send(payload(round)).await.unwrap();
            }
        });

        let report = feed.run(&mut simulation).await;
        producer.await.unwrap();
        assert!(report.is_clean());
        assert_eq!(report.applied, 4);
        assert_eq!(simulation.state().max_rounds, 3);
    }
}
