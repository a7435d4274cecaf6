//! In-process change feed.
//!
//! Every committed mutation publishes a [`ChangeEvent`]. Sessions subscribe
//! to the lead collection or to one lead's thread and only receive events
//! their scope admits. A subscriber that falls behind gets a single
//! `resync` event instead of the events it missed.
//!
//! Optimistic writes register a [`PendingWrite`] under their correlation id
//! before writing. The write and its confirming event must both land within
//! the confirmation timeout, or the write is reported as uncertain.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use futures::Stream;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use uuid::Uuid;

use common::{AppError, AppResult};
use domain::{ChangeEvent, Scope, Topic};

/// Filtered change events for one session.
pub type Subscription = Pin<Box<dyn Stream<Item = ChangeEvent> + Send>>;

/// Broadcast hub shared by every service and session.
#[derive(Clone)]
pub struct RealtimeHub {
    sender: broadcast::Sender<ChangeEvent>,
    confirm_timeout: Duration,
}

impl RealtimeHub {
    pub fn new(capacity: usize, confirm_timeout: Duration) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            confirm_timeout,
        }
    }

    /// Fan an event out to current subscribers.
    pub fn publish(&self, event: ChangeEvent) {
        tracing::debug!(
            topic = ?event.topic,
            kind = ?event.kind,
            id = %event.id,
            "Publishing change event"
        );
        // No subscribers is the normal idle state
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self, topic: Topic, scope: Scope) -> Subscription {
        let stream = BroadcastStream::new(self.sender.subscribe()).filter_map(move |item| {
            match item {
                Ok(event) if event.topic == topic && event.visible_in(&scope) => Some(event),
                Ok(_) => None,
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    tracing::warn!(?topic, skipped, "Subscriber lagged, asking for resync");
                    Some(ChangeEvent::resync(topic))
                }
            }
        });
        Box::pin(stream)
    }

    /// Start waiting for the event tagged `correlation_id`. Call before the
    /// write so the confirmation cannot be missed.
    pub fn track(&self, correlation_id: Uuid) -> PendingWrite {
        PendingWrite {
            correlation_id,
            receiver: self.sender.subscribe(),
            timeout: self.confirm_timeout,
        }
    }
}

/// An optimistic write awaiting its authoritative event.
pub struct PendingWrite {
    correlation_id: Uuid,
    receiver: broadcast::Receiver<ChangeEvent>,
    timeout: Duration,
}

impl PendingWrite {
    pub fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    /// Run `write` bounded by the confirmation timeout, then collect its
    /// confirming event. A write still running at the deadline may or may
    /// not land, so it resolves to `WriteUncertain`.
    pub async fn settle<T, F>(self, write: F) -> AppResult<(T, Option<ChangeEvent>)>
    where
        F: Future<Output = AppResult<T>>,
    {
        let correlation_id = self.correlation_id;
        let value = match tokio::time::timeout(self.timeout, write).await {
            Ok(result) => result?,
            Err(_) => {
                tracing::warn!(%correlation_id, "Write not confirmed before timeout");
                return Err(AppError::WriteUncertain(correlation_id));
            }
        };

        let event = self.try_confirmed()?;
        Ok((value, event))
    }

    /// Look for the confirming event without waiting. In-process writes
    /// publish before they return, so once the write has completed the
    /// event is either buffered or was never sent because nothing changed.
    pub fn try_confirmed(mut self) -> AppResult<Option<ChangeEvent>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) if event.correlation_id == Some(self.correlation_id) => {
                    return Ok(Some(event))
                }
                Ok(_) => continue,
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return Ok(None),
                Err(TryRecvError::Lagged(_)) => {
                    return Err(AppError::WriteUncertain(self.correlation_id))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::ChangeKind;

    #[tokio::test]
    async fn operator_only_sees_events_for_their_leads() {
        let hub = RealtimeHub::new(16, Duration::from_secs(1));
        let operator = Uuid::new_v4();
        let mut feed = hub.subscribe(Topic::Leads, Scope::AssignedTo(operator));

        hub.publish(ChangeEvent::lead(ChangeKind::Update, Uuid::new_v4(), vec![]));
        let mine = Uuid::new_v4();
        hub.publish(ChangeEvent::lead(ChangeKind::Update, mine, vec![operator]));

        let event = feed.next().await.unwrap();
        assert_eq!(event.id, mine);
    }

    #[tokio::test]
    async fn lagging_subscriber_gets_resync() {
        let hub = RealtimeHub::new(2, Duration::from_secs(1));
        let mut feed = hub.subscribe(Topic::Leads, Scope::All);

        for _ in 0..5 {
            hub.publish(ChangeEvent::lead(ChangeKind::Insert, Uuid::new_v4(), vec![]));
        }

        let event = feed.next().await.unwrap();
        assert_eq!(event.kind, ChangeKind::Resync);
    }

    #[tokio::test]
    async fn settled_write_carries_its_event() {
        let hub = RealtimeHub::new(16, Duration::from_secs(1));
        let correlation_id = Uuid::new_v4();
        let pending = hub.track(correlation_id);

        let write = async {
            hub.publish(ChangeEvent::lead(ChangeKind::Update, Uuid::new_v4(), vec![]));
            hub.publish(
                ChangeEvent::lead(ChangeKind::Update, Uuid::new_v4(), vec![])
                    .with_correlation(Some(correlation_id)),
            );
            Ok(7)
        };

        let (value, event) = pending.settle(write).await.unwrap();
        assert_eq!(value, 7);
        assert_eq!(event.unwrap().correlation_id, Some(correlation_id));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_write_times_out_as_uncertain() {
        let hub = RealtimeHub::new(16, Duration::from_secs(5));
        let correlation_id = Uuid::new_v4();
        let pending = hub.track(correlation_id);

        let write = async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(())
        };

        let result = pending.settle(write).await;
        assert!(matches!(result, Err(AppError::WriteUncertain(id)) if id == correlation_id));
    }

    #[tokio::test]
    async fn failed_write_keeps_its_error() {
        let hub = RealtimeHub::new(16, Duration::from_secs(5));
        let pending = hub.track(Uuid::new_v4());

        let result = pending
            .settle(async { Err::<(), _>(AppError::NotFound) })
            .await;
        assert!(matches!(result, Err(AppError::NotFound)));
    }

    #[tokio::test]
    async fn try_confirmed_does_not_wait() {
        let hub = RealtimeHub::new(16, Duration::from_secs(5));
        let correlation_id = Uuid::new_v4();

        let untouched = hub.track(correlation_id);
        assert!(untouched.try_confirmed().unwrap().is_none());

        let pending = hub.track(correlation_id);
        hub.publish(
            ChangeEvent::lead(ChangeKind::Delete, Uuid::new_v4(), vec![])
                .with_correlation(Some(correlation_id)),
        );
        let event = pending.try_confirmed().unwrap().unwrap();
        assert_eq!(event.kind, ChangeKind::Delete);
    }
}
