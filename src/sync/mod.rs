//! Realtime synchronization state machine.
//!
//! `Disabled -> start -> Syncing -> stop -> Disabled`. While syncing, push
//! events, poll ticks and sweep ticks are merged into one [`SyncEvent`]
//! stream. Accepted sample writes mark a render pass as pending; any number of
//! marks between two passes collapse into one pass.

mod cache;

pub use cache::{HeatmapSample, SampleCache, WriteOutcome};

use crate::association::AssociationStore;
use crate::config::HeatmapConfigPatch;
use crate::sensor::{ReadingEvent, SensorRegistry};
use std::future::pending;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};


/// One item of the merged event stream
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    PollTick,
    Push(ReadingEvent),
    Sweep,
    ConfigChange(HeatmapConfigPatch),
    Disable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Disabled,
    Syncing,
}

/// Timers and subscriptions owned while syncing
struct EventSources {
    push: Option<broadcast::Receiver<ReadingEvent>>,
    poll: Option<Interval>,
    sweep: Interval,
}

enum Next {
    Push(Result<ReadingEvent, RecvError>),
    Poll,
    Sweep,
}

async fn recv_push(
    push: &mut Option<broadcast::Receiver<ReadingEvent>>,
) -> Result<ReadingEvent, RecvError> {
    match push.as_mut() {
        Some(rx) => rx.recv().await,
        None => pending().await,
    }
}

async fn tick_poll(poll: &mut Option<Interval>) -> Instant {
    match poll.as_mut() {
        Some(timer) => timer.tick().await,
        None => pending().await,
    }
}

fn ticker(period: Duration) -> Interval {
    // First tick one period from now, not immediately
    let mut timer = interval_at(Instant::now() + period, period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
    timer
}

pub struct RealtimeSync {
    state: SyncState,
    sources: Option<EventSources>,
    max_age_ms: i64,
    apply_pending: bool,
}

impl RealtimeSync {
    pub fn new(max_age_ms: i64) -> Self {
        Self {
            state: SyncState::Disabled,
            sources: None,
            max_age_ms,
            apply_pending: false,
        }
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn is_syncing(&self) -> bool {
        self.state == SyncState::Syncing
    }

    pub fn max_age_ms(&self) -> i64 {
        self.max_age_ms
    }

    /// Enter `Syncing`. A `None` poll interval disables polling.
    /// Restarting while syncing replaces the previous sources.
    pub fn start(
        &mut self,
        push: Option<broadcast::Receiver<ReadingEvent>>,
        poll_interval: Option<Duration>,
        sweep_interval: Duration,
    ) {
        info!(
            push = push.is_some(),
            poll_interval_ms = ?poll_interval.map(|d| d.as_millis() as u64),
            sweep_interval_ms = sweep_interval.as_millis() as u64,
            "Realtime sync started"
        );
        self.sources = Some(EventSources {
            push,
            poll: poll_interval.map(ticker),
            sweep: ticker(sweep_interval),
        });
        self.state = SyncState::Syncing;
    }

    /// Cancel timers, drop the push subscription, enter `Disabled`.
    /// Returns false if already disabled.
    pub fn stop(&mut self) -> bool {
        if self.state == SyncState::Disabled {
            return false;
        }
        self.sources = None;
        self.apply_pending = false;
        self.state = SyncState::Disabled;
        info!("Realtime sync stopped");
        true
    }

    /// Replace the poll timer, e.g. after the update interval changed
    pub fn set_poll_interval(&mut self, poll_interval: Option<Duration>) {
        if let Some(sources) = self.sources.as_mut() {
            sources.poll = poll_interval.map(ticker);
            debug!(
                poll_interval_ms = ?poll_interval.map(|d| d.as_millis() as u64),
                "Poll timer restarted"
            );
        }
    }

    /// Wait for the next event from the merged sources.
    ///
    /// Returns `None` when disabled. Push events win over timer ticks when
    /// both are ready.
    pub async fn next_event(&mut self) -> Option<SyncEvent> {
        let sources = self.sources.as_mut()?;
        let EventSources { push, poll, sweep } = sources;

        loop {
            let next = tokio::select! {
                biased;

                result = recv_push(&mut *push) => Next::Push(result),
                _ = tick_poll(&mut *poll) => Next::Poll,
                _ = sweep.tick() => Next::Sweep,
            };

            match next {
                Next::Push(Ok(event)) => return Some(SyncEvent::Push(event)),
                Next::Push(Err(RecvError::Lagged(skipped))) => {
                    warn!(skipped = skipped, "Push channel lagged, skipped readings");
                }
                Next::Push(Err(RecvError::Closed)) => {
                    warn!("Push channel closed, continuing with polling");
                    *push = None;
                }
                Next::Poll => return Some(SyncEvent::PollTick),
                Next::Sweep => return Some(SyncEvent::Sweep),
            }
        }
    }

    /// Take a push event that is already queued, without waiting
    pub fn try_next_push(&mut self) -> Option<ReadingEvent> {
        let push = self.sources.as_mut()?.push.as_mut()?;
        loop {
            match push.try_recv() {
                Ok(event) => return Some(event),
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(skipped = skipped, "Push channel lagged, skipped readings");
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }

    /// Write a reading into the cache for every space actively linked to its
    /// sensor. Readings already older than the max age are dropped. Returns
    /// the number of samples that changed.
    pub fn ingest(
        &mut self,
        cache: &mut SampleCache,
        associations: &AssociationStore,
        registry: &SensorRegistry,
        event: &ReadingEvent,
        now_ms: i64,
    ) -> usize {
        if now_ms.saturating_sub(event.timestamp) > self.max_age_ms {
            debug!(
                sensor_id = %event.sensor_id,
                timestamp = event.timestamp,
                "Stale reading ignored"
            );
            return 0;
        }

        let targets: Vec<&str> = associations
            .by_sensor(&event.sensor_id)
            .into_iter()
            .filter(|a| a.is_active)
            .map(|a| a.space_guid.as_str())
            .collect();
        if targets.is_empty() {
            return 0;
        }

        let Some(sensor_type) = registry.sensor_type(&event.sensor_id) else {
            debug!(sensor_id = %event.sensor_id, "Reading from unregistered sensor, ignoring");
            return 0;
        };

        let mut changed = 0;
        for space_guid in targets {
            let outcome = cache.write(HeatmapSample {
                space_guid: space_guid.to_string(),
                sensor_id: event.sensor_id.clone(),
                value: event.value,
                sensor_type: sensor_type.to_string(),
                quality: event.quality,
                timestamp: event.timestamp,
            });
            match outcome {
                WriteOutcome::Discarded => debug!(
                    space_guid = %space_guid,
                    sensor_id = %event.sensor_id,
                    timestamp = event.timestamp,
                    "Out-of-order reading discarded"
                ),
                outcome if outcome.changed() => changed += 1,
                _ => {}
            }
        }

        if changed > 0 {
            self.request_apply();
        }
        changed
    }

    /// Remove samples older than the max age. Returns removed space guids.
    pub fn sweep(&mut self, cache: &mut SampleCache, now_ms: i64) -> Vec<String> {
        let removed = cache.remove_older_than(now_ms.saturating_sub(self.max_age_ms));
        if !removed.is_empty() {
            info!(
                removed = removed.len(),
                max_age_ms = self.max_age_ms,
                "Stale samples removed"
            );
            if self.is_syncing() {
                self.request_apply();
            }
        }
        removed
    }

    /// Mark a render pass as pending; repeated marks coalesce
    pub fn request_apply(&mut self) {
        self.apply_pending = true;
    }

    pub fn apply_pending(&self) -> bool {
        self.apply_pending
    }

    /// Consume the pending mark. True if a render pass should run now.
    pub fn take_apply(&mut self) -> bool {
        std::mem::take(&mut self.apply_pending)
    }
}
