//! Live check-in feed.
//!
//! Polls today's records on a fixed interval and forwards each record the
//! first time it is seen. There is no push channel on the backend, so this
//! is a plain fetch-and-diff loop.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::api::{ApiClient, ApiError, AttendanceRecord};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
const CHANNEL_CAPACITY: usize = 64;

/// Where the feed gets today's records from.
#[async_trait]
pub trait TodaySource: Send + Sync {
    async fn today(&self) -> Result<Vec<AttendanceRecord>, ApiError>;
}

#[async_trait]
impl TodaySource for ApiClient {
    async fn today(&self) -> Result<Vec<AttendanceRecord>, ApiError> {
        self.fetch_today_attendance().await
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEvent {
    CheckIn(AttendanceRecord),
    Error(String),
}

pub struct LiveFeed<S: TodaySource> {
    source: Arc<S>,
    interval: Duration,
    seen: HashSet<i64>,
}

impl<S: TodaySource + 'static> LiveFeed<S> {
    pub fn new(source: Arc<S>, interval: Duration) -> Self {
        Self { source, interval, seen: HashSet::new() }
    }

    /// Fetch once and return the records not seen before, oldest first.
    ///
    /// The seen set is replaced by the ids of this fetch, so it never grows
    /// beyond one day's worth of records.
    pub async fn poll_once(&mut self) -> Result<Vec<AttendanceRecord>, ApiError> {
        let mut records = self.source.today().await?;
        records.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));

        let fresh: Vec<AttendanceRecord> = records.iter().filter(|r| !self.seen.contains(&r.id)).cloned().collect();
        self.seen = records.iter().map(|r| r.id).collect();
        debug!(total = records.len(), fresh = fresh.len(), "feed polled");
        Ok(fresh)
    }

    /// Run the poll loop on the tokio runtime until the handle is stopped or dropped.
    pub fn spawn(mut self) -> FeedHandle {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(interval_ms = self.interval.as_millis() as u64, "live feed started");
            loop {
                ticker.tick().await;
                let events = match self.poll_once().await {
                    Ok(fresh) => fresh.into_iter().map(FeedEvent::CheckIn).collect(),
                    Err(e) => {
                        warn!(error = %e, "live feed poll failed");
                        vec![FeedEvent::Error(e.to_string())]
                    }
                };
                for event in events {
                    if tx.send(event).await.is_err() {
                        debug!("feed receiver gone; stopping");
                        return;
                    }
                }
            }
        });
        FeedHandle { rx, task }
    }
}

/// Receiving end of a running feed. Dropping it stops the poll loop.
pub struct FeedHandle {
    rx: mpsc::Receiver<FeedEvent>,
    task: JoinHandle<()>,
}

impl FeedHandle {
    pub async fn recv(&mut self) -> Option<FeedEvent> {
        self.rx.recv().await
    }

    pub fn stop(self) {
        self.task.abort();
    }
}

impl Drop for FeedHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
