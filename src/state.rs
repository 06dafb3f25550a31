//! In-memory board state: one cell per data source, refreshed by independent
//! polling tasks. Nothing here persists; every poll replaces the previous
//! payload wholesale.

use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::config;
use crate::prim::siri::MonitoredStopVisit;
use crate::sources::news::NewsItem;
use crate::sources::races::PmuResponse;
use crate::sources::roadworks::RoadworkEvent;
use crate::sources::velib::VelibStation;
use crate::sources::weather::WeatherResponse;

struct CellInner<T> {
    data: Option<Arc<T>>,
    error: Option<String>,
    updated_at: Option<DateTime<Utc>>,
}

/// Latest payload of one data source.
///
/// A failed refresh records the error but keeps the last-good payload, so
/// the board can render stale data with a separate error flag.
pub struct SourceCell<T> {
    inner: RwLock<CellInner<T>>,
}

/// What a handler needs to build the response envelope.
pub struct Snapshot<T> {
    pub data: Option<Arc<T>>,
    pub error: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl<T> SourceCell<T> {
    pub fn new() -> Self {
        SourceCell {
            inner: RwLock::new(CellInner {
                data: None,
                error: None,
                updated_at: None,
            }),
        }
    }

    pub async fn store_ok(&self, value: T) {
        let mut inner = self.inner.write().await;
        inner.data = Some(Arc::new(value));
        inner.error = None;
        inner.updated_at = Some(Utc::now());
    }

    pub async fn store_err(&self, message: String) {
        let mut inner = self.inner.write().await;
        inner.error = Some(message);
    }

    pub async fn data(&self) -> Option<Arc<T>> {
        self.inner.read().await.data.clone()
    }

    pub async fn snapshot(&self) -> Snapshot<T> {
        let inner = self.inner.read().await;
        Snapshot {
            data: inner.data.clone(),
            error: inner.error.clone(),
            updated_at: inner.updated_at,
        }
    }
}

impl<T> Default for SourceCell<T> {
    fn default() -> Self {
        SourceCell::new()
    }
}

/// Response envelope shared by every board endpoint.
#[derive(Serialize)]
pub struct Enveloped<V> {
    pub data: Option<V>,
    pub error: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// All source cells, one per widget or auxiliary feed.
pub struct BoardState {
    transport: HashMap<&'static str, Arc<SourceCell<Vec<MonitoredStopVisit>>>>,
    pub velib: Arc<SourceCell<Vec<VelibStation>>>,
    pub weather: Arc<SourceCell<WeatherResponse>>,
    pub races: Arc<SourceCell<PmuResponse>>,
    pub roadworks: Arc<SourceCell<Vec<RoadworkEvent>>>,
    pub news: Arc<SourceCell<Vec<NewsItem>>>,
}

impl BoardState {
    pub fn new() -> Self {
        let transport = config::TRANSPORT_WIDGETS
            .iter()
            .map(|w| (w.id, Arc::new(SourceCell::new())))
            .collect();
        BoardState {
            transport,
            velib: Arc::new(SourceCell::new()),
            weather: Arc::new(SourceCell::new()),
            races: Arc::new(SourceCell::new()),
            roadworks: Arc::new(SourceCell::new()),
            news: Arc::new(SourceCell::new()),
        }
    }

    pub fn transport_cell(&self, widget_id: &str) -> Option<Arc<SourceCell<Vec<MonitoredStopVisit>>>> {
        self.transport.get(widget_id).cloned()
    }
}

impl Default for BoardState {
    fn default() -> Self {
        BoardState::new()
    }
}

/// Spawns an independent refresh loop for one source.
///
/// Each task owns its cadence and its cancellation token; a slow or failing
/// source never delays another. There is no cancellation of an in-flight
/// fetch when the next tick would be due: the loop simply runs fetches back
/// to back, and the later completion wins.
pub fn spawn_poller<T, E, F, Fut>(
    name: &'static str,
    interval: Duration,
    token: CancellationToken,
    cell: Arc<SourceCell<T>>,
    mut fetch: F,
) where
    T: Send + Sync + 'static,
    E: Display + Send,
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, E>> + Send,
{
    tokio::spawn(async move {
        loop {
            match fetch().await {
                Ok(value) => {
                    log::debug!("{}: refreshed", name);
                    cell.store_ok(value).await;
                }
                Err(e) => {
                    log::error!("{}: fetch failed: {}", name, e);
                    cell.store_err(e.to_string()).await;
                }
            }

            tokio::select! {
                _ = sleep(interval) => {}
                _ = token.cancelled() => {
                    log::info!("{}: poller stopped", name);
                    break;
                }
            }
        }
    });
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn test_store_err_keeps_last_good() {
        let cell: SourceCell<Vec<u32>> = SourceCell::new();

        cell.store_ok(vec![1, 2, 3]).await;
        let snap = cell.snapshot().await;
        assert_eq!(snap.data.as_deref(), Some(&vec![1, 2, 3]));
        assert!(snap.error.is_none());

        cell.store_err("service unavailable".to_string()).await;
        let snap = cell.snapshot().await;
        assert_eq!(snap.data.as_deref(), Some(&vec![1, 2, 3]));
        assert_eq!(snap.error.as_deref(), Some("service unavailable"));

        // A later success clears the error again.
        cell.store_ok(vec![4]).await;
        let snap = cell.snapshot().await;
        assert_eq!(snap.data.as_deref(), Some(&vec![4]));
        assert!(snap.error.is_none());
    }

    #[tokio::test]
    async fn test_poller_refreshes_and_stops() {
        let cell: Arc<SourceCell<u32>> = Arc::new(SourceCell::new());
        let token = CancellationToken::new();

        let mut counter = 0u32;
        spawn_poller(
            "test",
            Duration::from_millis(5),
            token.clone(),
            cell.clone(),
            move || {
                counter += 1;
                let value = counter;
                async move { Ok::<_, std::convert::Infallible>(value) }
            },
        );

        tokio::time::sleep(Duration::from_millis(30)).await;
        let first = *cell.data().await.unwrap();
        assert!(first >= 2);

        token.cancel();
        tokio::time::sleep(Duration::from_millis(30)).await;
        let stopped_at = *cell.data().await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(*cell.data().await.unwrap(), stopped_at);
    }

    #[tokio::test]
    async fn test_poller_records_errors_and_keeps_data() {
        let cell: Arc<SourceCell<u32>> = Arc::new(SourceCell::new());
        let token = CancellationToken::new();

        let mut calls = 0u32;
        spawn_poller(
            "test",
            Duration::from_millis(5),
            token.clone(),
            cell.clone(),
            move || {
                calls += 1;
                let result = if calls == 1 {
                    Ok(7)
                } else {
                    Err(crate::prim::error::PrimError::Timeout)
                };
                async move { result }
            },
        );

        tokio::time::sleep(Duration::from_millis(30)).await;
        let snap = cell.snapshot().await;
        assert_eq!(snap.data.as_deref(), Some(&7));
        assert_eq!(snap.error.as_deref(), Some("Request timed out"));

        token.cancel();
    }

    #[tokio::test]
    async fn test_board_state_has_a_cell_per_widget() {
        let state = BoardState::new();
        for widget in config::TRANSPORT_WIDGETS {
            assert!(state.transport_cell(widget.id).is_some());
        }
        assert!(state.transport_cell("nope").is_none());
    }
}
