use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tokio::time::sleep;
use url::Url;

use crate::config;

use super::error::{PrimError, PrimResult};
use super::siri::{MonitoredStopVisit, SiriResponse};

/// Minimum spacing between consecutive PRIM requests.
const THROTTLE_DELAY: Duration = Duration::from_millis(200);
/// Independent budget for each request once it has its turn.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

const ALERTS_CACHE_TTL: Duration = Duration::from_secs(300);
const JOURNEY_CACHE_TTL: Duration = Duration::from_secs(60);

struct CacheEntry {
    fetched: Instant,
    ttl: Duration,
    body: String,
}

impl CacheEntry {
    fn expired(&self) -> bool {
        self.fetched.elapsed() >= self.ttl
    }
}

/// Drops every expired entry. Called on insert so the map stays bounded by
/// the set of targets requested within one TTL window.
fn evict_expired(cache: &mut HashMap<String, CacheEntry>) {
    cache.retain(|_, entry| !entry.expired());
}

/// Client for everything that goes through the forwarding proxy.
///
/// PRIM requests are serialized through a cooperative queue with a minimum
/// inter-request spacing; slow-moving payloads (alerts, journey details) are
/// served from a read-through cache. Throttle and cache state belong to the
/// instance, never to the module.
#[derive(Clone)]
pub struct PrimClient {
    client: reqwest::Client,
    proxy_url: Url,
    last_request: Arc<Mutex<Option<Instant>>>,
    cache: Arc<Mutex<HashMap<String, CacheEntry>>>,
}

impl PrimClient {
    pub fn new(proxy_url: &str) -> PrimResult<PrimClient> {
        let proxy_url = Url::parse(proxy_url).map_err(|e| PrimError::Init(e.to_string()))?;

        let client = PrimClient {
            client: reqwest::Client::builder()
                .build()
                .map_err(PrimError::Http)?,
            proxy_url,
            last_request: Arc::new(Mutex::new(None)),
            cache: Arc::new(Mutex::new(HashMap::new())),
        };

        Ok(client)
    }

    /// Wraps the real target URL into the proxy's `url` query parameter.
    fn proxied(&self, target: &str) -> Url {
        let mut url = self.proxy_url.clone();
        url.query_pairs_mut().append_pair("url", target);
        url
    }

    pub fn prim_url(path: &str, params: &[(&str, &str)]) -> String {
        let mut url = Url::parse(config::PRIM_BASE_URL)
            .expect("PRIM base URL is valid")
            .join(path)
            .expect("PRIM path is valid");
        url.query_pairs_mut().extend_pairs(params);
        url.into()
    }

    async fn get_body(&self, url: Url) -> PrimResult<String> {
        log::debug!("Requesting {}", url);
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PrimError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        log::trace!("Response: {}", body);
        Ok(body)
    }

    /// Direct proxied GET, no throttling. Used by the non-PRIM providers.
    pub async fn get_proxied_text(&self, target: &str) -> PrimResult<String> {
        let url = self.proxied(target);
        match tokio::time::timeout(REQUEST_TIMEOUT, self.get_body(url)).await {
            Ok(result) => result,
            Err(_) => Err(PrimError::Timeout),
        }
    }

    pub async fn get_proxied_json<T>(&self, target: &str) -> PrimResult<T>
    where
        T: DeserializeOwned,
    {
        let body = self.get_proxied_text(target).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Waits for its turn in the queue, then runs under the request timeout.
    async fn get_throttled(&self, target: &str) -> PrimResult<String> {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < THROTTLE_DELAY {
                sleep(THROTTLE_DELAY - elapsed).await;
            }
        }
        *last = Some(Instant::now());

        let url = self.proxied(target);
        match tokio::time::timeout(REQUEST_TIMEOUT, self.get_body(url)).await {
            Ok(result) => result,
            Err(_) => Err(PrimError::Timeout),
        }
    }

    async fn request<T>(&self, target: &str) -> PrimResult<T>
    where
        T: DeserializeOwned,
    {
        let body = self.get_throttled(target).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Read-through cache keyed by target URL. Entries expire passively.
    async fn request_cached<T>(&self, target: &str, ttl: Duration) -> PrimResult<T>
    where
        T: DeserializeOwned,
    {
        {
            let cache = self.cache.lock().await;
            if let Some(entry) = cache.get(target) {
                if !entry.expired() {
                    return Ok(serde_json::from_str(&entry.body)?);
                }
            }
        }

        let body = self.get_throttled(target).await?;
        let value = serde_json::from_str(&body)?;

        let mut cache = self.cache.lock().await;
        evict_expired(&mut cache);
        cache.insert(
            target.to_string(),
            CacheEntry {
                fetched: Instant::now(),
                ttl,
                body,
            },
        );
        Ok(value)
    }

    /// Realtime visits for one monitored stop area (hub widgets).
    pub async fn stop_monitoring(&self, monitoring_ref: &str) -> PrimResult<SiriResponse> {
        let target = PrimClient::prim_url(
            "/marketplace/stop-monitoring",
            &[("MonitoringRef", monitoring_ref)],
        );
        self.request(&target).await
    }

    /// Whole-line query, filtered down to the given stop refs.
    pub async fn line_query(
        &self,
        line_ref: &str,
        stop_refs: &[&str],
    ) -> PrimResult<Vec<MonitoredStopVisit>> {
        let target =
            PrimClient::prim_url("/marketplace/requete-ligne", &[("LineRef", line_ref)]);
        let response: SiriResponse = self.request(&target).await?;
        Ok(filter_line_visits(response.into_visits(), stop_refs))
    }

    /// Ordered call sequence for one vehicle journey.
    pub async fn vehicle_journey(&self, journey_ref: &str) -> PrimResult<SiriResponse> {
        let target = PrimClient::prim_url(
            "/marketplace/vehicle-journeys",
            &[("DatedVehicleJourneyRef", journey_ref)],
        );
        self.request_cached(&target, JOURNEY_CACHE_TTL).await
    }

    /// Per-line traffic messages, cached for five minutes.
    pub async fn general_message(&self, line_ref: &str) -> PrimResult<SiriResponse> {
        let target =
            PrimClient::prim_url("/marketplace/general-message", &[("LineRef", line_ref)]);
        self.request_cached(&target, ALERTS_CACHE_TTL).await
    }
}

/// Keeps only visits at the given stops, re-sorted chronologically.
///
/// A line query returns every stop on the line as chronologically-ordered
/// per-stop sub-lists; keeping more than one stop ref interleaves them, so
/// the merged result is re-sorted by `expected ?? aimed` before anyone
/// groups it.
pub fn filter_line_visits(
    visits: Vec<MonitoredStopVisit>,
    stop_refs: &[&str],
) -> Vec<MonitoredStopVisit> {
    let mut visits: Vec<MonitoredStopVisit> = visits
        .into_iter()
        .filter(|v| {
            v.monitoring_ref
                .as_ref()
                .map(|r| stop_refs.contains(&r.value.as_str()))
                .unwrap_or(false)
        })
        .collect();
    visits.sort_by_key(|v| v.departure_instant());
    visits
}
