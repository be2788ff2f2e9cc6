//! Running fetch effects against the forecast API.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::Sender;

use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::dashboard::state::{Action, Effect, FetchFailure};
use crate::data::ForecastClient;
use crate::error::AppError;

/// Worker threads for background fetches. Requests mostly wait on the
/// network, so this is independent of the CPU count.
pub const FETCH_THREADS: usize = 4;

/// Run one effect and return the action carrying its result.
///
/// `Effect::Render` is not a fetch and yields `None`; the caller renders.
pub fn perform(client: &ForecastClient, effect: Effect) -> Option<Action> {
    match effect {
        Effect::FetchMetadata => Some(Action::MetadataLoaded(
            client.fetch_metadata().map_err(FetchFailure::from),
        )),
        Effect::FetchSeries {
            request,
            item_code,
            region,
            horizon,
        } => Some(Action::SeriesLoaded {
            request,
            result: client
                .fetch_series(item_code, &region, horizon)
                .map_err(FetchFailure::from),
        }),
        Effect::FetchMultiSeries {
            request,
            item_code,
            region,
        } => Some(Action::MultiSeriesLoaded {
            request,
            result: client
                .fetch_multi_series(item_code, &region)
                .map_err(FetchFailure::from),
        }),
        Effect::Render => None,
    }
}

/// Runs fetch effects on a dedicated IO pool and sends results back as actions.
///
/// A series fetch that is still queued when a newer one is submitted never
/// hits the network.
pub struct Fetcher {
    client: ForecastClient,
    pool: ThreadPool,
    latest: Arc<AtomicU64>,
    tx: Sender<Action>,
}

impl Fetcher {
    pub fn new(client: ForecastClient, tx: Sender<Action>) -> Result<Self, AppError> {
        Self::with_threads(client, tx, FETCH_THREADS)
    }

    pub fn with_threads(client: ForecastClient, tx: Sender<Action>, threads: usize) -> Result<Self, AppError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads.max(1))
            .thread_name(|i| format!("vdash-fetch-{i}"))
            .build()
            .map_err(|e| AppError::new(4, format!("Failed to start fetch workers: {e}")))?;
        Ok(Self {
            client,
            pool,
            latest: Arc::new(AtomicU64::new(0)),
            tx,
        })
    }

    pub fn submit(&self, effect: Effect) {
        if !effect.is_fetch() {
            return;
        }
        if let Some(request) = effect.request() {
            self.latest.fetch_max(request.0, Ordering::SeqCst);
        }

        let client = self.client.clone();
        let latest = Arc::clone(&self.latest);
        let tx = self.tx.clone();
        self.pool.spawn(move || {
            if let Some(request) = effect.request() {
                let newest = latest.load(Ordering::SeqCst);
                if request.0 < newest {
                    tracing::debug!(request = request.0, newest, "skipping superseded fetch");
                    return;
                }
            }
            if let Some(action) = perform(&client, effect) {
                // The receiver is gone only once the UI has exited.
                let _ = tx.send(action);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::{Duration, Instant};

    use httpmock::prelude::*;

    use crate::dashboard::state::RequestId;
    use crate::domain::Horizon;

    fn series_effect(request: u64, item_code: i64) -> Effect {
        Effect::FetchSeries {
            request: RequestId(request),
            item_code,
            region: "CA".to_string(),
            horizon: Horizon::D1,
        }
    }

    fn mock_item(server: &MockServer, item_code: i64, delay: Duration) -> httpmock::Mock<'_> {
        let code = item_code.to_string();
        server.mock(|when, then| {
            when.method(GET)
                .path("/api/predict")
                .query_param("item_code", code.as_str());
            then.status(200)
                .delay(delay)
                .json_body(serde_json::json!({"series": []}));
        })
    }

    fn loaded_request(action: Action) -> RequestId {
        match action {
            Action::SeriesLoaded { request, .. } => request,
            other => panic!("expected a series result, got {other:?}"),
        }
    }

    #[test]
    fn slow_superseded_fetch_does_not_delay_newer_one() {
        let server = MockServer::start();
        mock_item(&server, 1, Duration::from_secs(3));
        mock_item(&server, 2, Duration::ZERO);

        let client = ForecastClient::new(&server.base_url(), Duration::from_secs(10)).unwrap();
        let (tx, rx) = mpsc::channel();
        let fetcher = Fetcher::new(client, tx).unwrap();

        let started = Instant::now();
        fetcher.submit(series_effect(1, 1));
        // Let the slow request reach the server first.
        std::thread::sleep(Duration::from_millis(100));
        fetcher.submit(series_effect(2, 2));

        let first = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(loaded_request(first), RequestId(2));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn queued_superseded_fetch_is_skipped() {
        let server = MockServer::start();
        mock_item(&server, 1, Duration::from_millis(300));
        let skipped = mock_item(&server, 2, Duration::ZERO);
        let newest = mock_item(&server, 3, Duration::ZERO);

        let client = ForecastClient::new(&server.base_url(), Duration::from_secs(10)).unwrap();
        let (tx, rx) = mpsc::channel();
        let fetcher = Fetcher::with_threads(client, tx, 1).unwrap();

        fetcher.submit(series_effect(1, 1));
        fetcher.submit(series_effect(2, 2));
        fetcher.submit(series_effect(3, 3));

        let mut seen = Vec::new();
        while let Ok(action) = rx.recv_timeout(Duration::from_secs(2)) {
            seen.push(loaded_request(action));
            if seen.contains(&RequestId(3)) {
                break;
            }
        }
        assert!(seen.contains(&RequestId(3)), "{seen:?}");
        assert!(!seen.contains(&RequestId(2)), "{seen:?}");
        skipped.assert_hits(0);
        newest.assert_hits(1);
    }

    #[test]
    fn metadata_and_render_effects() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/items");
            then.status(200).json_body(serde_json::json!({"items": [], "states": ["CA"]}));
        });

        let client = ForecastClient::new(&server.base_url(), Duration::from_secs(5)).unwrap();
        let (tx, rx) = mpsc::channel();
        let fetcher = Fetcher::with_threads(client, tx, 1).unwrap();

        fetcher.submit(Effect::Render);
        fetcher.submit(Effect::FetchMetadata);

        match rx.recv_timeout(Duration::from_secs(2)).unwrap() {
            Action::MetadataLoaded(Ok(metadata)) => assert_eq!(metadata.regions, vec!["CA"]),
            other => panic!("expected metadata, got {other:?}"),
        }
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
    }
}
