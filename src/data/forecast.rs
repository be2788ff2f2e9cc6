//! HTTP client for the external forecast API.
//!
//! Three GET endpoints are consumed:
//!
//! - `/api/items`          -> `{ items: [{code, name}], states: [string] }`
//! - `/api/predict`        -> `{ series: [{date, variance}] }`
//! - `/api/predict_multi`  -> `{ series: { "1": [...], "7": [...], "30": [...] } }`

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::Url;
use reqwest::blocking::Client;
use serde::{Deserialize, Deserializer};
use serde::de::DeserializeOwned;

use crate::domain::{Horizon, Metadata, MultiSeries, SeriesPoint};
use crate::error::ApiError;

const ITEMS_PATH: &str = "api/items";
const PREDICT_PATH: &str = "api/predict";
const PREDICT_MULTI_PATH: &str = "api/predict_multi";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Blocking forecast API client.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct ForecastClient {
    client: Client,
    base: Url,
}

impl ForecastClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let base = parse_base_url(base_url)?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| ApiError::Transport {
                url: base.to_string(),
                source,
            })?;
        Ok(Self { client, base })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    pub fn items_url(&self) -> Result<Url, ApiError> {
        self.endpoint(ITEMS_PATH, &[])
    }

    pub fn predict_url(&self, item_code: i64, region: &str, horizon: Horizon) -> Result<Url, ApiError> {
        self.endpoint(
            PREDICT_PATH,
            &[
                ("item_code", item_code.to_string()),
                ("state", region.to_string()),
                ("horizon", horizon.days().to_string()),
            ],
        )
    }

    pub fn predict_multi_url(&self, item_code: i64, region: &str) -> Result<Url, ApiError> {
        self.endpoint(
            PREDICT_MULTI_PATH,
            &[
                ("item_code", item_code.to_string()),
                ("state", region.to_string()),
            ],
        )
    }

    pub fn fetch_metadata(&self) -> Result<Metadata, ApiError> {
        let url = self.items_url()?;
        let metadata: Metadata = self.get_json(url)?;
        tracing::info!(
            items = metadata.items.len(),
            regions = metadata.regions.len(),
            "loaded metadata"
        );
        Ok(metadata)
    }

    pub fn fetch_series(
        &self,
        item_code: i64,
        region: &str,
        horizon: Horizon,
    ) -> Result<Vec<SeriesPoint>, ApiError> {
        let url = self.predict_url(item_code, region, horizon)?;
        let body: PredictResponse = self.get_json(url)?;
        tracing::info!(item_code, region, horizon = horizon.days(), points = body.series.len(), "loaded series");
        Ok(body.series)
    }

    pub fn fetch_multi_series(&self, item_code: i64, region: &str) -> Result<MultiSeries, ApiError> {
        let url = self.predict_multi_url(item_code, region)?;
        let body: PredictMultiResponse = self.get_json(url)?;

        let mut out = MultiSeries::new();
        for (key, points) in body.series {
            let horizon = key.trim().parse::<u32>().ok().and_then(Horizon::from_days);
            match horizon {
                Some(h) => out.insert(h, points),
                None => tracing::warn!(key = %key, "ignoring unknown horizon in multi-series response"),
            }
        }
        tracing::info!(
            item_code,
            region,
            d1 = out.get(Horizon::D1).len(),
            d7 = out.get(Horizon::D7).len(),
            d30 = out.get(Horizon::D30).len(),
            "loaded multi-horizon series"
        );
        Ok(out)
    }

    fn endpoint(&self, path: &str, params: &[(&str, String)]) -> Result<Url, ApiError> {
        let mut url = self.base.join(path).map_err(|e| ApiError::InvalidBaseUrl {
            url: self.base.to_string(),
            reason: e.to_string(),
        })?;
        if !params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in params {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ApiError> {
        tracing::debug!(url = %url, "GET");
        let resp = self
            .client
            .get(url.clone())
            .send()
            .map_err(|source| ApiError::Transport {
                url: url.to_string(),
                source,
            })?;

        let status = resp.status();
        if !status.is_success() {
            tracing::warn!(url = %url, %status, "forecast API returned an error status");
            return Err(ApiError::Status {
                url: url.to_string(),
                status,
            });
        }

        let body = resp.text().map_err(|source| ApiError::Transport {
            url: url.to_string(),
            source,
        })?;
        serde_json::from_str(&body).map_err(|source| ApiError::Decode {
            url: url.to_string(),
            source,
        })
    }
}

// `series` may be absent or `null` when the backend has nothing to report.
#[derive(Debug, Deserialize)]
struct PredictResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    series: Vec<SeriesPoint>,
}

#[derive(Debug, Deserialize)]
struct PredictMultiResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    series: BTreeMap<String, Vec<SeriesPoint>>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Validate and normalize the API base URL.
///
/// The result always ends in `/` so endpoint paths join under any prefix
/// (e.g. `https://host/forecast` -> `https://host/forecast/api/items`).
pub fn parse_base_url(raw: &str) -> Result<Url, ApiError> {
    let invalid = |reason: String| ApiError::InvalidBaseUrl {
        url: raw.to_string(),
        reason,
    };

    let mut url = Url::parse(raw.trim()).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }
    if url.cannot_be_a_base() || url.host_str().is_none() {
        return Err(invalid("missing host".to_string()));
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(invalid("base URL must not carry a query or fragment".to_string()));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}
