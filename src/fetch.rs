use std::time::Instant;

use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tracing::debug;

use crate::settings::Settings;

/// Why a schedule page could not be read.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network error fetching {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("couldn't get: {url}")]
    Status { url: String, status: StatusCode },
}

impl FetchError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            FetchError::Network { .. } => None,
            FetchError::Status { status, .. } => Some(*status),
        }
    }
}

/// Schedule page location for a station, optional region (or service
/// variant such as `hd`, `fm`, `lw`) and `YYYY/MM/DD` date.
pub fn schedule_url(base_url: &str, station: &str, region: &str, date: &str) -> String {
    let base = base_url.trim_end_matches('/');
    if region.is_empty() {
        format!("{}/{}/programmes/schedules/{}", base, station, date)
    } else {
        format!("{}/{}/programmes/schedules/{}/{}", base, station, region, date)
    }
}

pub struct ScheduleClient {
    http: Client,
    base_url: String,
}

impl ScheduleClient {
    pub fn new(settings: &Settings) -> Result<Self> {
        let http = Client::builder()
            .user_agent(settings.user_agent.as_str())
            .timeout(settings.timeout())
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url: settings.base_url.clone(),
        })
    }

    /// Fetch one schedule page. Anything but HTTP 200 is a failure; there is
    /// no retry.
    pub async fn fetch(
        &self,
        station: &str,
        region: &str,
        date: &str,
    ) -> std::result::Result<String, FetchError> {
        let url = schedule_url(&self.base_url, station, region, date);
        let start = Instant::now();

        let network = |source| FetchError::Network {
            url: url.clone(),
            source,
        };
        let response = self.http.get(&url).send().await.map_err(network)?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(FetchError::Status {
                url: url.clone(),
                status,
            });
        }
        let body = response.text().await.map_err(network)?;

        debug!(
            url = %url,
            bytes = body.len(),
            latency_ms = start.elapsed().as_millis() as u64,
            "Fetched schedule page"
        );
        Ok(body)
    }
}
