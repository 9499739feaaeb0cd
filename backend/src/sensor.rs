//! HTTP client for the sensor's `/v1/current_conditions` endpoint.

use std::time::{Duration, Instant};

use log::{debug, info};
use reqwest::Client;

use crate::payload::{self, Rejection};
use crate::reading::Reading;
use crate::utils::secs_since_epoch;

/// Total attempts when the connection cannot be established. Name resolution
/// often fails for a few seconds right after the host reboots.
const CONNECT_ATTEMPTS: u32 = 3;

const RETRY_PAUSE: Duration = Duration::from_secs(1);

/// Fetches slower than this are worth an info line.
const SLOW_FETCH: Duration = Duration::from_secs(1);

/// Failures to get a response body out of the device at all.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("cannot build HTTP client: {0}")]
    Client(reqwest::Error),

    #[error("cannot connect to {url} after {attempts} attempts: {source}")]
    Connect {
        url: String,
        attempts: u32,
        source: reqwest::Error,
    },

    #[error("request to {url} failed: {source}")]
    Request { url: String, source: reqwest::Error },
}

pub struct SensorClient {
    url: String,
    timeout: Duration,
    client: Client,
}

impl std::fmt::Debug for SensorClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SensorClient")
            .field("url", &self.url)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl SensorClient {
    pub fn new(hostname: &str, port: u16, timeout: Duration) -> Result<Self, TransportError> {
        Ok(Self {
            url: format!("http://{}:{}/v1/current_conditions", hostname, port),
            timeout,
            client: Self::build_client(timeout)?,
        })
    }

    fn build_client(timeout: Duration) -> Result<Client, TransportError> {
        Client::builder()
            .timeout(timeout)
            .build()
            .map_err(TransportError::Client)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Drops pooled connections by replacing the underlying client.
    pub fn recycle(&mut self) -> Result<(), TransportError> {
        self.client = Self::build_client(self.timeout)?;
        debug!("Recycled HTTP client for {}", self.url);
        Ok(())
    }

    /// Fetches and validates one reading.
    ///
    /// `Ok(None)` means the device answered but the answer is not usable; the
    /// reason has already been logged.
    pub async fn fetch(&self) -> Result<Option<Reading>, TransportError> {
        let start = Instant::now();
        let body = self.get_body().await?;
        let elapsed = start.elapsed();

        debug!("Fetched {} in {:?}", self.url, elapsed);
        if elapsed > SLOW_FETCH {
            info!("Fetch took longer than expected: {:?}.", elapsed);
        }

        match payload::process(&body, secs_since_epoch()) {
            Ok(reading) => {
                debug!("Successful read from {}.", self.url);
                Ok(Some(reading))
            }
            Err(rejection) => {
                match &rejection {
                    Rejection::Insane(_) | Rejection::Stale { .. } | Rejection::SinceBoot { .. } => {
                        info!("Ignoring reading from {}: {}. Record: {}", self.url, rejection, body);
                    }
                    _ => info!("Ignoring reading from {}: {}", self.url, rejection),
                }
                Ok(None)
            }
        }
    }

    async fn get_body(&self) -> Result<String, TransportError> {
        let mut attempt = 1;
        let response = loop {
            match self.client.get(&self.url).send().await {
                Ok(response) => break response,
                Err(err) if err.is_connect() && attempt < CONNECT_ATTEMPTS => {
                    info!("{}: Retrying request.", err);
                    tokio::time::sleep(RETRY_PAUSE).await;
                    attempt += 1;
                }
                Err(err) if err.is_connect() => {
                    return Err(TransportError::Connect {
                        url: self.url.clone(),
                        attempts: attempt,
                        source: err,
                    })
                }
                Err(err) => return Err(self.request_error(err)),
            }
        };

        let response = response
            .error_for_status()
            .map_err(|err| self.request_error(err))?;
        response.text().await.map_err(|err| self.request_error(err))
    }

    fn request_error(&self, source: reqwest::Error) -> TransportError {
        TransportError::Request {
            url: self.url.clone(),
            source,
        }
    }
}
