use crate::error::Error;
use crate::fetcher::{gunzip, ExtractReader, Fetcher};

use async_trait::async_trait;
use futures::stream::TryStreamExt;
use reqwest::Client;
use serde::Deserialize;

use tokio::io::BufReader;
use tokio_util::compat::FuturesAsyncReadCompatExt;
use tracing::info;

const FULL_EXTRACT_URL: &str =
    "https://publicdatafeeds.networkrail.co.uk/ntrod/CifFileAuthenticate?type=CIF_ALL_FULL_DAILY&day=toc-full.CIF.gz";

/// Network Rail open data feed credentials.
#[derive(Clone, Deserialize)]
pub struct NrFetcherConfig {
    username: String,
    password: String,
}

pub struct NrFetcher {
    config: NrFetcherConfig,
}

impl NrFetcher {
    pub fn new(config: NrFetcherConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Fetcher for NrFetcher {
    fn source(&self) -> String {
        "Network Rail open data".to_string()
    }

    async fn fetch(&self) -> Result<ExtractReader, Error> {
        info!("Fetching full CIF extract as {}", self.config.username);
        let response = Client::new()
            .get(FULL_EXTRACT_URL)
            .basic_auth(&self.config.username, Some(&self.config.password))
            .send()
            .await?
            .error_for_status()?;
        let reader = response
            .bytes_stream()
            .map_err(|e| futures::io::Error::new(futures::io::ErrorKind::Other, e))
            .into_async_read()
            .compat();
        Ok(gunzip(BufReader::new(reader)))
    }
}
