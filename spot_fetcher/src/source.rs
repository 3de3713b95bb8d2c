use shared::SourceConfig;
use shared::error::FetchError;
use shared::refresh::{BatchSource, FetchParams};
use shared::spots::{RawBatch, parse_batch};
use tracing::{debug, instrument};

/// A reporting network reached over HTTP, returning a JSON batch of spots.
pub struct HttpBatchSource {
    name: String,
    url: String,
    client: reqwest::Client,
}

impl HttpBatchSource {
    pub fn new(config: &SourceConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(concat!("spot_fetcher/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            name: config.name.clone(),
            url: config.url.clone(),
            client,
        })
    }
}

impl BatchSource for HttpBatchSource {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip(self), fields(source = %self.name))]
    async fn fetch(&self, params: &FetchParams) -> Result<RawBatch, FetchError> {
        let mut query: Vec<(&str, String)> = Vec::new();
        if let Some(callsign) = &params.target_callsign {
            query.push(("callsign", callsign.clone()));
        }
        if let Some(minutes) = params.window_minutes {
            query.push(("minutes", minutes.to_string()));
        }

        let resp = self
            .client
            .get(&self.url)
            .query(&query)
            .send()
            .await
            .map_err(FetchError::request)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = resp.text().await.map_err(FetchError::request)?;
        let batch = parse_batch(&body)?;
        debug!(
            count = batch.reports.len(),
            undecodable = batch.undecodable,
            "fetched batch"
        );
        Ok(batch)
    }
}
