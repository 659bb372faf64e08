use reqwest::header::HeaderMap;
use reqwest::{Client, Response};
use serde::Serialize;
use std::time::Duration;

/// Upper bound for a whole downstream call, connect to last body byte.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// POSTs `body` as JSON and hands back the raw response, whatever its
    /// status.
    pub async fn post_json<T>(
        &self,
        url: &str,
        headers: HeaderMap,
        body: &T,
    ) -> Result<Response, reqwest::Error>
    where
        T: Serialize + ?Sized,
    {
        self.client
            .post(url)
            .headers(headers)
            .json(body)
            .send()
            .await
    }
}
