// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;

/// User agent sent with every request; some podcast CDNs reject blank agents.
pub const USER_AGENT: &str = concat!("podsync/", env!("CARGO_PKG_VERSION"));

/// Streaming body of an in-flight response
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>>;

/// A fully buffered response body.
pub struct FetchedBytes {
    pub body: Bytes,
    /// URL that ultimately served the body, when redirects moved it away
    /// from the requested one
    pub final_url: Option<String>,
}

/// The pieces of a streaming response the download path cares about.
pub struct HttpResponse {
    pub status: u16,
    /// Content-Length, when the server sends one
    pub content_length: Option<u64>,
    pub body: ByteStream,
}

/// Seam between the sync engine and the network. Tests substitute canned
/// implementations here instead of standing up an HTTP server.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Fetch a whole body into memory. Non-2xx statuses are errors.
    async fn get_bytes(&self, url: &str) -> Result<FetchedBytes, reqwest::Error>;

    /// Open a streaming response, for bodies too large to buffer.
    async fn get_stream(&self, url: &str) -> Result<HttpResponse, reqwest::Error>;
}

/// Production client backed by reqwest.
#[derive(Clone)]
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_default();
        Self { client }
    }
}

impl Default for ReqwestClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn get_bytes(&self, url: &str) -> Result<FetchedBytes, reqwest::Error> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        let final_url =
            (response.url().as_str() != url).then(|| response.url().as_str().to_string());

        Ok(FetchedBytes {
            body: response.bytes().await?,
            final_url,
        })
    }

    async fn get_stream(&self, url: &str) -> Result<HttpResponse, reqwest::Error> {
        let response = self.client.get(url).send().await?;
        let status = response.status().as_u16();
        let content_length = response.content_length();

        let body: ByteStream = Box::pin(response.bytes_stream());

        Ok(HttpResponse {
            status,
            content_length,
            body,
        })
    }
}
