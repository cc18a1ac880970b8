use std::time::Duration;

use futures::future::BoxFuture;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE};
use reqwest::Client;

use crate::images::ThumbnailError;

/// Retrieves the raw bytes behind an image locator.
pub trait ImageFetcher: Send + Sync {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Vec<u8>, ThumbnailError>>;
}

/// Plain HTTP GET with a request timeout, so a stuck server can't hold a
/// worker forever.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: u64, user_agent: &str, proxy: Option<&str>) -> Result<Self, reqwest::Error> {
        let client_builder = Client::builder()
            .timeout(Duration::from_secs(timeout))
            .user_agent(user_agent);

        let client_builder = match proxy {
            Some(proxy) => {
                log::info!("Fetching images through proxy {}", proxy);
                client_builder.proxy(reqwest::Proxy::all(proxy)?)
            }
            None => client_builder,
        };

        Ok(Self {
            client: client_builder.build()?,
        })
    }

    async fn get(&self, url: &str) -> Result<Vec<u8>, ThumbnailError> {
        let response = self
            .client
            .get(url)
            .header(ACCEPT, "image/avif,image/webp,image/png,image/jpeg,image/*;q=0.8,*/*;q=0.5")
            .header(ACCEPT_LANGUAGE, "en-US,en;q=0.9")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            log::debug!("Image request for {} failed with status: {}", url, status);
            return Err(ThumbnailError::FetchStatus(status));
        }

        let bytes = response.bytes().await?;
        log::debug!("Fetched {} bytes from {}", bytes.len(), url);
        Ok(bytes.to_vec())
    }
}

impl ImageFetcher for HttpFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Vec<u8>, ThumbnailError>> {
        Box::pin(self.get(url))
    }
}
