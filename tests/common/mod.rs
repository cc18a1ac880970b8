#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use parking_lot::Mutex;

use memorymap::images::{ImageFetcher, ThumbnailError};

#[derive(Clone)]
pub enum Response {
    Image(Vec<u8>),
    Status(u16),
    Slow(Duration),
}

/// In-memory stand-in for the network that records every requested URL.
#[derive(Default)]
pub struct StubFetcher {
    responses: HashMap<String, Response>,
    requests: Mutex<Vec<String>>,
}

impl StubFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, url: &str, response: Response) -> Self {
        self.responses.insert(url.to_string(), response);
        self
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }
}

impl ImageFetcher for StubFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Vec<u8>, ThumbnailError>> {
        self.requests.lock().push(url.to_string());
        let response = self.responses.get(url).cloned().unwrap_or(Response::Status(404));

        Box::pin(async move {
            match response {
                Response::Image(data) => Ok(data),
                Response::Status(code) => Err(ThumbnailError::FetchStatus(
                    reqwest::StatusCode::from_u16(code).unwrap(),
                )),
                Response::Slow(delay) => {
                    tokio::time::sleep(delay).await;
                    Err(ThumbnailError::FetchStatus(reqwest::StatusCode::GATEWAY_TIMEOUT))
                }
            }
        })
    }
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 90]));
    let mut output = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut output), ImageFormat::Png)
        .unwrap();
    output
}
