//! HTTP seam for the remote photo source.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, RequestBuilder};
use tracing::trace;
use url::Url;

use crate::error::TransportError;

/// A GET request issued by the remote source.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub url: Url,
    pub headers: Vec<(&'static str, String)>,
    /// Always go to the network; never answer from a cache.
    pub bypass_cache: bool,
}

impl HttpRequest {
    pub fn get(url: Url) -> Self {
        Self {
            url,
            headers: Vec::new(),
            bypass_cache: false,
        }
    }

    pub fn with_header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    pub fn bypass_cache(mut self) -> Self {
        self.bypass_cache = true;
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// `HttpTransport` backed by a shared reqwest client.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Option<Duration>) -> Result<Self, TransportError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
        })
    }

    fn build_request(&self, request: HttpRequest) -> RequestBuilder {
        let mut builder = self.client.get(request.url);
        for (name, value) in &request.headers {
            builder = builder.header(*name, value.as_str());
        }
        if request.bypass_cache {
            builder = builder
                .header(header::CACHE_CONTROL, "no-cache")
                .header(header::PRAGMA, "no-cache");
        }
        builder
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        trace!(url = %request.url, "GET");
        let response = self.build_request(request).send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?.to_vec();
        Ok(HttpResponse { status, body })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;

    use parking_lot::Mutex;

    use super::*;

    /// In-memory transport keyed by URL without its query string.
    /// Unregistered URLs fail like an unreachable host.
    #[derive(Default)]
    pub struct FakeTransport {
        routes: Mutex<HashMap<String, HttpResponse>>,
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl FakeTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn route(self, url: &str, status: u16, body: impl Into<Vec<u8>>) -> Self {
            self.routes.lock().insert(
                url.to_string(),
                HttpResponse {
                    status,
                    body: body.into(),
                },
            );
            self
        }

        pub fn requests(&self) -> Vec<HttpRequest> {
            self.requests.lock().clone()
        }

        fn route_key(url: &Url) -> String {
            let mut url = url.clone();
            url.set_query(None);
            url.to_string()
        }
    }

    #[async_trait]
    impl HttpTransport for FakeTransport {
        async fn get(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
            let key = Self::route_key(&request.url);
            self.requests.lock().push(request);
            self.routes
                .lock()
                .get(&key)
                .cloned()
                .ok_or_else(|| TransportError::Unreachable {
                    url: key,
                    reason: "no route".into(),
                })
        }
    }
}
