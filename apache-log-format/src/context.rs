// Copyright 2024 Wladimir Palant
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Per-request data a log line is rendered from

use http::request::Parts;
use http::{HeaderMap, Method, Request, Uri, Version};
use std::borrow::Cow;
use std::net::SocketAddr;
use std::time::{Duration, SystemTime};

/// Everything known about a single request/response exchange
///
/// A context is created for every log line and borrows the request data from the server’s own
/// structures:
///
/// ```rust
/// use apache_log_format::RequestContext;
/// use http::{HeaderMap, Request, StatusCode};
/// use std::time::Duration;
///
/// let request = Request::get("/index.html").body(()).unwrap();
/// let response_headers = HeaderMap::new();
/// let ctx = RequestContext::new(&request, StatusCode::OK.as_u16())
///     .with_remote_addr("192.0.2.1")
///     .with_response_headers(&response_headers)
///     .with_elapsed(Duration::from_millis(3));
/// ```
#[derive(Debug, Clone)]
pub struct RequestContext<'a> {
    pub(crate) method: &'a Method,
    pub(crate) uri: &'a Uri,
    pub(crate) version: Version,
    pub(crate) headers: &'a HeaderMap,
    pub(crate) remote_addr: Option<Cow<'a, str>>,
    pub(crate) status: u16,
    pub(crate) response_headers: Option<&'a HeaderMap>,
    pub(crate) elapsed_micros: Option<u64>,
    pub(crate) time: Option<SystemTime>,
}

impl<'a> RequestContext<'a> {
    /// Creates a context for a request and the status code it was answered with
    pub fn new<B>(request: &'a Request<B>, status: u16) -> Self {
        Self::build(
            request.method(),
            request.uri(),
            request.version(),
            request.headers(),
            status,
        )
    }

    /// Creates a context from request parts and the status code the request was answered with
    pub fn from_parts(parts: &'a Parts, status: u16) -> Self {
        Self::build(
            &parts.method,
            &parts.uri,
            parts.version,
            &parts.headers,
            status,
        )
    }

    fn build(
        method: &'a Method,
        uri: &'a Uri,
        version: Version,
        headers: &'a HeaderMap,
        status: u16,
    ) -> Self {
        Self {
            method,
            uri,
            version,
            headers,
            remote_addr: None,
            status,
            response_headers: None,
            elapsed_micros: None,
            time: None,
        }
    }

    /// Sets the client address as it should appear in the log
    pub fn with_remote_addr(mut self, remote_addr: impl Into<Cow<'a, str>>) -> Self {
        self.remote_addr = Some(remote_addr.into());
        self
    }

    /// Sets the client address from a socket address, only the IP address is logged
    pub fn with_client_addr(mut self, client_addr: SocketAddr) -> Self {
        self.remote_addr = Some(Cow::Owned(client_addr.ip().to_string()));
        self
    }

    /// Sets the headers of the response
    pub fn with_response_headers(mut self, headers: &'a HeaderMap) -> Self {
        self.response_headers = Some(headers);
        self
    }

    /// Sets the time it took to serve the request in microseconds, zero means not measured
    pub fn with_elapsed_micros(mut self, micros: u64) -> Self {
        self.elapsed_micros = (micros > 0).then_some(micros);
        self
    }

    /// Sets the time it took to serve the request, zero means not measured
    pub fn with_elapsed(self, elapsed: Duration) -> Self {
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.with_elapsed_micros(micros)
    }

    /// Overrides the time logged by `%t`, by default this is the time the line is rendered
    pub fn with_time(mut self, time: SystemTime) -> Self {
        self.time = Some(time);
        self
    }

    /// The status code of the response
    pub fn status(&self) -> u16 {
        self.status
    }

    /// The time it took to serve the request in microseconds if it was measured
    pub fn elapsed_micros(&self) -> Option<u64> {
        self.elapsed_micros
    }
}
