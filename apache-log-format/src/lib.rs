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

//! # Apache Log Format
//!
//! This crate renders access log lines for HTTP requests using the directives of the Apache HTTP
//! server’s [`LogFormat`](https://httpd.apache.org/docs/current/mod/mod_log_config.html)
//! setting. A template is compiled once, the result is then used to render one line per request.
//!
//! The supported directives are:
//!
//! * `%h`: client’s address, `-` if unknown
//! * `%l`: remote logname, always `-`
//! * `%u`: remote user, always `-`
//! * `%t`: time the line is rendered, e.g. `10/Oct/2000:13:55:36 -0700`
//! * `%r`: request line, e.g. `GET /index.html HTTP/1.1`
//! * `%s`, `%>s`, `%<s`: status code of the response
//! * `%b`: `Content-Length` header of the response, `-` if missing
//! * `%m`: request method
//! * `%q`: query string prefixed with `?`, empty if there is no query
//! * `%H`: request protocol, e.g. `HTTP/1.1`
//! * `%U`: request path without the query
//! * `%D`: time taken to serve the request in microseconds, empty if not measured
//! * `%T`: time taken to serve the request in whole seconds, empty if not measured
//! * `%p`: process ID
//! * `%%`: verbatim `%` character
//! * `%{Header}i`: value of a request header, `-` if missing
//! * `%{Header}o`: value of a response header, `-` if missing
//! * `%{format}t`: not supported, renders as an empty string
//!
//! Anything else is copied into the log line verbatim. This includes unknown directives, so that
//! a mistyped template shows up in the log instead of breaking it.
//!
//! ## Code example
//!
//! ```rust
//! use apache_log_format::{LineFormatter, LogFormat, LogSink, RequestContext};
//! use http::{HeaderMap, Request};
//! use std::time::Duration;
//!
//! // Once during startup
//! let formatter = LineFormatter::new(
//!     LogFormat::compile(r#"%h "%r" %>s %b %D"#),
//!     LogSink::stderr().line_terminated(),
//! );
//!
//! // For each request
//! let request = Request::get("/index.html").body(()).unwrap();
//! let response_headers = HeaderMap::new();
//! let ctx = RequestContext::new(&request, 200)
//!     .with_remote_addr("192.0.2.1")
//!     .with_response_headers(&response_headers)
//!     .with_elapsed(Duration::from_micros(1500));
//! assert_eq!(formatter.format(&ctx), r#"192.0.2.1 "GET /index.html HTTP/1.1" 200 - 1500"#);
//! formatter.write_line(&ctx).unwrap();
//! ```
//!
//! A formatter can also be created from configuration, see [`AccessLogConf`].

pub mod configuration;
mod context;
mod error;
mod formatter;
mod sink;
pub mod template;

pub use configuration::{AccessLogConf, AccessLogOpt};
pub use context::RequestContext;
pub use error::AccessLogError;
pub use formatter::LineFormatter;
pub use sink::LogSink;
pub use template::{LogFormat, COMBINED_LOG_FORMAT, COMMON_LOG_FORMAT};
