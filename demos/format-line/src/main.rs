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

//! Writes a single access log line for a request described on the command line.
//!
//! ```sh
//! format-line --log-format common --method POST --uri '/submit?id=3' --status 201 \
//!     --remote-addr 192.0.2.1 --header 'User-Agent: curl/8.0' --elapsed-us 1500
//! ```

use apache_log_format::{AccessLogConf, AccessLogOpt, LineFormatter, RequestContext};
use clap::Parser;
use http::{HeaderMap, HeaderName, HeaderValue, Method, Request, Uri, Version};
use log::error;
use std::path::PathBuf;

/// Write an access log line for a request
#[derive(Debug, Parser)]
struct Opt {
    /// Configuration file to load
    #[arg(short, long)]
    conf: Option<PathBuf>,

    #[command(flatten)]
    log: AccessLogOpt,

    /// Request method
    #[arg(long, default_value = "GET")]
    method: Method,

    /// Request target
    #[arg(long, default_value = "/")]
    uri: Uri,

    /// Protocol version, one of HTTP/1.0, HTTP/1.1, HTTP/2.0
    #[arg(long, default_value = "HTTP/1.1", value_parser = parse_version)]
    version: Version,

    /// Response status code
    #[arg(long, default_value_t = 200)]
    status: u16,

    /// Client address
    #[arg(long)]
    remote_addr: Option<String>,

    /// Request header like `Name: value`, can be given multiple times
    #[arg(long = "header", value_parser = parse_header)]
    headers: Vec<(HeaderName, HeaderValue)>,

    /// Response header like `Name: value`, can be given multiple times
    #[arg(long = "response-header", value_parser = parse_header)]
    response_headers: Vec<(HeaderName, HeaderValue)>,

    /// Time taken to serve the request in microseconds
    #[arg(long, default_value_t = 0)]
    elapsed_us: u64,
}

fn parse_version(value: &str) -> Result<Version, String> {
    match value {
        "HTTP/0.9" => Ok(Version::HTTP_09),
        "HTTP/1.0" => Ok(Version::HTTP_10),
        "HTTP/1.1" => Ok(Version::HTTP_11),
        "HTTP/2" | "HTTP/2.0" => Ok(Version::HTTP_2),
        "HTTP/3" | "HTTP/3.0" => Ok(Version::HTTP_3),
        _ => Err(format!("Unsupported protocol version {value}")),
    }
}

fn parse_header(value: &str) -> Result<(HeaderName, HeaderValue), String> {
    let (name, value) = value
        .split_once(':')
        .ok_or_else(|| format!("Expected `Name: value`, got `{value}`"))?;
    let name = HeaderName::try_from(name.trim()).map_err(|err| err.to_string())?;
    let value = HeaderValue::try_from(value.trim()).map_err(|err| err.to_string())?;
    Ok((name, value))
}

fn header_map(headers: Vec<(HeaderName, HeaderValue)>) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        map.append(name, value);
    }
    map
}

fn main() {
    env_logger::init();

    let opt = Opt::parse();

    let mut conf = match opt.conf.as_deref().map(AccessLogConf::load_from_yaml) {
        Some(Ok(conf)) => conf,
        Some(Err(err)) => {
            error!("{err}");
            AccessLogConf::default()
        }
        None => AccessLogConf::default(),
    };
    conf.merge_with_opt(opt.log);

    let formatter = match LineFormatter::try_from(conf) {
        Ok(formatter) => formatter,
        Err(err) => {
            error!("{err}");
            return;
        }
    };

    let mut request = Request::new(());
    *request.method_mut() = opt.method;
    *request.uri_mut() = opt.uri;
    *request.version_mut() = opt.version;
    *request.headers_mut() = header_map(opt.headers);
    let response_headers = header_map(opt.response_headers);

    let mut ctx = RequestContext::new(&request, opt.status)
        .with_response_headers(&response_headers)
        .with_elapsed_micros(opt.elapsed_us);
    if let Some(remote_addr) = opt.remote_addr {
        ctx = ctx.with_remote_addr(remote_addr);
    }

    if let Err(err) = formatter.write_line(&ctx) {
        error!("Failed writing log line: {err}");
    }
}
