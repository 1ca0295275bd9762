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

//! Rendering compiled templates into log lines

use chrono::{DateTime, Local, TimeZone};
use http::{header, HeaderMap, HeaderName};
use std::fmt::Display;
use std::io::{self, Write};
use std::process;
use std::time::SystemTime;

use crate::context::RequestContext;
use crate::sink::LogSink;
use crate::template::{Directive, FieldClass, FieldName, LogFormat, Segment};

/// Apache’s marker for values that aren’t available
const NIL_FIELD: &[u8] = b"-";

fn write_or_nil(buf: &mut Vec<u8>, value: Option<&[u8]>) {
    match value {
        Some(value) if !value.is_empty() => buf.extend_from_slice(value),
        _ => buf.extend_from_slice(NIL_FIELD),
    }
}

fn write_header(buf: &mut Vec<u8>, headers: Option<&HeaderMap>, name: Option<&HeaderName>) {
    let value = headers
        .zip(name)
        .and_then(|(headers, name)| headers.get(name))
        .map(|value| value.as_bytes());
    write_or_nil(buf, value);
}

fn write_timestamp<Tz>(buf: &mut Vec<u8>, time: DateTime<Tz>) -> io::Result<()>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    write!(buf, "{}", time.format("%d/%b/%Y:%H:%M:%S %z"))
}

fn write_directive(
    buf: &mut Vec<u8>,
    directive: &Directive,
    ctx: &RequestContext<'_>,
) -> io::Result<()> {
    match directive {
        Directive::RemoteAddr => {
            write_or_nil(buf, ctx.remote_addr.as_deref().map(str::as_bytes));
            Ok(())
        }
        Directive::RemoteLogname | Directive::RemoteUser => buf.write_all(NIL_FIELD),
        Directive::Time => {
            let time = ctx.time.unwrap_or_else(SystemTime::now);
            write_timestamp(buf, DateTime::<Local>::from(time))
        }
        Directive::RequestLine => {
            write!(buf, "{} {} {:?}", ctx.method, ctx.uri, ctx.version)
        }
        Directive::Status => write!(buf, "{}", ctx.status),
        Directive::BodySize => {
            write_header(
                buf,
                ctx.response_headers,
                Some(&header::CONTENT_LENGTH),
            );
            Ok(())
        }
        Directive::Method => buf.write_all(ctx.method.as_str().as_bytes()),
        Directive::Query => match ctx.uri.query() {
            Some(query) if !query.is_empty() => write!(buf, "?{query}"),
            _ => Ok(()),
        },
        Directive::Protocol => write!(buf, "{:?}", ctx.version),
        Directive::Path => buf.write_all(ctx.uri.path().as_bytes()),
        Directive::ElapsedMicros => match ctx.elapsed_micros {
            Some(micros) => write!(buf, "{micros}"),
            None => Ok(()),
        },
        Directive::ElapsedSeconds => match ctx.elapsed_micros {
            Some(micros) => write!(buf, "{}", micros / 1_000_000),
            None => Ok(()),
        },
        Directive::ProcessId => write!(buf, "{}", process::id()),
        Directive::Percent => buf.write_all(b"%"),
        Directive::Field(class, name) => {
            write_field(buf, *class, name, ctx);
            Ok(())
        }
    }
}

fn write_field(buf: &mut Vec<u8>, class: FieldClass, name: &FieldName, ctx: &RequestContext<'_>) {
    match class {
        FieldClass::RequestHeader => write_header(buf, Some(ctx.headers), name.header()),
        FieldClass::ResponseHeader => write_header(buf, ctx.response_headers, name.header()),
        FieldClass::RequestTime => {}
    }
}

impl LogFormat {
    /// Appends the line rendered for the given request to the buffer
    pub fn render_into(&self, buf: &mut Vec<u8>, ctx: &RequestContext<'_>) {
        // Writing into a `Vec<u8>` cannot fail
        self.write_segments(buf, ctx)
            .expect("writing into a memory buffer failed");
    }

    fn write_segments(&self, buf: &mut Vec<u8>, ctx: &RequestContext<'_>) -> io::Result<()> {
        for segment in self.segments() {
            match segment {
                Segment::Literal(text) => buf.write_all(text.as_bytes())?,
                Segment::Directive(directive) => write_directive(buf, directive, ctx)?,
            }
        }
        Ok(())
    }

    /// Renders the line for the given request
    ///
    /// Header values that aren’t valid UTF-8 are converted lossily.
    pub fn render(&self, ctx: &RequestContext<'_>) -> String {
        let mut buf = Vec::new();
        self.render_into(&mut buf, ctx);
        match String::from_utf8(buf) {
            Ok(line) => line,
            Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
        }
    }
}

/// Renders log lines and writes them to a log destination
///
/// A formatter can be shared between threads, each call to [`LineFormatter::write_line`] writes
/// exactly one record to the sink. No newline is added unless the sink is
/// [line terminated](LogSink::line_terminated).
///
/// ```rust
/// use apache_log_format::{LineFormatter, LogFormat, LogSink, RequestContext};
/// use http::Request;
///
/// let formatter = LineFormatter::new(LogFormat::compile("%m %U%q %>s"), LogSink::stdout());
/// let request = Request::get("/search?q=rust").body(()).unwrap();
/// let ctx = RequestContext::new(&request, 200);
/// assert_eq!(formatter.format(&ctx), "GET /search?q=rust 200");
/// formatter.write_line(&ctx).unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct LineFormatter {
    format: LogFormat,
    output: LogSink,
}

impl LineFormatter {
    /// Creates a formatter from a compiled template and a log destination
    pub fn new(format: LogFormat, output: LogSink) -> Self {
        Self { format, output }
    }

    /// A formatter writing the Common Log Format to standard error
    pub fn common() -> Self {
        Self::new(LogFormat::common(), LogSink::stderr().line_terminated())
    }

    /// A formatter writing the Combined Log Format to standard error
    pub fn combined() -> Self {
        Self::new(LogFormat::combined(), LogSink::stderr().line_terminated())
    }

    /// The compiled template used by this formatter
    pub fn log_format(&self) -> &LogFormat {
        &self.format
    }

    /// The log destination of this formatter
    pub fn output(&self) -> &LogSink {
        &self.output
    }

    /// Redirects output to another destination
    pub fn set_output(&mut self, output: LogSink) {
        self.output = output;
    }

    /// Creates a copy of this formatter writing to a different destination
    ///
    /// The copy shares the compiled template but not the destination.
    pub fn with_output(&self, output: LogSink) -> Self {
        Self {
            format: self.format.clone(),
            output,
        }
    }

    /// Renders the line for the given request
    pub fn format(&self, ctx: &RequestContext<'_>) -> String {
        self.format.render(ctx)
    }

    /// Appends the line rendered for the given request to the buffer
    pub fn format_into(&self, buf: &mut Vec<u8>, ctx: &RequestContext<'_>) {
        self.format.render_into(buf, ctx);
    }

    /// Renders the line for the given request and writes it to the log destination
    pub fn write_line(&self, ctx: &RequestContext<'_>) -> io::Result<()> {
        let mut buf = Vec::with_capacity(256);
        self.format_into(&mut buf, ctx);
        self.output.write_record(&buf)
    }
}
