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

//! Compilation of `LogFormat` templates into a list of segments

use http::HeaderName;
use log::{trace, warn};
use serde::Deserialize;
use std::sync::Arc;

/// The Common Log Format as defined by the Apache HTTP server
pub const COMMON_LOG_FORMAT: &str = r#"%h %l %u %t "%r" %>s %b"#;

/// The Combined Log Format, Common Log Format with referrer and user agent added
pub const COMBINED_LOG_FORMAT: &str =
    r#"%h %l %u %t "%r" %>s %b "%{Referer}i" "%{User-agent}i""#;

/// Kind of value a `%{name}X` directive refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldClass {
    /// A request header, `%{name}i`
    RequestHeader,
    /// A response header, `%{name}o`
    ResponseHeader,
    /// Request time in a custom format, `%{format}t`
    ///
    /// Not implemented, always resolves to an empty string.
    RequestTime,
}

impl FieldClass {
    fn from_suffix(suffix: u8) -> Option<Self> {
        match suffix {
            b'i' => Some(Self::RequestHeader),
            b'o' => Some(Self::ResponseHeader),
            b't' => Some(Self::RequestTime),
            _ => None,
        }
    }
}

/// The name given between the braces of a `%{name}X` directive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldName {
    name: Box<str>,
    header: Option<HeaderName>,
}

impl FieldName {
    fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            header: HeaderName::from_bytes(name.as_bytes()).ok(),
        }
    }

    /// The field name as written in the template
    pub fn as_str(&self) -> &str {
        &self.name
    }

    /// The field name as an HTTP header name, `None` if it isn’t a valid one
    pub fn header(&self) -> Option<&HeaderName> {
        self.header.as_ref()
    }
}

/// A directive resolved against the request context when a line is rendered
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// Client address, `%h`
    RemoteAddr,
    /// Remote logname from identd, `%l`, always `-`
    RemoteLogname,
    /// Authenticated remote user, `%u`, always `-`
    RemoteUser,
    /// Time the line is rendered unless overridden in the request context, `%t`
    Time,
    /// Request line like `GET / HTTP/1.1`, `%r`
    RequestLine,
    /// Response status code, `%s` (or `%>s`)
    Status,
    /// Response size according to the `Content-Length` response header, `%b`
    BodySize,
    /// Request method, `%m`
    Method,
    /// Query string including the leading `?`, `%q`
    Query,
    /// Request protocol like `HTTP/1.1`, `%H`
    Protocol,
    /// Request path without query, `%U`
    Path,
    /// Time taken to serve the request in microseconds, `%D`
    ElapsedMicros,
    /// Time taken to serve the request in whole seconds, `%T`
    ElapsedSeconds,
    /// Process ID of the process writing the log, `%p`
    ProcessId,
    /// Verbatim `%` character, `%%`
    Percent,
    /// Parametrized directive like `%{Referer}i`
    Field(FieldClass, FieldName),
}

impl Directive {
    fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            b'h' => Self::RemoteAddr,
            b'l' => Self::RemoteLogname,
            b'u' => Self::RemoteUser,
            b't' => Self::Time,
            b'r' => Self::RequestLine,
            b's' => Self::Status,
            b'b' => Self::BodySize,
            b'm' => Self::Method,
            b'q' => Self::Query,
            b'H' => Self::Protocol,
            b'U' => Self::Path,
            b'D' => Self::ElapsedMicros,
            b'T' => Self::ElapsedSeconds,
            b'p' => Self::ProcessId,
            _ => return None,
        })
    }
}

/// A part of a compiled template
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Text copied into the log line unchanged
    Literal(String),
    /// A value determined per request
    Directive(Directive),
}

/// A compiled log format template
///
/// Compiling happens once, the result can be rendered any number of times without parsing the
/// template again. Clones share the same segment list.
///
/// Compiling never fails: unrecognized directives, a `%` at the end of the template or a `%{`
/// without a matching `}i`, `}o` or `}t` are kept in the output verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub struct LogFormat {
    segments: Arc<[Segment]>,
}

impl LogFormat {
    /// Compiles a template like `%h %l %u %t "%r" %>s %b`
    pub fn compile(template: &str) -> Self {
        let mut compiler = Compiler::default();
        compiler.run(template);

        trace!(
            "Compiled log format `{template}` into {} segments",
            compiler.segments.len()
        );
        Self {
            segments: compiler.segments.into(),
        }
    }

    /// The Common Log Format, see [`COMMON_LOG_FORMAT`]
    pub fn common() -> Self {
        Self::compile(COMMON_LOG_FORMAT)
    }

    /// The Combined Log Format, see [`COMBINED_LOG_FORMAT`]
    pub fn combined() -> Self {
        Self::compile(COMBINED_LOG_FORMAT)
    }

    /// Segments of the template in the order they are rendered
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }
}

impl From<&str> for LogFormat {
    fn from(value: &str) -> Self {
        Self::compile(value)
    }
}

impl From<String> for LogFormat {
    fn from(value: String) -> Self {
        value.as_str().into()
    }
}

#[derive(Debug, Default)]
struct Compiler {
    segments: Vec<Segment>,
}

impl Compiler {
    fn push_literal(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }

        if let Some(Segment::Literal(last)) = self.segments.last_mut() {
            last.push_str(text);
        } else {
            self.segments.push(Segment::Literal(text.to_owned()));
        }
    }

    fn push_directive(&mut self, directive: Directive) {
        self.segments.push(Segment::Directive(directive));
    }

    /// Parses a directive at the start of `rest` which is known to start with `%`. Returns the
    /// directive and its length, or `None` if `%` doesn’t start a directive here.
    fn parse_directive(rest: &str) -> Option<(Directive, usize)> {
        let bytes = rest.as_bytes();
        match bytes.get(1)? {
            b'%' => Some((Directive::Percent, 2)),
            b'{' => {
                let end = rest.find('}')?;
                let class = FieldClass::from_suffix(*bytes.get(end + 1)?)?;
                let name = &rest[2..end];
                if name.is_empty() {
                    return None;
                }
                Some((Directive::Field(class, FieldName::new(name)), end + 2))
            }
            b'<' | b'>' => {
                let directive = Directive::from_code(*bytes.get(2)?)?;
                Some((directive, 3))
            }
            code => Some((Directive::from_code(*code)?, 2)),
        }
    }

    /// Checks whether `rest` opens a `%{` that no `}i`, `}o` or `}t` closes
    fn is_unterminated_field(rest: &str) -> bool {
        rest.starts_with("%{")
            && !rest
                .match_indices('}')
                .filter_map(|(index, _)| rest.as_bytes().get(index + 1))
                .any(|suffix| FieldClass::from_suffix(*suffix).is_some())
    }

    fn run(&mut self, mut template: &str) {
        while let Some(start) = template.find('%') {
            self.push_literal(&template[..start]);
            let rest = &template[start..];

            if let Some((directive, len)) = Self::parse_directive(rest) {
                self.push_directive(directive);
                template = &rest[len..];
            } else if Self::is_unterminated_field(rest) {
                // Nothing closes this `%{`, the remainder is literal text
                warn!("Unterminated log format directive `{rest}`, kept verbatim");
                self.push_literal(rest);
                return;
            } else {
                // Keep the percent sign and continue right after it, whatever follows is literal
                // text unless it starts another directive.
                let next = rest[1..].find('%').map_or(rest.len(), |index| index + 1);
                warn!("Unrecognized log format directive `{}`, kept verbatim", &rest[..next]);
                self.push_literal(&rest[..1]);
                template = &rest[1..];
            }
        }
        self.push_literal(template);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    fn literal(text: &str) -> Segment {
        Segment::Literal(text.to_owned())
    }

    fn directive(directive: Directive) -> Segment {
        Segment::Directive(directive)
    }

    fn field(class: FieldClass, name: &str) -> Segment {
        Segment::Directive(Directive::Field(class, FieldName::new(name)))
    }

    #[test]
    fn literal_only() {
        assert!(LogFormat::compile("").segments().is_empty());
        assert_eq!(
            LogFormat::compile("no directives {here}").segments(),
            &[literal("no directives {here}")]
        );
    }

    #[test]
    fn common_log_format() {
        assert_eq!(
            LogFormat::common().segments(),
            &[
                directive(Directive::RemoteAddr),
                literal(" "),
                directive(Directive::RemoteLogname),
                literal(" "),
                directive(Directive::RemoteUser),
                literal(" "),
                directive(Directive::Time),
                literal(" \""),
                directive(Directive::RequestLine),
                literal("\" "),
                directive(Directive::Status),
                literal(" "),
                directive(Directive::BodySize),
            ]
        );
    }

    #[test]
    fn combined_log_format() {
        let format = LogFormat::combined();
        let segments = format.segments();
        assert_eq!(
            &segments[segments.len() - 5..],
            &[
                literal(" \""),
                field(FieldClass::RequestHeader, "Referer"),
                literal("\" \""),
                field(FieldClass::RequestHeader, "User-agent"),
                literal("\""),
            ]
        );
    }

    #[test]
    fn all_codes() {
        assert_eq!(
            LogFormat::compile("%h%l%u%t%r%s%b%m%q%H%U%D%T%p%%").segments(),
            &[
                directive(Directive::RemoteAddr),
                directive(Directive::RemoteLogname),
                directive(Directive::RemoteUser),
                directive(Directive::Time),
                directive(Directive::RequestLine),
                directive(Directive::Status),
                directive(Directive::BodySize),
                directive(Directive::Method),
                directive(Directive::Query),
                directive(Directive::Protocol),
                directive(Directive::Path),
                directive(Directive::ElapsedMicros),
                directive(Directive::ElapsedSeconds),
                directive(Directive::ProcessId),
                directive(Directive::Percent),
            ]
        );
    }

    #[test]
    fn modifiers() {
        assert_eq!(
            LogFormat::compile("%>s %<s %s").segments(),
            &[
                directive(Directive::Status),
                literal(" "),
                directive(Directive::Status),
                literal(" "),
                directive(Directive::Status),
            ]
        );
    }

    #[test]
    fn fields() {
        assert_eq!(
            LogFormat::compile("%{X-Req}i|%{X-Resp}o|%{%d/%b}t").segments(),
            &[
                field(FieldClass::RequestHeader, "X-Req"),
                literal("|"),
                field(FieldClass::ResponseHeader, "X-Resp"),
                literal("|"),
                field(FieldClass::RequestTime, "%d/%b"),
            ]
        );

        let format = LogFormat::compile("%{User-Agent}i");
        let Segment::Directive(Directive::Field(_, name)) = &format.segments()[0] else {
            panic!("Expected a field directive");
        };
        assert_eq!(name.as_str(), "User-Agent");
        assert_eq!(name.header(), Some(&http::header::USER_AGENT));

        let format = LogFormat::compile("%{not a header}i");
        let Segment::Directive(Directive::Field(_, name)) = &format.segments()[0] else {
            panic!("Expected a field directive");
        };
        assert_eq!(name.as_str(), "not a header");
        assert_eq!(name.header(), None);
    }

    #[test]
    fn degrades_to_literal() {
        assert_eq!(
            LogFormat::compile("stray percent at the end: %").segments(),
            &[literal("stray percent at the end: %")]
        );
        assert_eq!(
            LogFormat::compile("Missing closing brace: %{Test <- this should be verbatim")
                .segments(),
            &[literal(
                "Missing closing brace: %{Test <- this should be verbatim"
            )]
        );
        assert_eq!(
            LogFormat::compile("%x %>x %> %{}i %{a}x%").segments(),
            &[literal("%x %>x %> %{}i %{a}x%")]
        );
        assert_eq!(
            LogFormat::compile("%{a}x %{b}o").segments(),
            &[
                literal("%{a}x "),
                field(FieldClass::ResponseHeader, "b"),
            ]
        );
        assert_eq!(
            LogFormat::compile("%m %{Test %m %h %% tail").segments(),
            &[
                directive(Directive::Method),
                literal(" %{Test %m %h %% tail"),
            ]
        );
        assert_eq!(
            LogFormat::compile("%{a}x %m %{b").segments(),
            &[literal("%{a}x %m %{b")]
        );
        assert_eq!(
            LogFormat::compile("100% %m").segments(),
            &[literal("100% "), directive(Directive::Method)]
        );
    }

    #[test]
    fn multibyte_text() {
        assert_eq!(
            LogFormat::compile("ä%ö %{Ü}i€%").segments(),
            &[literal("ä%ö "), field(FieldClass::RequestHeader, "Ü"), literal("€%")]
        );
    }

    #[test]
    fn clones_share_segments() {
        let format = LogFormat::common();
        let clone = format.clone();
        assert!(Arc::ptr_eq(&format.segments, &clone.segments));
    }

    #[test]
    fn deserialization() {
        #[derive(Debug, Deserialize)]
        struct Conf {
            format: LogFormat,
        }

        let conf: Conf = serde_yaml::from_str("format: '%m %U%q'").unwrap();
        assert_eq!(
            conf.format.segments(),
            &[
                directive(Directive::Method),
                literal(" "),
                directive(Directive::Path),
                directive(Directive::Query),
            ]
        );
    }
}
