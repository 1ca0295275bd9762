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

//! Structures handling command line options and YAML deserialization for access logging

use clap::Args;
use log::trace;
use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::error::AccessLogError;
use crate::formatter::LineFormatter;
use crate::sink::LogSink;
use crate::template::{LogFormat, COMBINED_LOG_FORMAT, COMMON_LOG_FORMAT};

/// Command line options for access logging
#[derive(Debug, Default, Args)]
pub struct AccessLogOpt {
    /// Access log file path
    ///
    /// Special values are an empty string (disable logging) and - (write to standard output).
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Access log format
    ///
    /// Either `common`, `combined` or a template like `%h %l %u %t "%r" %>s %b`.
    #[arg(long)]
    pub log_format: Option<String>,
}

/// The log format setting, a preset name or a template
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub struct LogFormatSetting(String);

impl LogFormatSetting {
    /// The template this setting stands for, with preset names resolved
    pub fn template(&self) -> &str {
        match self.0.as_str() {
            "common" => COMMON_LOG_FORMAT,
            "combined" => COMBINED_LOG_FORMAT,
            template => template,
        }
    }

    /// Compiles the template
    pub fn compile(&self) -> LogFormat {
        LogFormat::compile(self.template())
    }
}

impl Default for LogFormatSetting {
    fn default() -> Self {
        Self("combined".to_owned())
    }
}

impl From<String> for LogFormatSetting {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for LogFormatSetting {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// Configuration settings for access logging
///
/// ```yaml
/// log_file: access.log
/// log_format: '%h %l %u %t "%r" %>s %b "%{Referer}i" "%{User-agent}i" %D'
/// line_terminator: true
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AccessLogConf {
    /// Access log file path
    ///
    /// Special values are an empty string (disable logging) and - (write to standard output).
    pub log_file: PathBuf,

    /// Log format, either `common`, `combined` or a template
    ///
    /// The default is `combined`:
    ///
    /// ```text
    /// %h %l %u %t "%r" %>s %b "%{Referer}i" "%{User-agent}i"
    /// ```
    pub log_format: LogFormatSetting,

    /// If `true`, a newline character is written after each log line
    pub line_terminator: bool,
}

impl Default for AccessLogConf {
    fn default() -> Self {
        Self {
            log_file: PathBuf::from("-"),
            log_format: LogFormatSetting::default(),
            line_terminator: true,
        }
    }
}

impl AccessLogConf {
    /// Loads configuration from a YAML file
    pub fn load_from_yaml(path: impl AsRef<Path>) -> Result<Self, AccessLogError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|err| AccessLogError::ConfOpen {
            path: path.to_owned(),
            source: err,
        })?;
        let reader = BufReader::new(file);

        let conf = serde_yaml::from_reader(reader).map_err(|err| AccessLogError::ConfParse {
            path: path.to_owned(),
            source: err,
        })?;
        trace!("Loaded configuration file: {conf:#?}");

        Ok(conf)
    }

    /// Merges the command line options into the current configuration. Any command line options
    /// present overwrite existing settings.
    pub fn merge_with_opt(&mut self, opt: AccessLogOpt) {
        if let Some(log_file) = opt.log_file {
            self.log_file = log_file;
        }

        if let Some(log_format) = opt.log_format {
            self.log_format = log_format.into();
        }
    }
}

fn normalize_path(path: PathBuf) -> Result<PathBuf, AccessLogError> {
    if path.as_os_str().is_empty() || path.as_os_str() == "-" {
        // Don't change special paths
        return Ok(path);
    }

    if let Some(parent) = path.parent() {
        let mut parent = if parent.as_os_str().is_empty() {
            PathBuf::from(".").canonicalize()
        } else {
            parent.canonicalize()
        }
        .map_err(|err| AccessLogError::LogFileResolve {
            path: path.clone(),
            source: err,
        })?;
        if let Some(name) = path.file_name() {
            parent.push(name);
        }
        Ok(parent)
    } else {
        // Absolute path in the root, leave unchanged
        Ok(path)
    }
}

impl TryFrom<AccessLogConf> for LineFormatter {
    type Error = AccessLogError;

    fn try_from(conf: AccessLogConf) -> Result<Self, Self::Error> {
        let log_file = normalize_path(conf.log_file)?;
        let output = if log_file.as_os_str().is_empty() {
            LogSink::discard()
        } else if log_file.as_os_str() == "-" {
            LogSink::stdout()
        } else {
            LogSink::append_to_file(&log_file)?
        };
        let output = if conf.line_terminator {
            output.line_terminated()
        } else {
            output
        };

        Ok(Self::new(conf.log_format.compile(), output))
    }
}
