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

//! Errors setting up access logging

use std::io;
use std::path::PathBuf;

/// Failure loading the configuration or opening the log destination
///
/// Rendering log lines never fails, and write errors are reported as [`std::io::Error`].
#[derive(Debug, thiserror::Error)]
pub enum AccessLogError {
    /// Configuration file could not be opened
    #[error("failed opening configuration file {}", path.display())]
    ConfOpen {
        /// Path of the configuration file
        path: PathBuf,
        /// Underlying I/O error
        source: io::Error,
    },

    /// Configuration file could not be parsed
    #[error("failed reading configuration file {}", path.display())]
    ConfParse {
        /// Path of the configuration file
        path: PathBuf,
        /// Underlying YAML error
        source: serde_yaml::Error,
    },

    /// Parent directory of the log file could not be resolved
    #[error("failed resolving parent directory of log file {}", path.display())]
    LogFileResolve {
        /// Path of the log file
        path: PathBuf,
        /// Underlying I/O error
        source: io::Error,
    },

    /// Log file could not be opened for writing
    #[error("failed opening log file {}", path.display())]
    LogFileOpen {
        /// Path of the log file
        path: PathBuf,
        /// Underlying I/O error
        source: io::Error,
    },
}
