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

//! Destinations for rendered log lines

use std::fmt::{self, Debug, Formatter};
use std::fs::File;
use std::io::{self, sink, stderr, stdout, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::AccessLogError;

type SharedWriter = Arc<Mutex<Box<dyn Write + Send>>>;

/// A handle to a log destination
///
/// Handles are cheap to clone, clones write to the same destination. Every record is written
/// while holding an exclusive lock on the destination, so records written from different
/// threads never interleave.
#[derive(Clone)]
pub struct LogSink {
    writer: SharedWriter,
    line_terminated: bool,
}

impl Debug for LogSink {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogSink")
            .field("writer", &Arc::as_ptr(&self.writer))
            .field("line_terminated", &self.line_terminated)
            .finish()
    }
}

impl LogSink {
    /// Creates a sink writing to an arbitrary destination
    pub fn new(writer: impl Write + Send + 'static) -> Self {
        Self {
            writer: Arc::new(Mutex::new(Box::new(writer))),
            line_terminated: false,
        }
    }

    /// Creates a sink writing to standard output
    pub fn stdout() -> Self {
        Self::new(stdout())
    }

    /// Creates a sink writing to standard error
    pub fn stderr() -> Self {
        Self::new(stderr())
    }

    /// Creates a sink discarding all data
    pub fn discard() -> Self {
        Self::new(sink())
    }

    /// Creates a sink appending to a file, the file is created if necessary
    pub fn append_to_file(path: impl AsRef<Path>) -> Result<Self, AccessLogError> {
        let path = path.as_ref();
        let file = File::options()
            .append(true)
            .create(true)
            .open(path)
            .map_err(|err| AccessLogError::LogFileOpen {
                path: path.to_owned(),
                source: err,
            })?;
        Ok(Self::new(file))
    }

    /// Makes this sink add a newline character after each record
    pub fn line_terminated(mut self) -> Self {
        self.line_terminated = true;
        self
    }

    /// Checks whether both handles write to the same destination
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.writer, &other.writer)
    }

    /// Writes a single record
    ///
    /// The data is written with one `write_all` call, followed by the line terminator if
    /// configured. Any write error is returned to the caller.
    pub fn write_record(&self, data: &[u8]) -> io::Result<()> {
        // A panic in another thread doesn’t make the destination unusable
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writer.write_all(data)?;
        if self.line_terminated {
            writer.write_all(b"\n")?;
        }
        writer.flush()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    use std::env::temp_dir;
    use std::fs::{read_to_string, remove_file};
    use std::process;
    use test_log::test;

    /// In-memory destination, clones share the same buffer
    #[derive(Debug, Clone, Default)]
    pub(crate) struct MemoryWriter(pub(crate) Arc<Mutex<Vec<u8>>>);

    impl MemoryWriter {
        pub(crate) fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl Write for MemoryWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct FailingWriter;

    impl Write for FailingWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn records() {
        let memory = MemoryWriter::default();
        let sink = LogSink::new(memory.clone());
        sink.write_record(b"first").unwrap();
        sink.write_record(b" second").unwrap();
        assert_eq!(memory.contents(), "first second");

        let memory = MemoryWriter::default();
        let sink = LogSink::new(memory.clone()).line_terminated();
        sink.write_record(b"first").unwrap();
        sink.write_record(b"second").unwrap();
        assert_eq!(memory.contents(), "first\nsecond\n");
    }

    #[test]
    fn aliasing() {
        let sink = LogSink::discard();
        let clone = sink.clone();
        assert!(sink.ptr_eq(&clone));
        assert!(!sink.ptr_eq(&LogSink::discard()));
    }

    #[test]
    fn write_errors() {
        let sink = LogSink::new(FailingWriter);
        let err = sink.write_record(b"data").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn poisoned_lock() {
        let memory = MemoryWriter::default();
        let sink = LogSink::new(memory.clone());

        let clone = sink.clone();
        let _ = std::thread::spawn(move || {
            let _guard = clone.writer.lock().unwrap();
            panic!("poisoning the lock");
        })
        .join();

        sink.write_record(b"still working").unwrap();
        assert_eq!(memory.contents(), "still working");
    }

    #[test]
    fn file() {
        let path = temp_dir().join(format!("apache-log-format-sink-{}.log", process::id()));
        let _ = remove_file(&path);

        let sink = LogSink::append_to_file(&path).unwrap().line_terminated();
        sink.write_record(b"one").unwrap();
        drop(sink);

        let sink = LogSink::append_to_file(&path).unwrap().line_terminated();
        sink.write_record(b"two").unwrap();
        assert_eq!(read_to_string(&path).unwrap(), "one\ntwo\n");

        remove_file(&path).unwrap();

        let missing = temp_dir().join("apache-log-format-missing-dir").join("x.log");
        assert!(matches!(
            LogSink::append_to_file(missing),
            Err(AccessLogError::LogFileOpen { .. })
        ));
    }
}
