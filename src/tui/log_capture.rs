//! Log capture for the chat shell
//!
//! While the shell owns the terminal, tracing-subscriber writes into a
//! `LogBuffer` (it implements `MakeWriter`) instead of stderr. Every tick the
//! shell drains the buffer into `tui.log` in the data directory. If the shell
//! falls behind, the oldest lines are dropped and the file gets a marker saying
//! how many went missing.

use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};

use tracing_subscriber::fmt::MakeWriter;

use crate::config::Config;

/// Lines held between drains.
const CAPACITY: usize = 500;

#[derive(Default)]
struct Pending {
    lines: VecDeque<String>,
    dropped: usize,
}

/// Lines taken out of a `LogBuffer` by one drain.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Drained {
    pub lines: Vec<String>,
    /// Lines lost to the capacity limit since the previous drain.
    pub dropped: usize,
}

/// Shared line queue that tracing writes into. Clones share the same queue.
#[derive(Clone, Default)]
pub struct LogBuffer {
    inner: Arc<Mutex<Pending>>,
}

impl LogBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, line: String) {
        let mut pending = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if pending.lines.len() >= CAPACITY {
            pending.lines.pop_front();
            pending.dropped += 1;
        }
        pending.lines.push_back(line);
    }

    /// Take everything queued so far, oldest first.
    pub fn drain(&self) -> Drained {
        let mut pending = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        Drained {
            lines: pending.lines.drain(..).collect(),
            dropped: std::mem::take(&mut pending.dropped),
        }
    }
}

/// Per-event writer handed out by `LogBuffer`. Splits output into lines;
/// a trailing partial line is pushed when the writer is dropped.
pub struct LineWriter {
    buffer: LogBuffer,
    partial: String,
}

impl Write for LineWriter {
    fn write(&mut self, bytes: &[u8]) -> std::io::Result<usize> {
        self.partial.push_str(&String::from_utf8_lossy(bytes));
        while let Some(end) = self.partial.find('\n') {
            let rest = self.partial.split_off(end + 1);
            let mut line = std::mem::replace(&mut self.partial, rest);
            line.truncate(end);
            self.buffer.push(line);
        }
        Ok(bytes.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        if !self.partial.is_empty() {
            self.buffer.push(std::mem::take(&mut self.partial));
        }
        Ok(())
    }
}

impl Drop for LineWriter {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = LineWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LineWriter {
            buffer: self.clone(),
            partial: String::new(),
        }
    }
}

/// Append-only `tui.log`. Lines are discarded once the file cannot be written.
pub struct LogFile {
    file: Option<File>,
}

impl LogFile {
    /// Open `tui.log` in the data directory.
    pub fn open() -> Self {
        match Config::data_dir() {
            Ok(dir) => {
                if std::fs::create_dir_all(&dir).is_err() {
                    return Self { file: None };
                }
                Self::at(&dir.join("tui.log"))
            }
            Err(_) => Self { file: None },
        }
    }

    pub fn at(path: &Path) -> Self {
        let file = OpenOptions::new().create(true).append(true).open(path).ok();
        Self { file }
    }

    pub fn persist(&mut self, drained: Drained) {
        let Some(file) = self.file.as_mut() else {
            return;
        };
        let mut result = Ok(());
        if drained.dropped > 0 {
            result = writeln!(file, "[{} log lines dropped]", drained.dropped);
        }
        for line in &drained.lines {
            if result.is_err() {
                break;
            }
            result = writeln!(file, "{}", line);
        }
        if result.is_err() {
            self.file = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_empties_buffer() {
        let buf = LogBuffer::new();
        buf.push("contacts loaded".to_string());
        buf.push("room socket open".to_string());

        let drained = buf.drain();
        assert_eq!(drained.lines, vec!["contacts loaded", "room socket open"]);
        assert_eq!(drained.dropped, 0);
        assert_eq!(buf.drain(), Drained::default());
    }

    #[test]
    fn test_overflow_counts_dropped_lines() {
        let buf = LogBuffer::new();
        for i in 0..CAPACITY + 40 {
            buf.push(format!("line {}", i));
        }

        let drained = buf.drain();
        assert_eq!(drained.lines.len(), CAPACITY);
        assert_eq!(drained.lines[0], "line 40");
        assert_eq!(drained.dropped, 40);
        assert_eq!(buf.drain().dropped, 0);
    }

    #[test]
    fn test_writer_splits_lines_and_flushes_tail() {
        let buf = LogBuffer::new();
        {
            let mut writer = buf.make_writer();
            write!(writer, "one\ntw").unwrap();
            write!(writer, "o\nthree").unwrap();
            assert_eq!(buf.drain().lines, vec!["one", "two"]);
        }
        assert_eq!(buf.drain().lines, vec!["three"]);
    }

    #[test]
    fn test_tracing_output_lands_in_buffer() {
        use tracing_subscriber::layer::SubscriberExt;

        let buf = LogBuffer::new();
        let subscriber = tracing_subscriber::registry().with(
            tracing_subscriber::fmt::layer()
                .with_writer(buf.clone())
                .with_ansi(false)
                .with_target(false),
        );
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("room socket open");
        });

        let lines = buf.drain().lines;
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("room socket open"));
    }

    #[test]
    fn test_persist_writes_drop_marker() {
        let path = std::env::temp_dir().join(format!("portal-tui-{}.log", uuid::Uuid::new_v4()));
        let mut file = LogFile::at(&path);
        file.persist(Drained {
            lines: vec!["a".to_string(), "b".to_string()],
            dropped: 3,
        });
        drop(file);

        let written = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(written, "[3 log lines dropped]\na\nb\n");
    }
}
