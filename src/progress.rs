use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{info, warn};

use crate::error::MarkerError;

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

impl ProgressEvent {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            elapsed: None,
        }
    }

    pub fn timed(message: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            message: message.into(),
            elapsed: Some(elapsed),
        }
    }
}

pub trait ProgressSink: Sync {
    fn event(&self, event: ProgressEvent);
}

pub struct NoopSink;

impl ProgressSink for NoopSink {
    fn event(&self, _event: ProgressEvent) {}
}

pub struct ItemLog {
    genome: String,
    file: Mutex<File>,
    write_failed: AtomicBool,
}

impl ItemLog {
    pub fn open(path: &Path, genome: &str) -> Result<Self, MarkerError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|err| MarkerError::Filesystem(format!("open log {}: {err}", path.display())))?;
        Ok(Self {
            genome: genome.to_string(),
            file: Mutex::new(file),
            write_failed: AtomicBool::new(false),
        })
    }

    fn append(&self, line: &str) -> Result<(), String> {
        let mut file = self
            .file
            .lock()
            .map_err(|_| "log file lock poisoned".to_string())?;
        file.write_all(line.as_bytes()).map_err(|err| err.to_string())
    }

    pub fn line(&self, message: impl Into<String>) {
        self.event(ProgressEvent::new(message));
    }
}

impl ProgressSink for ItemLog {
    fn event(&self, event: ProgressEvent) {
        let timestamp = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
        let line = match event.elapsed {
            Some(elapsed) => format!(
                "{timestamp}  {} (elapsed_ms={})\n",
                event.message,
                elapsed.as_millis()
            ),
            None => format!("{timestamp}  {}\n", event.message),
        };
        info!(genome = %self.genome, "{}", event.message);
        if let Err(err) = self.append(&line)
            && !self.write_failed.swap(true, Ordering::Relaxed)
        {
            warn!(genome = %self.genome, "failed to write item log: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_lines_append() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("marker_genes.log");
        {
            let log = ItemLog::open(&path, "G1").unwrap();
            log.line("Running search for genome G1.");
        }
        {
            let log = ItemLog::open(&path, "G1").unwrap();
            log.event(ProgressEvent::timed("search finished", Duration::from_millis(12)));
        }
        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("Running search for genome G1."));
        assert!(lines[1].ends_with("search finished (elapsed_ms=12)"));
    }

    #[test]
    fn write_failures_are_flagged_once() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("marker_genes.log");
        let log = ItemLog::open(&path, "G1").unwrap();
        let _ = std::thread::scope(|scope| {
            scope
                .spawn(|| {
                    let _guard = log.file.lock().unwrap();
                    panic!("writer crashed");
                })
                .join()
        });

        log.line("after the crash");
        assert!(log.write_failed.load(Ordering::Relaxed));
        log.line("still running");
        assert!(std::fs::read_to_string(&path).unwrap().is_empty());
    }
}
