//! Raw per-request results log
//!
//! One CSV row per emitted event. The file is truncated when a run starts, so
//! it always describes the latest run only.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use perfplan_core::OutcomeEvent;
use perfplan_report::extract_message;

use crate::error::{EngineError, EngineResult};

pub const HEADER: [&str; 9] = [
    "timeStamp",
    "elapsed",
    "label",
    "responseCode",
    "responseMessage",
    "threadName",
    "success",
    "failureMessage",
    "URL",
];

/// CSV sink shared by every virtual user of a run.
pub struct ResultsLog {
    path: PathBuf,
    writer: Mutex<csv::Writer<File>>,
}

impl ResultsLog {
    /// Creates (or truncates) the log at `path` and writes the header row.
    pub fn create(path: impl AsRef<Path>) -> EngineResult<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| EngineError::results_log(&path, err))?;
        }

        let mut writer = csv::Writer::from_path(&path).map_err(|err| EngineError::results_log(&path, err))?;
        writer
            .write_record(HEADER)
            .map_err(|err| EngineError::results_log(&path, err))?;

        tracing::debug!(path = %path.display(), "results log created");
        Ok(Self {
            path,
            writer: Mutex::new(writer),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one row for `event`.
    pub fn record(&self, event: &OutcomeEvent, thread_name: &str) -> EngineResult<()> {
        let failure = if event.success {
            String::new()
        } else {
            extract_message(event)
        };

        let row = [
            event.timestamp.timestamp_millis().to_string(),
            event.elapsed_ms.to_string(),
            event.node_label.clone(),
            event.status_code.clone(),
            event.response_message.clone(),
            thread_name.to_string(),
            event.success.to_string(),
            failure,
            event.url.clone().unwrap_or_default(),
        ];

        self.writer
            .lock()
            .write_record(&row)
            .map_err(|err| EngineError::results_log(&self.path, err))
    }

    pub fn flush(&self) -> EngineResult<()> {
        self.writer
            .lock()
            .flush()
            .map_err(|err| EngineError::results_log(&self.path, err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use perfplan_core::AssertionOutcome;

    #[test]
    fn test_rows_and_truncation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs/test_result.csv");

        let log = ResultsLog::create(&path).unwrap();
        log.record(
            &OutcomeEvent::sample("home", "200", 12).with_request("GET", "https://api.test/"),
            "users 1-1",
        )
        .unwrap();
        log.record(
            &OutcomeEvent::sample("login", "200", 30).with_assertion(AssertionOutcome::failed("codes", "wanted 201, got 200")),
            "users 1-2",
        )
        .unwrap();
        log.flush().unwrap();
        drop(log);

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers: Vec<String> = reader.headers().unwrap().iter().map(str::to_string).collect();
        assert_eq!(headers, HEADER);

        let rows: Vec<csv::StringRecord> = reader.records().map(Result::unwrap).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[0][2], "home");
        assert_eq!(&rows[0][6], "true");
        assert_eq!(&rows[0][8], "https://api.test/");
        assert_eq!(&rows[1][5], "users 1-2");
        assert_eq!(&rows[1][7], "wanted 201, got 200");

        // A new run starts from an empty log.
        let log = ResultsLog::create(&path).unwrap();
        log.flush().unwrap();
        drop(log);
        let mut reader = csv::Reader::from_path(&path).unwrap();
        assert_eq!(reader.records().count(), 0);
    }
}
