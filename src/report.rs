//! Task reporting: the bordered per-task console report and the JSONL task
//! log with running metrics.

use crate::check::CheckFlag;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use uuid::Uuid;

/// Build the report rows for one finished task. Returns the rows plus the
/// success flag used for presentation styling.
#[allow(clippy::too_many_arguments)]
pub fn build_rows(
    error: Option<String>,
    elapsed_secs: f64,
    prompt_tokens: u64,
    completion_tokens: u64,
    source: &[String],
    translated: &[String],
    extra: &[String],
) -> (Vec<String>, bool) {
    let success = error.is_none();
    let mut rows = Vec::new();

    match error {
        Some(error) => rows.push(error),
        None => rows.push(format!(
            "task finished in {elapsed_secs:.2}s, {} lines, {prompt_tokens} prompt tokens, {completion_tokens} completion tokens",
            source.len(),
        )),
    }

    for fragment in extra {
        rows.push(fragment.trim().to_string());
    }

    // Source/translation comparison, padded to the longer side.
    let mut pairs = String::new();
    let count = source.len().max(translated.len());
    for i in 0..count {
        let src = source.get(i).map(String::as_str).unwrap_or("");
        let dst = translated.get(i).map(String::as_str).unwrap_or("");
        if !pairs.is_empty() {
            pairs.push('\n');
        }
        pairs.push_str(&format!("{src} --> {dst}"));
    }
    if !pairs.is_empty() {
        rows.push(pairs);
    }

    (rows, success)
}

/// Render rows as a titled, bordered block for console output.
pub fn render(rows: &[String], success: bool) -> String {
    let title = if success {
        "TRANSLATION TASK - OK"
    } else {
        "TRANSLATION TASK - FAILED"
    };
    let border = "+".to_string() + &"-".repeat(62) + "+";

    let mut out = String::new();
    out.push_str(&border);
    out.push('\n');
    out.push_str(&format!("| {title}\n"));
    for row in rows {
        out.push_str(&border);
        out.push('\n');
        for line in row.lines() {
            out.push_str(&format!("| {line}\n"));
        }
    }
    out.push_str(&border);
    out
}

/// One line of the JSONL task log.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskLogEntry {
    pub timestamp: DateTime<Utc>,
    pub task_id: Uuid,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check_flag: Option<CheckFlag>,
    pub row_count: usize,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub elapsed_ms: u64,
}

/// Running totals across all tasks of a session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskMetrics {
    pub tasks_total: u64,
    pub tasks_failed: u64,
    pub rows_translated: u64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub by_check_flag: HashMap<String, u64>,
}

impl TaskMetrics {
    pub fn record(&mut self, entry: &TaskLogEntry) {
        self.tasks_total += 1;
        if !entry.success {
            self.tasks_failed += 1;
            if let Some(flag) = entry.check_flag {
                *self.by_check_flag.entry(format!("{flag:?}")).or_insert(0) += 1;
            }
        } else {
            self.rows_translated += entry.row_count as u64;
            self.prompt_tokens += entry.prompt_tokens;
            self.completion_tokens += entry.completion_tokens;
        }
    }

    pub fn failure_rate(&self) -> f64 {
        if self.tasks_total == 0 {
            0.0
        } else {
            self.tasks_failed as f64 / self.tasks_total as f64
        }
    }
}

pub struct TaskLogger {
    log_file: Mutex<Option<BufWriter<File>>>,
    metrics: Mutex<TaskMetrics>,
}

impl TaskLogger {
    pub fn new() -> Self {
        Self {
            log_file: Mutex::new(None),
            metrics: Mutex::new(TaskMetrics::default()),
        }
    }

    pub fn init_file_logging<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        if let Ok(mut guard) = self.log_file.lock() {
            *guard = Some(BufWriter::new(file));
        }
        Ok(())
    }

    pub fn log(&self, entry: &TaskLogEntry) {
        if let Ok(mut guard) = self.log_file.lock() {
            if let Some(writer) = guard.as_mut() {
                if let Ok(json) = serde_json::to_string(entry) {
                    let _ = writeln!(writer, "{json}");
                    let _ = writer.flush();
                }
            }
        }
        if let Ok(mut metrics) = self.metrics.lock() {
            metrics.record(entry);
        }
    }

    pub fn metrics(&self) -> TaskMetrics {
        self.metrics
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    pub fn reset_metrics(&self) {
        if let Ok(mut guard) = self.metrics.lock() {
            *guard = TaskMetrics::default();
        }
    }
}

impl Default for TaskLogger {
    fn default() -> Self {
        Self::new()
    }
}

static TASK_LOGGER: Lazy<TaskLogger> = Lazy::new(TaskLogger::new);

pub fn task_logger() -> &'static TaskLogger {
    &TASK_LOGGER
}

pub fn init_task_logging<P: AsRef<Path>>(path: P) -> anyhow::Result<()> {
    task_logger().init_file_logging(path)
}

/// Default JSONL log path, one file per day.
pub fn default_task_log_path() -> PathBuf {
    let dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("game-translator")
        .join("logs");
    std::fs::create_dir_all(&dir).ok();

    let day = chrono::Local::now().format("%Y%m%d");
    dir.join(format!("tasks-{day}.jsonl"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(success: bool, rows: usize) -> TaskLogEntry {
        TaskLogEntry {
            timestamp: Utc::now(),
            task_id: Uuid::new_v4(),
            success,
            check_flag: (!success).then_some(CheckFlag::LineCountMismatch),
            row_count: rows,
            prompt_tokens: 100,
            completion_tokens: 50,
            elapsed_ms: 1200,
        }
    }

    #[test]
    fn success_rows_start_with_summary() {
        let (rows, success) = build_rows(
            None,
            1.5,
            120,
            80,
            &["こんにちは".into()],
            &["Hello".into()],
            &[],
        );
        assert!(success);
        assert!(rows[0].contains("1 lines"));
        assert!(rows[0].contains("120 prompt tokens"));
        assert!(rows.last().unwrap().contains("こんにちは --> Hello"));
    }

    #[test]
    fn failure_rows_lead_with_the_error() {
        let (rows, success) = build_rows(
            Some("reply line count does not match the source".into()),
            0.4,
            0,
            0,
            &["a".into(), "b".into()],
            &["x".into()],
            &["glossary used".into()],
        );
        assert!(!success);
        assert!(rows[0].contains("line count"));
        assert!(rows.iter().any(|r| r.contains("glossary used")));
        // Comparison pads the missing translation side.
        assert!(rows.last().unwrap().contains("b --> "));
    }

    #[test]
    fn render_tags_success_and_failure() {
        let ok = render(&["all good".into()], true);
        assert!(ok.contains("TRANSLATION TASK - OK"));
        assert!(ok.starts_with('+'));

        let bad = render(&["broken".into()], false);
        assert!(bad.contains("FAILED"));
    }

    #[test]
    fn metrics_accumulate_by_outcome() {
        let mut metrics = TaskMetrics::default();
        metrics.record(&entry(true, 8));
        metrics.record(&entry(false, 0));

        assert_eq!(metrics.tasks_total, 2);
        assert_eq!(metrics.tasks_failed, 1);
        assert_eq!(metrics.rows_translated, 8);
        assert_eq!(metrics.prompt_tokens, 100);
        assert_eq!(metrics.by_check_flag["LineCountMismatch"], 1);
        assert!((metrics.failure_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn jsonl_logging_appends_one_line_per_task() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("tasks.jsonl");

        let logger = TaskLogger::new();
        logger.init_file_logging(&path).unwrap();
        logger.log(&entry(true, 3));
        logger.log(&entry(false, 0));

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let parsed: TaskLogEntry = serde_json::from_str(lines[0]).unwrap();
        assert!(parsed.success);
        assert_eq!(logger.metrics().tasks_total, 2);
    }
}
