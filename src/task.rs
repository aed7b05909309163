//! One translation task: the request/validate/repair round trip for a batch
//! of cache entries.
//!
//! Construction does all the deterministic work up front: split into
//! sub-lines, normalize, pre-translation replacement, code protection, and
//! prompt building. `run` then performs the round trip and either commits
//! every entry in the batch or none of them; validation is all-or-nothing
//! per batch, and every failure path leaves the entries untouched so the
//! external scheduler can resubmit them.

use crate::cache::CacheEntry;
use crate::check::{CheckFlag, ResponseChecker};
use crate::config::{Platform, TranslatorConfig};
use crate::context::RunContext;
use crate::normalize::normalize;
use crate::prompt::{to_wire, Message, PromptDialect, WireMessage};
use crate::protect::CodeGuard;
use crate::punctuation;
use crate::replace::ReplacementStage;
use crate::report::{self, TaskLogEntry};
use crate::requester::Requester;
use crate::subline::SubLineBatch;
use crate::text::safe_decode;
use chrono::Utc;
use log::{info, warn};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// What the scheduler gets back from one task invocation.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TaskResult {
    /// `None` means the batch was accepted and committed.
    pub check_flag: Option<CheckFlag>,
    pub row_count: usize,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

impl TaskResult {
    /// Early silent return: cancellation or timeout, zero progress, no error.
    pub fn empty() -> Self {
        Self {
            check_flag: None,
            row_count: 0,
            prompt_tokens: 0,
            completion_tokens: 0,
        }
    }

    fn rejected(flag: CheckFlag) -> Self {
        Self {
            check_flag: Some(flag),
            row_count: 0,
            prompt_tokens: 0,
            completion_tokens: 0,
        }
    }
}

pub struct TranslationTask {
    task_id: Uuid,
    config: TranslatorConfig,
    entries: Vec<Arc<CacheEntry>>,
    context: Arc<RunContext>,

    requester: Box<dyn Requester>,
    checker: Box<dyn ResponseChecker>,
    guard: Box<dyn CodeGuard>,

    batch: SubLineBatch,
    /// Sub-line sources as sent to the model: normalized, pre-replaced,
    /// code-protected. Punctuation repair compares against these.
    source: Vec<(String, String)>,
    messages: Vec<Message>,
    wire: Vec<WireMessage>,
    extra_log: Vec<String>,

    started: Instant,
}

impl TranslationTask {
    pub fn new(
        config: TranslatorConfig,
        platform: Platform,
        entries: Vec<Arc<CacheEntry>>,
        context: Arc<RunContext>,
        requester: Box<dyn Requester>,
        checker: Box<dyn ResponseChecker>,
        mut guard: Box<dyn CodeGuard>,
    ) -> Self {
        let refs: Vec<&CacheEntry> = entries.iter().map(Arc::as_ref).collect();
        let mut batch = SubLineBatch::split(&refs);

        batch.map_text(|text| normalize(text));

        let pre_stage = ReplacementStage::new(
            config.replace_before_translation_enable,
            config.replace_before_translation_data.clone(),
        );
        batch.map_text(|text| pre_stage.apply(text));

        let mut source = batch.source_pairs();
        guard.preprocess(&mut source);

        let dialect = PromptDialect::for_format(platform.api_format);
        let (messages, extra_log) = dialect.build(&config, &source);
        let wire = to_wire(&messages, platform.api_format);

        Self {
            task_id: Uuid::new_v4(),
            config,
            entries,
            context,
            requester,
            checker,
            guard,
            batch,
            source,
            messages,
            wire,
            extra_log,
            started: Instant::now(),
        }
    }

    /// The built message list, before the wire-shape rewrite.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn wire_messages(&self) -> &[WireMessage] {
        &self.wire
    }

    /// Execute the round trip. Never panics and never fails the batch
    /// permanently; any rejection is recoverable by resubmitting the same
    /// entries.
    pub fn run(&mut self) -> TaskResult {
        // Cancellation point: once the coordinator says stopping, no new
        // remote work starts.
        if self.context.is_stopping() {
            return TaskResult::empty();
        }

        // Defensive timeout guard against pathological re-entry; the
        // requester enforces its own wall-clock budget for the call itself.
        if self.started.elapsed() >= Duration::from_secs(self.config.request_timeout) {
            return TaskResult::empty();
        }

        let outcome = self.requester.request(&self.wire);

        if outcome.skip {
            let result = TaskResult::rejected(CheckFlag::Unknown);
            self.report(&result, &HashMap::new());
            return result;
        }

        let mut destination = safe_decode(&outcome.result);

        if !outcome.reasoning.is_empty() {
            self.extra_log
                .push(format!("Model reasoning:\n{}", outcome.reasoning.trim()));
        }

        if let Some(flag) = self.checker.check(&self.source, &destination) {
            let result = TaskResult::rejected(flag);
            self.report(&result, &destination);
            return result;
        }

        // Repair chain: punctuation per sub-line pair, code-protection
        // restore, post-translation replacement, then the merge commits.
        for (key, src) in &self.source {
            if let Some(dst) = destination.get_mut(key) {
                *dst = punctuation::fix(src, dst);
            }
        }

        self.guard.postprocess(&mut destination);

        let post_stage = ReplacementStage::new(
            self.config.replace_after_translation_enable,
            self.config.replace_after_translation_data.clone(),
        );
        for text in destination.values_mut() {
            *text = post_stage.apply(text);
        }

        let refs: Vec<&CacheEntry> = self.entries.iter().map(Arc::as_ref).collect();
        self.batch.merge(&destination, &refs);

        let result = TaskResult {
            check_flag: None,
            row_count: self.entries.len(),
            prompt_tokens: outcome.prompt_tokens,
            completion_tokens: outcome.completion_tokens,
        };
        self.report(&result, &destination);
        result
    }

    fn report(&self, result: &TaskResult, destination: &HashMap<String, String>) {
        let elapsed = self.started.elapsed();

        let source: Vec<String> = self
            .source
            .iter()
            .map(|(_, text)| text.trim().to_string())
            .collect();
        let translated: Vec<String> = self
            .source
            .iter()
            .filter_map(|(key, _)| destination.get(key))
            .map(|text| text.trim().to_string())
            .collect();

        let error = result.check_flag.map(|flag| {
            format!("batch rejected, it will be retried in the next round: {flag}")
        });
        let (rows, success) = report::build_rows(
            error,
            elapsed.as_secs_f64(),
            result.prompt_tokens,
            result.completion_tokens,
            &source,
            &translated,
            &self.extra_log,
        );
        let rendered = report::render(&rows, success);
        if success {
            info!("task {}\n{rendered}", self.task_id);
        } else {
            warn!("task {}\n{rendered}", self.task_id);
        }

        report::task_logger().log(&TaskLogEntry {
            timestamp: Utc::now(),
            task_id: self.task_id,
            success,
            check_flag: result.check_flag,
            row_count: result.row_count,
            prompt_tokens: result.prompt_tokens,
            completion_tokens: result.completion_tokens,
            elapsed_ms: elapsed.as_millis() as u64,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{FileType, TranslationStatus};
    use crate::check::StandardChecker;
    use crate::config::ApiFormat;
    use crate::context::RunStatus;
    use crate::protect::NoopGuard;
    use crate::requester::RequestOutcome;
    use std::sync::Mutex;

    /// Requester that returns a canned outcome and counts invocations.
    struct ScriptedRequester {
        outcome: RequestOutcome,
        calls: Arc<Mutex<usize>>,
    }

    impl Requester for ScriptedRequester {
        fn request(&self, _messages: &[WireMessage]) -> RequestOutcome {
            *self.calls.lock().unwrap() += 1;
            self.outcome.clone()
        }
    }

    fn platform() -> Platform {
        Platform::new("test", "http://localhost/v1", "test-model", ApiFormat::OpenAi)
    }

    fn task_with(
        entries: Vec<Arc<CacheEntry>>,
        context: Arc<RunContext>,
        outcome: RequestOutcome,
    ) -> (TranslationTask, Arc<Mutex<usize>>) {
        let calls = Arc::new(Mutex::new(0));
        let requester = ScriptedRequester {
            outcome,
            calls: Arc::clone(&calls),
        };
        let task = TranslationTask::new(
            TranslatorConfig::default(),
            platform(),
            entries,
            context,
            Box::new(requester),
            Box::new(StandardChecker),
            Box::new(NoopGuard),
        );
        (task, calls)
    }

    fn reply(json: &str) -> RequestOutcome {
        RequestOutcome {
            skip: false,
            reasoning: String::new(),
            result: json.to_string(),
            prompt_tokens: 25,
            completion_tokens: 12,
        }
    }

    #[test]
    fn stopping_state_returns_empty_without_requesting() {
        let entry = Arc::new(CacheEntry::new("a.txt", 0, FileType::Txt, "こんにちは"));
        let context = Arc::new(RunContext::new());
        context.set_status(RunStatus::Stopping);

        let (mut task, calls) = task_with(
            vec![Arc::clone(&entry)],
            context,
            reply(r#"{"0": "hello"}"#),
        );
        let result = task.run();

        assert_eq!(result, TaskResult::empty());
        assert_eq!(*calls.lock().unwrap(), 0);
        assert_eq!(entry.status(), TranslationStatus::Untranslated);
    }

    #[test]
    fn elapsed_timeout_returns_empty_without_requesting() {
        let entry = Arc::new(CacheEntry::new("a.txt", 0, FileType::Txt, "line"));
        let context = Arc::new(RunContext::new());

        let mut config = TranslatorConfig::default();
        config.request_timeout = 0;

        let calls = Arc::new(Mutex::new(0));
        let requester = ScriptedRequester {
            outcome: reply(r#"{"0": "x"}"#),
            calls: Arc::clone(&calls),
        };
        let mut task = TranslationTask::new(
            config,
            platform(),
            vec![entry],
            context,
            Box::new(requester),
            Box::new(StandardChecker),
            Box::new(NoopGuard),
        );

        assert_eq!(task.run(), TaskResult::empty());
        assert_eq!(*calls.lock().unwrap(), 0);
    }

    #[test]
    fn successful_round_trip_merges_and_reports_counts() {
        let entry = Arc::new(CacheEntry::new("a.txt", 0, FileType::Txt, "Hello\nWorld"));
        let context = Arc::new(RunContext::new());

        let (mut task, calls) = task_with(
            vec![Arc::clone(&entry)],
            context,
            reply(r#"{"0": "你好", "1": "世界"}"#),
        );
        let result = task.run();

        assert_eq!(*calls.lock().unwrap(), 1);
        assert_eq!(result.check_flag, None);
        assert_eq!(result.row_count, 1);
        assert_eq!(result.prompt_tokens, 25);
        assert_eq!(result.completion_tokens, 12);
        assert_eq!(entry.dst(), "你好世界");
        assert_eq!(entry.status(), TranslationStatus::Translated);
    }

    #[test]
    fn transport_skip_reports_unknown_and_mutates_nothing() {
        let entry = Arc::new(CacheEntry::new("a.txt", 0, FileType::Txt, "Hello\nWorld"));
        let context = Arc::new(RunContext::new());

        let (mut task, _) = task_with(
            vec![Arc::clone(&entry)],
            context,
            RequestOutcome::skipped(),
        );
        let result = task.run();

        assert_eq!(result.check_flag, Some(CheckFlag::Unknown));
        assert_eq!(result.row_count, 0);
        assert_eq!(result.prompt_tokens, 0);
        assert_eq!(entry.status(), TranslationStatus::Untranslated);
        assert_eq!(entry.dst(), "");
    }

    #[test]
    fn validation_failure_leaves_entries_untouched() {
        let entry = Arc::new(CacheEntry::new("a.txt", 0, FileType::Txt, "Hello\nWorld"));
        let context = Arc::new(RunContext::new());

        // Only one of two sub-lines came back.
        let (mut task, _) = task_with(
            vec![Arc::clone(&entry)],
            context,
            reply(r#"{"0": "你好"}"#),
        );
        let result = task.run();

        assert_eq!(result.check_flag, Some(CheckFlag::LineCountMismatch));
        assert_eq!(result.row_count, 0);
        assert_eq!(entry.status(), TranslationStatus::Untranslated);
        assert_eq!(entry.dst(), "");
    }

    #[test]
    fn undecodable_reply_folds_into_validation_failure() {
        let entry = Arc::new(CacheEntry::new("a.txt", 0, FileType::Txt, "line"));
        let context = Arc::new(RunContext::new());

        let (mut task, _) = task_with(
            vec![Arc::clone(&entry)],
            context,
            reply("I am sorry, I cannot translate that."),
        );
        let result = task.run();

        assert!(result.check_flag.is_some());
        assert_eq!(entry.status(), TranslationStatus::Untranslated);
    }

    #[test]
    fn post_replacement_applies_to_committed_text() {
        let entry = Arc::new(CacheEntry::new("a.txt", 0, FileType::Txt, "魔王"));
        let context = Arc::new(RunContext::new());

        let mut config = TranslatorConfig::default();
        config.replace_after_translation_enable = true;
        config
            .replace_after_translation_data
            .push(crate::replace::ReplacementRule {
                src: "Maou".into(),
                dst: "Demon Lord".into(),
            });

        let calls = Arc::new(Mutex::new(0));
        let requester = ScriptedRequester {
            outcome: reply(r#"{"0": "Maou"}"#),
            calls,
        };
        let mut task = TranslationTask::new(
            config,
            platform(),
            vec![Arc::clone(&entry)],
            context,
            Box::new(requester),
            Box::new(StandardChecker),
            Box::new(NoopGuard),
        );

        let result = task.run();
        assert_eq!(result.check_flag, None);
        assert_eq!(entry.dst(), "Demon Lord");
    }

    #[test]
    fn single_turn_platform_builds_two_messages() {
        let entry = Arc::new(CacheEntry::new("a.txt", 0, FileType::Txt, "おはよう"));
        let context = Arc::new(RunContext::new());

        let calls = Arc::new(Mutex::new(0));
        let requester = ScriptedRequester {
            outcome: reply(r#"{"0": "早上好"}"#),
            calls,
        };
        let task = TranslationTask::new(
            TranslatorConfig::default(),
            Platform::new("sakura", "http://localhost:8080/v1", "sakura-14b", ApiFormat::SakuraLlm),
            vec![entry],
            context,
            Box::new(requester),
            Box::new(StandardChecker),
            Box::new(NoopGuard),
        );

        assert_eq!(task.messages().len(), 2);
    }
}
