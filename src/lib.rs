pub mod cache;
pub mod check;
pub mod config;
pub mod context;
pub mod glossary;
pub mod normalize;
pub mod prompt;
pub mod protect;
pub mod punctuation;
pub mod replace;
pub mod report;
pub mod requester;
pub mod subline;
pub mod task;
pub mod text;

pub use cache::{CacheEntry, EntrySnapshot, FileType, TranslationStatus};
pub use check::{CheckFlag, ResponseChecker, StandardChecker};
pub use config::{ApiFormat, Platform, TranslatorConfig};
pub use context::{RunContext, RunStatus};
pub use glossary::GlossaryRule;
pub use prompt::{Message, PromptDialect, Role, WireMessage};
pub use protect::{CodeGuard, NoopGuard, PlaceholderGuard};
pub use replace::{ReplacementRule, ReplacementStage};
pub use report::{
    default_task_log_path, init_task_logging, task_logger, TaskLogEntry, TaskLogger, TaskMetrics,
};
pub use requester::{HttpRequester, RequestOutcome, Requester};
pub use subline::{SubLine, SubLineBatch};
pub use task::{TaskResult, TranslationTask};
