//! Prompt construction for the two supported request dialects.
//!
//! The dialect is picked once per task from the platform's API format and
//! stays fixed for the task's lifetime. Builders return the message list
//! plus human-readable log fragments (the glossary text actually injected,
//! for example) that go to the task report, never to the wire.

use crate::config::{ApiFormat, TranslatorConfig};
use crate::glossary;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Message shape actually serialized for the requester. The role-renamed
/// family replaces `assistant`/`content` with `model`/`parts`; everything
/// else uses the plain chat shape.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum WireMessage {
    Chat { role: Role, content: String },
    Parts { role: String, parts: String },
}

/// Rewrite a built message list into the target platform's wire shape.
/// A pure post-construction transform, not a different builder.
pub fn to_wire(messages: &[Message], api_format: ApiFormat) -> Vec<WireMessage> {
    match api_format {
        ApiFormat::Google => messages
            .iter()
            .map(|m| WireMessage::Parts {
                role: match m.role {
                    Role::Assistant => "model".to_string(),
                    Role::System => "system".to_string(),
                    Role::User => "user".to_string(),
                },
                parts: m.content.clone(),
            })
            .collect(),
        _ => messages
            .iter()
            .map(|m| WireMessage::Chat {
                role: m.role,
                content: m.content.clone(),
            })
            .collect(),
    }
}

// Fixed prompts of the single-turn dialect. The upstream model was tuned on
// these exact strings; do not localize them.
const SINGLE_TURN_SYSTEM_PROMPT: &str = "你是一个轻小说翻译模型，可以流畅通顺地以日本轻小说的风格将日文翻译成简体中文，并联系上下文正确使用人称代词，不擅自添加原文中没有的代词。";
const SINGLE_TURN_TASK: &str = "将下面的日文文本翻译成中文：";
const SINGLE_TURN_GLOSSARY_HEADER: &str = "根据以下术语表（可以为空）：";
const SINGLE_TURN_TASK_WITH_GLOSSARY: &str = "将下面的日文文本根据对应关系和备注翻译成中文：";

/// Prompt dialect, chosen once per task at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptDialect {
    /// One user message: instruction preamble + serialized key->text map.
    Generic,
    /// Fixed system prompt + one user message of bare newline-joined text.
    SingleTurn,
}

impl PromptDialect {
    pub fn for_format(api_format: ApiFormat) -> Self {
        match api_format {
            ApiFormat::SakuraLlm => PromptDialect::SingleTurn,
            ApiFormat::OpenAi | ApiFormat::Google => PromptDialect::Generic,
        }
    }

    /// Build the message list for the given ordered source pairs, returning
    /// the messages and the side list of log fragments.
    pub fn build(
        self,
        config: &TranslatorConfig,
        source: &[(String, String)],
    ) -> (Vec<Message>, Vec<String>) {
        match self {
            PromptDialect::Generic => build_generic(config, source),
            PromptDialect::SingleTurn => build_single_turn(config, source),
        }
    }
}

fn build_generic(
    config: &TranslatorConfig,
    source: &[(String, String)],
) -> (Vec<Message>, Vec<String>) {
    let mut extra_log = Vec::new();

    let mut base = if config.custom_prompt_enable && !config.custom_prompt_data.is_empty() {
        config.custom_prompt_data.clone()
    } else {
        default_preamble(config)
    };

    if config.glossary_enable {
        let lines: Vec<&str> = source.iter().map(|(_, text)| text.as_str()).collect();
        let glossary_text = glossary::build(config, &lines);
        if !glossary_text.is_empty() {
            base.push('\n');
            base.push_str(&glossary_text);
            extra_log.push(glossary_text);
        }
    }

    // serde_json keeps insertion order here, so the payload lists sub-lines
    // exactly as split.
    let mut payload = serde_json::Map::new();
    for (key, text) in source {
        payload.insert(key.clone(), serde_json::Value::String(text.clone()));
    }
    let serialized = serde_json::Value::Object(payload).to_string();

    let content = format!("{base}\nSource text:\n{serialized}");
    (vec![Message::new(Role::User, content)], extra_log)
}

fn default_preamble(config: &TranslatorConfig) -> String {
    format!(
        "You are a professional game localization translator. Translate the {} game text below into {}. \
Keep every placeholder, control code, and marker exactly as it appears, and keep line breaks inside each value. \
Reply with a JSON object mapping every line key to its translation, and nothing else.",
        config.source_language, config.target_language
    )
}

fn build_single_turn(
    config: &TranslatorConfig,
    source: &[(String, String)],
) -> (Vec<Message>, Vec<String>) {
    let mut extra_log = Vec::new();

    let joined = source
        .iter()
        .map(|(_, text)| text.trim_end_matches('\n'))
        .collect::<Vec<_>>()
        .join("\n");

    let mut content = String::new();
    if config.glossary_enable {
        let lines: Vec<&str> = source.iter().map(|(_, text)| text.as_str()).collect();
        let glossary_text = glossary::build_single_turn(config, &lines);
        if !glossary_text.is_empty() {
            content = format!(
                "{SINGLE_TURN_GLOSSARY_HEADER}\n{glossary_text}\n{SINGLE_TURN_TASK_WITH_GLOSSARY}\n{joined}"
            );
            extra_log.push(glossary_text);
        }
    }
    if content.is_empty() {
        content = format!("{SINGLE_TURN_TASK}\n{joined}");
    }

    let messages = vec![
        Message::new(Role::System, SINGLE_TURN_SYSTEM_PROMPT),
        Message::new(Role::User, content),
    ];
    (messages, extra_log)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::glossary::GlossaryRule;

    fn source(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn dialect_selection_follows_api_format() {
        assert_eq!(
            PromptDialect::for_format(ApiFormat::OpenAi),
            PromptDialect::Generic
        );
        assert_eq!(
            PromptDialect::for_format(ApiFormat::Google),
            PromptDialect::Generic
        );
        assert_eq!(
            PromptDialect::for_format(ApiFormat::SakuraLlm),
            PromptDialect::SingleTurn
        );
    }

    #[test]
    fn generic_dialect_serializes_keys_in_split_order() {
        let config = TranslatorConfig::default();
        let source = source(&[("0", "一行目\n"), ("1", "二行目"), ("10", "最後")]);

        let (messages, extra_log) = PromptDialect::Generic.build(&config, &source);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, Role::User);
        assert!(extra_log.is_empty());

        let content = &messages[0].content;
        let a = content.find("\"0\"").unwrap();
        let b = content.find("\"1\"").unwrap();
        let c = content.find("\"10\"").unwrap();
        assert!(a < b && b < c, "keys must keep split order: {content}");
    }

    #[test]
    fn generic_dialect_appends_glossary_and_logs_it() {
        let mut config = TranslatorConfig::default();
        config.glossary_enable = true;
        config.glossary_data.push(GlossaryRule {
            src: "勇者".into(),
            dst: "Hero".into(),
            info: String::new(),
        });

        let (messages, extra_log) =
            PromptDialect::Generic.build(&config, &source(&[("0", "勇者は旅立った")]));
        assert!(messages[0].content.contains("勇者 -> Hero"));
        assert_eq!(extra_log.len(), 1);
        assert!(extra_log[0].contains("勇者"));
    }

    #[test]
    fn custom_prompt_replaces_default_preamble() {
        let mut config = TranslatorConfig::default();
        config.custom_prompt_enable = true;
        config.custom_prompt_data = "Translate like a pirate.".into();

        let (messages, _) = PromptDialect::Generic.build(&config, &source(&[("0", "text")]));
        assert!(messages[0].content.starts_with("Translate like a pirate."));
        assert!(!messages[0].content.contains("professional game localization"));
    }

    #[test]
    fn single_turn_dialect_has_fixed_system_prompt_and_bare_text() {
        let config = TranslatorConfig::default();
        let (messages, extra_log) =
            PromptDialect::SingleTurn.build(&config, &source(&[("0", "おはよう\n"), ("1", "元気？")]));

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[0].content, SINGLE_TURN_SYSTEM_PROMPT);
        assert_eq!(messages[1].role, Role::User);
        assert_eq!(
            messages[1].content,
            format!("{SINGLE_TURN_TASK}\nおはよう\n元気？")
        );
        assert!(extra_log.is_empty());
        assert!(!messages[1].content.contains('{'), "no keys on the wire");
    }

    #[test]
    fn single_turn_dialect_prefixes_glossary_when_enabled() {
        let mut config = TranslatorConfig::default();
        config.glossary_enable = true;
        config.glossary_data.push(GlossaryRule {
            src: "魔王".into(),
            dst: "Demon Lord".into(),
            info: String::new(),
        });

        let (messages, extra_log) =
            PromptDialect::SingleTurn.build(&config, &source(&[("0", "魔王が来る")]));
        let content = &messages[1].content;
        assert!(content.starts_with(SINGLE_TURN_GLOSSARY_HEADER));
        assert!(content.contains("魔王->Demon Lord"));
        assert!(content.contains(SINGLE_TURN_TASK_WITH_GLOSSARY));
        assert_eq!(extra_log.len(), 1);
    }

    #[test]
    fn role_rename_rewrites_the_message_list() {
        let messages = vec![
            Message::new(Role::User, "hello"),
            Message::new(Role::Assistant, "reply"),
        ];

        let wire = to_wire(&messages, ApiFormat::Google);
        assert_eq!(
            wire[0],
            WireMessage::Parts {
                role: "user".into(),
                parts: "hello".into()
            }
        );
        assert_eq!(
            wire[1],
            WireMessage::Parts {
                role: "model".into(),
                parts: "reply".into()
            }
        );

        let json = serde_json::to_string(&wire).unwrap();
        assert!(json.contains("\"parts\""));
        assert!(!json.contains("\"content\""));

        let chat = to_wire(&messages, ApiFormat::OpenAi);
        let json = serde_json::to_string(&chat).unwrap();
        assert!(json.contains("\"content\""));
        assert!(json.contains("\"assistant\""));
    }
}
