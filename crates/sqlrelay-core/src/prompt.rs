//! Prompt composition.
//!
//! A conversation sent upstream is always laid out as
//! `system → history… → user`; the model's context depends on that order.

use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;
use utoipa::ToSchema;

use crate::error::{RelayError, Result};
use crate::schema::SchemaEntry;

/// Domain knowledge the model is primed with.
pub const FINANCIAL_PREAMBLE: &str = "\
You are a SQL expert specialised in finance, microfinance and commercial analytics.
You have experience with credit-risk models, customer scoring, portfolio analysis,
financial projections and commercial reporting.

Specific knowledge:
- Microfinance: group lending analysis, village banking methodology, delinquency indicators (PAR), portfolio turnover
- Finance: financial ratios (liquidity, solvency, profitability), financial statement analysis, cash-flow projections
- Commercial: sales-channel analysis, customer segmentation, CLV (Customer Lifetime Value), campaign analysis

Whenever you write a query:
1. State clearly the assumptions you make about the data structure
2. When needed, suggest data structures typical of the financial sector
3. Give short explanations of complex financial concepts
4. Prefer queries that compute relevant financial KPIs";

/// Output rules appended after the preamble.
pub const FORMATTING_INSTRUCTIONS: &str = "\
Additional instructions:
- Generate valid SQL queries
- Briefly explain your assumptions
- For complex financial terms, give a short definition
- Suggest data-model improvements when relevant
- If the question is ambiguous, ask for clarification";

const SCHEMA_HEADER: &str = "Current database schema:";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single conversation turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
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

/// The ordered message list sent to the completion API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct Conversation(Vec<Message>);

impl Conversation {
    pub fn messages(&self) -> &[Message] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Consume the conversation and append the assistant's reply.
    pub fn with_reply(mut self, reply: impl Into<String>) -> Self {
        self.0.push(Message::new(Role::Assistant, reply));
        self
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.0
    }
}

/// Deserialize caller-supplied history, keeping only well-formed turns.
///
/// A missing or non-array value yields no history. Entries that are not
/// objects, lack `role` or `content`, carry non-string content or name an
/// unknown role are dropped; the rest keep their order.
pub fn lenient_history<'de, D>(deserializer: D) -> std::result::Result<Vec<Message>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    let Some(serde_json::Value::Array(items)) = value else {
        return Ok(Vec::new());
    };

    let total = items.len();
    let kept: Vec<Message> = items
        .into_iter()
        .filter_map(|item| serde_json::from_value::<Message>(item).ok())
        .collect();
    if kept.len() != total {
        debug!(total, kept = kept.len(), "dropped malformed history entries");
    }
    Ok(kept)
}

/// Builds conversations from a fixed system prompt.
#[derive(Debug, Clone)]
pub struct PromptComposer {
    system_prompt: String,
}

impl Default for PromptComposer {
    fn default() -> Self {
        Self::with_preamble(FINANCIAL_PREAMBLE)
    }
}

impl PromptComposer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a custom preamble; the formatting instructions are still appended.
    pub fn with_preamble(preamble: &str) -> Self {
        Self {
            system_prompt: format!("{preamble}\n\n{FORMATTING_INSTRUCTIONS}"),
        }
    }

    /// The system message content used when no schema is attached.
    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Build `system → history → user`.
    ///
    /// `schema` is appended verbatim to the system message when present.
    pub fn compose(
        &self,
        user_message: &str,
        history: &[Message],
        schema: Option<&SchemaEntry>,
    ) -> Result<Conversation> {
        let user_message = user_message.trim();
        if user_message.is_empty() {
            return Err(RelayError::Validation("message is required".into()));
        }

        let mut system = self.system_prompt.clone();
        if let Some(entry) = schema {
            system.push_str("\n\n");
            system.push_str(SCHEMA_HEADER);
            system.push('\n');
            system.push_str(&entry.content);
        }

        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(Message::new(Role::System, system));
        messages.extend_from_slice(history);
        messages.push(Message::new(Role::User, user_message));
        Ok(Conversation(messages))
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[derive(Deserialize)]
    struct Wrapper {
        #[serde(default, deserialize_with = "lenient_history")]
        history: Vec<Message>,
    }

    fn history_of(value: serde_json::Value) -> Vec<Message> {
        serde_json::from_value::<Wrapper>(json!({ "history": value }))
            .unwrap()
            .history
    }

    #[test]
    fn bare_message_yields_system_then_user() {
        let composer = PromptComposer::new();
        let conv = composer.compose("total active loans per branch", &[], None).unwrap();

        assert_eq!(conv.len(), 2);
        assert_eq!(conv.messages()[0].role, Role::System);
        assert_eq!(conv.messages()[0].content, composer.system_prompt());
        assert_eq!(conv.messages()[1], Message::new(Role::User, "total active loans per branch"));
    }

    #[test]
    fn user_message_is_trimmed_and_required() {
        let composer = PromptComposer::new();
        let conv = composer.compose("  list branches \n", &[], None).unwrap();
        assert_eq!(conv.messages()[1].content, "list branches");

        assert!(matches!(
            composer.compose(" \t\n", &[], None),
            Err(RelayError::Validation(_))
        ));
    }

    #[test]
    fn schema_is_appended_verbatim() {
        let composer = PromptComposer::new();
        let schema = SchemaEntry {
            name: "loans.txt".into(),
            content: "CREATE TABLE loans (\n  id INT,\n  branch_id INT\n);".into(),
        };
        let conv = composer.compose("q", &[], Some(&schema)).unwrap();
        let system = &conv.messages()[0].content;

        assert!(system.starts_with(composer.system_prompt()));
        assert!(system.ends_with(&schema.content));
    }

    #[test]
    fn history_sits_between_system_and_user() {
        let composer = PromptComposer::with_preamble("be terse");
        let history = vec![
            Message::new(Role::User, "first"),
            Message::new(Role::Assistant, "SELECT 1;"),
        ];
        let conv = composer.compose("second", &history, None).unwrap();
        let roles: Vec<Role> = conv.messages().iter().map(|m| m.role).collect();

        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant, Role::User]);
        assert_eq!(conv.messages()[2].content, "SELECT 1;");
        assert!(conv.messages()[0].content.starts_with("be terse"));
    }

    #[test]
    fn malformed_history_entries_are_dropped_in_order() {
        let history = history_of(json!([
            { "role": "user", "content": "a" },
            { "role": "user" },
            { "content": "orphan" },
            "not an object",
            { "role": "tool", "content": "x" },
            { "role": "assistant", "content": 42 },
            { "role": "assistant", "content": "b", "extra": true },
        ]));
        assert_eq!(
            history,
            vec![Message::new(Role::User, "a"), Message::new(Role::Assistant, "b")]
        );
    }

    #[test]
    fn non_array_history_is_empty() {
        assert!(history_of(json!("nope")).is_empty());
        assert!(history_of(json!({ "role": "user", "content": "a" })).is_empty());
        assert!(history_of(serde_json::Value::Null).is_empty());
    }

    #[test]
    fn reply_is_appended_last() {
        let conv = PromptComposer::new()
            .compose("q", &[], None)
            .unwrap()
            .with_reply("SELECT 1;");
        assert_eq!(conv.len(), 3);
        assert_eq!(conv.messages()[2], Message::new(Role::Assistant, "SELECT 1;"));
    }
}
