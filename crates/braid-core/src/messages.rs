//! Conversation message types.
//!
//! [`ContextMessage`] is the unit the engine tracks, protects, truncates,
//! and checkpoints. Messages serialize with camelCase field names so that
//! snapshot and checkpoint payloads have a stable wire format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ids::MessageId;
use crate::tokens::estimate_tokens;

/// Role of a conversation message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Message authored by the user.
    User,
    /// Message authored by the assistant.
    Assistant,
    /// System-injected message (prompts, notices).
    System,
    /// Tool execution output.
    Tool,
}

/// Retention priority of a message when context must shrink.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessagePriority {
    /// Droppable early (bulk tool output, stale results).
    Low,
    /// Ordinary conversation turns.
    #[default]
    Normal,
    /// Keep as long as possible (pinned context, active task state).
    High,
    /// Never a truncation candidate (system anchors).
    Critical,
}

/// A single conversation unit tracked by the engine.
///
/// ## Summary invariant
///
/// A message is a *summary* iff `is_summary` is set OR it carries a
/// non-empty `condense_id`. A message whose `condense_parent` is set was
/// absorbed *into* a summary during compression — that field never makes
/// the message itself a summary.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextMessage {
    /// Unique message ID.
    pub id: MessageId,
    /// Author role.
    pub role: MessageRole,
    /// Message text.
    pub content: String,
    /// Retention priority.
    #[serde(default)]
    pub priority: MessagePriority,
    /// Estimated token count.
    pub tokens: u32,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Marks a synthesized summary message.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_summary: bool,
    /// Compression run that produced this message (set on summaries).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condense_id: Option<String>,
    /// Compression run that absorbed this message (set on sources).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condense_parent: Option<String>,
    /// Free-form metadata (e.g. `compressedCount` on summaries).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl ContextMessage {
    /// Create a message with an estimated token count and current timestamp.
    #[must_use]
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        let content = content.into();
        #[allow(clippy::cast_possible_truncation)]
        let tokens = estimate_tokens(content.len()) as u32;
        Self {
            id: MessageId::new(),
            role,
            content,
            priority: MessagePriority::Normal,
            tokens,
            created_at: Utc::now(),
            is_summary: false,
            condense_id: None,
            condense_parent: None,
            metadata: None,
        }
    }

    /// Convenience constructor for a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    /// Convenience constructor for an assistant message.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    /// Convenience constructor for a summary message tied to a compression run.
    #[must_use]
    pub fn summary(content: impl Into<String>, condense_id: impl Into<String>) -> Self {
        let mut msg = Self::new(MessageRole::Assistant, content);
        msg.is_summary = true;
        msg.condense_id = Some(condense_id.into());
        msg.priority = MessagePriority::High;
        msg
    }

    /// Whether this message is a summary.
    ///
    /// True iff `is_summary` is set or `condense_id` is non-empty.
    /// `condense_parent` is deliberately ignored: a message absorbed into
    /// a summary must not itself be treated as one.
    #[must_use]
    pub fn is_summary_message(&self) -> bool {
        self.is_summary || self.condense_id.as_deref().is_some_and(|id| !id.is_empty())
    }

    /// Number of messages this summary replaced, from
    /// `metadata.compressedCount`. Zero when absent or not a number.
    #[must_use]
    pub fn compressed_count(&self) -> u64 {
        self.metadata
            .as_ref()
            .and_then(|m| m.get("compressedCount"))
            .and_then(Value::as_u64)
            .unwrap_or(0)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
