//! Message domain types.
//!
//! A [`Message`] is one conversation turn. Messages are immutable once built:
//! fields are private and only readable through accessors, and the four role
//! constructors are the only way to make one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::error::Error;

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions
    System,
    /// The end user
    User,
    /// The model
    Assistant,
    /// Tool execution result
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
        }
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "system" => Ok(Self::System),
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            "tool" => Ok(Self::Tool),
            other => Err(Error::InvalidRole(other.to_string())),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The function part of a tool call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Name of the tool to invoke
    pub name: String,

    /// Arguments as a JSON string
    pub arguments: String,
}

/// A tool call embedded in an assistant message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageToolCall {
    /// Unique ID for this tool call
    pub id: String,

    /// Always "function"
    #[serde(rename = "type", default = "function_kind")]
    pub kind: String,

    pub function: FunctionCall,
}

fn function_kind() -> String {
    "function".into()
}

impl MessageToolCall {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            kind: function_kind(),
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }
}

/// A single message in a conversation.
///
/// Deserialization applies the same checks as the constructors.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "RawMessage")]
pub struct Message {
    id: String,
    role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<MessageToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
    timestamp: DateTime<Utc>,
}

/// Unchecked serialized form of [`Message`].
#[derive(Deserialize)]
struct RawMessage {
    id: String,
    role: Role,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<MessageToolCall>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    tool_call_id: Option<String>,
    timestamp: DateTime<Utc>,
}

impl TryFrom<RawMessage> for Message {
    type Error = Error;

    fn try_from(raw: RawMessage) -> Result<Self, Self::Error> {
        if raw.role == Role::Tool {
            let named = raw.name.as_deref().is_some_and(|n| !n.is_empty());
            let linked = raw.tool_call_id.as_deref().is_some_and(|id| !id.is_empty());
            if !named || !linked {
                return Err(Error::InvalidMessage(
                    "tool message requires a non-empty name and tool_call_id".into(),
                ));
            }
        }
        Ok(Self {
            id: raw.id,
            role: raw.role,
            content: raw.content,
            tool_calls: raw.tool_calls,
            name: raw.name,
            tool_call_id: raw.tool_call_id,
            timestamp: raw.timestamp,
        })
    }
}

impl Message {
    fn build(role: Role, content: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content,
            tool_calls: Vec::new(),
            name: None,
            tool_call_id: None,
            timestamp: Utc::now(),
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::build(Role::User, Some(content.into()))
    }

    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::build(Role::System, Some(content.into()))
    }

    /// Create a new assistant message. Assistant content may be absent
    /// when the turn only carries tool calls.
    pub fn assistant(content: Option<String>) -> Self {
        Self::build(Role::Assistant, content)
    }

    /// Create a tool result message. Both `name` and `tool_call_id` must be non-empty.
    pub fn tool(
        content: impl Into<String>,
        name: impl Into<String>,
        tool_call_id: impl Into<String>,
    ) -> Result<Self, Error> {
        let name = name.into();
        let tool_call_id = tool_call_id.into();
        if name.is_empty() {
            return Err(Error::InvalidMessage("tool message requires a name".into()));
        }
        if tool_call_id.is_empty() {
            return Err(Error::InvalidMessage(
                "tool message requires a tool_call_id".into(),
            ));
        }
        let mut msg = Self::build(Role::Tool, Some(content.into()));
        msg.name = Some(name);
        msg.tool_call_id = Some(tool_call_id);
        Ok(msg)
    }

    /// Create an assistant message that requests tool calls.
    pub fn from_tool_calls(tool_calls: Vec<MessageToolCall>, content: impl Into<String>) -> Self {
        let mut msg = Self::build(Role::Assistant, Some(content.into()));
        msg.tool_calls = tool_calls;
        msg
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> Option<&str> {
        self.content.as_deref()
    }

    pub fn tool_calls(&self) -> &[MessageToolCall] {
        &self.tool_calls
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn tool_call_id(&self) -> Option<&str> {
        self.tool_call_id.as_deref()
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Wire form used in prompts and notifications: only the fields that are set,
    /// without the local id and timestamp.
    pub fn to_value(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        map.insert("role".into(), self.role.as_str().into());
        if let Some(content) = &self.content {
            map.insert("content".into(), content.clone().into());
        }
        if !self.tool_calls.is_empty() {
            map.insert(
                "tool_calls".into(),
                serde_json::to_value(&self.tool_calls).unwrap_or_default(),
            );
        }
        if let Some(name) = &self.name {
            map.insert("name".into(), name.clone().into());
        }
        if let Some(id) = &self.tool_call_id {
            map.insert("tool_call_id".into(), id.clone().into());
        }
        serde_json::Value::Object(map)
    }
}
