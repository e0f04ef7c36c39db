//! The notification unit published to a channel.

use serde::{Deserialize, Serialize};

use crate::manipulation::Manipulation;

/// Where a payload came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OriginKind {
    /// Emitted by the save pipeline after a successful write.
    Persistence,
    /// Emitted on behalf of a user action that did not persist anything.
    User,
    /// Emitted by the server itself (administrative events).
    System,
}

/// Origin metadata of a payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Origin {
    /// Kind of originator.
    pub kind: OriginKind,
    /// User that caused the payload, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    /// Channel the payload was published to. Stamped by the broker.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
}

impl Origin {
    /// Origin for a persistence pipeline event.
    pub fn persistence(user: impl Into<String>) -> Self {
        Self {
            kind: OriginKind::Persistence,
            user: Some(user.into()),
            channel: None,
        }
    }

    /// Origin for a user-originated event.
    pub fn user(user: impl Into<String>) -> Self {
        Self {
            kind: OriginKind::User,
            user: Some(user.into()),
            channel: None,
        }
    }

    /// Origin for a system event.
    pub fn system() -> Self {
        Self {
            kind: OriginKind::System,
            user: None,
            channel: None,
        }
    }
}

/// Severity of a user-facing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageLevel {
    Info,
    Warning,
    Error,
}

/// A user-facing message carried alongside (or instead of) manipulations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub level: MessageLevel,
    pub text: String,
}

impl Message {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Info,
            text: text.into(),
        }
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Warning,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Error,
            text: text.into(),
        }
    }
}

/// One notification unit.
///
/// A payload is immutable once the broker has appended it to a channel
/// log. Every subscriber receives its own clone at delivery time, so the
/// delivered copy may be rewritten freely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    /// Origin metadata.
    pub origin: Origin,
    /// Publish timestamp in microseconds since Unix epoch. Zero until
    /// the payload is published.
    #[serde(default)]
    pub timestamp: u64,
    /// Row changes carried by this payload.
    #[serde(default)]
    pub manipulations: Vec<Manipulation>,
    /// Messages to show the user.
    #[serde(default)]
    pub messages: Vec<Message>,
    /// Arbitrary application data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_data: Option<serde_json::Value>,
    /// Client-side function to invoke on receipt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
    /// Session this payload is addressed to. `None` means every
    /// subscriber of the channel.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
}

impl Payload {
    /// Create an empty payload.
    pub fn new(origin: Origin) -> Self {
        Self {
            origin,
            timestamp: 0,
            manipulations: Vec::new(),
            messages: Vec::new(),
            custom_data: None,
            function: None,
            recipient: None,
        }
    }

    /// Add a manipulation.
    pub fn with_manipulation(mut self, manipulation: Manipulation) -> Self {
        self.manipulations.push(manipulation);
        self
    }

    /// Add a message.
    pub fn with_message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    /// Attach custom data.
    pub fn with_custom_data(mut self, data: serde_json::Value) -> Self {
        self.custom_data = Some(data);
        self
    }

    /// Set the client-side function name.
    pub fn with_function(mut self, function: impl Into<String>) -> Self {
        self.function = Some(function.into());
        self
    }

    /// Channel the payload was published to, if stamped.
    pub fn channel(&self) -> Option<&str> {
        self.origin.channel.as_deref()
    }

    /// Whether this payload carries row changes that need view filtering.
    pub fn has_manipulations(&self) -> bool {
        !self.manipulations.is_empty()
    }

    /// Whether the payload may be delivered to the given session.
    pub fn is_addressed_to(&self, session_id: &str) -> bool {
        self.recipient
            .as_deref()
            .map_or(true, |recipient| recipient == session_id)
    }
}
