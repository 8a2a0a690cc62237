use chrono::{DateTime, Utc};
use common::CorrelationId;
use domain::CommandPayload;
use serde::{Deserialize, Serialize};

/// The kind of an outbound command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandKind {
    /// Create a domain record.
    Create,

    /// Update a domain record.
    Update,

    /// Delete a domain record.
    Delete,

    /// Credit an account's monetary balance.
    Deposit,

    /// Debit an account's monetary balance.
    Withdraw,
}

impl CommandKind {
    /// Returns the kind name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandKind::Create => "Create",
            CommandKind::Update => "Update",
            CommandKind::Delete => "Delete",
            CommandKind::Deposit => "Deposit",
            CommandKind::Withdraw => "Withdraw",
        }
    }
}

impl std::fmt::Display for CommandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome reported by an owning service for a processed command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    /// The command was applied.
    Success,

    /// The command was not applied.
    Error,
}

/// An outbound command envelope.
///
/// The subject key is the record ID for CRUD commands and the account ID for
/// balance adjustments; it doubles as the transport partition key so that
/// commands touching the same subject are consumed in emission order. A
/// correlation ID is present only when a reply is expected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandEnvelope {
    /// The command kind.
    pub kind: CommandKind,

    /// Record or account the command targets; also the partition key.
    pub subject_key: String,

    /// The command payload.
    pub payload: CommandPayload,

    /// When the command was issued.
    pub issued_at: DateTime<Utc>,

    /// Set when the emitter expects a correlated reply.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<CorrelationId>,
}

impl CommandEnvelope {
    /// Creates a new command envelope builder.
    pub fn builder() -> CommandEnvelopeBuilder {
        CommandEnvelopeBuilder::default()
    }

    /// Returns the transport partition key (the subject key).
    pub fn partition_key(&self) -> &str {
        &self.subject_key
    }

    /// Returns true if this command expects a correlated reply.
    pub fn expects_reply(&self) -> bool {
        self.correlation_id.is_some()
    }
}

/// Builder for constructing command envelopes.
#[derive(Debug, Default)]
pub struct CommandEnvelopeBuilder {
    kind: Option<CommandKind>,
    subject_key: Option<String>,
    payload: Option<CommandPayload>,
    issued_at: Option<DateTime<Utc>>,
    correlation_id: Option<CorrelationId>,
}

impl CommandEnvelopeBuilder {
    /// Sets the command kind.
    pub fn kind(mut self, kind: CommandKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Sets the subject key (record or account ID).
    pub fn subject_key(mut self, subject_key: impl Into<String>) -> Self {
        self.subject_key = Some(subject_key.into());
        self
    }

    /// Sets the payload.
    pub fn payload(mut self, payload: CommandPayload) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Sets the issue timestamp. If not set, the current time will be used.
    pub fn issued_at(mut self, issued_at: DateTime<Utc>) -> Self {
        self.issued_at = Some(issued_at);
        self
    }

    /// Sets the correlation ID, marking the command as expecting a reply.
    pub fn correlation_id(mut self, correlation_id: CorrelationId) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }

    /// Builds the command envelope.
    ///
    /// # Panics
    ///
    /// Panics if required fields (kind, subject_key, payload) are not set.
    pub fn build(self) -> CommandEnvelope {
        CommandEnvelope {
            kind: self.kind.expect("kind is required"),
            subject_key: self.subject_key.expect("subject_key is required"),
            payload: self.payload.expect("payload is required"),
            issued_at: self.issued_at.unwrap_or_else(Utc::now),
            correlation_id: self.correlation_id,
        }
    }
}

/// An inbound response envelope, produced by an owning service in reply to
/// exactly one command that requested a reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    /// Whether the command was applied.
    pub outcome: Outcome,

    /// Correlation ID matching the originating command.
    pub correlation_id: CorrelationId,

    /// Human-readable detail, empty on success.
    pub message: String,

    /// Status code reported by the owning service.
    pub status_code: u16,

    /// When the response was issued.
    pub issued_at: DateTime<Utc>,
}

impl ResponseEnvelope {
    /// Creates a success response.
    pub fn success(correlation_id: CorrelationId) -> Self {
        Self {
            outcome: Outcome::Success,
            correlation_id,
            message: String::new(),
            status_code: 200,
            issued_at: Utc::now(),
        }
    }

    /// Creates an error response with the given status and message.
    pub fn error(correlation_id: CorrelationId, status_code: u16, message: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::Error,
            correlation_id,
            message: message.into(),
            status_code,
            issued_at: Utc::now(),
        }
    }
}
