//! Event payloads carried through the outbox.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::NewOutboxMessage;
use crate::domain::foundation::DomainError;

/// A payload type that can travel through the outbox.
///
/// `MESSAGE_TYPE` is stored in the row's `message_type` column and is what a
/// publisher instance filters on when claiming.
pub trait OutboxEvent: Serialize + DeserializeOwned + Send + Sync + 'static {
    const MESSAGE_TYPE: &'static str;
}

/// Emitted when an account is registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserCreatedMessage {
    pub user_id: Uuid,
    pub email: String,
}

impl UserCreatedMessage {
    /// Logical topic for auth events.
    pub const TOPIC_KEY: &'static str = "Auth";

    pub fn new(user_id: Uuid, email: impl Into<String>) -> Self {
        Self {
            user_id,
            email: email.into(),
        }
    }

    /// Partition key: the user id without hyphens.
    pub fn partition_key(&self) -> String {
        self.user_id.simple().to_string()
    }

    /// Builds the outbox row the registration transaction inserts.
    pub fn to_outbox(&self) -> Result<NewOutboxMessage, DomainError> {
        NewOutboxMessage::for_event(Self::TOPIC_KEY, self.partition_key(), self)
    }
}

impl OutboxEvent for UserCreatedMessage {
    const MESSAGE_TYPE: &'static str = "UserCreatedMessage";
}
