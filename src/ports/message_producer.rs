//! MessageProducer port - Delivery of one message to the external broker.
//!
//! The outbox publisher hands every claimed, decoded message to this port.
//! Implementations must be safe to call repeatedly with the same message:
//! the outbox guarantees at-least-once delivery, so a message may be sent
//! again after a crash between a successful send and the outcome write.

use async_trait::async_trait;

use crate::domain::foundation::DomainError;

/// Port for sending typed messages to a broker topic.
#[async_trait]
pub trait MessageProducer<M>: Send + Sync
where
    M: Send + Sync,
{
    /// Deliver `message` to the destination named by `topic_key`, routed by `key`.
    ///
    /// Any error is recorded on the outbox row and retried later.
    async fn produce(&self, topic_key: &str, key: &str, message: &M) -> Result<(), DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::outbox::UserCreatedMessage;

    #[allow(dead_code)]
    fn assert_object_safe(_: &dyn MessageProducer<UserCreatedMessage>) {}
}
