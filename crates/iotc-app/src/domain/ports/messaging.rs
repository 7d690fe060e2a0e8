/// Why the MQTT agent refused a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishError {
    NotConnected,
    Rejected,
}

/// Outbound side of the MQTT agent
#[allow(async_fn_in_trait)]
pub trait MessagePublisher {
    async fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), PublishError>;
}

impl<P: MessagePublisher + ?Sized> MessagePublisher for &mut P {
    async fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), PublishError> {
        (**self).publish(topic, payload).await
    }
}
