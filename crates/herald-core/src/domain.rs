/// Chat id on the external messaging network (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChatId(pub i64);

/// One inbound chat message, as surfaced by the network adapter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundMessage {
    pub chat: ChatId,
    pub sender: String,
    pub text: String,
}
