use crate::types::Message;

/// Apology appended when a send fails for any reason other than quota
pub const SEND_FAILURE_APOLOGY: &str = "Sorry, there was an error processing your message.";

/// Ordered messages of the active conversation.
///
/// Entries are never edited once appended; switching conversations replaces
/// the whole list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn replace(&mut self, messages: Vec<Message>) {
        self.messages = messages;
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.push(Message::user(content));
    }

    pub fn push_bot(&mut self, content: impl Into<String>) {
        self.push(Message::bot(content));
    }

    pub fn push_apology(&mut self) {
        self.push_bot(SEND_FAILURE_APOLOGY);
    }
}
