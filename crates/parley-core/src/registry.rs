//! Conversation registry: the sidebar list, the active entry and inline rename.

use crate::types::{Conversation, ConversationId};

/// Inline title edit in progress
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameDraft {
    pub id: ConversationId,
    pub title: String,
}

/// Rename to send to the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameRequest {
    pub id: ConversationId,
    pub title: String,
}

/// Invariant: `active`, when set, names an entry of `conversations`.
#[derive(Debug, Clone, Default)]
pub struct ConversationRegistry {
    conversations: Vec<Conversation>,
    active: Option<ConversationId>,
    editing: Option<RenameDraft>,
}

impl ConversationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    pub fn get(&self, id: &ConversationId) -> Option<&Conversation> {
        self.conversations.iter().find(|c| &c.id == id)
    }

    pub fn contains(&self, id: &ConversationId) -> bool {
        self.get(id).is_some()
    }

    pub fn active_id(&self) -> Option<&ConversationId> {
        self.active.as_ref()
    }

    pub fn active(&self) -> Option<&Conversation> {
        self.active.as_ref().and_then(|id| self.get(id))
    }

    pub fn is_active(&self, id: &ConversationId) -> bool {
        self.active.as_ref() == Some(id)
    }

    /// Replace the list wholesale; drops the active id if it vanished
    pub fn replace(&mut self, conversations: Vec<Conversation>) {
        self.conversations = conversations;
        if let Some(active) = &self.active {
            if !self.contains(active) {
                self.active = None;
            }
        }
        if let Some(draft) = &self.editing {
            if !self.contains(&draft.id) {
                self.editing = None;
            }
        }
    }

    /// Add at the top unless the id is already listed
    pub fn prepend(&mut self, conversation: Conversation) -> bool {
        if self.contains(&conversation.id) {
            return false;
        }
        self.conversations.insert(0, conversation);
        true
    }

    /// Make `id` active. Unknown ids are refused.
    pub fn activate(&mut self, id: &ConversationId) -> bool {
        if !self.contains(id) {
            return false;
        }
        self.active = Some(id.clone());
        true
    }

    pub fn set_title(&mut self, id: &ConversationId, title: impl Into<String>) -> bool {
        match self.conversations.iter_mut().find(|c| &c.id == id) {
            Some(conversation) => {
                conversation.title = title.into();
                true
            }
            None => false,
        }
    }

    pub fn editing(&self) -> Option<&RenameDraft> {
        self.editing.as_ref()
    }

    pub fn is_editing(&self, id: &ConversationId) -> bool {
        self.editing.as_ref().map(|d| &d.id) == Some(id)
    }

    /// Enter edit mode for `id`, seeded with its current title
    pub fn begin_edit(&mut self, id: &ConversationId) -> bool {
        let Some(conversation) = self.get(id) else {
            return false;
        };
        self.editing = Some(RenameDraft {
            id: id.clone(),
            title: conversation.title.clone(),
        });
        true
    }

    pub fn edit_title(&mut self, title: impl Into<String>) {
        if let Some(draft) = self.editing.as_mut() {
            draft.title = title.into();
        }
    }

    pub fn edit_push(&mut self, c: char) {
        if let Some(draft) = self.editing.as_mut() {
            draft.title.push(c);
        }
    }

    pub fn edit_pop(&mut self) {
        if let Some(draft) = self.editing.as_mut() {
            draft.title.pop();
        }
    }

    /// Commit the draft (submit or focus loss).
    ///
    /// A title that is empty after trimming sends nothing and stays in edit
    /// mode. Otherwise edit mode closes and the trimmed title is returned.
    pub fn commit_edit(&mut self) -> Option<RenameRequest> {
        let draft = self.editing.as_ref()?;
        let title = draft.title.trim();
        if title.is_empty() {
            return None;
        }
        let request = RenameRequest {
            id: draft.id.clone(),
            title: title.to_string(),
        };
        self.editing = None;
        Some(request)
    }

    /// Escape: leave edit mode without a request
    pub fn cancel_edit(&mut self) {
        self.editing = None;
    }
}
