//! Main-view state and the reducer that folds backend outcomes into it.
//!
//! User intents produce [`Effect`]s; requests among them are executed
//! elsewhere (inline by [`crate::driver::Driver`], or on spawned tasks by the
//! TUI) and come back as [`Outcome`]s for [`ChatState::apply`]. Responses
//! that belong to a conversation carry a ticket and are dropped if that
//! conversation is no longer the one on screen.

use tracing::{debug, warn};

use crate::backend::{BackendError, BackendResult};
use crate::registry::{ConversationRegistry, RenameRequest};
use crate::transcript::Transcript;
use crate::types::{Conversation, ConversationId, Message, Profile, UsageSnapshot};
use crate::usage::UsageMeter;

/// Alert text when checkout answers without a usable URL
pub const INVALID_CHECKOUT_RESPONSE: &str = "Invalid checkout response from server";

/// Correlates a history fetch with the selection that started it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchTicket {
    pub conversation_id: ConversationId,
    pub epoch: u64,
}

/// Correlates a send with the conversation it was typed into
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendTicket {
    pub conversation_id: ConversationId,
    pub epoch: u64,
    pub content: String,
}

/// A backend call to make
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Profile,
    ListConversations,
    CreateConversation { auto: bool },
    History(SwitchTicket),
    Send(SendTicket),
    Rename(RenameRequest),
    Usage,
    Checkout,
    /// Every message of the account, across conversations
    AllMessages,
}

impl Request {
    pub fn name(&self) -> &'static str {
        match self {
            Request::Profile => "profile",
            Request::ListConversations => "list_conversations",
            Request::CreateConversation { .. } => "create_conversation",
            Request::History(_) => "history",
            Request::Send(_) => "send",
            Request::Rename(_) => "rename",
            Request::Usage => "usage",
            Request::Checkout => "checkout",
            Request::AllMessages => "all_messages",
        }
    }
}

/// Result of a [`Request`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Profile(BackendResult<Profile>),
    Conversations(BackendResult<Vec<Conversation>>),
    Created {
        auto: bool,
        result: BackendResult<Conversation>,
    },
    History {
        ticket: SwitchTicket,
        result: BackendResult<Vec<Message>>,
    },
    Sent {
        ticket: SendTicket,
        result: BackendResult<String>,
    },
    Renamed {
        request: RenameRequest,
        result: BackendResult<String>,
    },
    Usage(BackendResult<UsageSnapshot>),
    Checkout(BackendResult<String>),
    AllMessages(BackendResult<Vec<Message>>),
}

/// Something the view layer has to act on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Request(Request),
    /// Leave the client for the hosted checkout page
    Redirect(String),
    /// Blocking message for the user
    Alert(String),
    /// The backend rejected the credential
    SignedOut,
}

impl From<Request> for Effect {
    fn from(request: Request) -> Self {
        Effect::Request(request)
    }
}

#[derive(Debug, Clone)]
pub struct ChatState {
    registry: ConversationRegistry,
    transcript: Transcript,
    usage: UsageMeter,
    input: String,
    sending: bool,
    creating: bool,
    loading_conversations: bool,
    loading_history: bool,
    checkout_pending: bool,
    /// Bumped every time the transcript is swapped for another conversation
    epoch: u64,
    /// First epoch of the current load; older tickets predate a reload
    reloaded_at: u64,
}

impl ChatState {
    pub fn new(usage: UsageMeter) -> Self {
        Self {
            registry: ConversationRegistry::new(),
            transcript: Transcript::new(),
            usage,
            input: String::new(),
            sending: false,
            creating: false,
            loading_conversations: false,
            loading_history: false,
            checkout_pending: false,
            epoch: 0,
            reloaded_at: 0,
        }
    }

    pub fn registry(&self) -> &ConversationRegistry {
        &self.registry
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn usage(&self) -> &UsageMeter {
        &self.usage
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn is_sending(&self) -> bool {
        self.sending
    }

    pub fn is_loading(&self) -> bool {
        self.loading_conversations || self.loading_history || self.creating
    }

    pub fn is_checkout_pending(&self) -> bool {
        self.checkout_pending
    }

    /// Entering the main view: profile, usage and the conversation list
    pub fn enter(&mut self) -> Vec<Effect> {
        self.loading_conversations = true;
        vec![
            Request::Profile.into(),
            Request::Usage.into(),
            Request::ListConversations.into(),
        ]
    }

    /// Drop everything and load the main view again ("Continue Free")
    pub fn reload(&mut self) -> Vec<Effect> {
        let usage = UsageMeter::new(self.usage.limit(), self.usage.time_frame());
        let epoch = self.epoch + 1;
        *self = Self::new(usage);
        self.epoch = epoch;
        self.reloaded_at = epoch;
        self.enter()
    }

    pub fn set_input(&mut self, input: impl Into<String>) {
        self.input = input.into();
    }

    pub fn push_input(&mut self, c: char) {
        self.input.push(c);
    }

    pub fn pop_input(&mut self) {
        self.input.pop();
    }

    /// Input box is editable unless the free quota is used up
    pub fn input_enabled(&self) -> bool {
        self.usage.can_send()
    }

    /// Send control state.
    ///
    /// Held back while the active conversation's history loads, since the
    /// history replaces the transcript wholesale.
    pub fn can_submit(&self) -> bool {
        !self.input.trim().is_empty()
            && !self.sending
            && !self.loading_history
            && self.usage.can_send()
            && self.registry.active_id().is_some()
    }

    /// Append the typed message optimistically and emit the send request.
    ///
    /// Returns `None` without touching anything when sending is gated.
    pub fn begin_send(&mut self) -> Option<Effect> {
        if !self.can_submit() {
            return None;
        }
        let conversation_id = self.registry.active_id()?.clone();
        let content = std::mem::take(&mut self.input);

        self.transcript.push_user(content.clone());
        self.sending = true;

        Some(
            Request::Send(SendTicket {
                conversation_id,
                epoch: self.epoch,
                content,
            })
            .into(),
        )
    }

    /// Activate a listed conversation and fetch its history
    pub fn select_conversation(&mut self, id: &ConversationId) -> Option<Effect> {
        if !self.registry.activate(id) {
            return None;
        }
        self.swap_transcript();
        self.loading_history = true;

        Some(
            Request::History(SwitchTicket {
                conversation_id: id.clone(),
                epoch: self.epoch,
            })
            .into(),
        )
    }

    /// Explicit "new conversation"
    pub fn new_conversation(&mut self) -> Option<Effect> {
        if self.creating {
            return None;
        }
        self.creating = true;
        Some(Request::CreateConversation { auto: false }.into())
    }

    pub fn begin_rename(&mut self, id: &ConversationId) -> bool {
        self.registry.begin_edit(id)
    }

    pub fn rename_set(&mut self, title: impl Into<String>) {
        self.registry.edit_title(title);
    }

    pub fn rename_push(&mut self, c: char) {
        self.registry.edit_push(c);
    }

    pub fn rename_pop(&mut self) {
        self.registry.edit_pop();
    }

    /// Submit or focus loss on the rename field
    pub fn commit_rename(&mut self) -> Option<Effect> {
        self.registry
            .commit_edit()
            .map(|request| Request::Rename(request).into())
    }

    /// Escape on the rename field
    pub fn cancel_rename(&mut self) {
        self.registry.cancel_edit();
    }

    /// "Upgrade Now"
    pub fn upgrade(&mut self) -> Option<Effect> {
        if self.checkout_pending {
            return None;
        }
        self.checkout_pending = true;
        Some(Request::Checkout.into())
    }

    /// Load the account-wide history into the transcript.
    ///
    /// Only shown while no conversation is active.
    pub fn load_all_messages(&mut self) -> Effect {
        self.loading_history = true;
        Request::AllMessages.into()
    }

    /// Fold one backend outcome into the state
    pub fn apply(&mut self, outcome: Outcome) -> Vec<Effect> {
        match outcome {
            Outcome::Profile(Ok(profile)) => {
                self.usage.set_premium(profile.is_premium);
                Vec::new()
            }
            Outcome::Profile(Err(e)) => fetch_failure("profile", e),

            Outcome::Conversations(result) => {
                self.loading_conversations = false;
                match result {
                    Ok(conversations) => self.apply_conversations(conversations),
                    Err(e) => fetch_failure("conversation list", e),
                }
            }

            Outcome::Created { auto, result } => {
                self.creating = false;
                match result {
                    Ok(conversation) => {
                        debug!(auto, id = %conversation.id, "Conversation created");
                        self.apply_created(conversation);
                        Vec::new()
                    }
                    Err(e) => fetch_failure("create conversation", e),
                }
            }

            Outcome::History { ticket, result } => {
                if !self.is_current_switch(&ticket) {
                    debug!(id = %ticket.conversation_id, "Discarding stale history response");
                    return Vec::new();
                }
                self.loading_history = false;
                match result {
                    Ok(messages) => {
                        self.transcript.replace(messages);
                        Vec::new()
                    }
                    Err(e) => fetch_failure("conversation history", e),
                }
            }

            Outcome::Sent { ticket, result } => {
                if ticket.epoch < self.reloaded_at {
                    debug!(id = %ticket.conversation_id, "Discarding reply sent before reload");
                    return Vec::new();
                }
                self.sending = false;
                let current = self.is_current_send(&ticket);
                if !current {
                    debug!(id = %ticket.conversation_id, "Reply for an inactive conversation not shown");
                }
                match result {
                    Ok(reply) => {
                        if current {
                            self.transcript.push_bot(reply);
                        }
                        vec![Request::Usage.into()]
                    }
                    Err(BackendError::QuotaExceeded) => vec![Request::Usage.into()],
                    Err(e) => {
                        warn!("Sending message failed: {}", e);
                        if current {
                            self.transcript.push_apology();
                        }
                        if e == BackendError::Unauthorized {
                            vec![Effect::SignedOut]
                        } else {
                            Vec::new()
                        }
                    }
                }
            }

            Outcome::Renamed { request, result } => match result {
                Ok(title) => {
                    self.registry.set_title(&request.id, title);
                    Vec::new()
                }
                Err(e) => fetch_failure("rename conversation", e),
            },

            Outcome::Usage(Ok(snapshot)) => {
                self.usage.apply_snapshot(snapshot);
                Vec::new()
            }
            Outcome::Usage(Err(e)) => fetch_failure("message count", e),

            Outcome::Checkout(result) => {
                self.checkout_pending = false;
                match result {
                    Ok(url) => vec![Effect::Redirect(url)],
                    Err(BackendError::Unauthorized) => vec![Effect::SignedOut],
                    Err(e) => {
                        warn!("Creating checkout session failed: {}", e);
                        vec![Effect::Alert(checkout_alert(&e))]
                    }
                }
            }

            Outcome::AllMessages(result) => {
                self.loading_history = false;
                match result {
                    Ok(_) if self.registry.active_id().is_some() => {
                        debug!("Discarding account history, a conversation is open");
                        Vec::new()
                    }
                    Ok(messages) => {
                        self.transcript.replace(messages);
                        Vec::new()
                    }
                    Err(e) => fetch_failure("message history", e),
                }
            }
        }
    }

    fn apply_conversations(&mut self, conversations: Vec<Conversation>) -> Vec<Effect> {
        self.registry.replace(conversations);

        if self.registry.is_empty() {
            if self.creating {
                return Vec::new();
            }
            self.creating = true;
            return vec![Request::CreateConversation { auto: true }.into()];
        }

        if self.registry.active_id().is_some() {
            return Vec::new();
        }

        let first = self.registry.conversations()[0].id.clone();
        self.select_conversation(&first).into_iter().collect()
    }

    fn apply_created(&mut self, conversation: Conversation) {
        let id = conversation.id.clone();
        self.registry.prepend(conversation);
        self.registry.activate(&id);
        self.swap_transcript();
        self.loading_history = false;
    }

    fn swap_transcript(&mut self) {
        self.epoch += 1;
        self.transcript.clear();
    }

    fn is_current_switch(&self, ticket: &SwitchTicket) -> bool {
        ticket.epoch == self.epoch && self.registry.is_active(&ticket.conversation_id)
    }

    fn is_current_send(&self, ticket: &SendTicket) -> bool {
        ticket.epoch == self.epoch && self.registry.is_active(&ticket.conversation_id)
    }
}

/// Non-send fetch failures are logged and otherwise ignored, except an
/// expired credential which signs the user out.
fn fetch_failure(what: &str, error: BackendError) -> Vec<Effect> {
    if error == BackendError::Unauthorized {
        warn!("{} rejected the credential, signing out", what);
        return vec![Effect::SignedOut];
    }
    warn!("Fetching {} failed: {}", what, error);
    Vec::new()
}

fn checkout_alert(error: &BackendError) -> String {
    match error {
        BackendError::Malformed(_) => INVALID_CHECKOUT_RESPONSE.to_string(),
        BackendError::Api { detail, .. } => format!("Checkout error: {}", detail),
        other => format!("Checkout error: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_with(conversations: &[(i64, &str)]) -> ChatState {
        let mut state = ChatState::new(UsageMeter::new(10, "minute"));
        state.enter();
        let list = conversations
            .iter()
            .map(|(id, title)| Conversation::new(*id, *title))
            .collect();
        let effects = state.apply(Outcome::Conversations(Ok(list)));
        if let Some(effect) = effects.into_iter().next() {
            let ticket = history_ticket(Some(effect));
            state.apply(Outcome::History {
                ticket,
                result: Ok(Vec::new()),
            });
        }
        state
    }

    fn open(state: &mut ChatState, id: i64) {
        let ticket = history_ticket(state.select_conversation(&ConversationId::from(id)));
        state.apply(Outcome::History {
            ticket,
            result: Ok(Vec::new()),
        });
    }

    fn history_ticket(effect: Option<Effect>) -> SwitchTicket {
        match effect {
            Some(Effect::Request(Request::History(ticket))) => ticket,
            other => panic!("expected history request, got {:?}", other),
        }
    }

    fn send_ticket(effect: Option<Effect>) -> SendTicket {
        match effect {
            Some(Effect::Request(Request::Send(ticket))) => ticket,
            other => panic!("expected send request, got {:?}", other),
        }
    }

    #[test]
    fn test_enter_requests_profile_usage_and_list() {
        let mut state = ChatState::new(UsageMeter::new(10, "minute"));
        let effects = state.enter();
        assert_eq!(
            effects,
            vec![
                Effect::Request(Request::Profile),
                Effect::Request(Request::Usage),
                Effect::Request(Request::ListConversations),
            ]
        );
        assert!(state.is_loading());
    }

    #[test]
    fn test_empty_list_requests_exactly_one_auto_create() {
        let mut state = ChatState::new(UsageMeter::new(10, "minute"));
        state.enter();
        let effects = state.apply(Outcome::Conversations(Ok(Vec::new())));
        assert_eq!(
            effects,
            vec![Effect::Request(Request::CreateConversation { auto: true })]
        );

        // a second empty listing while the create is in flight adds nothing
        assert!(state.apply(Outcome::Conversations(Ok(Vec::new()))).is_empty());
    }

    #[test]
    fn test_stale_history_is_discarded() {
        let mut state = state_with(&[(1, "A"), (2, "B")]);
        let first = history_ticket(state.select_conversation(&ConversationId::from(1)));
        let second = history_ticket(state.select_conversation(&ConversationId::from(2)));

        state.apply(Outcome::History {
            ticket: first,
            result: Ok(vec![Message::user("from A")]),
        });
        assert!(state.transcript().is_empty());

        state.apply(Outcome::History {
            ticket: second,
            result: Ok(vec![Message::user("from B")]),
        });
        assert_eq!(state.transcript().messages(), &[Message::user("from B")]);
    }

    #[test]
    fn test_reply_for_inactive_conversation_is_not_shown() {
        let mut state = state_with(&[(1, "A"), (2, "B")]);
        open(&mut state, 1);
        state.set_input("hello A");
        let ticket = send_ticket(state.begin_send());

        state.select_conversation(&ConversationId::from(2));
        let effects = state.apply(Outcome::Sent {
            ticket,
            result: Ok("reply for A".to_string()),
        });

        assert!(state.transcript().is_empty());
        assert!(!state.is_sending());
        assert_eq!(effects, vec![Effect::Request(Request::Usage)]);
    }

    #[test]
    fn test_send_is_serialized_per_conversation() {
        let mut state = state_with(&[(1, "A")]);
        state.set_input("one");
        assert!(state.begin_send().is_some());
        state.set_input("two");
        assert!(state.begin_send().is_none());
        assert_eq!(state.input(), "two");
    }

    #[test]
    fn test_no_send_without_active_conversation() {
        let mut state = ChatState::new(UsageMeter::new(10, "minute"));
        state.set_input("hello");
        assert!(state.begin_send().is_none());
        assert!(state.transcript().is_empty());
    }

    #[test]
    fn test_checkout_outcomes() {
        let mut state = state_with(&[(1, "A")]);
        assert!(state.upgrade().is_some());
        assert!(state.upgrade().is_none());

        let effects = state.apply(Outcome::Checkout(Ok("https://checkout.stripe.com/c/pay".into())));
        assert_eq!(
            effects,
            vec![Effect::Redirect("https://checkout.stripe.com/c/pay".to_string())]
        );

        state.upgrade();
        let effects = state.apply(Outcome::Checkout(Err(BackendError::Api {
            status: 400,
            detail: "No such price".to_string(),
        })));
        assert_eq!(effects, vec![Effect::Alert("Checkout error: No such price".to_string())]);

        state.upgrade();
        let effects = state.apply(Outcome::Checkout(Err(BackendError::malformed("no url"))));
        assert_eq!(effects, vec![Effect::Alert(INVALID_CHECKOUT_RESPONSE.to_string())]);

        state.upgrade();
        let effects = state.apply(Outcome::Checkout(Err(BackendError::transport("connection refused"))));
        assert_eq!(
            effects,
            vec![Effect::Alert("Checkout error: Transport error: connection refused".to_string())]
        );
    }

    #[test]
    fn test_unauthorized_signs_out() {
        let mut state = state_with(&[(1, "A")]);
        let effects = state.apply(Outcome::Usage(Err(BackendError::Unauthorized)));
        assert_eq!(effects, vec![Effect::SignedOut]);
    }

    #[test]
    fn test_reload_resets_state() {
        let mut state = state_with(&[(1, "A")]);
        state.set_input("draft");
        let effects = state.reload();
        assert_eq!(effects.len(), 3);
        assert!(state.registry().is_empty());
        assert_eq!(state.input(), "");
        assert_eq!(state.usage().limit(), 10);
    }

    #[test]
    fn test_reply_from_before_reload_is_discarded() {
        let mut state = state_with(&[(1, "A")]);
        state.set_input("before reload");
        let stale = send_ticket(state.begin_send());

        state.reload();
        let effects = state.apply(Outcome::Conversations(Ok(vec![Conversation::new(1, "A")])));
        let ticket = history_ticket(effects.into_iter().next());
        state.apply(Outcome::History {
            ticket,
            result: Ok(Vec::new()),
        });

        state.set_input("after reload");
        let current = send_ticket(state.begin_send());
        assert_ne!(stale.epoch, current.epoch);

        let effects = state.apply(Outcome::Sent {
            ticket: stale,
            result: Ok("stale reply".to_string()),
        });
        assert!(effects.is_empty());
        assert!(state.is_sending());
        assert_eq!(state.transcript().messages(), &[Message::user("after reload")]);

        state.set_input("another");
        assert!(state.begin_send().is_none());

        state.apply(Outcome::Sent {
            ticket: current,
            result: Ok("fresh reply".to_string()),
        });
        assert_eq!(
            state.transcript().messages(),
            &[Message::user("after reload"), Message::bot("fresh reply")]
        );
        assert!(!state.is_sending());
    }

    #[test]
    fn test_send_waits_for_history() {
        let mut state = ChatState::new(UsageMeter::new(10, "minute"));
        state.enter();
        let effects = state.apply(Outcome::Conversations(Ok(vec![Conversation::new(1, "A")])));
        let ticket = history_ticket(effects.into_iter().next());

        state.set_input("hi");
        assert!(!state.can_submit());
        assert!(state.begin_send().is_none());
        assert_eq!(state.input(), "hi");

        state.apply(Outcome::History {
            ticket,
            result: Ok(vec![Message::user("old q"), Message::bot("old a")]),
        });
        let ticket = send_ticket(state.begin_send());
        state.apply(Outcome::Sent {
            ticket,
            result: Ok("reply to hi".to_string()),
        });

        assert_eq!(
            state.transcript().messages(),
            &[
                Message::user("old q"),
                Message::bot("old a"),
                Message::user("hi"),
                Message::bot("reply to hi"),
            ]
        );
    }
}
