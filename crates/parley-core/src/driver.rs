use std::collections::VecDeque;
use std::sync::Arc;

use tracing::debug;

use crate::backend::ChatBackend;
use crate::state::{ChatState, Effect, Outcome, Request};

/// Execute one request against the backend
pub async fn perform<B: ChatBackend + ?Sized>(backend: &B, request: Request) -> Outcome {
    debug!("Performing {}", request.name());

    match request {
        Request::Profile => Outcome::Profile(backend.profile().await),
        Request::ListConversations => Outcome::Conversations(backend.list_conversations().await),
        Request::CreateConversation { auto } => Outcome::Created {
            auto,
            result: backend.create_conversation(None).await,
        },
        Request::History(ticket) => {
            let result = backend.conversation_messages(&ticket.conversation_id).await;
            Outcome::History { ticket, result }
        }
        Request::Send(ticket) => {
            let result = backend
                .send_message(&ticket.conversation_id, &ticket.content)
                .await;
            Outcome::Sent { ticket, result }
        }
        Request::Rename(request) => {
            let result = backend
                .rename_conversation(&request.id, &request.title)
                .await;
            Outcome::Renamed { request, result }
        }
        Request::Usage => Outcome::Usage(backend.usage().await),
        Request::Checkout => Outcome::Checkout(backend.create_checkout_session().await),
        Request::AllMessages => Outcome::AllMessages(backend.all_messages().await),
    }
}

/// Runs requests one after another until only view effects remain.
///
/// Used by the command-line client and by tests; the TUI spawns each
/// request instead so responses can interleave.
pub struct Driver<B: ?Sized> {
    backend: Arc<B>,
}

impl<B: ChatBackend + ?Sized> Driver<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Drain `effects`, feeding every outcome back into `state`.
    ///
    /// Returns the redirects, alerts and sign-outs in the order they arose.
    pub async fn run(
        &self,
        state: &mut ChatState,
        effects: impl IntoIterator<Item = Effect>,
    ) -> Vec<Effect> {
        let mut queue: VecDeque<Effect> = effects.into_iter().collect();
        let mut surfaced = Vec::new();

        while let Some(effect) = queue.pop_front() {
            match effect {
                Effect::Request(request) => {
                    let outcome = perform(self.backend.as_ref(), request).await;
                    queue.extend(state.apply(outcome));
                }
                other => surfaced.push(other),
            }
        }

        surfaced
    }
}
