pub mod auth;
pub mod backend;
pub mod driver;
pub mod error;
pub mod registry;
pub mod routes;
pub mod session;
pub mod state;
pub mod transcript;
pub mod types;
pub mod usage;

pub use types::{Conversation, ConversationId, Message, Profile, UsageSnapshot};

pub use backend::{AuthBackend, BackendError, BackendResult, ChatBackend};
pub use error::{StorageError, StorageResult};
pub use session::{
    Credential, CredentialStore, FileCredentialStore, MemoryCredentialStore, SessionContext,
};

pub use auth::{AuthField, AuthForm, AuthMode};
pub use registry::{ConversationRegistry, RenameDraft, RenameRequest};
pub use routes::{Landing, Route};
pub use transcript::{Transcript, SEND_FAILURE_APOLOGY};
pub use usage::{GateState, Plan, PlanAction, UpgradePanel, UsageMeter, UsageNotice};

pub use driver::{perform, Driver};
pub use state::{ChatState, Effect, Outcome, Request, SendTicket, SwitchTicket};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
