use parley_client::{ApiClient, BrowserRedirector, Redirect, Redirector};
use parley_config::Config;
use parley_core::{
    perform, AuthBackend, AuthForm, AuthMode, BackendResult, ChatState, ConversationId,
    Credential, Effect, Landing, Outcome, Route, SessionContext, UsageMeter,
};
use tokio::sync::mpsc;

/// Which pane receives keys on the chat view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Sidebar,
    Input,
}

/// Results coming back from spawned backend calls
#[derive(Debug)]
pub enum AppEvent {
    Outcome { generation: u64, outcome: Outcome },
    Auth { generation: u64, result: BackendResult<Credential> },
}

pub struct App {
    pub route: Route,
    pub session: SessionContext,
    pub auth: AuthForm,
    pub chat: ChatState,
    pub focus: Focus,
    /// Sidebar cursor
    pub selected: usize,
    pub alert: Option<String>,
    pub status: Option<String>,
    pub scroll_offset: usize,
    base_client: ApiClient,
    client: ApiClient,
    redirector: BrowserRedirector,
    message_limit: u32,
    time_frame: String,
    /// Active conversation the cursor last followed
    followed: Option<ConversationId>,
    /// Bumped on sign-in and sign-out; events from an older session are dropped
    generation: u64,
    event_tx: mpsc::Sender<AppEvent>,
    event_rx: mpsc::Receiver<AppEvent>,
}

impl App {
    pub fn new(config: &Config, session: SessionContext, route: Route) -> anyhow::Result<Self> {
        let base_client = ApiClient::from_config(&config.api)?;
        let client = match session.credential() {
            Some(credential) => base_client.clone().with_credential(credential.clone()),
            None => base_client.clone(),
        };
        let message_limit = config.usage.message_limit;
        let time_frame = config.usage.time_frame.to_string();
        let (event_tx, event_rx) = mpsc::channel(100);

        Ok(Self {
            route: route.guard(&session),
            session,
            auth: AuthForm::new(),
            chat: ChatState::new(UsageMeter::new(message_limit, time_frame.clone())),
            focus: Focus::Input,
            selected: 0,
            alert: None,
            status: None,
            scroll_offset: 0,
            base_client,
            client,
            redirector: BrowserRedirector::from_config(&config.checkout),
            message_limit,
            time_frame,
            followed: None,
            generation: 0,
            event_tx,
            event_rx,
        })
    }

    /// Kick off whatever the current route needs
    pub async fn start(&mut self) {
        if self.route == Route::Chat {
            let effects = self.chat.enter();
            self.dispatch(effects).await;
        }
    }

    pub fn landing(&self) -> Option<Landing> {
        Landing::for_route(self.route)
    }

    /// Run requests on spawned tasks and surface everything else
    pub async fn dispatch(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Request(request) => {
                    let client = self.client.clone();
                    let tx = self.event_tx.clone();
                    let generation = self.generation;
                    tokio::spawn(async move {
                        let outcome = perform(&client, request).await;
                        if tx.send(AppEvent::Outcome { generation, outcome }).await.is_err() {
                            tracing::debug!("App closed before outcome arrived");
                        }
                    });
                }
                Effect::Redirect(url) => self.redirect(&url),
                Effect::Alert(message) => self.alert = Some(message),
                Effect::SignedOut => self.sign_out().await,
            }
        }
    }

    fn redirect(&mut self, url: &str) {
        self.status = Some(match self.redirector.redirect(url) {
            Ok(Redirect::Opened) => {
                "Checkout opened in your browser. Press Ctrl+R once payment completes.".to_string()
            }
            Ok(Redirect::Manual(url)) => format!("Open this page to complete checkout: {}", url),
            Err(e) => {
                tracing::warn!("{}", e);
                format!("Open this page to complete checkout: {}", url)
            }
        });
    }

    /// Drain outcomes from finished tasks
    pub async fn process_events(&mut self) {
        let mut events = Vec::new();
        while let Ok(event) = self.event_rx.try_recv() {
            events.push(event);
        }

        for event in events {
            match event {
                AppEvent::Outcome { generation, outcome } => {
                    if generation != self.generation {
                        continue;
                    }
                    let effects = self.chat.apply(outcome);
                    self.sync_cursor();
                    self.dispatch(effects).await;
                }
                AppEvent::Auth { generation, result } => {
                    if generation != self.generation {
                        continue;
                    }
                    if let Some(credential) = self.auth.finish_submit(result) {
                        self.sign_in(credential).await;
                    }
                }
            }
        }
    }

    /// Validate the form and run login/register in the background
    pub fn submit_auth(&mut self) {
        if !self.auth.begin_submit() {
            return;
        }

        let client = self.base_client.clone();
        let tx = self.event_tx.clone();
        let generation = self.generation;
        let mode = self.auth.mode;
        let email = self.auth.email.trim().to_string();
        let password = self.auth.password.clone();

        tokio::spawn(async move {
            let result = match mode {
                AuthMode::Login => client.login(&email, &password).await,
                AuthMode::Register => client.register(&email, &password).await,
            };
            if tx.send(AppEvent::Auth { generation, result }).await.is_err() {
                tracing::debug!("App closed before sign-in finished");
            }
        });
    }

    async fn sign_in(&mut self, credential: Credential) {
        if let Err(e) = self.session.login(credential.clone()).await {
            tracing::warn!("Failed to persist credential: {}", e);
        }
        self.generation += 1;
        self.client = self.base_client.clone().with_credential(credential);
        self.auth = AuthForm::new();
        self.reset_chat();
        self.route = Route::Chat;
        tracing::info!("Signed in");
        self.start().await;
    }

    /// Logout, or the backend rejected the credential
    pub async fn sign_out(&mut self) {
        if let Err(e) = self.session.logout().await {
            tracing::warn!("Failed to delete credential: {}", e);
        }
        self.generation += 1;
        self.client = self.base_client.clone();
        self.auth = AuthForm::new();
        self.reset_chat();
        self.route = Route::Login;
        tracing::info!("Signed out");
    }

    fn reset_chat(&mut self) {
        self.chat = ChatState::new(UsageMeter::new(self.message_limit, self.time_frame.clone()));
        self.focus = Focus::Input;
        self.selected = 0;
        self.followed = None;
        self.scroll_offset = 0;
        self.status = None;
        self.alert = None;
    }

    /// "Return to Chat" on a landing view
    pub async fn return_to_chat(&mut self) {
        self.route = Route::Chat.guard(&self.session);
        self.reset_chat();
        self.start().await;
    }

    /// Ctrl+R, also "Continue Free"
    pub async fn reload(&mut self) {
        self.generation += 1;
        self.status = None;
        self.selected = 0;
        self.followed = None;
        let effects = self.chat.reload();
        self.dispatch(effects).await;
    }

    pub async fn send_message(&mut self) {
        if let Some(effect) = self.chat.begin_send() {
            self.scroll_offset = 0;
            self.dispatch(vec![effect]).await;
        }
    }

    pub async fn new_conversation(&mut self) {
        if let Some(effect) = self.chat.new_conversation() {
            self.dispatch(vec![effect]).await;
        }
    }

    /// "Upgrade Now"; only offered while the upgrade panel is up
    pub async fn upgrade(&mut self) {
        if self.chat.usage().upgrade_panel().is_none() {
            return;
        }
        if let Some(effect) = self.chat.upgrade() {
            self.status = Some("Creating checkout session...".to_string());
            self.dispatch(vec![effect]).await;
        }
    }

    pub async fn toggle_focus(&mut self) {
        // leaving the sidebar commits a pending rename
        if self.focus == Focus::Sidebar && self.chat.registry().editing().is_some() {
            self.commit_rename().await;
        }
        self.focus = match self.focus {
            Focus::Sidebar => Focus::Input,
            Focus::Input => Focus::Sidebar,
        };
    }

    pub fn cursor_id(&self) -> Option<ConversationId> {
        self.chat
            .registry()
            .conversations()
            .get(self.selected)
            .map(|c| c.id.clone())
    }

    pub fn cursor_up(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn cursor_down(&mut self) {
        if self.selected + 1 < self.chat.registry().len() {
            self.selected += 1;
        }
    }

    pub async fn select_cursor(&mut self) {
        let Some(id) = self.cursor_id() else {
            return;
        };
        if self.chat.registry().is_active(&id) {
            return;
        }
        if let Some(effect) = self.chat.select_conversation(&id) {
            self.followed = Some(id);
            self.scroll_offset = 0;
            self.dispatch(vec![effect]).await;
        }
    }

    pub fn begin_rename(&mut self) {
        if let Some(id) = self.cursor_id() {
            self.chat.begin_rename(&id);
        }
    }

    /// Enter on the rename field; a blank title keeps the field open
    pub async fn commit_rename(&mut self) {
        if let Some(effect) = self.chat.commit_rename() {
            self.dispatch(vec![effect]).await;
        }
    }

    pub fn dismiss_alert(&mut self) {
        self.alert = None;
    }

    pub fn push_input(&mut self, c: char) {
        if self.chat.input_enabled() {
            self.chat.push_input(c);
        }
    }

    pub fn pop_input(&mut self) {
        self.chat.pop_input();
    }

    pub fn scroll_up(&mut self) {
        self.scroll_offset += 1;
    }

    pub fn scroll_down(&mut self) {
        self.scroll_offset = self.scroll_offset.saturating_sub(1);
    }

    pub fn scroll_page_up(&mut self) {
        self.scroll_offset += 10;
    }

    pub fn scroll_page_down(&mut self) {
        self.scroll_offset = self.scroll_offset.saturating_sub(10);
    }

    /// Move the cursor to a newly active conversation and keep it in range
    fn sync_cursor(&mut self) {
        let registry = self.chat.registry();
        let active = registry.active_id().cloned();

        if active.is_some() && active != self.followed {
            if let Some(index) = registry
                .conversations()
                .iter()
                .position(|c| Some(&c.id) == active.as_ref())
            {
                self.selected = index;
            }
            self.followed = active;
        }

        let len = self.chat.registry().len();
        if self.selected >= len {
            self.selected = len.saturating_sub(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::{Conversation, MemoryCredentialStore};
    use std::sync::Arc;

    async fn build_app(signed_in: bool, route: Route) -> App {
        let store = if signed_in {
            MemoryCredentialStore::with_credential(Credential::new("token").unwrap())
        } else {
            MemoryCredentialStore::new()
        };
        let session = SessionContext::restore(Arc::new(store)).await;
        App::new(&Config::default(), session, route).unwrap()
    }

    async fn deliver(app: &mut App, outcome: Outcome) {
        let generation = app.generation;
        app.event_tx
            .send(AppEvent::Outcome { generation, outcome })
            .await
            .unwrap();
        app.process_events().await;
    }

    #[tokio::test]
    async fn test_protected_route_without_credential_shows_login() {
        let app = build_app(false, Route::Success).await;
        assert_eq!(app.route, Route::Login);

        let app = build_app(true, Route::Success).await;
        assert_eq!(app.route, Route::Success);
        assert_eq!(app.landing().unwrap().title, "Thank You!");
    }

    #[tokio::test]
    async fn test_blank_auth_form_is_rejected_locally() {
        let mut app = build_app(false, Route::Login).await;
        app.submit_auth();
        assert!(!app.auth.is_submitting());
        assert!(app.auth.error().is_some());
    }

    #[tokio::test]
    async fn test_sign_out_returns_to_login() {
        let mut app = build_app(true, Route::Chat).await;
        app.chat.set_input("draft");
        app.sign_out().await;

        assert_eq!(app.route, Route::Login);
        assert!(!app.session.is_authenticated());
        assert_eq!(app.chat.input(), "");
        assert!(!app.client.is_authenticated());
    }

    #[tokio::test]
    async fn test_events_from_previous_session_are_dropped() {
        let mut app = build_app(true, Route::Chat).await;
        let stale = app.generation;
        app.sign_out().await;

        app.event_tx
            .send(AppEvent::Outcome {
                generation: stale,
                outcome: Outcome::Conversations(Ok(vec![Conversation::new(1, "A")])),
            })
            .await
            .unwrap();
        app.process_events().await;
        assert!(app.chat.registry().is_empty());
    }

    #[tokio::test]
    async fn test_reload_drops_events_from_before() {
        let mut app = build_app(true, Route::Chat).await;
        let stale = app.generation;
        app.reload().await;
        assert_ne!(app.generation, stale);

        app.event_tx
            .send(AppEvent::Outcome {
                generation: stale,
                outcome: Outcome::Conversations(Ok(vec![Conversation::new(1, "A")])),
            })
            .await
            .unwrap();
        app.process_events().await;
        assert!(app.chat.registry().is_empty());
    }

    #[tokio::test]
    async fn test_cursor_follows_created_conversation() {
        let mut app = build_app(true, Route::Chat).await;
        deliver(
            &mut app,
            Outcome::Conversations(Ok(vec![Conversation::new(1, "A"), Conversation::new(2, "B")])),
        )
        .await;
        app.cursor_down();
        assert_eq!(app.selected, 1);

        deliver(
            &mut app,
            Outcome::Created {
                auto: false,
                result: Ok(Conversation::new(5, "New Chat")),
            },
        )
        .await;
        assert_eq!(app.selected, 0);
        assert_eq!(app.cursor_id(), Some(ConversationId::from(5)));
    }

    #[tokio::test]
    async fn test_focus_loss_commits_rename() {
        let mut app = build_app(true, Route::Chat).await;
        deliver(
            &mut app,
            Outcome::Created {
                auto: true,
                result: Ok(Conversation::new(5, "New Chat")),
            },
        )
        .await;

        app.focus = Focus::Sidebar;
        app.begin_rename();
        assert!(app.chat.registry().editing().is_some());
        app.chat.rename_set("Plans");
        app.toggle_focus().await;

        assert!(app.chat.registry().editing().is_none());
        assert_eq!(app.focus, Focus::Input);
        // the local title changes only once the backend answers
        assert_eq!(app.chat.registry().conversations()[0].title, "New Chat");
    }

    #[tokio::test]
    async fn test_alert_is_dismissed() {
        let mut app = build_app(true, Route::Chat).await;
        app.dispatch(vec![Effect::Alert("Checkout error: boom".to_string())])
            .await;
        assert_eq!(app.alert.as_deref(), Some("Checkout error: boom"));
        app.dismiss_alert();
        assert!(app.alert.is_none());
    }

    #[tokio::test]
    async fn test_input_is_locked_at_the_limit() {
        let mut app = build_app(true, Route::Chat).await;
        deliver(
            &mut app,
            Outcome::Usage(Ok(parley_core::UsageSnapshot {
                current_count: 10,
                time_frame: "minute".to_string(),
            })),
        )
        .await;
        app.push_input('x');
        assert_eq!(app.chat.input(), "");
    }
}
