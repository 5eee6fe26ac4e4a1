//! Shared login / register form.

use crate::backend::AuthBackend;
use crate::session::Credential;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthMode {
    #[default]
    Login,
    Register,
}

impl AuthMode {
    pub fn title(&self) -> &'static str {
        match self {
            AuthMode::Login => "Login",
            AuthMode::Register => "Register",
        }
    }

    /// Text of the link that flips the mode
    pub fn toggle_hint(&self) -> &'static str {
        match self {
            AuthMode::Login => "Need an account? Register",
            AuthMode::Register => "Already have an account? Login",
        }
    }

    /// Generic failure text; backend detail is never shown
    pub fn failure_message(&self) -> &'static str {
        match self {
            AuthMode::Login => "Invalid credentials",
            AuthMode::Register => "Registration failed",
        }
    }
}

/// Which field has focus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthField {
    #[default]
    Email,
    Password,
}

#[derive(Debug, Clone, Default)]
pub struct AuthForm {
    pub email: String,
    pub password: String,
    pub mode: AuthMode,
    pub focus: AuthField,
    error: Option<String>,
    submitting: bool,
}

pub const REQUIRED_FIELDS_MESSAGE: &str = "Email and password are required";

impl AuthForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    pub fn toggle_mode(&mut self) {
        self.mode = match self.mode {
            AuthMode::Login => AuthMode::Register,
            AuthMode::Register => AuthMode::Login,
        };
        self.error = None;
    }

    pub fn toggle_focus(&mut self) {
        self.focus = match self.focus {
            AuthField::Email => AuthField::Password,
            AuthField::Password => AuthField::Email,
        };
    }

    pub fn push_char(&mut self, c: char) {
        match self.focus {
            AuthField::Email => self.email.push(c),
            AuthField::Password => self.password.push(c),
        }
    }

    pub fn pop_char(&mut self) {
        match self.focus {
            AuthField::Email => self.email.pop(),
            AuthField::Password => self.password.pop(),
        };
    }

    /// Required-field check; there is no password policy
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.email.trim().is_empty() || self.password.is_empty() {
            return Err(REQUIRED_FIELDS_MESSAGE);
        }
        Ok(())
    }

    /// Mark the form busy before the request goes out
    pub fn begin_submit(&mut self) -> bool {
        if self.submitting {
            return false;
        }
        if let Err(message) = self.validate() {
            self.error = Some(message.to_string());
            return false;
        }
        self.error = None;
        self.submitting = true;
        true
    }

    /// Record the outcome; returns the credential on success
    pub fn finish_submit<E: std::fmt::Display>(
        &mut self,
        result: Result<Credential, E>,
    ) -> Option<Credential> {
        self.submitting = false;
        match result {
            Ok(credential) => {
                self.password.clear();
                self.error = None;
                Some(credential)
            }
            Err(e) => {
                tracing::warn!("{} failed: {}", self.mode.title(), e);
                self.error = Some(self.mode.failure_message().to_string());
                None
            }
        }
    }

    /// Validate, call `/token` or `/register`, and record the outcome
    pub async fn submit<A: AuthBackend + ?Sized>(&mut self, backend: &A) -> Option<Credential> {
        if !self.begin_submit() {
            return None;
        }
        let email = self.email.trim().to_string();
        let result = match self.mode {
            AuthMode::Login => backend.login(&email, &self.password).await,
            AuthMode::Register => backend.register(&email, &self.password).await,
        };
        self.finish_submit(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendError, BackendResult};
    use async_trait::async_trait;

    struct ScriptedAuth {
        accept: bool,
    }

    #[async_trait]
    impl AuthBackend for ScriptedAuth {
        async fn login(&self, email: &str, _password: &str) -> BackendResult<Credential> {
            if self.accept {
                Ok(Credential::new(format!("login-{}", email)).unwrap())
            } else {
                Err(BackendError::Api {
                    status: 401,
                    detail: "Invalid credentials for alice@example.com".to_string(),
                })
            }
        }

        async fn register(&self, _email: &str, _password: &str) -> BackendResult<Credential> {
            if self.accept {
                Ok(Credential::new("registered").unwrap())
            } else {
                Err(BackendError::Api {
                    status: 400,
                    detail: "Email already registered".to_string(),
                })
            }
        }
    }

    fn filled_form() -> AuthForm {
        let mut form = AuthForm::new();
        form.email = "alice@example.com".to_string();
        form.password = "hunter2".to_string();
        form
    }

    #[tokio::test]
    async fn test_login_success_returns_credential() {
        let mut form = filled_form();
        let credential = form.submit(&ScriptedAuth { accept: true }).await.unwrap();
        assert_eq!(credential.as_str(), "login-alice@example.com");
        assert!(form.error().is_none());
        assert!(form.password.is_empty());
    }

    #[tokio::test]
    async fn test_failures_are_generic() {
        let mut form = filled_form();
        assert!(form.submit(&ScriptedAuth { accept: false }).await.is_none());
        assert_eq!(form.error(), Some("Invalid credentials"));

        form.toggle_mode();
        assert!(form.error().is_none());
        assert!(form.submit(&ScriptedAuth { accept: false }).await.is_none());
        assert_eq!(form.error(), Some("Registration failed"));
        assert!(!form.is_submitting());
    }

    #[tokio::test]
    async fn test_empty_fields_never_reach_backend() {
        let mut form = AuthForm::new();
        form.email = "  ".to_string();
        form.password = "x".to_string();
        // the backend accepts everything, so None means it was never called
        assert!(form.submit(&ScriptedAuth { accept: true }).await.is_none());
        assert_eq!(form.error(), Some(REQUIRED_FIELDS_MESSAGE));
    }

    #[test]
    fn test_typing_goes_to_focused_field() {
        let mut form = AuthForm::new();
        form.push_char('a');
        form.toggle_focus();
        form.push_char('b');
        form.push_char('c');
        form.pop_char();
        assert_eq!(form.email, "a");
        assert_eq!(form.password, "b");
    }
}
