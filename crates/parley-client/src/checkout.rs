//! Handing a hosted checkout URL to the user.

use parley_config::CheckoutConfig;

#[derive(Debug, thiserror::Error)]
pub enum RedirectError {
    #[error("Failed to open browser: {0}")]
    Browser(String),
}

/// How the redirect was carried out
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Redirect {
    /// The system browser was asked to open the page
    Opened,
    /// The user has to open this URL themselves
    Manual(String),
}

pub trait Redirector: Send + Sync {
    fn redirect(&self, url: &str) -> Result<Redirect, RedirectError>;
}

/// Opens checkout in the system browser, or hands the URL back when that
/// is disabled (headless sessions, SSH)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrowserRedirector {
    open_browser: bool,
}

impl BrowserRedirector {
    pub fn new(open_browser: bool) -> Self {
        Self { open_browser }
    }

    pub fn from_config(config: &CheckoutConfig) -> Self {
        if config.publishable_key.is_none() {
            tracing::debug!("No Stripe publishable key configured");
        }
        Self::new(config.open_browser)
    }

    pub fn opens_browser(&self) -> bool {
        self.open_browser
    }
}

impl Redirector for BrowserRedirector {
    fn redirect(&self, url: &str) -> Result<Redirect, RedirectError> {
        if !self.open_browser {
            return Ok(Redirect::Manual(url.to_string()));
        }

        tracing::info!("Opening checkout page");
        webbrowser::open(url).map_err(|e| RedirectError::Browser(e.to_string()))?;
        Ok(Redirect::Opened)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_browser_hands_back_url() {
        let redirector = BrowserRedirector::new(false);
        let outcome = redirector
            .redirect("https://checkout.stripe.com/c/pay/cs_test")
            .unwrap();
        assert_eq!(
            outcome,
            Redirect::Manual("https://checkout.stripe.com/c/pay/cs_test".to_string())
        );
    }

    #[test]
    fn test_from_config() {
        let config = CheckoutConfig {
            publishable_key: Some("pk_test_123".to_string()),
            open_browser: false,
        };
        assert!(!BrowserRedirector::from_config(&config).opens_browser());
        assert!(BrowserRedirector::from_config(&CheckoutConfig::default()).opens_browser());
    }
}
