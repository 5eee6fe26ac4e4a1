use crate::session::SessionContext;

/// Views the user can land on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Login,
    Chat,
    /// Checkout completed
    Success,
    /// Checkout abandoned
    Cancel,
}

impl Route {
    pub fn parse(path: &str) -> Option<Self> {
        match path.trim().trim_end_matches('/') {
            "" => Some(Route::Chat),
            "/login" => Some(Route::Login),
            "/success" => Some(Route::Success),
            "/cancel" => Some(Route::Cancel),
            _ => None,
        }
    }

    pub fn path(&self) -> &'static str {
        match self {
            Route::Login => "/login",
            Route::Chat => "/",
            Route::Success => "/success",
            Route::Cancel => "/cancel",
        }
    }

    pub fn is_protected(&self) -> bool {
        !matches!(self, Route::Login)
    }

    /// Protected views render only with a credential; otherwise go to login
    pub fn guard(self, session: &SessionContext) -> Route {
        if self.is_protected() && !session.is_authenticated() {
            Route::Login
        } else {
            self
        }
    }
}

/// Static acknowledgement shown on a checkout landing view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Landing {
    pub title: &'static str,
    pub body: &'static str,
    pub back_label: &'static str,
}

impl Landing {
    pub fn for_route(route: Route) -> Option<Self> {
        match route {
            Route::Success => Some(Landing {
                title: "Thank You!",
                body: "Your subscription has been successfully activated. You now have access to unlimited messages and premium features.",
                back_label: "Return to Chat",
            }),
            Route::Cancel => Some(Landing {
                title: "Payment Cancelled",
                body: "Your payment was cancelled. You can continue using the free version or try upgrading again when you're ready.",
                back_label: "Return to Chat",
            }),
            Route::Login | Route::Chat => None,
        }
    }
}
