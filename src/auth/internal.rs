//! User list authenticator

use super::{AuthAction, AuthError, AuthRequest, Authenticator};
use crate::conf::PathPattern;

/// Username that matches any client, with or without credentials
pub const ANY_USER: &str = "any";

/// Permission granted to a user
#[derive(Debug, Clone)]
pub struct Permission {
    pub action: AuthAction,
    /// Path restriction: exact name, `~regex`, or `None` for every path
    pub path: Option<String>,
}

impl Permission {
    /// Allow an action on every path
    pub fn any_path(action: AuthAction) -> Self {
        Self { action, path: None }
    }

    /// Allow an action on a single path or pattern
    pub fn on_path(action: AuthAction, path: impl Into<String>) -> Self {
        Self {
            action,
            path: Some(path.into()),
        }
    }

    fn allows(&self, action: AuthAction, path: &str) -> bool {
        if self.action != action {
            return false;
        }

        match self.path.as_deref() {
            None => true,
            Some(expr) => match expr.strip_prefix('~') {
                Some(re) => PathPattern::new(re)
                    .map(|p| p.captures(path).is_some())
                    .unwrap_or(false),
                None => expr == path,
            },
        }
    }
}

/// A configured user
#[derive(Debug, Clone)]
pub struct InternalUser {
    pub user: String,
    pub pass: String,
    pub permissions: Vec<Permission>,
}

impl InternalUser {
    /// Create a user with no permissions
    pub fn new(user: impl Into<String>, pass: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            pass: pass.into(),
            permissions: Vec::new(),
        }
    }

    /// Grant a permission
    pub fn allow(mut self, permission: Permission) -> Self {
        self.permissions.push(permission);
        self
    }

    fn matches_credentials(&self, req: &AuthRequest) -> bool {
        if self.user == ANY_USER {
            return true;
        }
        self.user == req.credentials.user && self.pass == req.credentials.pass
    }
}

/// Authenticator backed by a static user list
#[derive(Debug, Clone, Default)]
pub struct InternalAuth {
    users: Vec<InternalUser>,
}

impl InternalAuth {
    pub fn new(users: Vec<InternalUser>) -> Self {
        Self { users }
    }
}

impl Authenticator for InternalAuth {
    fn authenticate(&self, req: &AuthRequest) -> Result<(), AuthError> {
        let granted = self.users.iter().any(|u| {
            u.matches_credentials(req)
                && u.permissions
                    .iter()
                    .any(|p| p.allows(req.action, &req.path))
        });

        if granted {
            Ok(())
        } else {
            tracing::warn!(
                path = %req.path,
                user = %req.credentials.user,
                action = %req.action,
                "Authentication denied"
            );
            Err(AuthError::Denied {
                user: req.credentials.user.clone(),
                path: req.path.clone(),
            })
        }
    }
}
