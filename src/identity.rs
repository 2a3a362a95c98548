//! Identity collaborator: who is making the request.

use crate::domain::User;

/// Resolves the user behind the current request
pub trait Identity: Send + Sync {
    /// The authenticated user, or `None` when there is no session
    fn current_user(&self) -> Option<User>;
}

/// Fixed identity, e.g. taken from CLI flags or environment
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity {
    user: Option<User>,
}

impl StaticIdentity {
    pub fn new(user: User) -> Self {
        Self { user: Some(user) }
    }

    /// No session at all
    pub fn anonymous() -> Self {
        Self { user: None }
    }
}

impl Identity for StaticIdentity {
    fn current_user(&self) -> Option<User> {
        self.user.clone()
    }
}
