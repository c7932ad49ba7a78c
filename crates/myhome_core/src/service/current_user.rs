//! Current caller resolution.

use crate::model::user::UserIdentity;

/// Resolves the identity of whoever is calling the service right now.
///
/// `None` means an anonymous or system caller.
pub trait CurrentUserResolver {
    fn current_user(&self) -> Option<UserIdentity>;
}

impl<R: CurrentUserResolver + ?Sized> CurrentUserResolver for &R {
    fn current_user(&self) -> Option<UserIdentity> {
        (**self).current_user()
    }
}

/// Resolver that always reports the same caller.
///
/// Used where identity is fixed for the process, e.g. one CLI invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticUserResolver {
    user: Option<UserIdentity>,
}

impl StaticUserResolver {
    pub fn new(user: UserIdentity) -> Self {
        Self { user: Some(user) }
    }

    pub fn anonymous() -> Self {
        Self { user: None }
    }
}

impl CurrentUserResolver for StaticUserResolver {
    fn current_user(&self) -> Option<UserIdentity> {
        self.user.clone()
    }
}
