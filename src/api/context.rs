use std::sync::Arc;

use crate::{
    api::err::{not_authenticated, ApiResult},
    auth::Authenticator,
    model::User,
    store::CatalogStore,
};


/// The context that is accessible to every resolver in our API.
pub(crate) struct Context {
    pub(crate) store: Arc<dyn CatalogStore>,
    pub(crate) auth: Arc<Authenticator>,

    /// The user the request's bearer token resolved to, if any. Queries work
    /// without one, mutations (except `createUser` and `login`) do not.
    pub(crate) current_user: Option<User>,
}

impl juniper::Context for Context {}

impl Context {
    /// Returns the current user or fails with `UNAUTHENTICATED`.
    pub(crate) fn require_user(&self) -> ApiResult<&User> {
        self.current_user.as_ref().ok_or_else(|| not_authenticated!("not authenticated"))
    }
}

/// Builds a context around an in-memory store, with fixed auth secrets.
#[cfg(test)]
pub(crate) fn test_context(
    store: Arc<crate::store::memory::MemStore>,
    current_user: Option<User>,
) -> Context {
    use secrecy::SecretString;
    use crate::auth::AuthConfig;

    Context {
        store,
        auth: Arc::new(Authenticator::new(AuthConfig {
            jwt_secret: SecretString::from("test-signing-secret"),
            password: SecretString::from("hunter2"),
            token_expiry: None,
        })),
        current_user,
    }
}
