use juniper::{graphql_object, ID};

use crate::{
    api::{
        err::{internal_server_error, invalid_credentials, ApiError, ApiResult},
        Context,
    },
    model::User,
    prelude::*,
};


#[graphql_object(context = Context)]
impl User {
    fn id(&self) -> ID {
        self.id.to_hex().into()
    }

    /// The username, a unique string identifying the user.
    fn username(&self) -> &str {
        &self.username
    }

    /// The genre this user wants recommendations from.
    fn favorite_genre(&self) -> &str {
        &self.favorite_genre
    }
}


/// The result of a successful `login`.
#[derive(Debug)]
pub(crate) struct Token {
    pub(crate) value: String,
}

#[graphql_object(Context = Context)]
impl Token {
    /// The signed bearer token. Send it back as `Authorization: Bearer <value>`.
    fn value(&self) -> &str {
        &self.value
    }
}

impl User {
    /// Implements `createUser`. Deliberately open: anybody can create a user,
    /// authentication only guards the catalog mutations.
    pub(crate) async fn create(
        username: String,
        favorite_genre: String,
        context: &Context,
    ) -> ApiResult<Self> {
        context.store.create_user(&username, &favorite_genre).await.map_err(|e| {
            ApiError::from(e)
                .with_invalid_arg("username", username)
                .with_invalid_arg("favoriteGenre", favorite_genre)
        })
    }

    /// Implements `login`: checks the password and issues a bearer token.
    pub(crate) async fn login(
        username: String,
        password: String,
        context: &Context,
    ) -> ApiResult<Token> {
        let user = context.store.user_by_username(&username).await?;

        // One error for both unknown user and wrong password, so the endpoint
        // cannot be used to enumerate usernames.
        let user = match user {
            Some(user) if context.auth.password_matches(&password) => user,
            _ => return Err(invalid_credentials!("wrong credentials")),
        };

        let value = context.auth.issue(&user).map_err(|e| {
            error!("Failed to sign a login token: {e:#}");
            internal_server_error!("could not issue a token")
        })?;

        Ok(Token { value })
    }
}
