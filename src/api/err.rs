//! API error handling.
//!
//! We define our own error to use for all resolvers. It has `From` impls to be
//! created from other common errors that occur (e.g. store errors). This
//! module also offers a couple macros to easily create an error.
//!
//! The error contains information that helps the frontend show a good error
//! message. We have a very coarse "error kind" (sent as `extensions.kind`) and
//! optionally echo back the offending arguments as `extensions.invalidArgs`,
//! which is the shape Apollo-based clients expect.

use juniper::{FieldError, IntoFieldError, Object, ScalarValue, Value};

use crate::{prelude::*, store::StoreError};


pub(crate) type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug)]
pub(crate) struct ApiError {
    pub(crate) msg: String,
    pub(crate) kind: ApiErrorKind,
    pub(crate) invalid_args: Vec<(&'static str, String)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ApiErrorKind {
    /// The arguments passed to an endpoint are invalid somehow.
    InvalidInput,

    /// The operation requires a logged-in user but the request carried no
    /// (valid) bearer token.
    NotAuthenticated,

    /// `login` was called with a wrong username or password.
    InvalidCredentials,

    /// Some server error out of control of the API user.
    InternalServerError,
}

impl ApiErrorKind {
    fn kind_str(&self) -> &str {
        // These are the codes Apollo server sends for the same situations, so
        // existing frontends can keep dispatching on them.
        match self {
            Self::InvalidInput => "BAD_USER_INPUT",
            Self::NotAuthenticated => "UNAUTHENTICATED",
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::InternalServerError => "INTERNAL_SERVER_ERROR",
        }
    }

    fn message_prefix(&self) -> &str {
        match self {
            Self::InvalidInput => "Invalid input",
            Self::NotAuthenticated => "Not authenticated",
            Self::InvalidCredentials => "Invalid credentials",
            Self::InternalServerError => "Internal server error",
        }
    }
}

impl ApiError {
    /// Attaches an argument name/value pair that is echoed back to the client
    /// in `extensions.invalidArgs`. Only input errors carry these.
    pub(crate) fn with_invalid_arg(mut self, name: &'static str, value: impl Into<String>) -> Self {
        if self.kind == ApiErrorKind::InvalidInput {
            self.invalid_args.push((name, value.into()));
        }
        self
    }
}

impl From<StoreError> for ApiError {
    fn from(src: StoreError) -> Self {
        match src {
            StoreError::Duplicate { .. } => Self {
                msg: src.to_string(),
                kind: ApiErrorKind::InvalidInput,
                invalid_args: Vec::new(),
            },
            StoreError::Invalid(msg) => Self {
                msg,
                kind: ApiErrorKind::InvalidInput,
                invalid_args: Vec::new(),
            },
            StoreError::Backend(e) => {
                // The client only ever sees the generic message below, and
                // this conversion is the last place that still has the full
                // error. So it has to be logged here.
                error!("Store error while serving an API request: {e:#}");
                Self {
                    msg: "could not reach the data store".into(),
                    kind: ApiErrorKind::InternalServerError,
                    invalid_args: Vec::new(),
                }
            }
        }
    }
}

impl<S: ScalarValue> IntoFieldError<S> for ApiError {
    fn into_field_error(self) -> FieldError<S> {
        let msg = format!("{}: {}", self.kind.message_prefix(), self.msg);

        // The `invalidArgs` map has dynamic keys, so we cannot use
        // `graphql_value!` here.
        let mut ext = Object::with_capacity(2);
        ext.add_field("kind", Value::scalar(self.kind.kind_str().to_owned()));
        if !self.invalid_args.is_empty() {
            let mut args = Object::with_capacity(self.invalid_args.len());
            for (name, value) in self.invalid_args {
                args.add_field(name, Value::scalar(value));
            }
            ext.add_field("invalidArgs", Value::Object(args));
        }

        FieldError::new(msg, Value::Object(ext))
    }
}


// ===== Helper macros to easily create errors ==================================================

/// Creates an `ApiError` with a `format!` like syntax.
macro_rules! api_err {
    ($kind:ident, $fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::api::err::ApiError {
            msg: format!($fmt $(, $arg)*),
            kind: $crate::api::err::ApiErrorKind::$kind,
            invalid_args: Vec::new(),
        }
    };
}

macro_rules! invalid_input {
    ($($t:tt)+) => { $crate::api::err::api_err!(InvalidInput, $($t)*) };
}

macro_rules! not_authenticated {
    ($($t:tt)+) => { $crate::api::err::api_err!(NotAuthenticated, $($t)*) };
}

macro_rules! invalid_credentials {
    ($($t:tt)+) => { $crate::api::err::api_err!(InvalidCredentials, $($t)*) };
}

macro_rules! internal_server_error {
    ($($t:tt)+) => { $crate::api::err::api_err!(InternalServerError, $($t)*) };
}

pub(crate) use api_err;
pub(crate) use invalid_input;
pub(crate) use not_authenticated;
pub(crate) use invalid_credentials;
pub(crate) use internal_server_error;
