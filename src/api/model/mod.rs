//! The GraphQL types of the API and the application logic behind them.

pub(crate) mod author;
pub(crate) mod book;
pub(crate) mod user;
