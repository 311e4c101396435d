use juniper::graphql_object;

use crate::model::{Author, Book, User};
use super::{err::ApiResult, model::user::Token, Context};


/// The root mutation object.
pub(crate) struct Mutation;

#[graphql_object(Context = Context)]
impl Mutation {
    /// Creates a new user. Does not require authentication.
    async fn create_user(
        username: String,
        favorite_genre: String,
        context: &Context,
    ) -> ApiResult<User> {
        User::create(username, favorite_genre, context).await
    }

    /// Checks the credentials and returns a bearer token.
    async fn login(username: String, password: String, context: &Context) -> ApiResult<Token> {
        User::login(username, password, context).await
    }

    /// Adds a book to the catalog. The author is created on first sight.
    /// Requires authentication.
    async fn add_book(
        title: String,
        author: Option<String>,
        published: Option<i32>,
        genres: Option<Vec<String>>,
        context: &Context,
    ) -> ApiResult<Book> {
        Book::add(title, author, published, genres, context).await
    }

    /// Sets the birth year of the author with the given name. Requires
    /// authentication.
    async fn edit_author(name: String, set_born_to: i32, context: &Context) -> ApiResult<Author> {
        Author::set_born(name, set_born_to, context).await
    }
}
