use juniper::graphql_object;

use crate::model::{Author, Book, User};
use super::{err::ApiResult, Context};


/// The root query object.
pub(crate) struct Query;

#[graphql_object(Context = Context)]
impl Query {
    /// Returns the number of books in the catalog.
    async fn book_count(context: &Context) -> ApiResult<i32> {
        Book::count(context).await
    }

    /// Returns the number of authors in the catalog.
    async fn author_count(context: &Context) -> ApiResult<i32> {
        Author::count(context).await
    }

    /// Returns all books, optionally filtered by author name and/or genre
    /// membership. An empty string is treated like an absent filter.
    async fn all_books(
        author: Option<String>,
        genre: Option<String>,
        context: &Context,
    ) -> ApiResult<Vec<Book>> {
        Book::all(author, genre, context).await
    }

    /// Returns all authors.
    async fn all_authors(context: &Context) -> ApiResult<Vec<Author>> {
        Author::all(context).await
    }

    /// Returns every genre that appears on at least one book, each once.
    async fn all_genres(context: &Context) -> ApiResult<Vec<String>> {
        Ok(context.store.all_genres().await?)
    }

    /// Returns the current user.
    fn me<'ctx>(context: &'ctx Context) -> Option<&'ctx User> {
        context.current_user.as_ref()
    }
}
