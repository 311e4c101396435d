use juniper::{graphql_object, ID};

use crate::{
    api::{
        err::{internal_server_error, invalid_input, ApiError, ApiResult},
        Context,
    },
    model::{Author, Book},
    prelude::*,
    store::{BookFilter, NewBook},
};


#[graphql_object(context = Context)]
impl Book {
    fn id(&self) -> ID {
        self.id.to_hex().into()
    }

    fn title(&self) -> &str {
        &self.title
    }

    fn published(&self) -> i32 {
        self.published
    }

    fn genres(&self) -> &[String] {
        &self.genres
    }

    /// The book's author. Every book references exactly one.
    async fn author(&self, context: &Context) -> ApiResult<Author> {
        context.store.author_by_id(self.author_id).await?.ok_or_else(|| {
            error!("Book '{}' references a missing author record", self.title);
            internal_server_error!("book references a missing author")
        })
    }
}

impl Book {
    pub(crate) async fn all(
        author: Option<String>,
        genre: Option<String>,
        context: &Context,
    ) -> ApiResult<Vec<Self>> {
        Ok(context.store.all_books(&BookFilter::new(author, genre)).await?)
    }

    pub(crate) async fn count(context: &Context) -> ApiResult<i32> {
        Ok(context.store.book_count().await? as i32)
    }

    /// Implements `addBook`: find-or-create the author, insert the book, bump
    /// the author's book counter. The writes are separate (no transaction), so
    /// a failure in the middle can leave a bookless author or a stale counter.
    pub(crate) async fn add(
        title: String,
        author: Option<String>,
        published: Option<i32>,
        genres: Option<Vec<String>>,
        context: &Context,
    ) -> ApiResult<Self> {
        context.require_user()?;

        // Both arguments are nullable in the schema, but the catalog requires
        // them.
        let author_name = author
            .filter(|name| !name.is_empty())
            .ok_or_else(|| invalid_input!("`author` is required"))?;
        let published = published.ok_or_else(|| invalid_input!("`published` is required"))?;

        let author = Author::find_or_create(&author_name, context).await?;

        let new_book = NewBook {
            title,
            published,
            author_id: author.id,
            genres: genres.unwrap_or_default(),
        };
        let title_arg = new_book.title.clone();
        let book = context.store.insert_book(new_book).await
            .map_err(|e| ApiError::from(e).with_invalid_arg("title", title_arg))?;

        context.store.bump_book_count(author.id).await?;

        Ok(book)
    }
}


#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::{
        api::{context::test_context, err::ApiErrorKind},
        store::{memory::MemStore, CatalogStore},
    };
    use super::*;

    async fn logged_in() -> (Arc<MemStore>, Context) {
        let store = Arc::new(MemStore::new());
        let user = store.create_user("mluukkai", "refactoring").await.unwrap();
        let ctx = test_context(store.clone(), Some(user));
        (store, ctx)
    }

    async fn add(
        ctx: &Context,
        title: &str,
        author: &str,
        published: i32,
        genres: &[&str],
    ) -> ApiResult<Book> {
        Book::add(
            title.into(),
            Some(author.into()),
            Some(published),
            Some(genres.iter().map(|s| s.to_string()).collect()),
            ctx,
        ).await
    }

    fn titles(books: Vec<Book>) -> Vec<String> {
        books.into_iter().map(|b| b.title).collect()
    }

    #[tokio::test]
    async fn add_requires_a_user() {
        let store = Arc::new(MemStore::new());
        let ctx = test_context(store.clone(), None);

        let err = add(&ctx, "Refactoring", "Martin Fowler", 1999, &["refactoring"])
            .await
            .unwrap_err();
        assert_eq!(err.kind, ApiErrorKind::NotAuthenticated);
        assert_eq!(store.document_count(), 0);
    }

    #[tokio::test]
    async fn add_creates_the_author_once() {
        let (_, ctx) = logged_in().await;
        add(&ctx, "Refactoring", "Martin Fowler", 1999, &["refactoring"]).await.unwrap();
        add(&ctx, "Patterns of Enterprise Application Architecture", "Martin Fowler", 2002, &["design"])
            .await
            .unwrap();

        let authors = Author::all(&ctx).await.unwrap();
        assert_eq!(authors.len(), 1);
        assert_eq!(authors[0].name, "Martin Fowler");
        assert_eq!(authors[0].book_count, 2);
        assert_eq!(Book::count(&ctx).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn add_validates_its_arguments() {
        let (store, ctx) = logged_in().await;

        let err = Book::add("Refactoring".into(), None, Some(1999), None, &ctx)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ApiErrorKind::InvalidInput);

        let err = Book::add("Refactoring".into(), Some("Martin Fowler".into()), None, None, &ctx)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ApiErrorKind::InvalidInput);

        // Neither attempt got far enough to create the author.
        assert!(store.author_by_name("Martin Fowler").await.unwrap().is_none());

        let err = add(&ctx, "", "Martin Fowler", 1999, &[]).await.unwrap_err();
        assert_eq!(err.kind, ApiErrorKind::InvalidInput);
        assert_eq!(err.invalid_args, vec![("title", String::new())]);
        // The author creation is a separate earlier write and sticks around.
        assert!(store.author_by_name("Martin Fowler").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn filters_by_author_and_genre() {
        let (_, ctx) = logged_in().await;
        add(&ctx, "Refactoring", "Martin Fowler", 1999, &["refactoring", "design"]).await.unwrap();
        add(&ctx, "Clean Code", "Robert Martin", 2008, &["refactoring"]).await.unwrap();
        add(&ctx, "The Art of Computer Programming", "Donald Knuth", 1968, &["algorithms"])
            .await
            .unwrap();

        let all = Book::all(None, None, &ctx).await.unwrap();
        assert_eq!(all.len(), 3);

        let refactoring = Book::all(None, Some("refactoring".into()), &ctx).await.unwrap();
        assert_eq!(titles(refactoring), ["Refactoring", "Clean Code"]);

        let fowler = Book::all(Some("Martin Fowler".into()), None, &ctx).await.unwrap();
        assert_eq!(titles(fowler), ["Refactoring"]);

        let both = Book::all(Some("Robert Martin".into()), Some("refactoring".into()), &ctx)
            .await
            .unwrap();
        assert_eq!(titles(both), ["Clean Code"]);

        let unknown = Book::all(Some("B. Traven".into()), None, &ctx).await.unwrap();
        assert!(unknown.is_empty());
    }

    #[tokio::test]
    async fn empty_filter_strings_mean_no_filter() {
        let (_, ctx) = logged_in().await;
        add(&ctx, "Refactoring", "Martin Fowler", 1999, &["refactoring"]).await.unwrap();
        add(&ctx, "Clean Code", "Robert Martin", 2008, &["refactoring"]).await.unwrap();

        let unfiltered = Book::all(None, None, &ctx).await.unwrap();
        let empty = Book::all(Some(String::new()), Some(String::new()), &ctx).await.unwrap();
        assert_eq!(titles(unfiltered), titles(empty));
    }
}
