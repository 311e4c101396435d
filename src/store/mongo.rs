//! The MongoDB-backed store implementation.

use futures::TryStreamExt;
use mongodb::{
    bson::{doc, oid::ObjectId, Document},
    options::{IndexOptions, ReturnDocument},
    Client, Collection, IndexModel,
};
use secrecy::ExposeSecret;
use tokio::sync::OnceCell;

use crate::{model::{Author, Book, User}, prelude::*};

use super::{
    redacted_uri, validate_author_name, validate_book, validate_username,
    BookFilter, CatalogStore, NewBook, StoreConfig, StoreError,
};


/// The production store. Creating the handle is cheap and does no I/O: the
/// driver client is only built (and the unique indexes only created) on the
/// first [`ensure_ready`][CatalogStore::ensure_ready] call of the process.
/// Warm invocations after that reuse the established connection pool.
pub(crate) struct MongoStore {
    config: StoreConfig,
    collections: OnceCell<Collections>,
}

struct Collections {
    authors: Collection<Author>,
    books: Collection<Book>,
    users: Collection<User>,
}

impl MongoStore {
    pub(crate) fn new(config: StoreConfig) -> Self {
        Self {
            config,
            collections: OnceCell::new(),
        }
    }

    /// Returns the collection handles, connecting first if this is the first
    /// use. A failed attempt is not cached, so the next invocation retries.
    async fn collections(&self) -> Result<&Collections, StoreError> {
        self.collections.get_or_try_init(|| self.connect()).await
    }

    async fn connect(&self) -> Result<Collections, StoreError> {
        let uri = self.config.uri.expose_secret();
        debug!("Connecting to document store at '{}'", redacted_uri(uri));

        let client = Client::with_uri_str(uri).await
            .context("failed to initialize MongoDB client")
            .map_err(StoreError::Backend)?;
        let db = client.database(&self.config.database);
        let collections = Collections {
            authors: db.collection("authors"),
            books: db.collection("books"),
            users: db.collection("users"),
        };

        // The unique indexes back the duplicate checks. Creating them also
        // serves as the connectivity test for this process.
        let unique = |keys: Document| IndexModel::builder()
            .keys(keys)
            .options(IndexOptions::builder().unique(true).build())
            .build();
        collections.authors.create_index(unique(doc! { "name": 1 })).await
            .context("failed to create unique index on authors.name")
            .map_err(StoreError::Backend)?;
        collections.users.create_index(unique(doc! { "username": 1 })).await
            .context("failed to create unique index on users.username")
            .map_err(StoreError::Backend)?;

        info!("Connected to document store (database: {})", self.config.database);
        Ok(collections)
    }
}

#[async_trait::async_trait]
impl CatalogStore for MongoStore {
    async fn ensure_ready(&self) -> Result<(), StoreError> {
        self.collections().await.map(|_| ())
    }

    async fn author_by_id(&self, id: ObjectId) -> Result<Option<Author>, StoreError> {
        let cols = self.collections().await?;
        Ok(cols.authors.find_one(doc! { "_id": id }).await?)
    }

    async fn author_by_name(&self, name: &str) -> Result<Option<Author>, StoreError> {
        let cols = self.collections().await?;
        Ok(cols.authors.find_one(doc! { "name": name }).await?)
    }

    async fn all_authors(&self) -> Result<Vec<Author>, StoreError> {
        let cols = self.collections().await?;
        Ok(cols.authors.find(doc! {}).await?.try_collect().await?)
    }

    async fn author_count(&self) -> Result<u64, StoreError> {
        let cols = self.collections().await?;
        Ok(cols.authors.count_documents(doc! {}).await?)
    }

    async fn create_author(&self, name: &str) -> Result<Author, StoreError> {
        validate_author_name(name)?;
        let cols = self.collections().await?;
        let author = Author {
            id: ObjectId::new(),
            name: name.to_owned(),
            born: None,
            book_count: 0,
        };
        cols.authors.insert_one(&author).await.map_err(|e| {
            if is_duplicate_key_error(&e) {
                StoreError::Duplicate { what: "author", value: name.to_owned() }
            } else {
                e.into()
            }
        })?;
        Ok(author)
    }

    async fn set_author_born(&self, name: &str, born: i32) -> Result<Option<Author>, StoreError> {
        let cols = self.collections().await?;
        let updated = cols.authors
            .find_one_and_update(doc! { "name": name }, doc! { "$set": { "born": born } })
            .return_document(ReturnDocument::After)
            .await?;
        Ok(updated)
    }

    async fn bump_book_count(&self, author_id: ObjectId) -> Result<(), StoreError> {
        let cols = self.collections().await?;
        cols.authors
            .update_one(doc! { "_id": author_id }, doc! { "$inc": { "bookCount": 1 } })
            .await?;
        Ok(())
    }

    async fn all_books(&self, filter: &BookFilter) -> Result<Vec<Book>, StoreError> {
        let cols = self.collections().await?;

        let mut query = doc! {};
        if let Some(genre) = &filter.genre {
            query.insert("genres", doc! { "$in": [genre.as_str()] });
        }
        if let Some(author) = &filter.author {
            // Books store the author id, so resolve the name first. An
            // unknown author simply matches nothing.
            match cols.authors.find_one(doc! { "name": author.as_str() }).await? {
                Some(author) => query.insert("author", author.id),
                None => return Ok(Vec::new()),
            };
        }

        Ok(cols.books.find(query).await?.try_collect().await?)
    }

    async fn book_count(&self) -> Result<u64, StoreError> {
        let cols = self.collections().await?;
        Ok(cols.books.count_documents(doc! {}).await?)
    }

    async fn insert_book(&self, book: NewBook) -> Result<Book, StoreError> {
        validate_book(&book)?;
        let cols = self.collections().await?;
        let book = Book {
            id: ObjectId::new(),
            title: book.title,
            published: book.published,
            author_id: book.author_id,
            genres: book.genres,
        };
        cols.books.insert_one(&book).await?;
        Ok(book)
    }

    async fn all_genres(&self) -> Result<Vec<String>, StoreError> {
        let cols = self.collections().await?;
        let values = cols.books.distinct("genres", doc! {}).await?;
        Ok(values.into_iter()
            .filter_map(|value| value.as_str().map(ToOwned::to_owned))
            .collect())
    }

    async fn user_by_id(&self, id: ObjectId) -> Result<Option<User>, StoreError> {
        let cols = self.collections().await?;
        Ok(cols.users.find_one(doc! { "_id": id }).await?)
    }

    async fn user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let cols = self.collections().await?;
        Ok(cols.users.find_one(doc! { "username": username }).await?)
    }

    async fn create_user(&self, username: &str, favorite_genre: &str)
        -> Result<User, StoreError>
    {
        validate_username(username)?;
        let cols = self.collections().await?;
        let user = User {
            id: ObjectId::new(),
            username: username.to_owned(),
            favorite_genre: favorite_genre.to_owned(),
        };
        cols.users.insert_one(&user).await.map_err(|e| {
            if is_duplicate_key_error(&e) {
                StoreError::Duplicate { what: "username", value: username.to_owned() }
            } else {
                e.into()
            }
        })?;
        Ok(user)
    }
}

impl From<mongodb::error::Error> for StoreError {
    fn from(src: mongodb::error::Error) -> Self {
        Self::Backend(anyhow::Error::new(src).context("MongoDB operation failed"))
    }
}

/// The server reports violated unique indexes as write error 11000.
fn is_duplicate_key_error(error: &mongodb::error::Error) -> bool {
    use mongodb::error::{ErrorKind, WriteFailure};

    match &*error.kind {
        ErrorKind::Write(WriteFailure::WriteError(write_error)) => write_error.code == 11000,
        _ => false,
    }
}
