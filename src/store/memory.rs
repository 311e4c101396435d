//! In-memory store used by the test suites, so resolvers and the gateway can
//! be exercised without a running MongoDB.

use std::{
    collections::BTreeSet,
    sync::atomic::{AtomicBool, Ordering},
    sync::Mutex,
};

use anyhow::anyhow;
use mongodb::bson::oid::ObjectId;

use crate::model::{Author, Book, User};

use super::{
    validate_author_name, validate_book, validate_username,
    BookFilter, CatalogStore, NewBook, StoreError,
};


#[derive(Default)]
pub(crate) struct MemStore {
    state: Mutex<State>,
    broken: AtomicBool,
}

#[derive(Default)]
struct State {
    authors: Vec<Author>,
    books: Vec<Book>,
    users: Vec<User>,
}

impl MemStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Total number of stored documents. Handy for asserting that a failed
    /// mutation did not touch the store.
    pub(crate) fn document_count(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.authors.len() + state.books.len() + state.users.len()
    }

    /// Makes `ensure_ready` fail from now on, simulating an unreachable
    /// deployment.
    pub(crate) fn break_connection(&self) {
        self.broken.store(true, Ordering::Relaxed);
    }
}

#[async_trait::async_trait]
impl CatalogStore for MemStore {
    async fn ensure_ready(&self) -> Result<(), StoreError> {
        if self.broken.load(Ordering::Relaxed) {
            return Err(StoreError::Backend(anyhow!("simulated store outage")));
        }
        Ok(())
    }

    async fn author_by_id(&self, id: ObjectId) -> Result<Option<Author>, StoreError> {
        let state = self.state.lock().unwrap();
        Ok(state.authors.iter().find(|a| a.id == id).cloned())
    }

    async fn author_by_name(&self, name: &str) -> Result<Option<Author>, StoreError> {
        let state = self.state.lock().unwrap();
        Ok(state.authors.iter().find(|a| a.name == name).cloned())
    }

    async fn all_authors(&self) -> Result<Vec<Author>, StoreError> {
        Ok(self.state.lock().unwrap().authors.clone())
    }

    async fn author_count(&self) -> Result<u64, StoreError> {
        Ok(self.state.lock().unwrap().authors.len() as u64)
    }

    async fn create_author(&self, name: &str) -> Result<Author, StoreError> {
        validate_author_name(name)?;
        let mut state = self.state.lock().unwrap();
        if state.authors.iter().any(|a| a.name == name) {
            return Err(StoreError::Duplicate { what: "author", value: name.to_owned() });
        }
        let author = Author {
            id: ObjectId::new(),
            name: name.to_owned(),
            born: None,
            book_count: 0,
        };
        state.authors.push(author.clone());
        Ok(author)
    }

    async fn set_author_born(&self, name: &str, born: i32) -> Result<Option<Author>, StoreError> {
        let mut state = self.state.lock().unwrap();
        let author = state.authors.iter_mut().find(|a| a.name == name);
        Ok(author.map(|a| {
            a.born = Some(born);
            a.clone()
        }))
    }

    async fn bump_book_count(&self, author_id: ObjectId) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        if let Some(author) = state.authors.iter_mut().find(|a| a.id == author_id) {
            author.book_count += 1;
        }
        Ok(())
    }

    async fn all_books(&self, filter: &BookFilter) -> Result<Vec<Book>, StoreError> {
        let state = self.state.lock().unwrap();
        let author_id = match &filter.author {
            Some(name) => match state.authors.iter().find(|a| &a.name == name) {
                Some(author) => Some(author.id),
                None => return Ok(Vec::new()),
            },
            None => None,
        };

        Ok(state.books.iter()
            .filter(|b| author_id.map_or(true, |id| b.author_id == id))
            .filter(|b| filter.genre.as_ref().map_or(true, |g| b.genres.contains(g)))
            .cloned()
            .collect())
    }

    async fn book_count(&self) -> Result<u64, StoreError> {
        Ok(self.state.lock().unwrap().books.len() as u64)
    }

    async fn insert_book(&self, book: NewBook) -> Result<Book, StoreError> {
        validate_book(&book)?;
        let mut state = self.state.lock().unwrap();
        let book = Book {
            id: ObjectId::new(),
            title: book.title,
            published: book.published,
            author_id: book.author_id,
            genres: book.genres,
        };
        state.books.push(book.clone());
        Ok(book)
    }

    async fn all_genres(&self) -> Result<Vec<String>, StoreError> {
        let state = self.state.lock().unwrap();
        let genres: BTreeSet<String> = state.books.iter()
            .flat_map(|b| b.genres.iter().cloned())
            .collect();
        Ok(genres.into_iter().collect())
    }

    async fn user_by_id(&self, id: ObjectId) -> Result<Option<User>, StoreError> {
        let state = self.state.lock().unwrap();
        Ok(state.users.iter().find(|u| u.id == id).cloned())
    }

    async fn user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let state = self.state.lock().unwrap();
        Ok(state.users.iter().find(|u| u.username == username).cloned())
    }

    async fn create_user(&self, username: &str, favorite_genre: &str)
        -> Result<User, StoreError>
    {
        validate_username(username)?;
        let mut state = self.state.lock().unwrap();
        if state.users.iter().any(|u| u.username == username) {
            return Err(StoreError::Duplicate { what: "username", value: username.to_owned() });
        }
        let user = User {
            id: ObjectId::new(),
            username: username.to_owned(),
            favorite_genre: favorite_genre.to_owned(),
        };
        state.users.push(user.clone());
        Ok(user)
    }
}
