use juniper::{graphql_object, ID};

use crate::{
    api::{
        err::{internal_server_error, invalid_input, ApiResult},
        Context,
    },
    model::Author,
    prelude::*,
    store::StoreError,
};


#[graphql_object(context = Context)]
impl Author {
    fn id(&self) -> ID {
        self.id.to_hex().into()
    }

    fn name(&self) -> &str {
        &self.name
    }

    /// The author's year of birth, or `null` if it is not known (yet).
    fn born(&self) -> Option<i32> {
        self.born
    }

    /// The number of books by this author in the catalog. This is a counter
    /// maintained by `addBook`, not a live aggregation.
    fn book_count(&self) -> i32 {
        self.book_count
    }
}

impl Author {
    pub(crate) async fn all(context: &Context) -> ApiResult<Vec<Self>> {
        Ok(context.store.all_authors().await?)
    }

    pub(crate) async fn count(context: &Context) -> ApiResult<i32> {
        Ok(context.store.author_count().await? as i32)
    }

    /// Implements `editAuthor`: sets the birth year of the author with the
    /// given name.
    pub(crate) async fn set_born(name: String, born: i32, context: &Context) -> ApiResult<Self> {
        context.require_user()?;

        context.store.set_author_born(&name, born).await?.ok_or_else(|| {
            invalid_input!("no author named '{name}'").with_invalid_arg("name", name)
        })
    }

    /// Returns the author with the given name, creating it (without birth
    /// year, with zero books) if the catalog has not seen the name yet.
    pub(crate) async fn find_or_create(name: &str, context: &Context) -> ApiResult<Self> {
        if let Some(author) = context.store.author_by_name(name).await? {
            return Ok(author);
        }

        match context.store.create_author(name).await {
            Ok(author) => Ok(author),
            // The unique index caught a concurrent insert of the same name.
            // Use the record that won.
            Err(StoreError::Duplicate { .. }) => {
                context.store.author_by_name(name).await?.ok_or_else(|| {
                    error!("Author '{name}' is reported as duplicate but cannot be found");
                    internal_server_error!("could not create author '{name}'")
                })
            }
            Err(e) => Err(e.into()),
        }
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

    #[tokio::test]
    async fn set_born_requires_a_user() {
        let store = Arc::new(MemStore::new());
        store.create_author("Sandi Metz").await.unwrap();
        let ctx = test_context(store.clone(), None);

        let err = Author::set_born("Sandi Metz".into(), 1960, &ctx).await.unwrap_err();
        assert_eq!(err.kind, ApiErrorKind::NotAuthenticated);
        let author = store.author_by_name("Sandi Metz").await.unwrap().unwrap();
        assert_eq!(author.born, None);
    }

    #[tokio::test]
    async fn set_born_updates_known_authors() {
        let store = Arc::new(MemStore::new());
        store.create_author("Sandi Metz").await.unwrap();
        let user = store.create_user("mluukkai", "refactoring").await.unwrap();
        let ctx = test_context(store.clone(), Some(user));

        let author = Author::set_born("Sandi Metz".into(), 1960, &ctx).await.unwrap();
        assert_eq!(author.born, Some(1960));
        let stored = store.author_by_name("Sandi Metz").await.unwrap().unwrap();
        assert_eq!(stored.born, Some(1960));
    }

    #[tokio::test]
    async fn set_born_rejects_unknown_authors() {
        let store = Arc::new(MemStore::new());
        let user = store.create_user("mluukkai", "refactoring").await.unwrap();
        let ctx = test_context(store, Some(user));

        let err = Author::set_born("Reijo Mäki".into(), 1958, &ctx).await.unwrap_err();
        assert_eq!(err.kind, ApiErrorKind::InvalidInput);
        assert_eq!(err.invalid_args, vec![("name", "Reijo Mäki".to_owned())]);
    }

    #[tokio::test]
    async fn find_or_create_is_idempotent() {
        let store = Arc::new(MemStore::new());
        let ctx = test_context(store, None);

        let first = Author::find_or_create("Martin Fowler", &ctx).await.unwrap();
        let second = Author::find_or_create("Martin Fowler", &ctx).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(Author::all(&ctx).await.unwrap().len(), 1);
    }
}
