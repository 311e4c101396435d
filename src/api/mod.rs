//! Definition of the GraphQL API: types, resolvers and the schema root.

use juniper::EmptySubscription;

use self::{
    mutation::Mutation,
    query::Query,
};

pub(crate) mod err;
pub(crate) mod model;

mod context;
mod mutation;
mod query;

pub(crate) use self::context::Context;


/// Creates and returns the API root node.
pub(crate) fn root_node() -> RootNode {
    RootNode::new(Query, Mutation, Subscription::new())
}

/// Type of our API root node.
pub(crate) type RootNode = juniper::RootNode<'static, Query, Mutation, Subscription>;

/// The root subscription object. The API does not offer any subscriptions.
pub(crate) type Subscription = EmptySubscription<Context>;


#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use juniper::{graphql_value, Variables};

    use crate::{
        model::Book,
        store::{memory::MemStore, CatalogStore},
    };
    use super::*;

    /// A context over a store with three books, one user ("mluukkai") and,
    /// optionally, that user as the request user.
    async fn seeded(with_user: bool) -> Context {
        let store = Arc::new(MemStore::new());
        let user = store.create_user("mluukkai", "refactoring").await.unwrap();
        let seeder = context::test_context(store.clone(), Some(user.clone()));

        for (title, author, published, genres) in [
            ("Refactoring", "Martin Fowler", 1999, &["refactoring"][..]),
            ("Clean Code", "Robert Martin", 2008, &["refactoring", "agile"]),
            ("The Art of Computer Programming", "Donald Knuth", 1968, &["algorithms"]),
        ] {
            Book::add(
                title.into(),
                Some(author.into()),
                Some(published),
                Some(genres.iter().map(|s| s.to_string()).collect()),
                &seeder,
            ).await.unwrap();
        }

        context::test_context(store, with_user.then_some(user))
    }

    #[test]
    fn schema_exposes_the_catalog_surface() {
        let schema = root_node().as_sdl();
        for needle in [
            "type Query",
            "type Mutation",
            "type Author",
            "type Book",
            "type User",
            "type Token",
            "bookCount: Int!",
            "allBooks(author: String, genre: String): [Book!]!",
            "me: User",
            "setBornTo: Int!",
            "favoriteGenre: String!",
            "value: String!",
        ] {
            assert!(schema.contains(needle), "missing from schema: {needle}");
        }
    }

    #[tokio::test]
    async fn serves_counts_and_genres() {
        let ctx = seeded(false).await;
        let (data, errors) = juniper::execute(
            "{ bookCount authorCount allGenres }",
            None,
            &root_node(),
            &Variables::new(),
            &ctx,
        ).await.unwrap();

        assert!(errors.is_empty());
        assert_eq!(data, graphql_value!({
            "bookCount": 3,
            "authorCount": 3,
            "allGenres": ["agile", "algorithms", "refactoring"],
        }));
    }

    #[tokio::test]
    async fn resolves_books_with_their_authors() {
        let ctx = seeded(false).await;
        let (data, errors) = juniper::execute(
            r#"{ allBooks(genre: "refactoring") { title author { name bookCount } } }"#,
            None,
            &root_node(),
            &Variables::new(),
            &ctx,
        ).await.unwrap();

        assert!(errors.is_empty());
        assert_eq!(data, graphql_value!({
            "allBooks": [
                { "title": "Refactoring", "author": { "name": "Martin Fowler", "bookCount": 1 } },
                { "title": "Clean Code", "author": { "name": "Robert Martin", "bookCount": 1 } },
            ],
        }));
    }

    #[tokio::test]
    async fn me_reflects_the_request_user() {
        let ctx = seeded(true).await;
        let (data, _) = juniper::execute(
            "{ me { username favoriteGenre } }",
            None,
            &root_node(),
            &Variables::new(),
            &ctx,
        ).await.unwrap();
        assert_eq!(data, graphql_value!({
            "me": { "username": "mluukkai", "favoriteGenre": "refactoring" },
        }));

        let ctx = seeded(false).await;
        let (data, _) = juniper::execute(
            "{ me { username } }",
            None,
            &root_node(),
            &Variables::new(),
            &ctx,
        ).await.unwrap();
        assert_eq!(data, graphql_value!({ "me": null }));
    }

    #[tokio::test]
    async fn unauthenticated_mutations_are_rejected() {
        let ctx = seeded(false).await;
        let (data, errors) = juniper::execute(
            r#"mutation { editAuthor(name: "Martin Fowler", setBornTo: 1963) { born } }"#,
            None,
            &root_node(),
            &Variables::new(),
            &ctx,
        ).await.unwrap();

        assert_eq!(data, graphql_value!(null));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].error().message(), "Not authenticated: not authenticated");
        assert_eq!(
            *errors[0].error().extensions(),
            graphql_value!({ "kind": "UNAUTHENTICATED" }),
        );
    }
}
