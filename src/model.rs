//! The catalog's document types, shared between the store and the API layer.
//!
//! Serde attributes pin the exact field names used in the store collections
//! (`_id`, `bookCount`, `favoriteGenre`, ...), so existing data keeps working.

use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};


#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Author {
    #[serde(rename = "_id")]
    pub(crate) id: ObjectId,
    /// Unique among all authors.
    pub(crate) name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) born: Option<i32>,
    /// Denormalized count, bumped whenever a book of this author is added.
    /// Can lag behind the real count if an add-book partially fails.
    pub(crate) book_count: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Book {
    #[serde(rename = "_id")]
    pub(crate) id: ObjectId,
    pub(crate) title: String,
    pub(crate) published: i32,
    #[serde(rename = "author")]
    pub(crate) author_id: ObjectId,
    #[serde(default)]
    pub(crate) genres: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct User {
    #[serde(rename = "_id")]
    pub(crate) id: ObjectId,
    /// Unique among all users.
    pub(crate) username: String,
    pub(crate) favorite_genre: String,
}
