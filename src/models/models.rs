use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identity record owned by the authentication subsystem. The board only
/// reads it to resolve authors by id or username.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct User {
    pub id: String,
    pub username: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Group {
    pub slug: String,
    pub title: String,
    pub description: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Post {
    pub id: String,
    pub author_id: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub group: Option<String>,
    pub image: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Comment {
    pub id: String,
    pub post_id: Option<String>,
    pub author_id: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// Directed edge: `user_id` sees the posts of `author_id`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Follow {
    pub user_id: String,
    pub author_id: String,
}

#[derive(Serialize, Deserialize)]
pub struct TokenData {
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

/// Follow edges are stored per follower as the list of followed author ids.
pub type Followings = Vec<String>;

#[derive(Serialize, Clone, Debug)]
pub struct GroupRef {
    pub slug: String,
    pub title: String,
}

/// A post joined with what the presentation layer needs to show it.
#[derive(Serialize, Clone, Debug)]
pub struct PostView {
    pub id: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub author: String,
    pub group: Option<GroupRef>,
    pub image: Option<String>,
}

#[derive(Serialize, Clone, Debug)]
pub struct CommentView {
    pub id: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub author: String,
}
