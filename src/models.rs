use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

// --- Core Application Schemas (Mapped to Database) ---

/// Role
///
/// The explicit authorization attribute carried by every `User`. It is decided once,
/// when the account is created, and never changes afterwards.
/// Stored as lowercase text in the `users.role` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// May create, edit and delete posts.
    Admin,
    /// May read and comment.
    #[default]
    Reader,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Reader => "reader",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for Role {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "admin" => Ok(Role::Admin),
            "reader" => Ok(Role::Reader),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

/// User
///
/// The canonical identity record stored in the `users` table.
/// The password is only ever held as an argon2 PHC string.
#[derive(Debug, Clone, FromRow, Default)]
pub struct User {
    pub id: i64,
    pub name: String,
    // Unique across all users (enforced by the `users_email_key` index).
    pub email: String,
    pub password_hash: String,
    #[sqlx(try_from = "String")]
    pub role: Role,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Post
///
/// A blog post from the `posts` table.
#[derive(Debug, Clone, FromRow, Default, PartialEq)]
pub struct Post {
    pub id: i64,
    // Unique across all posts.
    pub title: String,
    pub subtitle: String,
    /// Human readable creation date ("March 05, 2026"). Stamped once, never recomputed.
    pub date: String,
    /// Markup authored by an admin; rendered unescaped.
    pub body: String,
    pub img_url: String,
    // FK to users.id (the admin who created the post).
    pub author_id: i64,
    /// The byline entered in the post form.
    pub author_name: String,
}

/// Comment
///
/// Raw row from the `comments` table.
#[derive(Debug, Clone, FromRow, Default, PartialEq)]
pub struct Comment {
    pub id: i64,
    pub body: String,
    pub author_id: i64,
    pub post_id: i64,
}

/// CommentView
///
/// A comment joined with its author's name and email, ready for display.
#[derive(Debug, Clone, FromRow, Default, PartialEq)]
pub struct CommentView {
    pub id: i64,
    pub body: String,
    pub author_id: i64,
    pub post_id: i64,
    pub author_name: String,
    pub author_email: String,
}

// --- Insert / Update Payloads ---

/// NewUser
///
/// Everything needed to insert a user. The role has already been decided by the caller.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

#[derive(Debug, Clone)]
pub struct NewPost {
    pub title: String,
    pub subtitle: String,
    pub date: String,
    pub body: String,
    pub img_url: String,
    pub author_id: i64,
    pub author_name: String,
}

/// PostUpdate
///
/// The fields an admin may overwrite when editing. The creation date is not editable.
#[derive(Debug, Clone)]
pub struct PostUpdate {
    pub title: String,
    pub subtitle: String,
    pub body: String,
    pub img_url: String,
    pub author_name: String,
}
