use crate::error::{RepoError, RepoResult};
use crate::models::{Comment, CommentView, NewPost, NewUser, Post, PostUpdate, User};
use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;

/// Repository Trait
///
/// The abstract contract for all persistence operations. Handlers only ever see
/// `Arc<dyn Repository>`, so the Postgres implementation can be swapped for an
/// in-memory one in tests.
///
/// Every mutating method is a single statement, so each one commits atomically on its own.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Posts ---
    async fn get_posts(&self) -> RepoResult<Vec<Post>>;
    async fn get_post(&self, id: i64) -> RepoResult<Option<Post>>;
    /// Fails with `RepoError::Conflict` when the title is already taken.
    async fn create_post(&self, post: NewPost) -> RepoResult<Post>;
    /// Overwrites the editable fields in place. `Ok(None)` if the post does not exist.
    async fn update_post(&self, id: i64, update: PostUpdate) -> RepoResult<Option<Post>>;
    /// Returns false if nothing was deleted. Comments on the post go with it.
    async fn delete_post(&self, id: i64) -> RepoResult<bool>;

    // --- Users ---
    async fn get_user(&self, id: i64) -> RepoResult<Option<User>>;
    async fn get_user_by_email(&self, email: &str) -> RepoResult<Option<User>>;
    async fn count_users(&self) -> RepoResult<i64>;
    /// Fails with `RepoError::Conflict` when the email is already registered, or with
    /// `Conflict(SINGLE_ADMIN_INDEX)` when an admin is inserted while one already exists.
    async fn create_user(&self, user: NewUser) -> RepoResult<User>;

    // --- Comments ---
    async fn add_comment(&self, post_id: i64, author_id: i64, body: String) -> RepoResult<Comment>;
    /// Comments for one post, oldest first, joined with their authors.
    async fn get_comments(&self, post_id: i64) -> RepoResult<Vec<CommentView>>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// Partial unique index allowing at most one `admin` row in `users`.
pub const SINGLE_ADMIN_INDEX: &str = "users_single_admin";

const POST_COLUMNS: &str = "id, title, subtitle, date, body, img_url, author_id, author_name";
const USER_COLUMNS: &str = "id, name, email, password_hash, role";

/// PostgresRepository
///
/// The `Repository` implementation backed by PostgreSQL.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    /// get_posts
    ///
    /// Lists every post, in insertion order.
    async fn get_posts(&self) -> RepoResult<Vec<Post>> {
        let query = format!("SELECT {POST_COLUMNS} FROM posts ORDER BY id ASC");
        let posts = sqlx::query_as::<_, Post>(&query)
            .fetch_all(&self.pool)
            .await?;
        Ok(posts)
    }

    async fn get_post(&self, id: i64) -> RepoResult<Option<Post>> {
        let query = format!("SELECT {POST_COLUMNS} FROM posts WHERE id = $1");
        let post = sqlx::query_as::<_, Post>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(post)
    }

    /// create_post
    ///
    /// Inserts a post and returns the stored row. The unique index on `title`
    /// rejects duplicates, which surface as `RepoError::Conflict`.
    async fn create_post(&self, post: NewPost) -> RepoResult<Post> {
        let query = format!(
            "INSERT INTO posts (title, subtitle, date, body, img_url, author_id, author_name) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {POST_COLUMNS}"
        );
        sqlx::query_as::<_, Post>(&query)
            .bind(post.title)
            .bind(post.subtitle)
            .bind(post.date)
            .bind(post.body)
            .bind(post.img_url)
            .bind(post.author_id)
            .bind(post.author_name)
            .fetch_one(&self.pool)
            .await
            .map_err(RepoError::from_write)
    }

    /// update_post
    ///
    /// Last writer wins: there is no version check.
    async fn update_post(&self, id: i64, update: PostUpdate) -> RepoResult<Option<Post>> {
        let query = format!(
            "UPDATE posts SET title = $2, subtitle = $3, body = $4, img_url = $5, author_name = $6 \
             WHERE id = $1 RETURNING {POST_COLUMNS}"
        );
        sqlx::query_as::<_, Post>(&query)
            .bind(id)
            .bind(update.title)
            .bind(update.subtitle)
            .bind(update.body)
            .bind(update.img_url)
            .bind(update.author_name)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepoError::from_write)
    }

    /// delete_post
    ///
    /// Permanent delete. Dependent comments are removed by `ON DELETE CASCADE`.
    async fn delete_post(&self, id: i64) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_user(&self, id: i64) -> RepoResult<Option<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let user = sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn get_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let user = sqlx::query_as::<_, User>(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn count_users(&self) -> RepoResult<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// create_user
    ///
    /// A single INSERT: a duplicate email fails the whole statement, so no partial
    /// row is ever left behind.
    async fn create_user(&self, user: NewUser) -> RepoResult<User> {
        let query = format!(
            "INSERT INTO users (name, email, password_hash, role) VALUES ($1, $2, $3, $4) \
             RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&query)
            .bind(user.name)
            .bind(user.email)
            .bind(user.password_hash)
            .bind(user.role.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(RepoError::from_write)
    }

    async fn add_comment(&self, post_id: i64, author_id: i64, body: String) -> RepoResult<Comment> {
        let comment = sqlx::query_as::<_, Comment>(
            "INSERT INTO comments (body, author_id, post_id) VALUES ($1, $2, $3) \
             RETURNING id, body, author_id, post_id",
        )
        .bind(body)
        .bind(author_id)
        .bind(post_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(comment)
    }

    /// get_comments
    ///
    /// Scoped to a single post and joined with `users` for the author byline.
    async fn get_comments(&self, post_id: i64) -> RepoResult<Vec<CommentView>> {
        let comments = sqlx::query_as::<_, CommentView>(
            r#"
            SELECT c.id, c.body, c.author_id, c.post_id,
                   u.name AS author_name, u.email AS author_email
            FROM comments c
            JOIN users u ON c.author_id = u.id
            WHERE c.post_id = $1
            ORDER BY c.id ASC
            "#,
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(comments)
    }
}
