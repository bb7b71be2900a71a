#![allow(dead_code)]

use async_trait::async_trait;
use axum::http::StatusCode;
use quill_blog::{
    AppConfig, AppState, create_router,
    error::{RepoError, RepoResult},
    models::{Comment, CommentView, NewPost, NewUser, Post, PostUpdate, Role, User},
    repository::{Repository, RepositoryState, SINGLE_ADMIN_INDEX},
    session::{MemorySessionStore, Sessions},
};
use reqwest::{
    Url,
    cookie::{CookieStore, Jar},
    header::LOCATION,
    redirect::Policy,
};
use std::{
    sync::{Arc, Mutex},
    time::Duration,
};
use tokio::net::TcpListener;

pub const PASSWORD: &str = "correct horse battery staple";

// --- In-Memory Repository ---

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    posts: Vec<Post>,
    comments: Vec<Comment>,
    next_id: i64,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Repository double with the same uniqueness, single-admin and cascade rules as
/// the schema. Every write checks its constraints under one lock.
#[derive(Default)]
pub struct InMemoryRepository {
    tables: Mutex<Tables>,
    // Simulated database round trip for `count_users`.
    count_latency: Option<Duration>,
}

impl InMemoryRepository {
    pub fn with_count_latency(latency: Duration) -> Self {
        Self {
            count_latency: Some(latency),
            ..Self::default()
        }
    }

    pub fn users(&self) -> Vec<User> {
        self.tables.lock().unwrap().users.clone()
    }

    pub fn posts(&self) -> Vec<Post> {
        self.tables.lock().unwrap().posts.clone()
    }

    pub fn comments(&self) -> Vec<Comment> {
        self.tables.lock().unwrap().comments.clone()
    }

    pub fn user_by_email(&self, email: &str) -> Option<User> {
        self.users().into_iter().find(|u| u.email == email)
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn get_posts(&self) -> RepoResult<Vec<Post>> {
        Ok(self.posts())
    }

    async fn get_post(&self, id: i64) -> RepoResult<Option<Post>> {
        Ok(self.posts().into_iter().find(|p| p.id == id))
    }

    async fn create_post(&self, post: NewPost) -> RepoResult<Post> {
        let mut tables = self.tables.lock().unwrap();
        if tables.posts.iter().any(|p| p.title == post.title) {
            return Err(RepoError::Conflict("posts_title_key".to_string()));
        }
        let created = Post {
            id: tables.next_id(),
            title: post.title,
            subtitle: post.subtitle,
            date: post.date,
            body: post.body,
            img_url: post.img_url,
            author_id: post.author_id,
            author_name: post.author_name,
        };
        tables.posts.push(created.clone());
        Ok(created)
    }

    async fn update_post(&self, id: i64, update: PostUpdate) -> RepoResult<Option<Post>> {
        let mut tables = self.tables.lock().unwrap();
        if tables
            .posts
            .iter()
            .any(|p| p.id != id && p.title == update.title)
        {
            return Err(RepoError::Conflict("posts_title_key".to_string()));
        }
        let Some(post) = tables.posts.iter_mut().find(|p| p.id == id) else {
            return Ok(None);
        };
        post.title = update.title;
        post.subtitle = update.subtitle;
        post.body = update.body;
        post.img_url = update.img_url;
        post.author_name = update.author_name;
        Ok(Some(post.clone()))
    }

    async fn delete_post(&self, id: i64) -> RepoResult<bool> {
        let mut tables = self.tables.lock().unwrap();
        let before = tables.posts.len();
        tables.posts.retain(|p| p.id != id);
        let deleted = tables.posts.len() != before;
        if deleted {
            tables.comments.retain(|c| c.post_id != id);
        }
        Ok(deleted)
    }

    async fn get_user(&self, id: i64) -> RepoResult<Option<User>> {
        Ok(self.users().into_iter().find(|u| u.id == id))
    }

    async fn get_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        Ok(self.user_by_email(email))
    }

    async fn count_users(&self) -> RepoResult<i64> {
        let count = self.users().len() as i64;
        if let Some(latency) = self.count_latency {
            tokio::time::sleep(latency).await;
        }
        Ok(count)
    }

    async fn create_user(&self, user: NewUser) -> RepoResult<User> {
        let mut tables = self.tables.lock().unwrap();
        if tables.users.iter().any(|u| u.email == user.email) {
            return Err(RepoError::Conflict("users_email_key".to_string()));
        }
        if user.role == Role::Admin && tables.users.iter().any(User::is_admin) {
            return Err(RepoError::Conflict(SINGLE_ADMIN_INDEX.to_string()));
        }
        let created = User {
            id: tables.next_id(),
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
        };
        tables.users.push(created.clone());
        Ok(created)
    }

    async fn add_comment(&self, post_id: i64, author_id: i64, body: String) -> RepoResult<Comment> {
        let mut tables = self.tables.lock().unwrap();
        let comment = Comment {
            id: tables.next_id(),
            body,
            author_id,
            post_id,
        };
        tables.comments.push(comment.clone());
        Ok(comment)
    }

    async fn get_comments(&self, post_id: i64) -> RepoResult<Vec<CommentView>> {
        let tables = self.tables.lock().unwrap();
        let views = tables
            .comments
            .iter()
            .filter(|c| c.post_id == post_id)
            .map(|c| {
                let author = tables.users.iter().find(|u| u.id == c.author_id);
                CommentView {
                    id: c.id,
                    body: c.body.clone(),
                    author_id: c.author_id,
                    post_id: c.post_id,
                    author_name: author.map(|u| u.name.clone()).unwrap_or_default(),
                    author_email: author.map(|u| u.email.clone()).unwrap_or_default(),
                }
            })
            .collect();
        Ok(views)
    }
}

// --- Application Under Test ---

pub struct TestApp {
    pub address: String,
    pub repo: Arc<InMemoryRepository>,
    pub store: Arc<MemorySessionStore>,
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(AppConfig::default()).await
}

pub async fn spawn_app_with(config: AppConfig) -> TestApp {
    spawn_app_on(Arc::new(InMemoryRepository::default()), config).await
}

/// Serves the full router on an ephemeral port, backed by `repo`.
pub async fn spawn_app_on(repo: Arc<InMemoryRepository>, config: AppConfig) -> TestApp {
    let store = Arc::new(MemorySessionStore::new());

    let state = AppState {
        repo: repo.clone() as RepositoryState,
        sessions: Sessions::new(store.clone(), &config),
        config,
    };
    let router = create_router(state);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    TestApp {
        address,
        repo,
        store,
    }
}

impl TestApp {
    /// A fresh browser: its own cookie jar, redirects not followed.
    pub fn client(&self) -> TestClient {
        let jar = Arc::new(Jar::default());
        let http = reqwest::Client::builder()
            .cookie_provider(jar.clone())
            .redirect(Policy::none())
            .build()
            .expect("Failed to build HTTP client");

        TestClient {
            http,
            jar,
            base: self.address.parse().expect("Invalid test address"),
        }
    }

    /// Seeds a post straight into the repository.
    pub async fn seed_post(&self, title: &str, author_id: i64) -> Post {
        self.repo
            .create_post(NewPost {
                title: title.to_string(),
                subtitle: "A subtitle".to_string(),
                date: "January 01, 2020".to_string(),
                body: "<p>Original body</p>".to_string(),
                img_url: "https://images.example.com/cover.jpg".to_string(),
                author_id,
                author_name: "Original Author".to_string(),
            })
            .await
            .unwrap()
    }

    /// Registers an account through the HTTP flow and returns its logged-in client.
    pub async fn register(&self, name: &str, email: &str) -> TestClient {
        let client = self.client();
        let response = client
            .post_form(
                "/register",
                &[("name", name), ("email", email), ("password", PASSWORD)],
            )
            .await;
        assert_eq!(response.location(), Some("/"), "registration failed");
        client
    }

    /// The first account registered without ADMIN_EMAIL is the admin.
    pub async fn admin(&self) -> (TestClient, User) {
        let client = self.register("Admin", "admin@example.com").await;
        let user = self.repo.user_by_email("admin@example.com").unwrap();
        assert_eq!(user.role, Role::Admin);
        (client, user)
    }

    pub async fn reader(&self, name: &str, email: &str) -> (TestClient, User) {
        let client = self.register(name, email).await;
        let user = self.repo.user_by_email(email).unwrap();
        assert_eq!(user.role, Role::Reader);
        (client, user)
    }
}

// --- Cookie-Carrying Client ---

pub struct TestClient {
    http: reqwest::Client,
    jar: Arc<Jar>,
    base: Url,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub location: Option<String>,
    pub body: String,
}

impl TestResponse {
    async fn read(response: reqwest::Response) -> Self {
        let status = response.status();
        let location = response
            .headers()
            .get(LOCATION)
            .map(|v| v.to_str().unwrap().to_string());
        let body = response.text().await.expect("Failed to read body");

        TestResponse {
            status,
            location,
            body,
        }
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    pub fn assert_redirect(&self, to: &str) {
        assert_eq!(self.status, StatusCode::SEE_OTHER, "body: {}", self.body);
        assert_eq!(self.location(), Some(to));
    }
}

impl TestClient {
    /// Overwrites the session cookie with an arbitrary token.
    pub fn set_cookie(&self, token: &str) {
        self.jar
            .add_cookie_str(&format!("session={token}; Path=/"), &self.base);
    }

    pub fn has_session_cookie(&self) -> bool {
        self.jar
            .cookies(&self.base)
            .is_some_and(|header| header.to_str().unwrap().contains("session="))
    }

    pub async fn get(&self, path: &str) -> TestResponse {
        let response = self
            .http
            .get(self.url(path))
            .send()
            .await
            .expect("GET request failed");
        TestResponse::read(response).await
    }

    pub async fn post_form(&self, path: &str, fields: &[(&str, &str)]) -> TestResponse {
        let response = self
            .http
            .post(self.url(path))
            .form(fields)
            .send()
            .await
            .expect("POST request failed");
        TestResponse::read(response).await
    }

    fn url(&self, path: &str) -> Url {
        self.base.join(path).expect("Invalid request path")
    }
}
