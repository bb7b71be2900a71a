mod common;

use axum::http::StatusCode;
use common::{InMemoryRepository, PASSWORD, spawn_app, spawn_app_on, spawn_app_with};
use quill_blog::{
    AppConfig,
    models::Role,
    session::{MemorySessionStore, Sessions},
};
use std::{sync::Arc, time::Duration};
use uuid::Uuid;

#[tokio::test]
async fn test_register_creates_account_and_logs_in() {
    let app = spawn_app().await;
    let client = app.client();

    let response = client
        .post_form(
            "/register",
            &[
                ("name", "Ann"),
                ("email", "  Ann@Example.com "),
                ("password", PASSWORD),
            ],
        )
        .await;
    response.assert_redirect("/");

    let user = app.repo.user_by_email("ann@example.com").unwrap();
    assert_eq!(user.name, "Ann");
    assert_ne!(user.password_hash, PASSWORD);
    assert!(user.password_hash.starts_with("$argon2"));

    let home = client.get("/").await;
    assert_eq!(home.status, StatusCode::OK);
    assert!(home.body.contains("Log Out"));
    assert!(home.body.contains("Ann"));
}

#[tokio::test]
async fn test_first_account_is_admin_and_later_ones_are_readers() {
    let app = spawn_app().await;
    app.admin().await;
    app.reader("Bob", "bob@example.com").await;

    let roles: Vec<Role> = app.repo.users().iter().map(|u| u.role).collect();
    assert_eq!(roles, vec![Role::Admin, Role::Reader]);
}

#[tokio::test]
async fn test_admin_email_decides_the_admin() {
    let app = spawn_app_with(AppConfig {
        admin_email: Some("boss@example.com".to_string()),
        ..AppConfig::default()
    })
    .await;

    app.register("First", "first@example.com").await;
    app.register("Boss", "Boss@example.com").await;

    assert_eq!(
        app.repo.user_by_email("first@example.com").unwrap().role,
        Role::Reader
    );
    assert_eq!(
        app.repo.user_by_email("boss@example.com").unwrap().role,
        Role::Admin
    );
}

#[tokio::test]
async fn test_concurrent_first_registrations_yield_one_admin() {
    // Both requests see an empty table before either insert lands.
    let repo = Arc::new(InMemoryRepository::with_count_latency(Duration::from_millis(50)));
    let app = spawn_app_on(repo, AppConfig::default()).await;
    let (first, second) = (app.client(), app.client());

    let (first_response, second_response) = tokio::join!(
        first.post_form(
            "/register",
            &[("name", "Ann"), ("email", "ann@example.com"), ("password", PASSWORD)],
        ),
        second.post_form(
            "/register",
            &[("name", "Bob"), ("email", "bob@example.com"), ("password", PASSWORD)],
        ),
    );
    first_response.assert_redirect("/");
    second_response.assert_redirect("/");

    let users = app.repo.users();
    assert_eq!(users.len(), 2);
    assert_eq!(users.iter().filter(|u| u.role == Role::Admin).count(), 1);
}

#[tokio::test]
async fn test_duplicate_email_redirects_to_login_without_session() {
    let app = spawn_app().await;
    app.register("Ann", "ann@example.com").await;

    let client = app.client();
    let response = client
        .post_form(
            "/register",
            &[
                ("name", "Impostor"),
                ("email", "ANN@example.com"),
                ("password", "other"),
            ],
        )
        .await;
    response.assert_redirect("/login");
    assert_eq!(app.repo.users().len(), 1);
    assert_eq!(app.repo.users()[0].name, "Ann");

    let login = client.get("/login").await;
    assert!(login.body.contains("already signed up with that email"));
    assert!(!login.body.contains("Log Out"));

    // The warning is shown exactly once.
    let again = client.get("/login").await;
    assert!(!again.body.contains("already signed up with that email"));
}

#[tokio::test]
async fn test_register_with_missing_fields_rerenders_form() {
    let app = spawn_app().await;
    let client = app.client();

    let response = client
        .post_form("/register", &[("email", "not-an-email"), ("name", "")])
        .await;

    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(response.body.contains("This field is required."));
    assert!(response.body.contains("Invalid email address."));
    assert!(response.body.contains("not-an-email"));
    assert!(app.repo.users().is_empty());
    assert!(!client.has_session_cookie());
}

#[tokio::test]
async fn test_login_with_correct_password() {
    let app = spawn_app().await;
    let first = app.register("Ann", "ann@example.com").await;
    first.get("/logout").await;

    let client = app.client();
    let response = client
        .post_form(
            "/login",
            &[("email", "ann@example.com"), ("password", PASSWORD)],
        )
        .await;
    response.assert_redirect("/");

    let home = client.get("/").await;
    assert!(home.body.contains("Log Out"));
}

#[tokio::test]
async fn test_login_with_wrong_password_stays_anonymous() {
    let app = spawn_app().await;
    app.register("Ann", "ann@example.com").await;

    let client = app.client();
    let response = client
        .post_form(
            "/login",
            &[("email", "ann@example.com"), ("password", "wrong")],
        )
        .await;
    response.assert_redirect("/login");

    let login = client.get("/login").await;
    assert!(login.body.contains("Password incorrect, please try again."));
    assert!(!login.body.contains("Log Out"));
}

#[tokio::test]
async fn test_login_with_unknown_email_points_to_registration() {
    let app = spawn_app().await;
    let client = app.client();

    let response = client
        .post_form(
            "/login",
            &[("email", "ghost@example.com"), ("password", PASSWORD)],
        )
        .await;
    response.assert_redirect("/register");

    let register = client.get("/register").await;
    assert!(
        register
            .body
            .contains("That email does not exist, please try again.")
    );
}

#[tokio::test]
async fn test_login_rotates_the_session_token() {
    let app = spawn_app().await;
    app.register("Ann", "ann@example.com").await;

    let client = app.client();
    client
        .post_form(
            "/login",
            &[("email", "ann@example.com"), ("password", "wrong")],
        )
        .await;
    assert!(client.has_session_cookie());
    assert_eq!(app.store.len().await, 2);

    client
        .post_form(
            "/login",
            &[("email", "ann@example.com"), ("password", PASSWORD)],
        )
        .await;

    // The anonymous flash session was replaced, not kept alongside.
    assert_eq!(app.store.len().await, 2);
    let home = client.get("/").await;
    assert!(home.body.contains("Log Out"));
}

#[tokio::test]
async fn test_failed_logins_reuse_one_anonymous_session() {
    let app = spawn_app().await;
    app.register("Ann", "ann@example.com").await;
    let wrong = [("email", "ann@example.com"), ("password", "wrong")];

    let client = app.client();
    client.post_form("/login", &wrong).await;
    client.post_form("/login", &wrong).await;
    client.post_form("/login", &wrong).await;
    assert_eq!(app.store.len().await, 2);

    // Entries are not expired, so every cookieless visitor adds one.
    app.client().post_form("/login", &wrong).await;
    assert_eq!(app.store.len().await, 3);
}

#[tokio::test]
async fn test_logout_twice_is_harmless() {
    let app = spawn_app().await;
    let client = app.register("Ann", "ann@example.com").await;

    client.get("/logout").await.assert_redirect("/");
    assert!(!client.has_session_cookie());
    assert!(app.store.is_empty().await);

    client.get("/logout").await.assert_redirect("/");

    let home = client.get("/").await;
    assert_eq!(home.status, StatusCode::OK);
    assert!(!home.body.contains("Log Out"));
}

#[tokio::test]
async fn test_forged_or_foreign_cookie_is_anonymous() {
    let app = spawn_app().await;
    app.register("Ann", "ann@example.com").await;

    let client = app.client();
    client.set_cookie("not.a.token");
    let home = client.get("/").await;
    assert_eq!(home.status, StatusCode::OK);
    assert!(!home.body.contains("Log Out"));

    // Correctly shaped, but signed with someone else's key.
    let foreign = Sessions::new(
        Arc::new(MemorySessionStore::new()),
        &AppConfig {
            secret_key: "some-other-deployment-secret".to_string(),
            ..AppConfig::default()
        },
    );
    client.set_cookie(&foreign.sign(Uuid::new_v4()).unwrap());
    let home = client.get("/").await;
    assert!(!home.body.contains("Log Out"));
}
