use crate::{
    AppState,
    auth::{CurrentUser, assign_role},
    error::{AppError, RepoError},
    forms::{CommentForm, FormErrors, LoginForm, PostForm, RegisterForm, normalize_email},
    models::{NewUser, Role},
    password,
    repository::SINGLE_ADMIN_INDEX,
    session::FlashLevel,
    views::{self, Page},
};
use axum::{
    Form,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use chrono::{Local, NaiveDate};
use maud::Markup;

// --- Flash Messages ---

pub const MSG_EMAIL_TAKEN: &str = "You've already signed up with that email, log in instead!";
pub const MSG_UNKNOWN_EMAIL: &str = "That email does not exist, please try again.";
pub const MSG_WRONG_PASSWORD: &str = "Password incorrect, please try again.";
pub const MSG_LOGIN_TO_COMMENT: &str = "You need to login or register to comment.";
pub const MSG_TITLE_TAKEN: &str = "A post with that title already exists.";

// --- Helpers ---

/// Formats a post's creation date, e.g. "March 05, 2026".
pub fn format_post_date(date: NaiveDate) -> String {
    date.format("%B %d, %Y").to_string()
}

/// Page context for a rendered view. Consumes the pending flash messages.
async fn page_context<'a>(
    state: &AppState,
    jar: &CookieJar,
    current: &'a CurrentUser,
) -> Page<'a> {
    Page::new(current, state.sessions.take_flashes(jar).await)
}

/// A form re-rendered with inline errors.
fn invalid(markup: Markup) -> Response {
    (StatusCode::UNPROCESSABLE_ENTITY, markup).into_response()
}

// --- Public Pages ---

/// get_all_posts
///
/// [Public Route] The front page: every post.
pub async fn get_all_posts(
    State(state): State<AppState>,
    jar: CookieJar,
    current: CurrentUser,
) -> Result<Markup, AppError> {
    let posts = state.repo.get_posts().await?;
    let page = page_context(&state, &jar, &current).await;
    Ok(views::index(&page, &posts))
}

pub async fn about(
    State(state): State<AppState>,
    jar: CookieJar,
    current: CurrentUser,
) -> Markup {
    let page = page_context(&state, &jar, &current).await;
    views::about_page(&page)
}

pub async fn contact(
    State(state): State<AppState>,
    jar: CookieJar,
    current: CurrentUser,
) -> Markup {
    let page = page_context(&state, &jar, &current).await;
    views::contact_page(&page)
}

/// not_found
///
/// Fallback for unknown paths.
pub async fn not_found() -> AppError {
    AppError::NotFound
}

// --- Registration & Login ---

pub async fn register_form(
    State(state): State<AppState>,
    jar: CookieJar,
    current: CurrentUser,
) -> Markup {
    let page = page_context(&state, &jar, &current).await;
    views::register_page(&page, &RegisterForm::default(), &FormErrors::default())
}

/// register
///
/// [Public Route] Creates an account and logs it in.
///
/// *Flow*: validate → hash → insert. A duplicate email is rejected by the unique
/// index inside the single INSERT, so nothing is written and no session is created;
/// the caller is sent to the login page with a warning instead.
///
/// The role is decided before the insert but enforced by the database: a second
/// admin insert fails on `SINGLE_ADMIN_INDEX` and is retried as a reader.
pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    current: CurrentUser,
    Form(form): Form<RegisterForm>,
) -> Result<Response, AppError> {
    if let Err(errors) = form.validate() {
        let page = page_context(&state, &jar, &current).await;
        return Ok(invalid(views::register_page(&page, &form, &errors)));
    }

    let email = normalize_email(&form.email);
    let existing_users = state.repo.count_users().await?;
    let role = assign_role(&state.config, &email, existing_users);
    let password_hash = password::hash_password(&form.password)?;

    let new_user = NewUser {
        name: form.name.trim().to_string(),
        email,
        password_hash,
        role,
    };

    let created = match state.repo.create_user(new_user.clone()).await {
        Err(RepoError::Conflict(index)) if index == SINGLE_ADMIN_INDEX => {
            tracing::info!("admin already claimed; registering as reader");
            let reader = NewUser {
                role: Role::Reader,
                ..new_user
            };
            state.repo.create_user(reader).await
        }
        other => other,
    };

    match created {
        Ok(user) => {
            tracing::info!(user_id = user.id, role = %user.role, "user registered");
            let jar = state.sessions.login(jar, user.id).await?;
            Ok((jar, Redirect::to("/")).into_response())
        }
        Err(RepoError::Conflict(_)) => {
            tracing::info!("registration rejected: email already registered");
            let jar = state
                .sessions
                .flash(jar, FlashLevel::Warning, MSG_EMAIL_TAKEN)
                .await?;
            Ok((jar, Redirect::to("/login")).into_response())
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn login_form(
    State(state): State<AppState>,
    jar: CookieJar,
    current: CurrentUser,
) -> Markup {
    let page = page_context(&state, &jar, &current).await;
    views::login_page(&page, &LoginForm::default(), &FormErrors::default())
}

/// login
///
/// [Public Route] Checks credentials and establishes a session.
///
/// An unknown email sends the caller to registration, a wrong password back to the
/// login form. Neither path touches the session beyond queuing the flash message.
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    current: CurrentUser,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    if let Err(errors) = form.validate() {
        let page = page_context(&state, &jar, &current).await;
        return Ok(invalid(views::login_page(&page, &form, &errors)));
    }

    let email = normalize_email(&form.email);
    let Some(user) = state.repo.get_user_by_email(&email).await? else {
        tracing::info!("login failed: unknown email");
        let jar = state
            .sessions
            .flash(jar, FlashLevel::Warning, MSG_UNKNOWN_EMAIL)
            .await?;
        return Ok((jar, Redirect::to("/register")).into_response());
    };

    if !password::verify_password(&form.password, &user.password_hash) {
        tracing::info!(user_id = user.id, "login failed: wrong password");
        let jar = state
            .sessions
            .flash(jar, FlashLevel::Warning, MSG_WRONG_PASSWORD)
            .await?;
        return Ok((jar, Redirect::to("/login")).into_response());
    }

    tracing::info!(user_id = user.id, "user logged in");
    let jar = state.sessions.login(jar, user.id).await?;
    Ok((jar, Redirect::to("/")).into_response())
}

/// logout
///
/// Always succeeds, with or without a session.
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> impl IntoResponse {
    let jar = state.sessions.logout(jar).await;
    (jar, Redirect::to("/"))
}

// --- Posts & Comments ---

/// show_post
///
/// [Public Route] One post with its own comments and a blank comment form.
pub async fn show_post(
    State(state): State<AppState>,
    jar: CookieJar,
    current: CurrentUser,
    Path(post_id): Path<i64>,
) -> Result<Markup, AppError> {
    let post = state.repo.get_post(post_id).await?.ok_or(AppError::NotFound)?;
    let comments = state.repo.get_comments(post_id).await?;
    let page = page_context(&state, &jar, &current).await;

    Ok(views::post_page(
        &page,
        &post,
        &comments,
        &CommentForm::default(),
        &FormErrors::default(),
    ))
}

/// add_comment
///
/// [Authenticated Write] Attaches a comment to the post and the current user.
/// Anonymous callers are redirected to the login page and nothing is stored.
pub async fn add_comment(
    State(state): State<AppState>,
    jar: CookieJar,
    current: CurrentUser,
    Path(post_id): Path<i64>,
    Form(form): Form<CommentForm>,
) -> Result<Response, AppError> {
    let post = state.repo.get_post(post_id).await?.ok_or(AppError::NotFound)?;

    let Some(author_id) = current.id() else {
        let jar = state
            .sessions
            .flash(jar, FlashLevel::Warning, MSG_LOGIN_TO_COMMENT)
            .await?;
        return Ok((jar, Redirect::to("/login")).into_response());
    };

    if let Err(errors) = form.validate() {
        let comments = state.repo.get_comments(post_id).await?;
        let page = page_context(&state, &jar, &current).await;
        return Ok(invalid(views::post_page(
            &page, &post, &comments, &form, &errors,
        )));
    }

    let comment = state
        .repo
        .add_comment(post_id, author_id, form.body.trim().to_string())
        .await?;
    tracing::info!(comment_id = comment.id, post_id, author_id, "comment added");

    Ok(Redirect::to(&format!("/post/{post_id}")).into_response())
}

// --- Admin ---

pub async fn new_post_form(
    State(state): State<AppState>,
    jar: CookieJar,
    current: CurrentUser,
) -> Markup {
    let page = page_context(&state, &jar, &current).await;
    views::make_post_page(&page, &PostForm::default(), &FormErrors::default(), None)
}

/// create_post
///
/// [Admin Route] Publishes a post authored by the current admin, dated today.
pub async fn create_post(
    State(state): State<AppState>,
    jar: CookieJar,
    current: CurrentUser,
    Form(form): Form<PostForm>,
) -> Result<Response, AppError> {
    // The role guard has already admitted the caller.
    let author_id = current.id().ok_or(AppError::Forbidden)?;

    if let Err(errors) = form.validate() {
        let page = page_context(&state, &jar, &current).await;
        return Ok(invalid(views::make_post_page(&page, &form, &errors, None)));
    }

    let date = format_post_date(Local::now().date_naive());
    match state.repo.create_post(form.into_new_post(author_id, date)).await {
        Ok(post) => {
            tracing::info!(post_id = post.id, author_id, "post created");
            Ok(Redirect::to("/").into_response())
        }
        Err(RepoError::Conflict(_)) => {
            let jar = state
                .sessions
                .flash(jar, FlashLevel::Warning, MSG_TITLE_TAKEN)
                .await?;
            Ok((jar, Redirect::to("/new-post")).into_response())
        }
        Err(e) => Err(e.into()),
    }
}

/// edit_post_form
///
/// [Admin Route] The edit form, pre-filled with the stored post.
pub async fn edit_post_form(
    State(state): State<AppState>,
    jar: CookieJar,
    current: CurrentUser,
    Path(post_id): Path<i64>,
) -> Result<Markup, AppError> {
    let post = state.repo.get_post(post_id).await?.ok_or(AppError::NotFound)?;
    let page = page_context(&state, &jar, &current).await;
    Ok(views::make_post_page(
        &page,
        &PostForm::from(&post),
        &FormErrors::default(),
        Some(post.id),
    ))
}

/// edit_post
///
/// [Admin Route] Overwrites title, subtitle, image, byline and body in place.
/// The original date is kept.
pub async fn edit_post(
    State(state): State<AppState>,
    jar: CookieJar,
    current: CurrentUser,
    Path(post_id): Path<i64>,
    Form(form): Form<PostForm>,
) -> Result<Response, AppError> {
    if state.repo.get_post(post_id).await?.is_none() {
        return Err(AppError::NotFound);
    }

    if let Err(errors) = form.validate() {
        let page = page_context(&state, &jar, &current).await;
        return Ok(invalid(views::make_post_page(
            &page,
            &form,
            &errors,
            Some(post_id),
        )));
    }

    match state.repo.update_post(post_id, form.into_update()).await {
        Ok(Some(post)) => {
            tracing::info!(post_id = post.id, "post updated");
            Ok(Redirect::to(&format!("/post/{}", post.id)).into_response())
        }
        // Deleted between the lookup and the update.
        Ok(None) => Err(AppError::NotFound),
        Err(RepoError::Conflict(_)) => {
            let jar = state
                .sessions
                .flash(jar, FlashLevel::Warning, MSG_TITLE_TAKEN)
                .await?;
            Ok((jar, Redirect::to(&format!("/edit-post/{post_id}"))).into_response())
        }
        Err(e) => Err(e.into()),
    }
}

/// delete_post
///
/// [Admin Route] Deletes the post and, by cascade, its comments. No confirmation step.
pub async fn delete_post(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
) -> Result<Redirect, AppError> {
    if state.repo.delete_post(post_id).await? {
        tracing::info!(post_id, "post deleted");
        Ok(Redirect::to("/"))
    } else {
        Err(AppError::NotFound)
    }
}
