//! HTML views, rendered with maud.
//!
//! Every interpolation is escaped except post bodies, which are admin-authored markup.

use axum::http::StatusCode;
use maud::{DOCTYPE, Markup, PreEscaped, html};
use sha2::{Digest, Sha256};

use crate::{
    auth::CurrentUser,
    forms::{CommentForm, FormErrors, LoginForm, PostForm, RegisterForm},
    models::{CommentView, Post},
    session::Flash,
};

const BOOTSTRAP_CSS: &str = "https://cdn.jsdelivr.net/npm/bootstrap@5.3.3/dist/css/bootstrap.min.css";
const SITE_NAME: &str = "Quill";
const GRAVATAR_BASE: &str = "https://www.gravatar.com/avatar";

/// Page
///
/// What every page needs besides its own content: who is looking, and the flash
/// messages queued for them.
pub struct Page<'a> {
    pub current: &'a CurrentUser,
    pub flashes: Vec<Flash>,
}

impl<'a> Page<'a> {
    pub fn new(current: &'a CurrentUser, flashes: Vec<Flash>) -> Self {
        Self { current, flashes }
    }
}

/// avatar_url
///
/// Gravatar image for a comment author: SHA-256 of the trimmed, lowercased email,
/// 100px, rated G, with a generated "retro" fallback.
pub fn avatar_url(email: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(email.trim().to_lowercase().as_bytes());
    let digest = hex::encode(hasher.finalize());
    format!("{GRAVATAR_BASE}/{digest}?s=100&r=g&d=retro")
}

fn layout(page: &Page<'_>, title: &str, content: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                title { (title) " | " (SITE_NAME) }
                link rel="stylesheet" href=(BOOTSTRAP_CSS);
            }
            body {
                (navbar(page.current))
                main.container."my-4" {
                    @for flash in &page.flashes {
                        div class={ "alert alert-" (flash.level.css_class()) } role="alert" {
                            (flash.message)
                        }
                    }
                    (content)
                }
                footer.container."py-4".text-muted.border-top {
                    small { "© " (SITE_NAME) }
                }
            }
        }
    }
}

fn navbar(current: &CurrentUser) -> Markup {
    html! {
        nav.navbar.navbar-expand.navbar-light.bg-light.border-bottom {
            div.container {
                a.navbar-brand href="/" { (SITE_NAME) }
                ul.navbar-nav.ms-auto {
                    li.nav-item { a.nav-link href="/" { "Home" } }
                    @match current {
                        CurrentUser::Authenticated(user) => {
                            @if user.is_admin() {
                                li.nav-item { a.nav-link href="/new-post" { "New Post" } }
                            }
                            li.nav-item { span.nav-link.disabled { (user.name) } }
                            li.nav-item { a.nav-link href="/logout" { "Log Out" } }
                        },
                        CurrentUser::Anonymous => {
                            li.nav-item { a.nav-link href="/login" { "Login" } }
                            li.nav-item { a.nav-link href="/register" { "Register" } }
                        }
                    }
                    li.nav-item { a.nav-link href="/about" { "About" } }
                    li.nav-item { a.nav-link href="/contact" { "Contact" } }
                }
            }
        }
    }
}

fn text_field(label: &str, name: &str, kind: &str, value: &str, errors: &FormErrors) -> Markup {
    html! {
        div."mb-3" {
            label.form-label for=(name) { (label) }
            input.form-control.is-invalid[errors.has(name)] type=(kind) id=(name) name=(name) value=(value);
            @for message in errors.get(name) {
                div.invalid-feedback { (message) }
            }
        }
    }
}

fn text_area(label: &str, name: &str, value: &str, errors: &FormErrors) -> Markup {
    html! {
        div."mb-3" {
            label.form-label for=(name) { (label) }
            textarea.form-control.is-invalid[errors.has(name)] id=(name) name=(name) rows="8" { (value) }
            @for message in errors.get(name) {
                div.invalid-feedback { (message) }
            }
        }
    }
}

/// index
///
/// The post list.
pub fn index(page: &Page<'_>, posts: &[Post]) -> Markup {
    let is_admin = page.current.is_admin();
    let content = html! {
        header."mb-4" {
            h1 { (SITE_NAME) }
            p.lead { "A collection of random musings." }
        }
        @if posts.is_empty() {
            p.text-muted { "No posts yet." }
        }
        @for post in posts {
            article."mb-4"."pb-3".border-bottom {
                a href={ "/post/" (post.id) } {
                    h2 { (post.title) }
                    h3.h5.text-muted { (post.subtitle) }
                }
                p.small {
                    "Posted by " (post.author_name) " on " (post.date)
                    @if is_admin {
                        " "
                        a.text-danger href={ "/delete/" (post.id) } { "✘" }
                    }
                }
            }
        }
        @if is_admin {
            a.btn.btn-primary href="/new-post" { "Create New Post" }
        }
    };
    layout(page, "Home", content)
}

/// post_page
///
/// A single post, its comments and the comment form.
pub fn post_page(
    page: &Page<'_>,
    post: &Post,
    comments: &[CommentView],
    form: &CommentForm,
    errors: &FormErrors,
) -> Markup {
    let content = html! {
        article {
            img.img-fluid."mb-3" src=(post.img_url) alt=(post.title);
            h1 { (post.title) }
            h2.h4.text-muted { (post.subtitle) }
            p.small { "Posted by " (post.author_name) " on " (post.date) }
            div.post-body { (PreEscaped(&post.body)) }
        }
        @if page.current.is_admin() {
            a.btn.btn-outline-primary."mb-4" href={ "/edit-post/" (post.id) } { "Edit Post" }
        }
        hr;
        form method="post" action={ "/post/" (post.id) } {
            (text_area("Comment", "body", &form.body, errors))
            button.btn.btn-primary type="submit" { "Submit Comment" }
        }
        section."mt-4" {
            ul.list-unstyled {
                @for comment in comments {
                    li.d-flex."mb-3" {
                        img.rounded-circle."me-3" src=(avatar_url(&comment.author_email)) width="48" height="48" alt="";
                        div {
                            p."mb-1" { (comment.body) }
                            small.text-muted { (comment.author_name) }
                        }
                    }
                }
            }
        }
    };
    layout(page, &post.title, content)
}

pub fn register_page(page: &Page<'_>, form: &RegisterForm, errors: &FormErrors) -> Markup {
    let content = html! {
        h1 { "Register" }
        p.lead { "Start contributing to the blog!" }
        form method="post" action="/register" novalidate {
            (text_field("Email", "email", "email", &form.email, errors))
            (text_field("Password", "password", "password", "", errors))
            (text_field("Name", "name", "text", &form.name, errors))
            button.btn.btn-primary type="submit" { "Sign Me Up!" }
        }
    };
    layout(page, "Register", content)
}

pub fn login_page(page: &Page<'_>, form: &LoginForm, errors: &FormErrors) -> Markup {
    let content = html! {
        h1 { "Log In" }
        p.lead { "Welcome back!" }
        form method="post" action="/login" novalidate {
            (text_field("Email", "email", "email", &form.email, errors))
            (text_field("Password", "password", "password", "", errors))
            button.btn.btn-primary type="submit" { "Let Me In!" }
        }
    };
    layout(page, "Log In", content)
}

/// make_post_page
///
/// The create form, or the edit form when `editing` names the post being edited.
pub fn make_post_page(
    page: &Page<'_>,
    form: &PostForm,
    errors: &FormErrors,
    editing: Option<i64>,
) -> Markup {
    let (heading, action) = match editing {
        Some(id) => ("Edit Post", format!("/edit-post/{id}")),
        None => ("New Post", "/new-post".to_string()),
    };
    let content = html! {
        h1 { (heading) }
        form method="post" action=(action) novalidate {
            (text_field("Blog Post Title", "title", "text", &form.title, errors))
            (text_field("Subtitle", "subtitle", "text", &form.subtitle, errors))
            (text_field("Your Name", "author", "text", &form.author, errors))
            (text_field("Blog Image URL", "img_url", "url", &form.img_url, errors))
            (text_area("Blog Content", "body", &form.body, errors))
            button.btn.btn-primary type="submit" { "Submit Post" }
        }
    };
    layout(page, heading, content)
}

pub fn about_page(page: &Page<'_>) -> Markup {
    let content = html! {
        h1 { "About Me" }
        p { "A small blog about code, books and everything in between." }
    };
    layout(page, "About", content)
}

pub fn contact_page(page: &Page<'_>) -> Markup {
    let content = html! {
        h1 { "Contact Me" }
        p { "Have questions? I have answers." }
    };
    layout(page, "Contact", content)
}

/// error_page
///
/// Rendered for every `AppError`. Identity is not resolved here, so the page is
/// always drawn for an anonymous visitor.
pub fn error_page(status: StatusCode) -> Markup {
    let anonymous = CurrentUser::Anonymous;
    let page = Page::new(&anonymous, Vec::new());
    let reason = status.canonical_reason().unwrap_or("Error");
    let content = html! {
        h1 { (status.as_u16()) " " (reason) }
        p { a href="/" { "Back to the front page" } }
    };
    layout(&page, reason, content)
}
