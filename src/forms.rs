//! Form payloads and their structural validation.
//!
//! Validation only checks presence and shape. Uniqueness is the database's job.
//! Every form deserializes missing fields as empty strings so that a field left out
//! of the body is reported inline like any other empty field.

use axum::http::Uri;
use serde::Deserialize;
use std::collections::BTreeMap;

use crate::models::{NewPost, Post, PostUpdate};

pub const REQUIRED: &str = "This field is required.";
pub const INVALID_EMAIL: &str = "Invalid email address.";
pub const INVALID_URL: &str = "Invalid URL.";
pub const TOO_LONG: &str = "Field cannot be longer than 250 characters.";

/// Width of the `VARCHAR(250)` post columns.
const FIELD_MAX_LENGTH: usize = 250;

/// Maximum email length (RFC 5321)
const EMAIL_MAX_LENGTH: usize = 254;

/// FormErrors
///
/// Field name to the messages shown under that field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormErrors {
    fields: BTreeMap<&'static str, Vec<String>>,
}

impl FormErrors {
    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.fields.entry(field).or_default().push(message.into());
    }

    pub fn get(&self, field: &str) -> &[String] {
        self.fields.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has(&self, field: &str) -> bool {
        !self.get(field).is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn required(&mut self, field: &'static str, value: &str) -> bool {
        if value.trim().is_empty() {
            self.add(field, REQUIRED);
            false
        } else {
            true
        }
    }

    fn max_length(&mut self, field: &'static str, value: &str) {
        if value.trim().chars().count() > FIELD_MAX_LENGTH {
            self.add(field, TOO_LONG);
        }
    }

    fn finish(self) -> Result<(), FormErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RegisterForm {
    pub email: String,
    pub password: String,
    pub name: String,
}

impl RegisterForm {
    pub fn validate(&self) -> Result<(), FormErrors> {
        let mut errors = FormErrors::default();
        if errors.required("email", &self.email) && !is_valid_email(&self.email) {
            errors.add("email", INVALID_EMAIL);
        }
        errors.required("password", &self.password);
        errors.required("name", &self.name);
        errors.finish()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

impl LoginForm {
    pub fn validate(&self) -> Result<(), FormErrors> {
        let mut errors = FormErrors::default();
        errors.required("email", &self.email);
        errors.required("password", &self.password);
        errors.finish()
    }
}

/// PostForm
///
/// Used for both creating and editing. `author` is the byline shown on the post.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PostForm {
    pub title: String,
    pub subtitle: String,
    pub author: String,
    pub img_url: String,
    pub body: String,
}

impl PostForm {
    pub fn validate(&self) -> Result<(), FormErrors> {
        let mut errors = FormErrors::default();
        errors.required("title", &self.title);
        errors.required("subtitle", &self.subtitle);
        errors.required("author", &self.author);
        if errors.required("img_url", &self.img_url) && !is_valid_url(&self.img_url) {
            errors.add("img_url", INVALID_URL);
        }
        errors.required("body", &self.body);
        for (field, value) in [
            ("title", &self.title),
            ("subtitle", &self.subtitle),
            ("img_url", &self.img_url),
        ] {
            errors.max_length(field, value);
        }
        errors.finish()
    }

    pub fn into_new_post(self, author_id: i64, date: String) -> NewPost {
        NewPost {
            title: self.title.trim().to_string(),
            subtitle: self.subtitle.trim().to_string(),
            date,
            body: self.body,
            img_url: self.img_url.trim().to_string(),
            author_id,
            author_name: self.author.trim().to_string(),
        }
    }

    pub fn into_update(self) -> PostUpdate {
        PostUpdate {
            title: self.title.trim().to_string(),
            subtitle: self.subtitle.trim().to_string(),
            body: self.body,
            img_url: self.img_url.trim().to_string(),
            author_name: self.author.trim().to_string(),
        }
    }
}

impl From<&Post> for PostForm {
    /// Pre-fills the edit form with the stored values.
    fn from(post: &Post) -> Self {
        Self {
            title: post.title.clone(),
            subtitle: post.subtitle.clone(),
            author: post.author_name.clone(),
            img_url: post.img_url.clone(),
            body: post.body.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CommentForm {
    pub body: String,
}

impl CommentForm {
    pub fn validate(&self) -> Result<(), FormErrors> {
        let mut errors = FormErrors::default();
        errors.required("body", &self.body);
        errors.finish()
    }
}

/// Normalized form of an email for storage and lookup.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Basic email shape: one `@`, a non-empty local part, and a dotted domain.
pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    if email.len() > EMAIL_MAX_LENGTH {
        return false;
    }

    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };

    if local.is_empty() || local.len() > 64 || local.chars().any(char::is_whitespace) {
        return false;
    }

    if domain.is_empty() || !domain.contains('.') || domain.contains('@') {
        return false;
    }

    if !domain
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
    {
        return false;
    }

    !(domain.starts_with('.')
        || domain.ends_with('.')
        || domain.starts_with('-')
        || domain.ends_with('-')
        || domain.contains(".."))
}

/// An absolute `http`/`https` URL with a host.
pub fn is_valid_url(url: &str) -> bool {
    let Ok(uri) = url.trim().parse::<Uri>() else {
        return false;
    };

    let scheme_ok = matches!(uri.scheme_str(), Some("http") | Some("https"));
    let host_ok = uri.host().is_some_and(|host| !host.is_empty());
    scheme_ok && host_ok
}
