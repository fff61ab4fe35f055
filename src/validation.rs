//! Request validation.
//!
//! Each payload is turned into a validated type before any store access.
//! All problems found in one payload are reported together, joined by `", "`.

use crate::error::{AppError, Result};
use crate::models::{CreateNotePayload, LoginPayload, SignupPayload, UpdateNotePayload};
use crate::tags::{normalize, TagInput, TagSet};

pub const TITLE_MAX_CHARS: usize = 200;
const NAME_MIN_CHARS: usize = 2;
const PASSWORD_MIN_CHARS: usize = 8;

#[derive(Debug, Default)]
struct Issues(Vec<String>);

impl Issues {
    fn push(&mut self, message: impl Into<String>) {
        self.0.push(message.into());
    }

    fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn into_error(self) -> AppError {
        AppError::Validation(self.0.join(", "))
    }
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn check_title(title: &str, issues: &mut Issues) {
    if title.chars().count() > TITLE_MAX_CHARS {
        issues.push("Title cannot exceed 200 characters");
    }
}

fn tags_or_issue(input: &TagInput, issues: &mut Issues) -> Option<TagSet> {
    match normalize(input) {
        Ok(tags) => Some(tags),
        Err(err) => {
            issues.push(err.to_string());
            None
        }
    }
}

/// A note that is ready to be inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct NoteDraft {
    pub title: String,
    pub content: String,
    pub tags: TagSet,
}

impl NoteDraft {
    pub fn new(title: &str, content: &str, tags: impl Into<TagInput>) -> Result<Self> {
        Self::from_payload(CreateNotePayload {
            title: Some(title.to_string()),
            content: Some(content.to_string()),
            tags: Some(tags.into()),
        })
    }

    pub fn from_payload(payload: CreateNotePayload) -> Result<Self> {
        let mut issues = Issues::default();

        let title = trimmed(payload.title);
        match &title {
            Some(title) => check_title(title, &mut issues),
            None => issues.push("Title is required"),
        }

        let content = trimmed(payload.content);
        if content.is_none() {
            issues.push("Content is required");
        }

        let tags = match &payload.tags {
            Some(input) => tags_or_issue(input, &mut issues),
            None => {
                issues.push("At least one tag is required");
                None
            }
        };

        match (title, content, tags) {
            (Some(title), Some(content), Some(tags)) if issues.is_empty() => Ok(Self {
                title,
                content,
                tags,
            }),
            _ => Err(issues.into_error()),
        }
    }
}

/// The fields of an update that will actually be written.
///
/// A blank title or content counts as not supplied. Supplied tags replace
/// the stored set wholesale.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NotePatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub tags: Option<TagSet>,
}

impl NotePatch {
    pub fn from_payload(payload: UpdateNotePayload) -> Result<Self> {
        let mut issues = Issues::default();

        let title = trimmed(payload.title);
        if let Some(title) = &title {
            check_title(title, &mut issues);
        }

        let content = trimmed(payload.content);
        let tags = payload
            .tags
            .as_ref()
            .and_then(|input| tags_or_issue(input, &mut issues));

        if !issues.is_empty() {
            return Err(issues.into_error());
        }

        Ok(Self {
            title,
            content,
            tags,
        })
    }
}

/// Loose address check: `local@domain.tld`, no whitespace.
pub fn is_plausible_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignupForm {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl SignupForm {
    pub fn from_payload(payload: SignupPayload) -> Result<Self> {
        let mut issues = Issues::default();

        let name = trimmed(payload.name);
        match &name {
            Some(name) if name.chars().count() < NAME_MIN_CHARS => {
                issues.push("Name must be at least 2 characters long")
            }
            Some(_) => {}
            None => issues.push("Name is required"),
        }

        let email = trimmed(payload.email).filter(|e| is_plausible_email(e));
        if email.is_none() {
            issues.push("Please enter a valid email");
        }

        let password = payload
            .password
            .filter(|p| p.chars().count() >= PASSWORD_MIN_CHARS);
        if password.is_none() {
            issues.push("Password must be at least 8 characters long");
        }

        match (name, email, password) {
            (Some(name), Some(email), Some(password)) if issues.is_empty() => Ok(Self {
                name,
                email,
                password,
            }),
            _ => Err(issues.into_error()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

impl LoginForm {
    pub fn from_payload(payload: LoginPayload) -> Result<Self> {
        let mut issues = Issues::default();

        let email = trimmed(payload.email).filter(|e| is_plausible_email(e));
        if email.is_none() {
            issues.push("Please enter a valid email");
        }

        let password = payload.password.filter(|p| !p.is_empty());
        if password.is_none() {
            issues.push("Password is required");
        }

        match (email, password) {
            (Some(email), Some(password)) => Ok(Self { email, password }),
            _ => Err(issues.into_error()),
        }
    }
}
