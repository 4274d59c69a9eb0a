//! View model.
//!
//! [`compose`] is a pure function of controller state. The console client
//! prints it through [`renderer::render_text`]; the RPC bridge sends it as
//! JSON.

pub mod renderer;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::managers::form_manager::{FormManager, FormManagerTrait};
use crate::types::bookmark::{Bookmark, BookmarkId};
use crate::types::session::Session;

pub const APP_TITLE: &str = "Smart Bookmark App";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    /// Input was rejected.
    Alert,
    /// A backend request failed.
    Error,
}

/// One-line message shown above the list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn alert(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Alert,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormView {
    pub title: String,
    pub url: String,
    pub submit_label: String,
    pub editing: Option<BookmarkId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookmarkView {
    /// 1-based position, used by the console commands.
    pub index: usize,
    pub id: BookmarkId,
    pub title: String,
    pub url: String,
    pub created_at: DateTime<Utc>,
    pub editing: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "screen", rename_all = "snake_case")]
pub enum View {
    Loading,
    Login {
        title: String,
        provider: String,
        action: String,
        notice: Option<Notice>,
    },
    Home {
        title: String,
        greeting: String,
        email: Option<String>,
        avatar_url: Option<String>,
        form: FormView,
        items: Vec<BookmarkView>,
        notice: Option<Notice>,
    },
}

impl View {
    pub fn is_login(&self) -> bool {
        matches!(self, View::Login { .. })
    }

    pub fn items(&self) -> &[BookmarkView] {
        match self {
            View::Home { items, .. } => items,
            _ => &[],
        }
    }

    pub fn notice(&self) -> Option<&Notice> {
        match self {
            View::Login { notice, .. } | View::Home { notice, .. } => notice.as_ref(),
            View::Loading => None,
        }
    }

    pub fn form(&self) -> Option<&FormView> {
        match self {
            View::Home { form, .. } => Some(form),
            _ => None,
        }
    }
}

/// Everything the view depends on.
pub struct ViewInput<'a> {
    pub loading: bool,
    pub session: Option<&'a Session>,
    pub items: &'a [Bookmark],
    pub form: &'a FormManager,
    pub notice: Option<&'a Notice>,
    pub provider: &'a str,
}

/// "Continue with Google" for provider `google`.
pub fn login_action(provider: &str) -> String {
    let mut chars = provider.chars();
    let name = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
        None => "provider".to_string(),
    };
    format!("Continue with {name}")
}

pub fn compose(input: &ViewInput<'_>) -> View {
    if input.loading {
        return View::Loading;
    }
    let notice = input.notice.cloned();
    let Some(session) = input.session else {
        return View::Login {
            title: APP_TITLE.to_string(),
            provider: input.provider.to_string(),
            action: login_action(input.provider),
            notice,
        };
    };

    let editing = input.form.editing_id();
    let items = input
        .items
        .iter()
        .enumerate()
        .map(|(i, b)| BookmarkView {
            index: i + 1,
            id: b.id.clone(),
            title: b.title.clone(),
            url: b.url.clone(),
            created_at: b.created_at,
            editing: editing == Some(&b.id),
        })
        .collect();

    View::Home {
        title: APP_TITLE.to_string(),
        greeting: format!("Hi, {}", session.greeting_name()),
        email: session.user.email.clone(),
        avatar_url: session.user.avatar_url.clone(),
        form: FormView {
            title: input.form.title().to_string(),
            url: input.form.url().to_string(),
            submit_label: input.form.submit_label().to_string(),
            editing: editing.cloned(),
        },
        items,
        notice,
    }
}
