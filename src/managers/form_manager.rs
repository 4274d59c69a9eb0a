//! Add/edit form state.
//!
//! ```text
//! Idle --begin_edit--> Editing(id) --submit ok / cancel--> Idle
//! ```

use crate::types::bookmark::{Bookmark, BookmarkId};

pub const ADD_LABEL: &str = "Add";
pub const UPDATE_LABEL: &str = "Update";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FormMode {
    #[default]
    Idle,
    Editing(BookmarkId),
}

/// What submitting the form should do with the current fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    Insert { title: String, url: String },
    Update { id: BookmarkId, title: String, url: String },
}

/// Trait defining add/edit form operations.
pub trait FormManagerTrait {
    fn set_title(&mut self, title: &str);
    fn set_url(&mut self, url: &str);
    fn begin_edit(&mut self, bookmark: &Bookmark);
    fn cancel_edit(&mut self);
    fn submit_label(&self) -> &'static str;
    fn submission(&self) -> Submission;
}

#[derive(Debug, Clone, Default)]
pub struct FormManager {
    title: String,
    url: String,
    mode: FormMode,
}

impl FormManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn mode(&self) -> &FormMode {
        &self.mode
    }

    pub fn editing_id(&self) -> Option<&BookmarkId> {
        match &self.mode {
            FormMode::Editing(id) => Some(id),
            FormMode::Idle => None,
        }
    }

    /// Back to an empty idle form.
    pub fn reset(&mut self) {
        self.title.clear();
        self.url.clear();
        self.mode = FormMode::Idle;
    }

    /// Drops edit mode when the edited record is no longer in `items`.
    /// The typed fields are kept.
    pub fn retain_existing(&mut self, items: &[Bookmark]) -> bool {
        let gone = match &self.mode {
            FormMode::Editing(id) => !items.iter().any(|b| &b.id == id),
            FormMode::Idle => false,
        };
        if gone {
            self.mode = FormMode::Idle;
        }
        gone
    }
}

impl FormManagerTrait for FormManager {
    fn set_title(&mut self, title: &str) {
        self.title = title.to_string();
    }

    fn set_url(&mut self, url: &str) {
        self.url = url.to_string();
    }

    /// Enters edit mode with the fields populated from `bookmark`.
    fn begin_edit(&mut self, bookmark: &Bookmark) {
        self.title = bookmark.title.clone();
        self.url = bookmark.url.clone();
        self.mode = FormMode::Editing(bookmark.id.clone());
    }

    /// Leaves edit mode and clears the fields.
    fn cancel_edit(&mut self) {
        self.reset();
    }

    fn submit_label(&self) -> &'static str {
        match self.mode {
            FormMode::Idle => ADD_LABEL,
            FormMode::Editing(_) => UPDATE_LABEL,
        }
    }

    fn submission(&self) -> Submission {
        let title = self.title.clone();
        let url = self.url.clone();
        match &self.mode {
            FormMode::Idle => Submission::Insert { title, url },
            FormMode::Editing(id) => Submission::Update {
                id: id.clone(),
                title,
                url,
            },
        }
    }
}
