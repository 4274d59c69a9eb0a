//! Plain-text rendering for the console client.

use super::{Notice, NoticeLevel, View};

fn notice_line(notice: &Notice) -> String {
    let marker = match notice.level {
        NoticeLevel::Info => "*",
        NoticeLevel::Alert => "!",
        NoticeLevel::Error => "x",
    };
    format!("{marker} {}", notice.message)
}

/// Renders `view` as terminal lines.
pub fn render_text(view: &View) -> Vec<String> {
    let mut lines = Vec::new();
    match view {
        View::Loading => lines.push("Loading...".to_string()),
        View::Login {
            title,
            action,
            notice,
            ..
        } => {
            lines.push(title.clone());
            lines.push(String::new());
            lines.push(format!("  [login] {action}"));
            if let Some(notice) = notice {
                lines.push(notice_line(notice));
            }
        }
        View::Home {
            title,
            greeting,
            email,
            form,
            items,
            notice,
            ..
        } => {
            lines.push(format!("{title}    [logout]"));
            match email {
                Some(email) if !greeting.ends_with(email.as_str()) => {
                    lines.push(format!("{greeting} <{email}>"))
                }
                _ => lines.push(greeting.clone()),
            }
            lines.push(String::new());

            let editing = match &form.editing {
                Some(_) => " (editing, `cancel` to stop)",
                None => "",
            };
            lines.push(format!(
                "  Title: {:<24} URL: {:<32} [{}]{}",
                shown(&form.title),
                shown(&form.url),
                form.submit_label,
                editing
            ));
            if let Some(notice) = notice {
                lines.push(notice_line(notice));
            }
            lines.push(String::new());

            if items.is_empty() {
                lines.push("  No bookmarks yet.".to_string());
            }
            for item in items {
                let marker = if item.editing { ">" } else { " " };
                lines.push(format!("{marker}{:>3}. {}", item.index, item.title));
                lines.push(format!("      {}", item.url));
            }
        }
    }
    lines
}

fn shown(field: &str) -> &str {
    if field.is_empty() {
        "_"
    } else {
        field
    }
}
