use chrono::{DateTime, Local, Utc};
use regex::Regex;
use std::sync::OnceLock;
use unicode_width::UnicodeWidthStr;

use crate::models::{ConversationSummary, Message, Peer};
use crate::utils::truncate_to_width;

/// One rendered line of the thread pane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadLine {
    pub outgoing: bool,
    pub text: String,
}

fn url_regex() -> Option<&'static Regex> {
    static URL_RE: OnceLock<Option<Regex>> = OnceLock::new();
    URL_RE
        .get_or_init(|| Regex::new(r"https?://[^\s]+").ok())
        .as_ref()
}

/// Shorten long URLs in text by truncating
pub fn shorten_urls(text: &str, max_len: usize) -> String {
    let Some(re) = url_regex() else {
        return text.to_string();
    };

    re.replace_all(text, |caps: &regex::Captures| {
        let url = &caps[0];
        if url.chars().count() > max_len {
            let cut: String = url.chars().take(max_len).collect();
            format!("{}...", cut)
        } else {
            url.to_string()
        }
    })
    .into_owned()
}

/// Greedy word wrap by display width; continuation lines get `indent` spaces.
pub fn wrap_text(text: &str, indent: usize, width: usize) -> Vec<String> {
    if width <= indent + 1 {
        return vec![text.to_string()];
    }
    let first_width = width;
    let rest_width = width - indent;
    let pad = " ".repeat(indent);

    let mut lines: Vec<String> = Vec::new();
    for paragraph in text.split('\n') {
        let mut current = String::new();
        for word in paragraph.split(' ') {
            let limit = if lines.is_empty() { first_width } else { rest_width };
            let candidate_width = if current.is_empty() {
                word.width()
            } else {
                current.width() + 1 + word.width()
            };
            if candidate_width <= limit || current.is_empty() {
                if !current.is_empty() {
                    current.push(' ');
                }
                current.push_str(word);
            } else {
                lines.push(std::mem::take(&mut current));
                current.push_str(word);
            }
        }
        lines.push(current);
    }

    lines
        .into_iter()
        .enumerate()
        .map(|(i, line)| if i == 0 { line } else { format!("{}{}", pad, line) })
        .collect()
}

/// Format timestamp for display
pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    let datetime: DateTime<Local> = timestamp.with_timezone(&Local);
    let now = Local::now();
    if datetime.date_naive() == now.date_naive() {
        datetime.format("%H:%M").to_string()
    } else {
        datetime.format("%Y-%m-%d %H:%M").to_string()
    }
}

/// Render the open thread. Messages written by `peer` are incoming, the rest are ours.
pub fn format_thread(
    peer: &Peer,
    messages: &[Message],
    width: usize,
    show_timestamps: bool,
    compact_mode: bool,
) -> Vec<ThreadLine> {
    let mut lines: Vec<ThreadLine> = Vec::new();

    for message in messages {
        let outgoing = !message.is_from(peer.id);
        let sender = if outgoing { "you" } else { peer.display_name.as_str() };

        let mut prefix = String::new();
        if show_timestamps {
            prefix.push_str(&format_timestamp(message.created_at));
            prefix.push(' ');
        }
        prefix.push_str(sender);
        prefix.push_str(": ");

        let body = shorten_urls(&message.content, 60);
        let wrapped = wrap_text(&format!("{}{}", prefix, body), prefix.width(), width);
        for text in wrapped {
            lines.push(ThreadLine { outgoing, text });
        }

        // Blank line between messages in non-compact mode
        if !compact_mode {
            lines.push(ThreadLine {
                outgoing,
                text: String::new(),
            });
        }
    }

    lines
}

/// Single list row: "name (unread)  preview".
pub fn format_summary_row(summary: &ConversationSummary, width: usize) -> String {
    let mut row = summary.peer.display_name.clone();
    if summary.unread_count > 0 {
        row.push_str(&format!(" ({})", summary.unread_count));
    }
    if !summary.preview_text.is_empty() {
        row.push_str("  ");
        row.push_str(summary.preview_text.lines().next().unwrap_or(""));
    }
    truncate_to_width(&row, width)
}
