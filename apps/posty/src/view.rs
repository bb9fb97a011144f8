//! Plain-text rendering of the controller's view state.

use client_core::ViewState;
use shared::domain::Post;
use tokio::time::Instant;

pub fn print_state(state: &ViewState) {
    print!("{}", render_state(state, Instant::now()));
}

pub fn render_state(state: &ViewState, now: Instant) -> String {
    let mut out = String::new();
    for (channel, text) in state.messages.visible(now) {
        out.push_str(&format!("[{}] {text}\n", channel.label()));
    }
    if state.posts.is_empty() {
        out.push_str("(no posts)\n");
    }
    for post in &state.posts {
        out.push_str(&render_post(post));
        out.push('\n');
    }
    out
}

/// Renders `state` and returns the text only when it differs from `last`.
pub fn render_if_changed(last: &mut String, state: &ViewState, now: Instant) -> Option<String> {
    let rendered = render_state(state, now);
    if rendered == *last {
        return None;
    }
    *last = rendered.clone();
    Some(rendered)
}

fn render_post(post: &Post) -> String {
    let mut line = format!("{:>8}  ", post.id);
    if let Some(username) = &post.username {
        line.push_str(&format!("{username}: "));
    }
    line.push_str(&post.message);
    if let Some(created_at) = post.created_at {
        line.push_str(&format!("  ({})", created_at.format("%Y-%m-%d %H:%M")));
    }
    line
}
