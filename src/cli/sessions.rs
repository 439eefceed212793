// src/cli/sessions.rs — Session listing, transcripts, deletion

use chrono::Local;

use crate::mentor::{group_by_date, MentorMessage};
use crate::provider::Role;
use crate::store::{ChatSession, SessionStore};
use crate::util::preview;

/// Print sessions under date headings, numbered in list order.
///
/// Numbers match `/load <n>` and `/delete <n>` in the chat REPL.
pub fn print_grouped(sessions: &[ChatSession], active: Option<&str>) {
    if sessions.is_empty() {
        eprintln!("  No conversations yet.");
        return;
    }

    let today = Local::now().date_naive();
    let mut n = 0;
    for (group, members) in group_by_date(sessions, today) {
        eprintln!("  {}", group.label());
        for s in members {
            n += 1;
            let marker = if active == Some(s.id.as_str()) { "*" } else { " " };
            eprintln!(
                "  {}{:>3}. {}  ({} msgs, {})  {}",
                marker,
                n,
                preview(s.display_title(), 48),
                s.message_count,
                s.updated_at.with_timezone(&Local).format("%b %d %H:%M"),
                s.id,
            );
        }
    }
}

/// Accept either a session id or a 1-based index into the grouped listing.
pub fn resolve_session_ref(arg: &str, sessions: &[ChatSession]) -> Option<String> {
    let arg = arg.trim();
    if arg.is_empty() {
        return None;
    }
    if let Ok(n) = arg.parse::<usize>() {
        let today = Local::now().date_naive();
        return group_by_date(sessions, today)
            .into_iter()
            .flat_map(|(_, members)| members)
            .nth(n.checked_sub(1)?)
            .map(|s| s.id.clone());
    }
    Some(arg.to_string())
}

pub fn print_message(m: &MentorMessage) {
    let who = match m.role {
        Role::User => "you",
        Role::Assistant => "mentor",
    };
    println!("[{}] {}\n", who, m.content);
}

pub async fn run_sessions(store: &dyn SessionStore, user_id: &str) -> anyhow::Result<()> {
    let feed = store.subscribe_sessions(user_id).await?;
    let sessions = feed.borrow().clone();
    print_grouped(&sessions, None);
    Ok(())
}

pub async fn run_show(store: &dyn SessionStore, user_id: &str, id: &str) -> anyhow::Result<()> {
    let messages = store.get_messages(user_id, id).await?;
    if messages.is_empty() {
        eprintln!("  Session {} has no messages.", id);
    }
    for m in messages {
        print_message(&MentorMessage::from(m));
    }
    Ok(())
}

pub async fn run_delete(store: &dyn SessionStore, user_id: &str, id: &str) -> anyhow::Result<()> {
    store.delete_session(user_id, id).await?;
    eprintln!("  Deleted {}", id);
    Ok(())
}
