// src/cli/chat.rs — Interactive mentor REPL

use std::io::Write;

use crate::mentor::{ChatView, SendOutcome, SessionManager, SUGGESTED_PROMPTS};
use crate::provider::Role;
use crate::store::{ChatSession, SessionFeed};

use super::sessions::{print_grouped, print_message, resolve_session_ref};

/// Run the interactive chat REPL.
pub async fn run_chat(manager: SessionManager, resume: Option<&str>) -> anyhow::Result<()> {
    let feed = manager.subscribe_sessions().await;

    eprintln!(
        "pathmentor v{} | user: {} | /help for commands\n",
        env!("CARGO_PKG_VERSION"),
        manager.user_id().unwrap_or("-"),
    );

    if let Some(id) = resume {
        manager.load_session(id).await;
    }
    print_transcript(&manager.view());
    if manager.view().is_fresh() {
        print_suggestions();
    }

    while let Some(input) = read_input() {
        let trimmed = input.trim();

        if trimmed == "quit" || trimmed == "exit" || trimmed == "/quit" {
            break;
        }

        if trimmed.starts_with('/') {
            handle_slash_command(trimmed, &manager, feed.as_ref()).await;
            continue;
        }

        if trimmed.is_empty() {
            continue;
        }

        match stream_reply(&manager, trimmed.to_string()).await {
            SendOutcome::Ignored => eprintln!("  (busy, message not sent)"),
            SendOutcome::Completed | SendOutcome::Failed => {}
        }
    }

    manager.flush().await;
    Ok(())
}

fn read_input() -> Option<String> {
    use std::io::{self, BufRead};

    print!("> ");
    io::stdout().flush().ok();

    let stdin = io::stdin();
    let mut line = String::new();
    match stdin.lock().read_line(&mut line) {
        Ok(0) => None,
        Ok(_) => Some(line),
        Err(_) => None,
    }
}

/// Send `text` and echo the reply as it streams in.
async fn stream_reply(manager: &SessionManager, text: String) -> SendOutcome {
    let mut rx = manager.watch();
    let baseline = rx.borrow_and_update().messages.len();

    let worker = manager.clone();
    let mut task = tokio::spawn(async move { worker.send_message(&text).await });
    let mut shown = String::new();

    loop {
        tokio::select! {
            joined = &mut task => {
                let outcome = joined.unwrap_or(SendOutcome::Failed);
                if outcome != SendOutcome::Ignored {
                    echo_tail(&manager.view(), baseline, &mut shown);
                    println!("\n");
                }
                return outcome;
            }
            changed = rx.changed() => {
                if changed.is_err() {
                    return task.await.unwrap_or(SendOutcome::Failed);
                }
                let view = rx.borrow_and_update().clone();
                echo_tail(&view, baseline, &mut shown);
            }
        }
    }
}

/// Print whatever part of the reply has not been printed yet.
fn echo_tail(view: &ChatView, baseline: usize, shown: &mut String) {
    // baseline is the user echo; the reply placeholder follows it
    let Some(reply) = view
        .messages
        .get(baseline + 1)
        .filter(|m| m.role == Role::Assistant)
    else {
        return;
    };
    if reply.content == *shown {
        return;
    }

    let mut out = std::io::stdout();
    if shown.is_empty() {
        print!("[mentor] ");
    }
    match reply.content.strip_prefix(shown.as_str()) {
        Some(tail) => print!("{}", tail),
        // Replaced rather than extended: an apology
        None => print!("\n{}", reply.content),
    }
    out.flush().ok();
    *shown = reply.content.clone();
}

fn print_transcript(view: &ChatView) {
    for m in &view.messages {
        print_message(m);
    }
}

fn print_suggestions() {
    eprintln!("  Try asking:");
    for (i, p) in SUGGESTED_PROMPTS.iter().enumerate() {
        eprintln!("    {}. {}", i + 1, p);
    }
    eprintln!("  (type /suggest <n> to send one)\n");
}

fn current_sessions(feed: Option<&SessionFeed>) -> Vec<ChatSession> {
    feed.map(|f| f.borrow().clone()).unwrap_or_default()
}

async fn handle_slash_command(input: &str, manager: &SessionManager, feed: Option<&SessionFeed>) {
    let parts: Vec<&str> = input.splitn(2, ' ').collect();
    let cmd = parts[0];
    let arg = parts.get(1).map(|s| s.trim()).unwrap_or("");

    match cmd {
        "/new" => {
            manager.start_new_chat();
            print_transcript(&manager.view());
            print_suggestions();
        }

        "/sessions" | "/history" => {
            let sessions = current_sessions(feed);
            let view = manager.view();
            print_grouped(&sessions, view.active_session_id.as_deref());
        }

        "/load" => {
            let sessions = current_sessions(feed);
            let Some(id) = resolve_session_ref(arg, &sessions) else {
                eprintln!("  Usage: /load <id|number>");
                return;
            };
            if manager.view().is_generating {
                eprintln!("  Wait for the current reply to finish.");
                return;
            }
            manager.load_session(&id).await;
            print_transcript(&manager.view());
        }

        "/delete" => {
            let sessions = current_sessions(feed);
            let Some(id) = resolve_session_ref(arg, &sessions) else {
                eprintln!("  Usage: /delete <id|number>");
                return;
            };
            let was_active = manager.view().active_session_id.as_deref() == Some(id.as_str());
            manager.delete_session(&id).await;
            eprintln!("  Deleted {}", id);
            if was_active {
                print_transcript(&manager.view());
            }
        }

        "/suggest" => {
            let pick = arg
                .parse::<usize>()
                .ok()
                .and_then(|n| n.checked_sub(1))
                .and_then(|i| SUGGESTED_PROMPTS.get(i));
            match pick {
                Some(prompt) => {
                    println!("> {}", prompt);
                    stream_reply(manager, prompt.to_string()).await;
                }
                None => print_suggestions(),
            }
        }

        "/help" => {
            eprintln!("  /new              Start a new conversation");
            eprintln!("  /sessions         List saved conversations");
            eprintln!("  /load <id|n>      Open a saved conversation");
            eprintln!("  /delete <id|n>    Delete a conversation");
            eprintln!("  /suggest [n]      Show or send a suggested prompt");
            eprintln!("  /quit             Exit");
        }

        _ => {
            eprintln!("  Unknown command: {}. Type /help for commands.", cmd);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mentor::MentorMessage;

    fn view_with_reply(content: &str) -> ChatView {
        let mut reply = MentorMessage::greeting();
        reply.id = "a-1".into();
        reply.content = content.into();
        let mut user = MentorMessage::greeting();
        user.id = "u-1".into();
        user.role = Role::User;
        ChatView {
            messages: vec![MentorMessage::greeting(), user, reply],
            active_session_id: None,
            is_generating: true,
            is_loading: false,
        }
    }

    #[test]
    fn test_echo_tail_tracks_progress() {
        let mut shown = String::new();
        echo_tail(&view_with_reply("Hel"), 1, &mut shown);
        assert_eq!(shown, "Hel");
        echo_tail(&view_with_reply("Hello"), 1, &mut shown);
        assert_eq!(shown, "Hello");
    }

    #[test]
    fn test_echo_tail_waits_for_placeholder() {
        let mut shown = String::new();
        let mut view = view_with_reply("x");
        view.messages.truncate(2);
        echo_tail(&view, 1, &mut shown);
        assert!(shown.is_empty());
    }
}
