// src/mentor/mod.rs — Career mentor chat sessions

pub mod history;
pub mod prompt;
pub mod session_manager;
pub mod types;

pub use history::{group_by_date, DateGroup};
pub use prompt::{MENTOR_SYSTEM_PROMPT, SUGGESTED_PROMPTS};
pub use session_manager::{MentorOptions, SessionManager};
pub use types::{session_title, ChatView, MentorMessage, SendOutcome};
