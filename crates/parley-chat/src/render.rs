//! Plain-text transcript rendering.

use parley_core::{Sender, Turn};

use crate::session::Session;

pub const USER_PREFIX: &str = "👤 You:";
pub const BOT_PREFIX: &str = "🤖 Bot:";

pub fn prefix(sender: Sender) -> &'static str {
    match sender {
        Sender::User => USER_PREFIX,
        Sender::Bot => BOT_PREFIX,
    }
}

pub fn render_turn(turn: &Turn) -> String {
    format!("{} {}", prefix(turn.sender), turn.text)
}

/// One line per turn, oldest first.
pub fn render_transcript(session: &Session) -> String {
    session
        .transcript()
        .iter()
        .map(render_turn)
        .collect::<Vec<_>>()
        .join("\n")
}
