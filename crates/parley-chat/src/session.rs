//! Per-run conversation state.

use chrono::{DateTime, Local};
use parley_core::Turn;
use uuid::Uuid;

/// Transcript and text-box contents for one conversation.
///
/// Only the controller mutates a session. Every mutation bumps
/// [`Session::revision`] so a front end can tell when to redraw.
#[derive(Debug, Clone)]
pub struct Session {
    id: Uuid,
    started_at: DateTime<Local>,
    transcript: Vec<Turn>,
    pending_input: String,
    revision: u64,
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Local::now(),
            transcript: Vec::new(),
            pending_input: String::new(),
            revision: 0,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }

    /// Turns in conversation order.
    pub fn transcript(&self) -> &[Turn] {
        &self.transcript
    }

    /// Current contents of the text box.
    pub fn pending_input(&self) -> &str {
        &self.pending_input
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn len(&self) -> usize {
        self.transcript.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transcript.is_empty()
    }

    pub(crate) fn push(&mut self, turn: Turn) {
        self.transcript.push(turn);
        self.revision += 1;
    }

    pub(crate) fn set_pending_input(&mut self, text: String) {
        self.pending_input = text;
        self.revision += 1;
    }

    pub(crate) fn clear_pending_input(&mut self) {
        if !self.pending_input.is_empty() {
            self.pending_input.clear();
            self.revision += 1;
        }
    }

    pub(crate) fn clear(&mut self) {
        self.transcript.clear();
        self.pending_input.clear();
        self.revision += 1;
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
