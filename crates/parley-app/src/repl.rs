//! Line-oriented terminal front end.
//!
//! Each input line is either a slash command or text for the text box.
//! Slash lines that name no command are sent as text, and a leading `//`
//! sends the rest of the line with one slash removed.
//! New turns are printed whenever the session revision moves.

use parley_chat::render::render_turn;
use parley_chat::TurnController;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

const HELP: &str = "Type a message and press Enter to send it.\n\
Commands: /voice  speak a message | /clear  clear the chat | /help | /quit\n\
Start a line with // to send it as text.";

/// One parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Text typed into the box, sent as-is.
    Send(String),
    Voice,
    Clear,
    Help,
    Quit,
}

impl Command {
    pub fn parse(line: &str) -> Self {
        let line = line.trim_end_matches(['\r', '\n']);
        let trimmed = line.trim();
        if !trimmed.starts_with('/') {
            return Command::Send(line.to_string());
        }
        if let Some(escaped) = trimmed.strip_prefix('/').filter(|rest| rest.starts_with('/')) {
            return Command::Send(escaped.to_string());
        }
        match trimmed.to_ascii_lowercase().as_str() {
            "/voice" | "/v" => Command::Voice,
            "/clear" | "/c" => Command::Clear,
            "/help" | "/h" | "/?" => Command::Help,
            "/quit" | "/q" | "/exit" => Command::Quit,
            _ => Command::Send(line.to_string()),
        }
    }
}

/// Tracks what has already been printed.
struct View {
    revision: u64,
    printed: usize,
}

impl View {
    async fn refresh<W>(&mut self, controller: &TurnController, out: &mut W) -> std::io::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let session = controller.session();
        if session.revision() == self.revision {
            return Ok(());
        }
        self.revision = session.revision();

        if session.len() < self.printed {
            out.write_all(b"-- chat cleared --\n").await?;
            self.printed = 0;
        }
        for turn in &session.transcript()[self.printed..] {
            out.write_all(render_turn(turn).as_bytes()).await?;
            out.write_all(b"\n").await?;
        }
        self.printed = session.len();
        Ok(())
    }
}

/// Run the interactive loop until `/quit` or end of input.
pub async fn run<R, W>(
    controller: &mut TurnController,
    title: &str,
    input: R,
    mut out: W,
) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    out.write_all(format!("{}\n{}\n\n", title, HELP).as_bytes())
        .await?;
    if !controller.has_voice_input() {
        out.write_all(b"(voice input is off)\n").await?;
    }

    let mut view = View {
        revision: controller.session().revision(),
        printed: controller.session().len(),
    };
    let mut lines = input.lines();

    loop {
        out.write_all(b"> ").await?;
        out.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        let outcome = match Command::parse(&line) {
            Command::Send(text) => {
                controller.set_pending_input(text);
                controller.submit_pending().await.map(|_| ())
            }
            Command::Voice => {
                if controller.has_voice_input() {
                    out.write_all(b"Listening... Say something.\n").await?;
                    out.flush().await?;
                }
                controller.submit_voice().await.map(|_| ())
            }
            Command::Clear => {
                controller.clear();
                Ok(())
            }
            Command::Help => {
                out.write_all(format!("{}\n", HELP).as_bytes()).await?;
                Ok(())
            }
            Command::Quit => break,
        };

        if let Err(e) = outcome {
            out.write_all(format!("⚠ {}\n", e).as_bytes()).await?;
        }
        view.refresh(controller, &mut out).await?;
    }

    out.write_all(b"Goodbye.\n").await?;
    out.flush().await
}
