use anyhow::Result;
use crossterm::{
    execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
};
use std::io::{self, Write};

use acacia_conversation::ReplyOutcome;
use acacia_core::StreamChunk;

/// Color scheme for terminal output.
struct Colors;

impl Colors {
    const USER_PROMPT: Color = Color::Green;
    const ASSISTANT_TEXT: Color = Color::Cyan;
    const ERROR: Color = Color::Red;
    const DIM: Color = Color::DarkGrey;
    const HEADER: Color = Color::Magenta;
}

/// What the user typed at the prompt.
#[derive(Debug, PartialEq, Eq)]
pub enum Input {
    Message(String),
    Empty,
    Exit,
}

impl Input {
    pub fn parse(line: &str) -> Self {
        match line.trim() {
            "" => Input::Empty,
            "exit" | "quit" | "/exit" | "/quit" => Input::Exit,
            text => Input::Message(text.to_string()),
        }
    }
}

/// Terminal I/O for the interactive REPL.
pub struct Terminal;

impl Terminal {
    pub fn new() -> Self {
        Self
    }

    /// Print the startup banner.
    pub fn print_banner(&self, provider: &str, model: &str, tools: &[String]) -> Result<()> {
        let mut stdout = io::stdout();
        execute!(
            stdout,
            SetForegroundColor(Colors::HEADER),
            Print("acacia-chat"),
            ResetColor,
            Print(" - streaming chat with tools\n"),
            SetForegroundColor(Colors::DIM),
            Print(format!("Provider: {} | Model: {}\n", provider, model)),
            Print(format!("Tools: {}\n", tools.join(", "))),
            Print("Type 'exit' or 'quit' to end. Ctrl+C cancels the current reply.\n"),
            Print("---\n"),
            ResetColor,
        )?;
        stdout.flush()?;
        Ok(())
    }

    /// Prompt and read one line. EOF counts as exit.
    pub fn read_input(&self) -> Result<Input> {
        let mut stdout = io::stdout();
        execute!(
            stdout,
            Print("\n"),
            SetForegroundColor(Colors::USER_PROMPT),
            Print("you> "),
            ResetColor,
        )?;
        stdout.flush()?;

        let mut line = String::new();
        if io::stdin().read_line(&mut line)? == 0 {
            return Ok(Input::Exit);
        }
        Ok(Input::parse(&line))
    }

    /// Render one chunk of a streaming reply.
    pub fn display_chunk(&self, chunk: &StreamChunk) -> Result<()> {
        let mut stdout = io::stdout();
        match (&chunk.error, chunk.done) {
            (Some(err), _) => {
                execute!(
                    stdout,
                    Print("\n"),
                    SetForegroundColor(Colors::ERROR),
                    Print(format!("[error: {}]\n", err)),
                    ResetColor,
                )?;
            }
            (None, true) => {
                execute!(stdout, Print("\n"))?;
            }
            (None, false) => {
                execute!(
                    stdout,
                    SetForegroundColor(Colors::ASSISTANT_TEXT),
                    Print(&chunk.content),
                    ResetColor,
                )?;
            }
        }
        stdout.flush()?;
        Ok(())
    }

    /// Report whether the reply made it into the store.
    pub fn display_outcome(&self, outcome: &ReplyOutcome) -> Result<()> {
        match outcome {
            ReplyOutcome::Saved(message) => {
                self.print_info(&format!("[saved as message #{}]", message.sequence_number))
            }
            ReplyOutcome::NotSaved { error, .. } => self.print_error(&error.to_string()),
            ReplyOutcome::Aborted(_) => self.print_info("[nothing saved]"),
            ReplyOutcome::Disconnected => self.print_info("[disconnected]"),
        }
    }

    /// Print an error message.
    pub fn print_error(&self, msg: &str) -> Result<()> {
        let mut stdout = io::stdout();
        execute!(
            stdout,
            SetForegroundColor(Colors::ERROR),
            Print(format!("Error: {}\n", msg)),
            ResetColor,
        )?;
        stdout.flush()?;
        Ok(())
    }

    /// Print an info message.
    pub fn print_info(&self, msg: &str) -> Result<()> {
        let mut stdout = io::stdout();
        execute!(
            stdout,
            SetForegroundColor(Colors::DIM),
            Print(format!("{}\n", msg)),
            ResetColor,
        )?;
        stdout.flush()?;
        Ok(())
    }
}
