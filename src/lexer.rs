//! Lexical analysis of one raw input line into argument tokens.
//!
//! Splitting is whitespace-only: there is no quoting, no substitution and no
//! globbing. The `&` character is never part of a token; its presence anywhere on
//! the line marks the command for the background.

use crate::command::CommandLine;
use crate::error::ShellError;

/// Errors that can occur during the lexical analysis process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LexingError {
    /// More tokens than the argument vector has room for.
    TooManyArgs { max: usize },
}

impl From<LexingError> for ShellError {
    fn from(err: LexingError) -> Self {
        match err {
            LexingError::TooManyArgs { max } => ShellError::TooManyArgs { max },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LexingState {
    Start,
    ReadingWord,
    // A control character cut the current token short; the rest of it is dropped.
    SkippingTail,
}

struct LexingFSM {
    input: Vec<char>,
    pos: usize,
    state: LexingState,
    buffer: String,
    background: bool,
    max_args: usize,
}

impl LexingFSM {
    /// Creates a new instance of the lexical analysis Finite State Machine.
    fn new(line: &str, max_args: usize) -> Self {
        LexingFSM {
            input: line.chars().collect(),
            pos: 0,
            state: LexingState::Start,
            buffer: String::new(),
            background: false,
            max_args,
        }
    }

    /// Runs the machine over the whole input and collects the tokens.
    fn make_tokens(mut self) -> Result<CommandLine, LexingError> {
        let mut out = Vec::new();

        while let Some(ch) = self.read_char() {
            if ch == '&' {
                self.background = true;
                self.finish_word(&mut out)?;
                continue;
            }
            match self.state {
                LexingState::Start => self.handle_start(ch),
                LexingState::ReadingWord => self.handle_word(ch, &mut out)?,
                LexingState::SkippingTail => self.handle_tail(ch, &mut out)?,
            }
        }
        self.finish_word(&mut out)?;

        Ok(CommandLine {
            args: out,
            background: self.background,
        })
    }

    fn read_char(&mut self) -> Option<char> {
        let ch = self.input.get(self.pos).copied();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn handle_start(&mut self, ch: char) {
        if !is_separator(ch) && !is_control(ch) {
            self.buffer.push(ch);
            self.state = LexingState::ReadingWord;
        }
    }

    fn handle_word(&mut self, ch: char, out: &mut Vec<String>) -> Result<(), LexingError> {
        if is_separator(ch) {
            self.finish_word(out)?;
        } else if is_control(ch) {
            self.state = LexingState::SkippingTail;
        } else {
            self.buffer.push(ch);
        }
        Ok(())
    }

    fn handle_tail(&mut self, ch: char, out: &mut Vec<String>) -> Result<(), LexingError> {
        if is_separator(ch) {
            self.finish_word(out)?;
        }
        Ok(())
    }

    /// Emits the buffered token, if any, and returns to the start state.
    fn finish_word(&mut self, out: &mut Vec<String>) -> Result<(), LexingError> {
        self.state = LexingState::Start;
        if self.buffer.is_empty() {
            return Ok(());
        }
        if out.len() == self.max_args {
            return Err(LexingError::TooManyArgs { max: self.max_args });
        }
        out.push(std::mem::take(&mut self.buffer));
        Ok(())
    }
}

fn is_separator(ch: char) -> bool {
    matches!(ch, ' ' | '\t' | '\n')
}

fn is_control(ch: char) -> bool {
    (ch as u32) <= 32
}

/// The main entry point function to perform lexical analysis.
///
/// # Arguments
/// * `line` - The raw line as returned by the line source, trailing newline included or not.
/// * `max_args` - Maximum number of tokens the line may produce.
///
/// # Returns
/// The tokens in input order and the background flag, or
/// [`LexingError::TooManyArgs`] when the line does not fit.
pub fn split_into_tokens(line: &str, max_args: usize) -> Result<CommandLine, LexingError> {
    LexingFSM::new(line, max_args).make_tokens()
}
