//! A small job-control shell.
//!
//! Each prompt yields one command line. The line is tokenized, classified as a
//! plain command, a two-stage pipeline or an output redirection, and then either
//! handled by a built-in inside the interpreter or launched as a child process.
//! Children can run in the foreground, where the interpreter waits for them and
//! routes keyboard interrupts to them, or in the background, where they are
//! recorded in the job table until `fg` claims them or the shell exits.
//!
//! The main entry point is [`Interpreter`]. The public modules expose the
//! individual stages so they can be driven and tested on their own.

pub mod builtin;
pub mod command;
pub mod config;
pub mod env;
pub mod error;
pub mod external;
pub mod interpreter;
pub mod jobs;
pub mod lexer;
pub mod parser;
pub mod signals;

/// Convenient re-exports of the interactive runner and its configuration.
pub use config::ShellConfig;
pub use interpreter::{Interpreter, LineSource};

/// Serializes tests that touch process-wide state: the working directory, signal
/// dispositions and the foreground slot.
#[cfg(test)]
pub(crate) fn lock_process_state() -> std::sync::MutexGuard<'static, ()> {
    static LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
    LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
