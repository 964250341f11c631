//! Error taxonomy for the shell.
//!
//! Every variant renders as a single diagnostic line. Only [`ShellError::Fork`]
//! and [`ShellError::SignalInstall`] are fatal; everything else is reported and
//! the prompt continues.

use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, ShellError>;

#[derive(Debug, Error)]
pub enum ShellError {
    /// Malformed placement of `|` or `>`.
    #[error("Error, expected : {expected}")]
    Syntax { expected: &'static str },

    /// Line had more tokens than the argument vector can hold.
    #[error("Error, too many arguments (at most {max} are allowed).")]
    TooManyArgs { max: usize },

    /// A name, path or directory could not be resolved.
    #[error("Error, could not execute command {command}: {reason}")]
    Resolution { command: String, reason: String },

    /// Missing or invalid argument to a built-in.
    #[error("{0}")]
    Usage(String),

    /// A built-in was wrapped in a pipe or a redirection.
    #[error("Error, cannot {action} built-in commands.")]
    BuiltinNotAllowed { action: &'static str },

    /// Pipe allocation or file opening failed.
    #[error("Error, could not {what}: {source}")]
    Resource {
        what: String,
        #[source]
        source: std::io::Error,
    },

    /// Process creation failed. Unrecoverable.
    #[error("Forked failed: {0}")]
    Fork(nix::Error),

    /// The OS refused to register a signal handler. Unrecoverable.
    #[error("Error, could not bind the signal handler: {0}")]
    SignalInstall(nix::Error),
}

impl ShellError {
    /// Whether the interpreter must run its termination sequence after reporting.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ShellError::Fork(_) | ShellError::SignalInstall(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_fork_and_signal_errors_are_fatal() {
        assert!(ShellError::Fork(nix::Error::EAGAIN).is_fatal());
        assert!(ShellError::SignalInstall(nix::Error::EINVAL).is_fatal());
        assert!(!ShellError::Usage("Expected : fg job".into()).is_fatal());
        assert!(
            !ShellError::Syntax {
                expected: "command > [file or directory]"
            }
            .is_fatal()
        );
    }

    #[test]
    fn builtin_rejection_message_names_the_action() {
        let err = ShellError::BuiltinNotAllowed { action: "pipe" };
        assert_eq!(err.to_string(), "Error, cannot pipe built-in commands.");
    }
}
