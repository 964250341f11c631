/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
pub type ExitCode = i32;

/// Status a child reports when the program loader could not run its command.
pub const EXIT_NOT_EXECUTED: ExitCode = 127;

/// One tokenized command line.
///
/// Built fresh for every prompt and dropped after one dispatch cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandLine {
    /// Non-empty argument tokens in input order.
    pub args: Vec<String>,
    /// Whether an `&` appeared anywhere on the line.
    pub background: bool,
}

impl CommandLine {
    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    /// Name shown for the command in the job table.
    pub fn name(&self) -> &str {
        self.args.first().map(String::as_str).unwrap_or_default()
    }
}
