use argh::FromArgs;

/// Prompt printed before every line is read.
pub const DEFAULT_PROMPT: &str = "\n>> ";

/// Argument slots available to a command line. The classic layout reserves a
/// 20-entry vector, one of which is the terminating null.
pub const DEFAULT_MAX_ARGS: usize = 19;

/// Filter applied to log output when `RUST_LOG` is not set.
pub const DEFAULT_LOG_LEVEL: &str = "warn";

#[derive(FromArgs, Debug)]
/// A small job-control shell: pipes, output redirection and background jobs.
pub struct ShellArgs {
    #[argh(option, default = "DEFAULT_PROMPT.to_string()")]
    /// prompt printed before each command line
    pub prompt: String,

    #[argh(option, default = "DEFAULT_MAX_ARGS")]
    /// maximum number of arguments accepted on one line
    pub max_args: usize,

    #[argh(option, default = "DEFAULT_LOG_LEVEL.to_string()")]
    /// log filter used when RUST_LOG is unset (error, warn, info, debug, trace)
    pub log_level: String,
}

/// Runtime settings owned by the [`Interpreter`](crate::Interpreter).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellConfig {
    pub prompt: String,
    pub max_args: usize,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            prompt: DEFAULT_PROMPT.to_string(),
            max_args: DEFAULT_MAX_ARGS,
        }
    }
}

impl TryFrom<&ShellArgs> for ShellConfig {
    type Error = anyhow::Error;

    fn try_from(args: &ShellArgs) -> anyhow::Result<Self> {
        if args.max_args == 0 {
            anyhow::bail!("--max-args must be at least 1");
        }
        Ok(Self {
            prompt: args.prompt.clone(),
            max_args: args.max_args,
        })
    }
}
