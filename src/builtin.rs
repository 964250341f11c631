use crate::command::ExitCode;
use crate::env::Environment;
use crate::error::{Result, ShellError};
use crate::signals;
use argh::{EarlyExit, FromArgs};
use std::env;
use std::io::Write;

/// Built-in commands known to the shell at compile time.
///
/// Builtins are parsed using the [`argh`] crate (`FromArgs`) and executed directly
/// in-process without spawning a child process.
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    /// Canonical name of the command, e.g. "cd" or "jobs".
    fn name() -> &'static str;

    /// Executes the command against the engine state.
    ///
    /// Return value should follow shell conventions: 0 for success, non-zero for error.
    fn execute(self, stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode>;
}

/// The closed set of built-ins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Cd,
    Pwd,
    Exit,
    Fg,
    Jobs,
}

impl Builtin {
    /// Resolve a command name to a built-in, once per command line.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "cd" => Some(Builtin::Cd),
            "pwd" => Some(Builtin::Pwd),
            "exit" => Some(Builtin::Exit),
            "fg" => Some(Builtin::Fg),
            "jobs" => Some(Builtin::Jobs),
            _ => None,
        }
    }

    /// Built-in named by the first word of `argv`, if any.
    pub fn lookup(argv: &[String]) -> Option<Self> {
        argv.first().and_then(|name| Self::from_name(name))
    }
}

/// Whether the first word of `argv` names a built-in.
pub fn is_builtin(argv: &[String]) -> bool {
    Builtin::lookup(argv).is_some()
}

/// Execute `argv` as a built-in.
///
/// `argv[0]` must name a member of the built-in set; anything else is reported as
/// a generic built-in error.
pub fn execute(argv: &[String], stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode> {
    let Some(builtin) = Builtin::lookup(argv) else {
        return Err(ShellError::Usage(
            "Error, expected built-in command.".to_string(),
        ));
    };
    tracing::debug!(?builtin, "running built-in");
    match builtin {
        Builtin::Cd => invoke::<Cd>(argv, stdout, env),
        Builtin::Pwd => invoke::<Pwd>(argv, stdout, env),
        Builtin::Exit => invoke::<Exit>(argv, stdout, env),
        Builtin::Fg => invoke::<Fg>(argv, stdout, env),
        Builtin::Jobs => invoke::<Jobs>(argv, stdout, env),
    }
}

fn invoke<T: BuiltinCommand>(
    argv: &[String],
    stdout: &mut dyn Write,
    env: &mut Environment,
) -> Result<ExitCode> {
    let args: Vec<&str> = argv[1..].iter().map(String::as_str).collect();
    match T::from_args(&[T::name()], &args) {
        Ok(cmd) => cmd.execute(stdout, env),
        // --help
        Err(EarlyExit {
            output,
            status: Ok(()),
        }) => {
            stdout
                .write_all(output.as_bytes())
                .map_err(|source| ShellError::Resource {
                    what: "write help".to_string(),
                    source,
                })?;
            Ok(0)
        }
        Err(EarlyExit { output, .. }) => Err(ShellError::Usage(output.trim_end().to_string())),
    }
}

fn write_line(stdout: &mut dyn Write, line: std::fmt::Arguments<'_>) -> Result<()> {
    writeln!(stdout, "{line}").map_err(|source| ShellError::Resource {
        what: "write output".to_string(),
        source,
    })
}

#[derive(FromArgs)]
/// Print the current working directory to standard output.
pub struct Pwd {}

impl BuiltinCommand for Pwd {
    fn name() -> &'static str {
        "pwd"
    }

    fn execute(self, stdout: &mut dyn Write, _env: &mut Environment) -> Result<ExitCode> {
        let dir = env::current_dir().map_err(|e| ShellError::Resolution {
            command: "pwd".to_string(),
            reason: e.to_string(),
        })?;
        write_line(stdout, format_args!("{}", dir.display()))?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Change the current working directory.
pub struct Cd {
    #[argh(positional)]
    /// directory to switch to; absolute or relative to the current directory.
    pub target: Option<String>,
}

impl BuiltinCommand for Cd {
    fn name() -> &'static str {
        "cd"
    }

    fn execute(self, _stdout: &mut dyn Write, _env: &mut Environment) -> Result<ExitCode> {
        let target = self
            .target
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ShellError::Usage("Expected : cd [OPTIONS] directory".to_string()))?;

        env::set_current_dir(&target).map_err(|e| ShellError::Resolution {
            command: "cd".to_string(),
            reason: format!("{target}: {e}"),
        })?;
        tracing::debug!(%target, "changed directory");
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Exit the shell, terminating every background job.
pub struct Exit {
    #[argh(positional, greedy)]
    /// ignored; the shell always exits with status 0
    pub _args: Vec<String>,
}

impl BuiltinCommand for Exit {
    fn name() -> &'static str {
        "exit"
    }

    fn execute(self, _stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode> {
        env.terminate();
        Ok(0)
    }
}

#[derive(FromArgs)]
/// List background jobs.
pub struct Jobs {}

impl BuiltinCommand for Jobs {
    fn name() -> &'static str {
        "jobs"
    }

    fn execute(self, stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode> {
        if env.jobs.is_empty() {
            write_line(
                stdout,
                format_args!("No job is running in the background at the moment."),
            )?;
        }
        for entry in env.jobs.list() {
            write_line(stdout, format_args!("{entry}"))?;
        }
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Bring a background job to the foreground and wait for it.
pub struct Fg {
    #[argh(positional)]
    /// job number as shown by `jobs`
    pub job: Option<String>,
}

impl Fg {
    /// Validate the job number against the current table.
    fn job_number(&self, job_count: usize) -> Result<usize> {
        let raw = self
            .job
            .as_deref()
            .ok_or_else(|| ShellError::Usage("Expected : fg job".to_string()))?;
        raw.parse::<usize>()
            .ok()
            .filter(|n| (1..=job_count).contains(n))
            .ok_or_else(|| ShellError::Usage("Error, job could not be found.".to_string()))
    }
}

impl BuiltinCommand for Fg {
    fn name() -> &'static str {
        "fg"
    }

    fn execute(self, _stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode> {
        let number = self.job_number(env.jobs.len())?;
        let Some(job) = env.jobs.remove(number) else {
            return Err(ShellError::Usage("Error, job could not be found.".to_string()));
        };
        tracing::info!(pid = job.pid.as_raw(), name = %job.name, number, "bringing job to foreground");

        let handed_over = signals::give_terminal_to(job.pid);
        signals::resume(job.pid);
        let status = env.signals.wait_foreground(job.pid);
        if handed_over {
            signals::reclaim_terminal();
        }
        Ok(status)
    }
}
