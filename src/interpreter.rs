use crate::command::ExitCode;
use crate::config::ShellConfig;
use crate::env::Environment;
use crate::error::ShellError;
use crate::external;
use crate::jobs::JobTable;
use crate::lexer;
use crate::parser;
use crate::signals::SignalController;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::collections::VecDeque;
use std::io::Write;

/// Where command lines come from.
pub trait LineSource {
    /// Show `prompt` and read one line.
    ///
    /// `Ok(None)` signals end of session: end of input, or a read failure the
    /// source cannot recover from.
    fn read_line(&mut self, prompt: &str) -> anyhow::Result<Option<String>>;
}

impl LineSource for DefaultEditor {
    fn read_line(&mut self, prompt: &str) -> anyhow::Result<Option<String>> {
        match self.readline(prompt) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    self.add_history_entry(line.as_str())?;
                }
                Ok(Some(line))
            }
            // Ctrl-C at the prompt only discards the line being typed.
            Err(ReadlineError::Interrupted) => Ok(Some(String::new())),
            Err(ReadlineError::Eof) => Ok(None),
            Err(err) => {
                tracing::warn!(%err, "line source failed");
                Ok(None)
            }
        }
    }
}

/// A fixed list of lines, for driving the shell without a terminal.
#[derive(Debug, Default)]
pub struct ScriptedLines {
    lines: VecDeque<String>,
}

impl ScriptedLines {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }
}

impl LineSource for ScriptedLines {
    fn read_line(&mut self, _prompt: &str) -> anyhow::Result<Option<String>> {
        Ok(self.lines.pop_front())
    }
}

/// The shell: owns the engine state and runs the prompt loop.
///
/// Example
/// ```no_run
/// use jobshell::{Interpreter, ShellConfig};
/// use jobshell::interpreter::ScriptedLines;
///
/// let mut sh = Interpreter::new(ShellConfig::default()).unwrap();
/// let mut lines = ScriptedLines::new(["ls -l &", "jobs", "exit"]);
/// assert_eq!(sh.repl(&mut lines), 0);
/// ```
#[derive(Debug)]
pub struct Interpreter {
    env: Environment,
    config: ShellConfig,
}

impl Interpreter {
    /// Install the signal controller and create an empty job table.
    pub fn new(config: ShellConfig) -> Result<Self, ShellError> {
        let signals = SignalController::install()?;
        Ok(Self {
            env: Environment::new(signals),
            config,
        })
    }

    pub fn jobs(&self) -> &JobTable {
        &self.env.jobs
    }

    pub fn should_exit(&self) -> bool {
        self.env.should_exit
    }

    /// Tokenize, classify and execute one raw line.
    ///
    /// Returns the foreground status, or `None` when nothing was waited on
    /// (blank line, background job, aborted line). Syntax diagnostics for a
    /// line that still runs are written to `stderr`.
    pub fn execute_line(
        &mut self,
        line: &str,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
    ) -> Result<Option<ExitCode>, ShellError> {
        let line = lexer::split_into_tokens(line, self.config.max_args)?;
        if line.is_empty() {
            return Ok(None);
        }
        let classified = parser::classify(&line.args);
        for diagnostic in &classified.diagnostics {
            let _ = writeln!(stderr, "{diagnostic}");
        }
        let Some(command) = classified.command else {
            tracing::debug!(args = ?line.args, "line aborted");
            return Ok(None);
        };
        tracing::debug!(?command, background = line.background, "dispatching");
        external::launch(&command, &line, stdout, &mut self.env)
    }

    /// Read and execute lines until `exit`, end of input or a fatal error, then
    /// run the termination sequence.
    ///
    /// Returns the status the process should exit with, which is always success.
    pub fn repl(&mut self, source: &mut dyn LineSource) -> ExitCode {
        while !self.env.should_exit {
            let line = match source.read_line(&self.config.prompt) {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(err) => {
                    eprintln!("{err}");
                    break;
                }
            };

            let stdout = &mut std::io::stdout();
            let stderr = &mut std::io::stderr();
            match self.execute_line(&line, stdout, stderr) {
                Ok(status) => {
                    tracing::trace!(?status, "command finished");
                }
                Err(err) if err.is_fatal() => {
                    eprintln!("{err}");
                    break;
                }
                Err(err) => eprintln!("{err}"),
            }
            let _ = stdout.flush();
        }
        self.shutdown()
    }

    /// The termination sequence shared by every way out of the shell.
    pub fn shutdown(&mut self) -> ExitCode {
        tracing::info!(jobs = self.env.jobs.len(), "shutting down");
        self.env.terminate();
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lock_process_state;
    use nix::unistd::Pid;

    fn shell() -> Interpreter {
        Interpreter::new(ShellConfig::default()).unwrap()
    }

    fn exec(sh: &mut Interpreter, line: &str) -> (Result<Option<ExitCode>, ShellError>, String, String) {
        let mut out = Vec::new();
        let mut err = Vec::new();
        let res = sh.execute_line(line, &mut out, &mut err);
        (
            res,
            String::from_utf8(out).unwrap(),
            String::from_utf8(err).unwrap(),
        )
    }

    #[test]
    fn blank_line_does_nothing() {
        let _lock = lock_process_state();
        let mut sh = shell();
        let (res, out, err) = exec(&mut sh, "  \t\n");
        assert_eq!(res.unwrap(), None);
        assert!(out.is_empty() && err.is_empty());
    }

    #[test]
    fn syntax_error_aborts_line() {
        let _lock = lock_process_state();
        let mut sh = shell();
        let (res, _, err) = exec(&mut sh, "ls |\n");
        assert_eq!(res.unwrap(), None);
        assert_eq!(err, "Error, expected : command_1 | command_2\n");
    }

    #[test]
    fn too_many_arguments_is_reported_not_run() {
        let _lock = lock_process_state();
        let mut sh = Interpreter::new(ShellConfig {
            max_args: 2,
            ..ShellConfig::default()
        })
        .unwrap();
        let (res, _, _) = exec(&mut sh, "echo a b");
        assert!(matches!(res, Err(ShellError::TooManyArgs { max: 2 })));
    }

    #[test]
    fn builtin_output_goes_to_given_stdout() {
        let _lock = lock_process_state();
        let mut sh = shell();
        let (res, out, _) = exec(&mut sh, "jobs\n");
        assert_eq!(res.unwrap(), Some(0));
        assert_eq!(out, "No job is running in the background at the moment.\n");
    }

    #[test]
    fn background_lines_each_add_one_job() {
        let _lock = lock_process_state();
        let mut sh = shell();
        for expected in 1..=2 {
            let (res, _, _) = exec(&mut sh, "sleep 30 &\n");
            assert_eq!(res.unwrap(), None);
            assert_eq!(sh.jobs().len(), expected);
        }
        let pids: Vec<Pid> = sh.jobs().list().map(|e| e.job.pid).collect();
        sh.shutdown();
        assert!(sh.jobs().is_empty());
        for pid in pids {
            crate::signals::wait_for(pid);
        }
    }

    #[test]
    fn repl_stops_at_exit_and_terminates_jobs() {
        let _lock = lock_process_state();
        let mut sh = shell();
        let mut lines = ScriptedLines::new(["sleep 30 &", "sleep 30 &", "exit", "sleep 30 &"]);
        let pids_before_exit = {
            // Run the first two lines by hand to capture the pids.
            let mut out = Vec::new();
            let mut err = Vec::new();
            for _ in 0..2 {
                let line = lines.read_line("").unwrap().unwrap();
                sh.execute_line(&line, &mut out, &mut err).unwrap();
            }
            sh.jobs().list().map(|e| e.job.pid).collect::<Vec<_>>()
        };
        assert_eq!(pids_before_exit.len(), 2);

        assert_eq!(sh.repl(&mut lines), 0);
        assert!(sh.should_exit());
        assert!(sh.jobs().is_empty());
        // The line after `exit` was never read.
        assert_eq!(lines.read_line("").unwrap().as_deref(), Some("sleep 30 &"));
        for pid in pids_before_exit {
            assert_eq!(crate::signals::wait_for(pid), 128 + nix::sys::signal::Signal::SIGTERM as i32);
        }
    }

    #[test]
    fn repl_treats_end_of_input_like_exit() {
        let _lock = lock_process_state();
        let mut sh = shell();
        let mut lines = ScriptedLines::new(["sleep 30 &"]);
        assert_eq!(sh.repl(&mut lines), 0);
        assert!(sh.jobs().is_empty());
        assert!(sh.should_exit());
    }
}
