//! Process creation for external commands, pipelines and redirections.
//!
//! Every external command line gets exactly one "command child" forked from the
//! interpreter. That child is what the interpreter waits on, or records as a
//! background job. For `cmd1 | cmd2` the command child allocates the pipe, forks
//! once more for `cmd2` (the reading side) and then becomes `cmd1` itself.
//!
//! Everything a child needs (argument vectors, error messages, the redirection
//! target) is prepared before forking, so the code running after `fork` only
//! makes system calls.

use crate::builtin;
use crate::command::{CommandLine, EXIT_NOT_EXECUTED, ExitCode};
use crate::env::Environment;
use crate::error::{Result, ShellError};
use crate::parser::Command;
use crate::signals;
use nix::unistd::{self, ForkResult, Pid};
use std::ffi::CString;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::os::fd::BorrowedFd;
use std::os::unix::fs::OpenOptionsExt;

/// An argument vector ready for the program loader.
#[derive(Debug)]
pub struct ProgramImage {
    argv: Vec<CString>,
    failure: Vec<u8>,
}

impl ProgramImage {
    pub fn new(argv: &[String]) -> Result<Self> {
        let name = argv
            .first()
            .ok_or_else(|| ShellError::Usage("Error, empty command.".to_string()))?;
        let argv = argv
            .iter()
            .map(|a| CString::new(a.as_bytes()))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| ShellError::Resolution {
                command: name.clone(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            argv,
            failure: format!("Error, could not execute command \"{name}\".\n").into_bytes(),
        })
    }

    /// Replace the current process image. Only returns by exiting the process.
    fn exec(&self) -> ! {
        let _ = unistd::execvp(self.argv[0].as_c_str(), &self.argv);
        child_fail(&self.failure, EXIT_NOT_EXECUTED)
    }
}

/// What the command child does after `fork`.
#[derive(Debug)]
enum ChildPlan {
    Plain(ProgramImage),
    Redirect { program: ProgramImage, target: File },
    Pipe { left: ProgramImage, right: ProgramImage },
}

/// Write a diagnostic and leave a child process without running any exit hooks.
fn child_fail(message: &[u8], status: ExitCode) -> ! {
    // SAFETY: fd 2 is open in every child the shell forks.
    let stderr = unsafe { BorrowedFd::borrow_raw(nix::libc::STDERR_FILENO) };
    let _ = unistd::write(stderr, message);
    // SAFETY: _exit(2) skips atexit handlers and stdio flushing, which a forked
    // child must not run.
    unsafe { nix::libc::_exit(status) }
}

impl ChildPlan {
    /// Body of the command child.
    fn run(self) -> ! {
        match self {
            ChildPlan::Plain(program) => program.exec(),
            ChildPlan::Redirect { program, target } => {
                if unistd::dup2_stdout(&target).is_err() {
                    child_fail(b"Error, could not redirect output.\n", 1);
                }
                drop(target);
                program.exec()
            }
            ChildPlan::Pipe { left, right } => {
                let (read_end, write_end) = match unistd::pipe() {
                    Ok(ends) => ends,
                    Err(_) => child_fail(b"Error, could not create pipe.\n", 1),
                };
                // SAFETY: the command child is single-threaded.
                match unsafe { unistd::fork() } {
                    Err(_) => child_fail(b"Forked failed.\n", 1),
                    Ok(ForkResult::Child) => {
                        if unistd::dup2_stdin(&read_end).is_err() {
                            child_fail(b"Error, could not read from pipe.\n", 1);
                        }
                        drop(read_end);
                        drop(write_end);
                        right.exec()
                    }
                    Ok(ForkResult::Parent { .. }) => {
                        if unistd::dup2_stdout(&write_end).is_err() {
                            child_fail(b"Error, could not write to pipe.\n", 1);
                        }
                        drop(read_end);
                        drop(write_end);
                        left.exec()
                    }
                }
            }
        }
    }
}

/// Open `target` for the redirected command: created if missing, truncated if not.
fn open_target(target: &str) -> Result<File> {
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o644)
        .open(target)
        .map_err(|source| ShellError::Resource {
            what: format!("open {target}"),
            source,
        })
}

/// Turn a classified command into a child plan, rejecting wrapped built-ins.
fn plan(command: &Command<'_>) -> Result<ChildPlan> {
    match *command {
        Command::Plain(argv) => Ok(ChildPlan::Plain(ProgramImage::new(argv)?)),
        Command::Redirect {
            argv,
            target,
            ignored,
        } => {
            if builtin::is_builtin(argv) {
                return Err(ShellError::BuiltinNotAllowed { action: "redirect output of" });
            }
            if !ignored.is_empty() {
                tracing::warn!(?ignored, "words after the redirection target are ignored");
            }
            let program = ProgramImage::new(argv)?;
            let target = open_target(target)?;
            Ok(ChildPlan::Redirect { program, target })
        }
        Command::Pipe { left, right } => {
            if builtin::is_builtin(left) || builtin::is_builtin(right) {
                return Err(ShellError::BuiltinNotAllowed { action: "pipe" });
            }
            Ok(ChildPlan::Pipe {
                left: ProgramImage::new(left)?,
                right: ProgramImage::new(right)?,
            })
        }
    }
}

/// Fork the command child and either wait for it or record it as a job.
///
/// Returns the child's status for a foreground command and `None` for a
/// background one. A fork failure comes back as the fatal [`ShellError::Fork`].
fn spawn(plan: ChildPlan, line: &CommandLine, env: &mut Environment) -> Result<Option<ExitCode>> {
    let _ = std::io::stdout().flush();
    // SAFETY: the child only calls async-signal-safe functions before exec or _exit.
    let pid = match unsafe { unistd::fork() } {
        Err(err) => return Err(ShellError::Fork(err)),
        Ok(ForkResult::Child) => {
            if line.background {
                let _ = unistd::setpgid(Pid::from_raw(0), Pid::from_raw(0));
            }
            signals::reset_for_child();
            plan.run()
        }
        Ok(ForkResult::Parent { child }) => child,
    };
    // Closes the redirection target on the interpreter's side.
    drop(plan);

    if line.background {
        // Also set from the parent so the group exists before anyone signals it.
        let _ = unistd::setpgid(pid, pid);
        let number = env.jobs.append(pid, line.name());
        tracing::info!(pid = pid.as_raw(), number, "started background job");
        Ok(None)
    } else {
        tracing::debug!(pid = pid.as_raw(), "waiting for foreground child");
        Ok(Some(env.signals.wait_foreground(pid)))
    }
}

/// Execute one classified command line.
///
/// Plain built-ins run synchronously inside the interpreter, whatever the
/// background flag says. Everything else goes through a forked child.
pub fn launch(
    command: &Command<'_>,
    line: &CommandLine,
    stdout: &mut dyn Write,
    env: &mut Environment,
) -> Result<Option<ExitCode>> {
    if let Command::Plain(argv) = *command {
        if builtin::is_builtin(argv) {
            return builtin::execute(argv, stdout, env).map(Some);
        }
    }
    let plan = plan(command)?;
    spawn(plan, line, env)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lock_process_state;
    use crate::parser::classify;
    use crate::signals::SignalController;
    use std::fs;

    fn line(s: &str) -> CommandLine {
        crate::lexer::split_into_tokens(s, 32).unwrap()
    }

    fn run(s: &str, env: &mut Environment) -> Result<Option<ExitCode>> {
        let line = line(s);
        let classified = classify(&line.args);
        let command = classified.command.expect("well-formed line");
        let mut out = Vec::new();
        launch(&command, &line, &mut out, env)
    }

    fn new_env() -> Environment {
        Environment::new(SignalController::install().unwrap())
    }

    #[test]
    fn program_image_keeps_argument_order() {
        let image = ProgramImage::new(&["ls".to_string(), "-l".to_string()]).unwrap();
        assert_eq!(image.argv, vec![c"ls".to_owned(), c"-l".to_owned()]);
        assert_eq!(image.failure, b"Error, could not execute command \"ls\".\n");
        assert!(ProgramImage::new(&[]).is_err());
    }

    #[test]
    fn foreground_status_is_returned() {
        let _lock = lock_process_state();
        let mut env = new_env();
        assert_eq!(run("true", &mut env).unwrap(), Some(0));
        assert_eq!(run("false", &mut env).unwrap(), Some(1));
        assert!(env.jobs.is_empty());
    }

    #[test]
    fn unknown_program_fails_only_the_child() {
        let _lock = lock_process_state();
        let mut env = new_env();
        let status = run("no-such-program-anywhere --flag", &mut env).unwrap();
        assert_eq!(status, Some(EXIT_NOT_EXECUTED));
    }

    #[test]
    fn background_command_becomes_one_job() {
        let _lock = lock_process_state();
        let mut env = new_env();
        assert_eq!(run("sleep 30 &", &mut env).unwrap(), None);
        assert_eq!(env.jobs.len(), 1);
        let job = env.jobs.get(1).unwrap().clone();
        assert_eq!(job.name, "sleep");
        env.terminate();
        signals::wait_for(job.pid);
    }

    #[test]
    fn redirect_writes_child_output_to_file() {
        let _lock = lock_process_state();
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.txt");
        fs::write(&target, "stale contents that must disappear\n").unwrap();
        let mut env = new_env();

        let status = run(&format!("echo hello world > {}", target.display()), &mut env).unwrap();
        assert_eq!(status, Some(0));
        assert_eq!(fs::read_to_string(&target).unwrap(), "hello world\n");
    }

    #[test]
    fn redirect_of_builtin_is_rejected_without_touching_file() {
        let _lock = lock_process_state();
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.txt");
        let mut env = new_env();

        let err = run(&format!("pwd > {}", target.display()), &mut env).unwrap_err();
        assert!(matches!(err, ShellError::BuiltinNotAllowed { .. }));
        assert!(!target.exists());
    }

    #[test]
    fn pipe_with_builtin_on_either_side_is_rejected() {
        let _lock = lock_process_state();
        let mut env = new_env();
        for s in ["cd / | wc", "ls | jobs"] {
            let err = run(s, &mut env).unwrap_err();
            assert_eq!(err.to_string(), "Error, cannot pipe built-in commands.");
        }
        assert!(env.jobs.is_empty());
    }

    #[test]
    fn pipe_connects_both_sides() {
        let _lock = lock_process_state();
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("piped.txt");
        let mut env = new_env();

        // Only the writing side is waited on; the reader finishes on its own.
        let helper = dir.path().join("upper.sh");
        fs::write(&helper, format!("#!/bin/sh\ntr a-z A-Z > {}\n", target.display())).unwrap();
        let status = run(&format!("echo piped | sh {}", helper.display()), &mut env).unwrap();
        assert_eq!(status, Some(0));

        let mut contents = String::new();
        for _ in 0..100 {
            contents = fs::read_to_string(&target).unwrap_or_default();
            if !contents.is_empty() {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(20));
        }
        assert_eq!(contents, "PIPED\n");
    }

    #[test]
    fn plain_builtin_runs_in_process() {
        let _lock = lock_process_state();
        let mut env = new_env();
        let line = line("jobs &");
        let command = classify(&line.args).command.unwrap();
        let mut out = Vec::new();
        let status = launch(&command, &line, &mut out, &mut env).unwrap();
        assert_eq!(status, Some(0));
        assert!(env.jobs.is_empty());
        assert!(String::from_utf8(out).unwrap().starts_with("No job"));
    }
}
