use crate::jobs::JobTable;
use crate::signals::SignalController;
use nix::sys::signal::{self, Signal};

/// Mutable engine state shared by the built-ins and the launcher.
///
/// The environment contains:
/// - `jobs`: the background job table.
/// - `signals`: the installed signal controller, which owns the foreground slot.
/// - `should_exit`: set by `exit`; the prompt loop checks it after every command.
#[derive(Debug)]
pub struct Environment {
    pub jobs: JobTable,
    pub signals: SignalController,
    pub should_exit: bool,
}

impl Environment {
    pub fn new(signals: SignalController) -> Self {
        Self {
            jobs: JobTable::new(),
            signals,
            should_exit: false,
        }
    }

    /// The termination sequence: SIGTERM to every background job, an empty job
    /// table, and SIGKILL to an outstanding foreground child.
    ///
    /// This is the only sanctioned way out of the shell; `exit`, end of input and
    /// fatal errors all run it before the process ends.
    pub fn terminate(&mut self) {
        for job in self.jobs.drain() {
            tracing::info!(pid = job.pid.as_raw(), name = %job.name, "terminating background job");
            if let Err(err) = signal::kill(job.pid, Signal::SIGTERM) {
                tracing::debug!(pid = job.pid.as_raw(), %err, "job already gone");
            }
        }
        self.signals.kill_foreground();
        self.should_exit = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lock_process_state;
    use nix::unistd::Pid;
    use std::os::unix::process::ExitStatusExt;
    use std::process::Command;

    #[test]
    fn terminate_signals_every_job_and_clears_table() {
        let _lock = lock_process_state();
        let mut env = Environment::new(SignalController::install().unwrap());

        let mut first = Command::new("sleep").arg("30").spawn().unwrap();
        let mut second = Command::new("sleep").arg("30").spawn().unwrap();
        env.jobs.append(Pid::from_raw(first.id() as i32), "sleep");
        env.jobs.append(Pid::from_raw(second.id() as i32), "sleep");

        env.terminate();

        assert!(env.jobs.is_empty());
        assert!(env.should_exit);
        assert_eq!(first.wait().unwrap().signal(), Some(Signal::SIGTERM as i32));
        assert_eq!(second.wait().unwrap().signal(), Some(Signal::SIGTERM as i32));
    }

    #[test]
    fn terminate_tolerates_finished_jobs() {
        let _lock = lock_process_state();
        let mut env = Environment::new(SignalController::install().unwrap());
        // Left unreaped, the finished child stays a zombie and keeps its pid.
        let mut done = Command::new("true").spawn().unwrap();
        std::thread::sleep(std::time::Duration::from_millis(50));
        env.jobs.append(Pid::from_raw(done.id() as i32), "true");

        env.terminate();
        assert!(env.jobs.is_empty());
        assert!(done.wait().unwrap().success());
    }
}
