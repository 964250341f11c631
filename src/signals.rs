//! Keyboard signal routing for the foreground child.
//!
//! The interrupt handler only reads one atomic pid and asks the kernel to kill
//! that process; it never touches the job table or any other in-process
//! collection. The suspend handler does nothing at all.

use crate::command::ExitCode;
use crate::error::ShellError;
use nix::errno::Errno;
use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, Signal};
use nix::sys::wait::{WaitStatus, waitpid};
use nix::unistd::{Pid, getpgrp, tcsetpgrp};
use std::io::IsTerminal;
use std::os::fd::BorrowedFd;
use std::sync::atomic::{AtomicI32, Ordering};

/// Pid of the child the interpreter is currently blocked on, or 0.
static FOREGROUND_PID: AtomicI32 = AtomicI32::new(0);

extern "C" fn on_interrupt(_: nix::libc::c_int) {
    let pid = FOREGROUND_PID.load(Ordering::SeqCst);
    if pid > 0 {
        let _ = signal::kill(Pid::from_raw(pid), Signal::SIGKILL);
    }
    // SAFETY: fd 1 stays open for the life of the interpreter.
    let stdout = unsafe { BorrowedFd::borrow_raw(nix::libc::STDOUT_FILENO) };
    let _ = nix::unistd::write(stdout, b"\n");
}

extern "C" fn on_suspend(_: nix::libc::c_int) {}

fn set_disposition(sig: Signal, handler: SigHandler) -> Result<(), ShellError> {
    let action = SigAction::new(handler, SaFlags::SA_RESTART, SigSet::empty());
    // SAFETY: the handlers above only perform async-signal-safe work: an atomic
    // load, kill(2) and write(2).
    unsafe { signal::sigaction(sig, &action) }
        .map(|_| ())
        .map_err(ShellError::SignalInstall)
}

/// Owns the interpreter's signal dispositions and its foreground slot.
///
/// States: no foreground child (slot empty) and foreground child active (slot
/// holds a pid). [`SignalController::foreground`] enters the active state for the
/// lifetime of the returned guard.
#[derive(Debug)]
pub struct SignalController {
    _private: (),
}

impl SignalController {
    /// Install the interrupt and suspend handlers and ignore SIGTTOU, so taking
    /// back the terminal after `fg` never stops the interpreter.
    pub fn install() -> Result<Self, ShellError> {
        set_disposition(Signal::SIGINT, SigHandler::Handler(on_interrupt))?;
        set_disposition(Signal::SIGTSTP, SigHandler::Handler(on_suspend))?;
        set_disposition(Signal::SIGTTOU, SigHandler::SigIgn)?;
        tracing::debug!("signal handlers installed");
        Ok(Self { _private: () })
    }

    /// Enter the active state for `pid` until the guard is dropped.
    pub fn foreground(&self, pid: Pid) -> ForegroundGuard {
        FOREGROUND_PID.store(pid.as_raw(), Ordering::SeqCst);
        tracing::debug!(pid = pid.as_raw(), "foreground child active");
        ForegroundGuard { pid }
    }

    /// Block until `pid` ends, with keyboard interrupts routed to it.
    pub fn wait_foreground(&self, pid: Pid) -> ExitCode {
        let _guard = self.foreground(pid);
        wait_for(pid)
    }

    /// Pid currently in the foreground slot.
    pub fn current_foreground(&self) -> Option<Pid> {
        match FOREGROUND_PID.load(Ordering::SeqCst) {
            0 => None,
            pid => Some(Pid::from_raw(pid)),
        }
    }

    /// Forcibly terminate the foreground child, if one is outstanding.
    pub fn kill_foreground(&self) {
        if let Some(pid) = self.current_foreground() {
            tracing::info!(pid = pid.as_raw(), "killing foreground child");
            let _ = signal::kill(pid, Signal::SIGKILL);
        }
    }
}

/// Clears the foreground slot on drop.
#[derive(Debug)]
pub struct ForegroundGuard {
    pid: Pid,
}

impl Drop for ForegroundGuard {
    fn drop(&mut self) {
        let _ = FOREGROUND_PID.compare_exchange(
            self.pid.as_raw(),
            0,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
        tracing::debug!(pid = self.pid.as_raw(), "foreground child cleared");
    }
}

/// Restore the dispositions a freshly forked child should run with.
///
/// Interrupt and SIGTTOU go back to their defaults. Suspend is ignored, which
/// survives exec, so the suspend keystroke is absorbed by the child too.
pub fn reset_for_child() {
    let default = SigAction::new(SigHandler::SigDfl, SaFlags::empty(), SigSet::empty());
    let ignore = SigAction::new(SigHandler::SigIgn, SaFlags::empty(), SigSet::empty());
    // SAFETY: installing SIG_DFL / SIG_IGN runs no user code.
    unsafe {
        let _ = signal::sigaction(Signal::SIGINT, &default);
        let _ = signal::sigaction(Signal::SIGTTOU, &default);
        let _ = signal::sigaction(Signal::SIGTSTP, &ignore);
    }
}

/// Make `pgid` the terminal's foreground process group.
///
/// Returns `false` without doing anything when stdin is not a terminal.
pub fn give_terminal_to(pgid: Pid) -> bool {
    let stdin = std::io::stdin();
    if !stdin.is_terminal() {
        return false;
    }
    match tcsetpgrp(&stdin, pgid) {
        Ok(()) => true,
        Err(err) => {
            tracing::warn!(pgid = pgid.as_raw(), %err, "could not hand over the terminal");
            false
        }
    }
}

/// Continue a job the terminal may have stopped (SIGTTIN/SIGTTOU, or SIGSTOP).
///
/// Background jobs lead their own group, so the whole group is continued. A job
/// that never got a group of its own falls back to a single SIGCONT.
pub fn resume(pgid: Pid) {
    match signal::killpg(pgid, Signal::SIGCONT) {
        Ok(()) => {}
        Err(Errno::ESRCH) => {
            let _ = signal::kill(pgid, Signal::SIGCONT);
        }
        Err(err) => {
            tracing::warn!(pgid = pgid.as_raw(), %err, "could not continue job");
        }
    }
}

/// Take the terminal back for the interpreter's own process group.
pub fn reclaim_terminal() {
    give_terminal_to(getpgrp());
}

/// Reap `pid`, retrying when the wait is interrupted.
pub fn wait_for(pid: Pid) -> ExitCode {
    loop {
        match waitpid(pid, None) {
            Ok(WaitStatus::Exited(_, code)) => return code,
            Ok(WaitStatus::Signaled(_, sig, _)) => return 128 + sig as i32,
            Ok(_) | Err(Errno::EINTR) => continue,
            Err(err) => {
                tracing::debug!(pid = pid.as_raw(), %err, "nothing to wait for");
                return 0;
            }
        }
    }
}
