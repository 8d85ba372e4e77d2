//! Tracking, termination, and collection of the foreground job.

use std::process::Child;

#[cfg(unix)]
use std::io;
#[cfg(unix)]
use std::sync::{Mutex, MutexGuard};

#[cfg(unix)]
use libc::pid_t;

/// Ordered pids of the command currently being waited on; empty whenever
/// the shell is idle at its prompt.
///
/// The main flow is the only writer of the contents and fills the list
/// completely before the first wait begins; the Ctrl-C handler thread only
/// reads it and issues kills.
#[cfg(unix)]
static FOREGROUND: Mutex<Vec<pid_t>> = Mutex::new(Vec::new());

#[cfg(unix)]
fn foreground_pids() -> MutexGuard<'static, Vec<pid_t>> {
    // A poisoned lock only means a panicking thread held it; the pid list
    // itself is still usable.
    FOREGROUND.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Configure the process-wide child-termination disposition so detached
/// background children are reaped automatically and never become zombies.
/// Called once at shell startup.
pub fn configure_child_auto_reap() {
    #[cfg(unix)]
    unsafe {
        libc::signal(libc::SIGCHLD, libc::SIG_IGN);
    }
}

/// Forcibly terminate every process of the current foreground job.
///
/// Runs on the Ctrl-C handler thread. No graceful phase, no escalation:
/// each registered pid gets SIGKILL. A no-op while the shell is idle.
pub fn terminate_foreground() {
    #[cfg(unix)]
    for &pid in foreground_pids().iter() {
        unsafe {
            libc::kill(pid, libc::SIGKILL);
        }
    }
}

/// Scoped registration of a foreground job: fills the registry on
/// construction, and clearing is guaranteed on every exit path of the
/// waiting routine, including cancellation.
#[cfg(unix)]
struct ForegroundGuard;

#[cfg(unix)]
impl ForegroundGuard {
    fn register(pids: &[pid_t]) -> Self {
        let mut foreground = foreground_pids();
        foreground.clear();
        foreground.extend_from_slice(pids);
        ForegroundGuard
    }
}

#[cfg(unix)]
impl Drop for ForegroundGuard {
    fn drop(&mut self) {
        foreground_pids().clear();
    }
}

/// Block until every child of the foreground command has been collected,
/// once per child in spawn order.
///
/// Ctrl-C during the wait kills the registered pids from the handler
/// thread; the pending waits then observe the terminations and the guard
/// clears the registry on the way out.
pub fn wait_foreground(children: Vec<Child>) {
    if children.is_empty() {
        return;
    }

    #[cfg(unix)]
    {
        let pids: Vec<pid_t> = children.iter().map(|child| child.id() as pid_t).collect();
        let _guard = ForegroundGuard::register(&pids);
        for &pid in &pids {
            wait_for_pid(pid);
        }
    }

    #[cfg(not(unix))]
    for mut child in children {
        let _ = child.wait();
    }
}

/// Forcibly terminate and collect every child spawned so far in an aborted
/// command, so no stage is left orphaned. Invoked on every abort branch of
/// the spawn loop.
pub fn reap_aborted(children: &mut Vec<Child>) {
    for child in children.iter_mut() {
        let _ = child.kill();
        // May fail with ECHILD once the auto-reap disposition has already
        // collected the child; either way it is gone.
        let _ = child.wait();
    }
    children.clear();
}

/// Wait for one child to exit or stop, retrying on EINTR.
///
/// ECHILD means the child was already collected under the process-wide
/// auto-reap disposition and counts as collected here too.
#[cfg(unix)]
fn wait_for_pid(pid: pid_t) {
    let mut raw_status: libc::c_int = 0;

    loop {
        let rc = unsafe { libc::waitpid(pid, &mut raw_status, libc::WUNTRACED) };
        if rc >= 0 {
            return;
        }

        let err = io::Error::last_os_error();
        match err.raw_os_error() {
            Some(code) if code == libc::EINTR => continue,
            Some(code) if code == libc::ECHILD => return,
            _ => {
                eprintln!("tsh: wait failed: {err}");
                return;
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::process::Command;

    // The registry is process-wide, so every scenario touching it runs
    // inside this one test to keep the parallel test runner away from it.
    #[test]
    fn foreground_registry_lifecycle() {
        // Idle shell: terminating with an empty registry is a no-op.
        assert!(foreground_pids().is_empty());
        terminate_foreground();

        // Scoped registration clears on drop.
        {
            let _guard = ForegroundGuard::register(&[12345, 12346]);
            assert_eq!(*foreground_pids(), vec![12345, 12346]);
        }
        assert!(foreground_pids().is_empty());

        // A full wait leaves the registry empty again.
        let children: Vec<Child> = (0..3)
            .map(|_| Command::new("true").spawn().expect("spawn true"))
            .collect();
        wait_foreground(children);
        assert!(foreground_pids().is_empty());
    }

    #[test]
    fn reap_aborted_terminates_spawned_children() {
        let mut children = vec![
            Command::new("sleep").arg("30").spawn().expect("spawn sleep"),
        ];
        let pid = children[0].id();
        reap_aborted(&mut children);
        assert!(children.is_empty());

        // The process must be gone (or a zombie already collected above).
        let alive = unsafe { libc::kill(pid as pid_t, 0) } == 0;
        assert!(!alive, "child {pid} still running after reap");
    }
}
