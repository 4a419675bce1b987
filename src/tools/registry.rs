use std::collections::HashMap;
use std::io;
use std::process::{Child, ExitStatus};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};
use tracing::warn;

/// State of a registered child after a non-blocking check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildState {
    Running,
    Exited(ExitStatus),
    /// Removed and killed by `terminate_all`
    Stopped,
}

/// Every external tool currently running, keyed by PID.
///
/// The interrupt handler calls `terminate_all`, which kills and reaps each
/// child and refuses any child registered afterwards.
#[derive(Debug, Default)]
pub struct ChildRegistry {
    children: Mutex<HashMap<u32, Child>>,
    terminated: AtomicBool,
}

impl ChildRegistry {
    /// Process-wide registry shared by `ProcessRunner::default()` and the signal handler
    pub fn global() -> Arc<ChildRegistry> {
        static GLOBAL: OnceLock<Arc<ChildRegistry>> = OnceLock::new();
        GLOBAL.get_or_init(|| Arc::new(ChildRegistry::default())).clone()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<u32, Child>> {
        self.children.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Take ownership of a freshly spawned child and return its PID.
    ///
    /// After `terminate_all` the child is killed straight away and `None`
    /// is returned.
    pub fn register(&self, mut child: Child) -> Option<u32> {
        let mut children = self.lock();
        if self.terminated.load(Ordering::SeqCst) {
            let _ = child.kill();
            let _ = child.wait();
            return None;
        }
        let pid = child.id();
        children.insert(pid, child);
        Some(pid)
    }

    pub fn poll(&self, pid: u32) -> io::Result<ChildState> {
        let mut children = self.lock();
        let child = match children.get_mut(&pid) {
            Some(child) => child,
            None => return Ok(ChildState::Stopped),
        };
        match child.try_wait() {
            Ok(Some(status)) => {
                children.remove(&pid);
                Ok(ChildState::Exited(status))
            }
            Ok(None) => Ok(ChildState::Running),
            Err(e) => {
                if let Some(mut child) = children.remove(&pid) {
                    let _ = child.kill();
                    let _ = child.wait();
                }
                Err(e)
            }
        }
    }

    /// Kill and reap every running child; returns how many were stopped.
    pub fn terminate_all(&self) -> usize {
        self.terminated.store(true, Ordering::SeqCst);
        let drained: Vec<(u32, Child)> = self.lock().drain().collect();
        let stopped = drained.len();
        for (pid, mut child) in drained {
            warn!("Stopping child process {}", pid);
            if let Err(e) = child.kill() {
                warn!("Could not kill process {}: {}", pid, e);
            }
            let _ = child.wait();
        }
        stopped
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::SeqCst)
    }

    /// PIDs of the children still running, sorted
    pub fn pids(&self) -> Vec<u32> {
        let mut pids: Vec<u32> = self.lock().keys().copied().collect();
        pids.sort_unstable();
        pids
    }
}
