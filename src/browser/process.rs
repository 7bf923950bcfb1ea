//! Reaping of browser processes left behind after close.
//!
//! The browser may leave orphaned renderer or helper processes when its own
//! shutdown fails or hangs. The process tree under the browser's root
//! process is snapshotted while it is intact and reaped after the browser
//! closes: survivors get time to exit on their own, then SIGTERM, then
//! SIGKILL. Processes outside that tree are never touched.

use std::io;
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use crate::config::ReapTimeouts;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// One OS process, identified by pid and start time so a reused pid is not
/// mistaken for the original process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProcessHandle {
    pub pid: u32,
    pub start_time: u64,
}

/// Process introspection and signalling.
pub trait ProcessGroup: Send + Sync {
    /// `root` and all of its live descendants.
    fn snapshot(&self, root: u32) -> Vec<ProcessHandle>;
    fn is_alive(&self, process: &ProcessHandle) -> bool;
    fn terminate(&self, process: &ProcessHandle) -> io::Result<()>;
    fn kill(&self, process: &ProcessHandle) -> io::Result<()>;
}

/// For platforms without process introspection: nothing is ever tracked.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProcessGroup;

impl ProcessGroup for NoopProcessGroup {
    fn snapshot(&self, _root: u32) -> Vec<ProcessHandle> {
        Vec::new()
    }

    fn is_alive(&self, _process: &ProcessHandle) -> bool {
        false
    }

    fn terminate(&self, _process: &ProcessHandle) -> io::Result<()> {
        Ok(())
    }

    fn kill(&self, _process: &ProcessHandle) -> io::Result<()> {
        Ok(())
    }
}

/// Best available process group for this platform.
pub fn default_process_group() -> Box<dyn ProcessGroup> {
    #[cfg(target_os = "linux")]
    {
        Box::new(ProcfsProcessGroup)
    }
    #[cfg(not(target_os = "linux"))]
    {
        Box::new(NoopProcessGroup)
    }
}

/// Process tree tracking through `/proc`.
#[cfg(target_os = "linux")]
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcfsProcessGroup;

#[cfg(target_os = "linux")]
struct ProcStat {
    state: char,
    ppid: u32,
    start_time: u64,
}

#[cfg(target_os = "linux")]
impl ProcfsProcessGroup {
    fn read_stat(pid: u32) -> Option<ProcStat> {
        let raw = std::fs::read_to_string(format!("/proc/{pid}/stat")).ok()?;
        parse_stat(&raw)
    }

    fn signal(process: &ProcessHandle, signal: nix::sys::signal::Signal) -> io::Result<()> {
        use nix::errno::Errno;
        use nix::sys::signal::kill;
        use nix::unistd::Pid;

        match kill(Pid::from_raw(process.pid as i32), signal) {
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(errno) => Err(io::Error::from(errno)),
        }
    }
}

/// Parses `/proc/<pid>/stat`. The command name may contain spaces and
/// parentheses, so fields are counted from the last `)`.
#[cfg(target_os = "linux")]
fn parse_stat(raw: &str) -> Option<ProcStat> {
    let after_comm = &raw[raw.rfind(')')? + 1..];
    let fields: Vec<&str> = after_comm.split_whitespace().collect();
    Some(ProcStat {
        state: fields.first()?.chars().next()?,
        ppid: fields.get(1)?.parse().ok()?,
        start_time: fields.get(19)?.parse().ok()?,
    })
}

#[cfg(target_os = "linux")]
impl ProcessGroup for ProcfsProcessGroup {
    fn snapshot(&self, root: u32) -> Vec<ProcessHandle> {
        let entries = match std::fs::read_dir("/proc") {
            Ok(entries) => entries,
            Err(err) => {
                warn!(error = %err, "Cannot read /proc; child processes will not be tracked");
                return Vec::new();
            }
        };

        let table: Vec<(u32, ProcStat)> = entries
            .filter_map(|entry| entry.ok()?.file_name().to_str()?.parse::<u32>().ok())
            .filter_map(|pid| Some((pid, Self::read_stat(pid)?)))
            .collect();

        let mut found: Vec<ProcessHandle> = table
            .iter()
            .filter(|(pid, stat)| *pid == root && !matches!(stat.state, 'Z' | 'X'))
            .map(|(pid, stat)| ProcessHandle {
                pid: *pid,
                start_time: stat.start_time,
            })
            .collect();
        let mut parents = vec![root];
        while let Some(parent) = parents.pop() {
            for (pid, stat) in &table {
                if stat.ppid == parent && !matches!(stat.state, 'Z' | 'X') {
                    found.push(ProcessHandle {
                        pid: *pid,
                        start_time: stat.start_time,
                    });
                    parents.push(*pid);
                }
            }
        }
        found
    }

    fn is_alive(&self, process: &ProcessHandle) -> bool {
        match Self::read_stat(process.pid) {
            Some(stat) => {
                stat.start_time == process.start_time && !matches!(stat.state, 'Z' | 'X')
            }
            None => false,
        }
    }

    fn terminate(&self, process: &ProcessHandle) -> io::Result<()> {
        Self::signal(process, nix::sys::signal::Signal::SIGTERM)
    }

    fn kill(&self, process: &ProcessHandle) -> io::Result<()> {
        Self::signal(process, nix::sys::signal::Signal::SIGKILL)
    }
}

/// Outcome of [`reap`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReapReport {
    /// Exited without a signal.
    pub exited: usize,
    /// Exited after SIGTERM.
    pub terminated: usize,
    /// Still running after SIGTERM and sent SIGKILL.
    pub killed: usize,
}

/// Waits for `snapshot` to exit, escalating to SIGTERM and then SIGKILL.
pub async fn reap(
    group: &dyn ProcessGroup,
    snapshot: &[ProcessHandle],
    timeouts: ReapTimeouts,
) -> ReapReport {
    let mut report = ReapReport::default();
    let alive = wait_for_exit(group, snapshot.to_vec(), timeouts.natural_exit).await;
    report.exited = snapshot.len() - alive.len();
    if alive.is_empty() {
        return report;
    }

    for process in &alive {
        debug!(pid = process.pid, "Sending SIGTERM to leftover browser process");
        if let Err(err) = group.terminate(process) {
            warn!(pid = process.pid, error = %err, "Failed to terminate process");
        }
    }
    let survivors = wait_for_exit(group, alive.clone(), timeouts.terminate).await;
    report.terminated = alive.len() - survivors.len();

    for process in &survivors {
        warn!(pid = process.pid, "Killing browser process that ignored SIGTERM");
        if let Err(err) = group.kill(process) {
            warn!(pid = process.pid, error = %err, "Failed to kill process");
        }
    }
    report.killed = survivors.len();
    report
}

async fn wait_for_exit(
    group: &dyn ProcessGroup,
    mut pending: Vec<ProcessHandle>,
    timeout: Duration,
) -> Vec<ProcessHandle> {
    let deadline = Instant::now() + timeout;
    loop {
        pending.retain(|process| group.is_alive(process));
        let now = Instant::now();
        if pending.is_empty() || now >= deadline {
            return pending;
        }
        sleep(POLL_INTERVAL.min(deadline - now)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Clone, Copy, PartialEq, Debug)]
    enum Behaviour {
        ExitsAlone,
        ExitsOnTerm,
        IgnoresTerm,
    }

    #[derive(Default)]
    struct ScriptedGroup {
        behaviours: HashMap<u32, Behaviour>,
        dead: Mutex<Vec<u32>>,
        signals: Mutex<Vec<(u32, &'static str)>>,
    }

    impl ScriptedGroup {
        fn with(processes: &[(u32, Behaviour)]) -> Self {
            let group = Self {
                behaviours: processes.iter().copied().collect(),
                ..Self::default()
            };
            for (pid, behaviour) in processes {
                if *behaviour == Behaviour::ExitsAlone {
                    group.dead.lock().unwrap().push(*pid);
                }
            }
            group
        }

        fn handles(&self) -> Vec<ProcessHandle> {
            let mut pids: Vec<u32> = self.behaviours.keys().copied().collect();
            pids.sort();
            pids.into_iter()
                .map(|pid| ProcessHandle { pid, start_time: 0 })
                .collect()
        }
    }

    impl ProcessGroup for ScriptedGroup {
        fn snapshot(&self, _root: u32) -> Vec<ProcessHandle> {
            self.handles()
        }

        fn is_alive(&self, process: &ProcessHandle) -> bool {
            !self.dead.lock().unwrap().contains(&process.pid)
        }

        fn terminate(&self, process: &ProcessHandle) -> io::Result<()> {
            self.signals.lock().unwrap().push((process.pid, "TERM"));
            if self.behaviours[&process.pid] == Behaviour::ExitsOnTerm {
                self.dead.lock().unwrap().push(process.pid);
            }
            Ok(())
        }

        fn kill(&self, process: &ProcessHandle) -> io::Result<()> {
            self.signals.lock().unwrap().push((process.pid, "KILL"));
            self.dead.lock().unwrap().push(process.pid);
            Ok(())
        }
    }

    fn short() -> ReapTimeouts {
        ReapTimeouts {
            natural_exit: Duration::from_millis(30),
            terminate: Duration::from_millis(30),
        }
    }

    #[tokio::test]
    async fn exited_processes_get_no_signals() {
        let group = ScriptedGroup::with(&[(1, Behaviour::ExitsAlone), (2, Behaviour::ExitsAlone)]);
        let report = reap(&group, &group.snapshot(0), short()).await;
        assert_eq!(
            report,
            ReapReport {
                exited: 2,
                terminated: 0,
                killed: 0
            }
        );
        assert!(group.signals.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn escalates_from_term_to_kill() {
        let group = ScriptedGroup::with(&[
            (1, Behaviour::ExitsAlone),
            (2, Behaviour::ExitsOnTerm),
            (3, Behaviour::IgnoresTerm),
        ]);
        let report = reap(&group, &group.snapshot(0), short()).await;
        assert_eq!(
            report,
            ReapReport {
                exited: 1,
                terminated: 1,
                killed: 1
            }
        );
        let signals = group.signals.lock().unwrap().clone();
        assert_eq!(signals, vec![(2, "TERM"), (3, "TERM"), (3, "KILL")]);
    }

    #[tokio::test]
    async fn empty_snapshot_is_a_no_op() {
        let report = reap(&NoopProcessGroup, &[], short()).await;
        assert_eq!(report, ReapReport::default());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn parse_stat_handles_spaces_in_command_name() {
        let raw = "4242 (chrome (renderer) x) S 100 4242 4242 0 -1 4194560 0 0 0 0 0 0 0 0 20 0 1 0 987654 0 0";
        let stat = parse_stat(raw).unwrap();
        assert_eq!(stat.state, 'S');
        assert_eq!(stat.ppid, 100);
        assert_eq!(stat.start_time, 987654);
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn kills_descendant_that_ignores_sigterm() {
        use std::process::Command;

        let mut parent = Command::new("sh")
            .arg("-c")
            .arg("trap '' TERM; sleep 30 & wait")
            .spawn()
            .expect("spawn sh");
        let group = ProcfsProcessGroup;

        let mut snapshot = Vec::new();
        for _ in 0..100 {
            snapshot = group.snapshot(parent.id());
            if snapshot.len() >= 2 {
                break;
            }
            sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(snapshot.len(), 2, "expected sh and the background sleep");
        assert!(snapshot.iter().any(|p| p.pid == parent.id()));

        let started = Instant::now();
        let report = reap(
            &group,
            &snapshot,
            ReapTimeouts {
                natural_exit: Duration::from_millis(100),
                terminate: Duration::from_millis(200),
            },
        )
        .await;
        assert_eq!(report.killed, 2);
        assert!(started.elapsed() < Duration::from_secs(2));
        let _ = parent.wait();

        let mut gone = false;
        for _ in 0..50 {
            if snapshot.iter().all(|p| !group.is_alive(p)) {
                gone = true;
                break;
            }
            sleep(Duration::from_millis(20)).await;
        }
        assert!(gone, "process survived SIGKILL");
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn snapshot_stays_inside_root_tree() {
        use std::process::Command;

        let mut unrelated = Command::new("sleep").arg("5").spawn().expect("spawn sleep");
        let mut root = Command::new("sh")
            .arg("-c")
            .arg("sleep 5 & wait")
            .spawn()
            .expect("spawn sh");
        let group = ProcfsProcessGroup;

        let mut snapshot = Vec::new();
        for _ in 0..100 {
            snapshot = group.snapshot(root.id());
            if snapshot.len() >= 2 {
                break;
            }
            sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.iter().any(|p| p.pid == root.id()));
        assert!(snapshot.iter().all(|p| p.pid != unrelated.id()));

        for process in &snapshot {
            group.kill(process).unwrap();
        }
        let _ = root.wait();
        let handle = snapshot.iter().find(|p| p.pid == root.id()).copied().unwrap();
        assert!(!group.is_alive(&handle));
        assert_eq!(unrelated.try_wait().unwrap(), None, "unrelated process was signalled");

        let _ = unrelated.kill();
        let _ = unrelated.wait();
    }
}
