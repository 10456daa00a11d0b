use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use lab_core::{CancellationState, CancellationToken};
use tracing::{debug, warn};

use crate::signal::{isolate_from_interrupts, kill_process_group};

const SOFT_INTERRUPT_NOTICE: &str = "\
Interrupt received. The running algorithms will finish the current problem instance first.

Long runs are the ones most likely to be interrupted by hand. Killing them and
dropping the sample would bias the results towards fast instances, making the
interrupted algorithm look better than it is.

Press CTRL+C again to stop immediately; results for the current instance will be
discarded. A third CTRL+C exits without any cleanup.";

/// How a supervised child ended.
#[derive(Debug)]
pub enum ProcessExit {
    Exited(ExitStatus),
    /// Killed after a hard terminate was requested.
    Killed,
}

#[derive(Debug)]
pub struct ProcessReport {
    pub exit: ProcessExit,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessReport {
    pub fn was_killed(&self) -> bool {
        matches!(self.exit, ProcessExit::Killed)
    }

    pub fn status_label(&self) -> String {
        match &self.exit {
            ProcessExit::Exited(status) => status
                .code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string()),
            ProcessExit::Killed => "killed".to_string(),
        }
    }
}

/// Runs child processes one at a time under the two-stage interrupt policy.
///
/// A soft interrupt never touches the running child; a hard terminate kills
/// and reaps it. All of this happens on the calling thread, between polls.
pub struct Supervisor {
    token: CancellationToken,
    poll_interval: Duration,
}

impl Supervisor {
    pub fn new(token: CancellationToken) -> Self {
        Supervisor {
            token,
            poll_interval: Duration::from_millis(50),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Logs interrupt transitions the operator has not been told about yet.
    pub fn announce_transitions(&self) {
        match self.token.observe() {
            Some(CancellationState::SoftInterruptRequested) => warn!("{}", SOFT_INTERRUPT_NOTICE),
            Some(CancellationState::HardTerminated) => {
                warn!("Abruptly interrupting the experiment. Killing the running process...")
            }
            _ => {}
        }
    }

    /// Spawns `cmd`, drains its pipes, and waits for it to exit.
    ///
    /// Stderr is relayed to the operator but does not make this fail.
    pub fn run(&self, label: &str, mut cmd: Command) -> Result<ProcessReport> {
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        isolate_from_interrupts(&mut cmd);

        let mut child = cmd
            .spawn()
            .with_context(|| format!("failed to launch {}: {:?}", label, cmd))?;
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let exit = self.wait(&mut child)?;
        if let ProcessExit::Killed = exit {
            // Grandchildren may still hold the pipes; leave the readers detached.
            return Ok(ProcessReport {
                exit,
                stdout: String::new(),
                stderr: String::new(),
            });
        }

        let stdout = join_drain(stdout)?;
        let stderr = join_drain(stderr)?;
        if !stdout.trim().is_empty() {
            debug!(process = label, "{}", stdout.trim_end());
        }
        if !stderr.trim().is_empty() {
            warn!(process = label, "{}", stderr.trim_end());
        }
        Ok(ProcessReport {
            exit,
            stdout,
            stderr,
        })
    }

    fn wait(&self, child: &mut Child) -> Result<ProcessExit> {
        loop {
            self.announce_transitions();
            if self.token.is_terminated() {
                // The child may have exited on its own in the meantime.
                let _ = kill_process_group(child);
                child.wait().context("failed to reap killed process")?;
                return Ok(ProcessExit::Killed);
            }
            if let Some(status) = child.try_wait()? {
                return Ok(ProcessExit::Exited(status));
            }
            thread::sleep(self.poll_interval);
        }
    }
}

type DrainHandle = Option<thread::JoinHandle<std::io::Result<Vec<u8>>>>;

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> DrainHandle {
    pipe.map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            pipe.read_to_end(&mut buf)?;
            Ok(buf)
        })
    })
}

fn join_drain(handle: DrainHandle) -> Result<String> {
    let Some(handle) = handle else {
        return Ok(String::new());
    };
    let bytes = handle
        .join()
        .map_err(|_| anyhow!("output reader thread panicked"))??;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
