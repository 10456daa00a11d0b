//! Bridge between the operator's interrupt key and the cancellation token.

use std::process::{Child, Command};

use anyhow::Result;
use lab_core::CancellationToken;

/// Exit status used when a third interrupt forces the orchestrator down.
pub const FORCED_EXIT_CODE: i32 = 130;

/// Routes SIGINT to `token`: each signal escalates it by one stage, and a
/// signal arriving after the hard stage exits the process immediately.
#[cfg(unix)]
pub fn install_interrupt_handler(token: &CancellationToken) -> Result<()> {
    use anyhow::anyhow;

    if HANDLER_TOKEN.set(token.clone()).is_err() {
        return Err(anyhow!("interrupt handler is already installed"));
    }
    // SAFETY: the handler only performs atomic operations and `_exit`, both
    // async-signal-safe; the sigaction struct is fully initialised.
    let rc = unsafe {
        let mut action: libc::sigaction = std::mem::zeroed();
        action.sa_sigaction = on_interrupt as extern "C" fn(libc::c_int) as libc::sighandler_t;
        action.sa_flags = libc::SA_RESTART;
        libc::sigemptyset(&mut action.sa_mask);
        libc::sigaction(libc::SIGINT, &action, std::ptr::null_mut())
    };
    if rc != 0 {
        return Err(anyhow!(
            "sigaction(SIGINT) failed: {}",
            std::io::Error::last_os_error()
        ));
    }
    Ok(())
}

#[cfg(not(unix))]
pub fn install_interrupt_handler(_token: &CancellationToken) -> Result<()> {
    tracing::warn!("two-stage interrupt handling is not available on this platform");
    Ok(())
}

#[cfg(unix)]
static HANDLER_TOKEN: std::sync::OnceLock<CancellationToken> = std::sync::OnceLock::new();

#[cfg(unix)]
extern "C" fn on_interrupt(_signal: libc::c_int) {
    if let Some(token) = HANDLER_TOKEN.get() {
        if token.interrupt() == lab_core::CancellationState::HardTerminated {
            // SAFETY: `_exit` is async-signal-safe; open descriptors, including
            // the result stream, are closed by the kernel.
            unsafe { libc::_exit(FORCED_EXIT_CODE) };
        }
    }
}

/// Keeps the operator's interrupt key away from a child process.
#[cfg(unix)]
pub fn isolate_from_interrupts(cmd: &mut Command) {
    use std::os::unix::process::CommandExt;
    cmd.process_group(0);
}

#[cfg(windows)]
pub fn isolate_from_interrupts(cmd: &mut Command) {
    use std::os::windows::process::CommandExt;
    const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
    cmd.creation_flags(CREATE_NEW_PROCESS_GROUP);
}

#[cfg(not(any(unix, windows)))]
pub fn isolate_from_interrupts(_cmd: &mut Command) {}

/// Kills `child` together with everything it started in its process group.
#[cfg(unix)]
pub fn kill_process_group(child: &mut Child) -> std::io::Result<()> {
    let Ok(pgid) = libc::pid_t::try_from(child.id()) else {
        return child.kill();
    };
    // SAFETY: plain syscall; `pgid` is the group created by `isolate_from_interrupts`.
    if unsafe { libc::killpg(pgid, libc::SIGKILL) } == 0 {
        return Ok(());
    }
    child.kill()
}

#[cfg(not(unix))]
pub fn kill_process_group(child: &mut Child) -> std::io::Result<()> {
    child.kill()
}
