//! Interrupt handling for the alt-text run.
//!
//! SIGINT and SIGTERM are caught on a dedicated thread, which removes the
//! scratch directory and exits with `128 + signal` (130 and 143). Captions
//! already written stay written: every file write completes before control
//! returns to the loop, and the thread never touches content files.

use crate::caption::CleanupHandle;

/// Exit status for a run ended by `signal`.
pub fn exit_code_for(signal: i32) -> i32 {
    128 + signal
}

#[cfg(unix)]
pub fn install(handle: CleanupHandle) -> std::io::Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM])?;
    std::thread::spawn(move || {
        if let Some(signal) = signals.forever().next() {
            handle.cleanup();
            eprintln!();
            eprintln!("Interrupted, scratch directory removed.");
            std::process::exit(exit_code_for(signal));
        }
    });
    Ok(())
}

/// Without Unix signals, only the scratch directory's drop cleans up.
#[cfg(not(unix))]
pub fn install(_handle: CleanupHandle) -> std::io::Result<()> {
    Ok(())
}
