//! Thread scheduling helpers.

/// Nice value applied to threads running background work.
pub const BACKGROUND_NICE: i32 = 10;

/// Lower the calling thread's scheduling priority to background.
///
/// Linux schedules threads individually, so `setpriority` on the thread id
/// only affects the caller. Elsewhere this is a no-op.
#[cfg(target_os = "linux")]
pub fn set_background_priority() {
    unsafe {
        let tid = libc::syscall(libc::SYS_gettid) as libc::id_t;
        let result = libc::setpriority(libc::PRIO_PROCESS, tid, BACKGROUND_NICE);
        if result != 0 {
            tracing::debug!(
                thread = std::thread::current().name().unwrap_or("unknown"),
                "failed to lower thread priority"
            );
        }
    }
}

#[cfg(not(target_os = "linux"))]
pub fn set_background_priority() {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_background_priority_does_not_panic() {
        std::thread::spawn(set_background_priority).join().unwrap();
    }
}
