//! Process open-file limit negotiation.
//!
//! Many systems start processes with a low soft limit on open descriptors
//! (1024 on Linux, 256 on macOS) while allowing a much higher hard limit.
//! A session raises the soft limit once, when its resource manager is built,
//! so that cached files and peer sockets fit. The new limit is capped at the
//! select(2) descriptor-set size, and the limit is never lowered.

/// Picks the new soft limit, or `None` when it should stay as it is.
///
/// The target is the smaller of the hard limit and `ceiling`; it is only
/// applied if it raises the current soft limit.
pub fn target_soft_limit(soft: u64, hard: u64, ceiling: u64) -> Option<u64> {
    let target = hard.min(ceiling);
    (target > soft).then_some(target)
}

/// Current `(soft, hard)` open-file limits.
#[cfg(unix)]
pub fn open_file_limit() -> Option<(u64, u64)> {
    use nix::sys::resource::{getrlimit, Resource};

    match getrlimit(Resource::RLIMIT_NOFILE) {
        Ok((soft, hard)) => Some((soft as u64, hard as u64)),
        Err(err) => {
            tracing::debug!("Failed to get open file limit: {err}");
            None
        }
    }
}

#[cfg(not(unix))]
pub fn open_file_limit() -> Option<(u64, u64)> {
    None
}

/// Raises the soft open-file limit toward `min(hard, ceiling)`.
///
/// Returns the soft limit in effect afterwards, or `None` when the limits
/// can't be read on this platform.
#[cfg(unix)]
pub fn raise_open_file_limit(ceiling: u64) -> Option<u64> {
    use nix::sys::resource::{setrlimit, Resource};

    let (soft, hard) = open_file_limit()?;
    tracing::debug!("Current open file limits: soft={soft}, hard={hard}");

    let Some(target) = target_soft_limit(soft, hard, ceiling) else {
        return Some(soft);
    };

    if let Err(err) = setrlimit(
        Resource::RLIMIT_NOFILE,
        target as libc::rlim_t,
        hard as libc::rlim_t,
    ) {
        tracing::debug!("Failed to raise open file limit from {soft} to {target}: {err}");
        return Some(soft);
    }

    let current = open_file_limit().map_or(target, |(soft, _)| soft);
    tracing::info!("Changed open file limit from {} to {}", soft, current);
    Some(current)
}

#[cfg(not(unix))]
pub fn raise_open_file_limit(_ceiling: u64) -> Option<u64> {
    None
}
