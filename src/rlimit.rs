//! Thin wrappers over `getrlimit`/`setrlimit`.
//!
//! [`set_rlimit`] runs inside the forked child between `fork()` and `execve()`,
//! so it must stay async-signal-safe: no allocation, no locks, no logging.

use crate::error::LimitKind;
use std::io;
use std::time::Duration;

#[cfg(all(target_os = "linux", target_env = "gnu"))]
pub(crate) type Resource = libc::__rlimit_resource_t;
#[cfg(not(all(target_os = "linux", target_env = "gnu")))]
pub(crate) type Resource = libc::c_int;

/// Native resource that enforces `kind`, if the host has one.
pub(crate) fn resource_for(kind: LimitKind) -> Option<Resource> {
    match kind {
        LimitKind::Cpu => Some(libc::RLIMIT_CPU),
        LimitKind::FileSize => Some(libc::RLIMIT_FSIZE),
        LimitKind::Memory => address_space(),
        LimitKind::ProcessCount => process_count(),
    }
}

#[cfg(not(target_os = "openbsd"))]
fn address_space() -> Option<Resource> {
    Some(libc::RLIMIT_AS)
}

#[cfg(target_os = "openbsd")]
fn address_space() -> Option<Resource> {
    None
}

#[cfg(not(any(target_os = "solaris", target_os = "illumos")))]
fn process_count() -> Option<Resource> {
    Some(libc::RLIMIT_NPROC)
}

#[cfg(any(target_os = "solaris", target_os = "illumos"))]
fn process_count() -> Option<Resource> {
    None
}

fn to_rlim(value: u64) -> libc::rlim_t {
    libc::rlim_t::try_from(value).unwrap_or(libc::RLIM_INFINITY)
}

/// Current hard ceiling for `resource`.
pub(crate) fn hard_limit(resource: Resource) -> io::Result<libc::rlim_t> {
    let mut rlim = libc::rlimit {
        rlim_cur: 0,
        rlim_max: 0,
    };
    // SAFETY: rlim is a valid, writable rlimit and resource is a libc constant.
    if unsafe { libc::getrlimit(resource, &mut rlim) } != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(rlim.rlim_max)
}

/// The hard ceiling a new limit has to fit under, read in the parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct HardCeiling {
    pub(crate) hard: libc::rlim_t,
    /// Privileged processes may raise hard limits.
    pub(crate) privileged: bool,
}

impl HardCeiling {
    /// Ceiling of `resource` for the current process, `None` if unreadable.
    pub(crate) fn current(resource: Resource) -> Option<Self> {
        // SAFETY: geteuid has no preconditions and cannot fail.
        let privileged = unsafe { libc::geteuid() } == 0;
        let hard = hard_limit(resource).ok()?;
        Some(Self { hard, privileged })
    }

    /// Returns the hard ceiling if setting `value` cannot succeed.
    pub(crate) fn blocks(&self, value: u64) -> Option<libc::rlim_t> {
        let value = to_rlim(value);
        if self.privileged || self.hard == libc::RLIM_INFINITY || value <= self.hard {
            None
        } else {
            Some(self.hard)
        }
    }
}

/// Hard `RLIMIT_CPU` value to pair with a soft limit of `soft` seconds.
///
/// Linux sends `SIGKILL` when the hard limit is reached and checks it before
/// the soft one, so with equal limits `SIGXCPU` is never delivered. One extra
/// second puts `SIGXCPU` first. Falls back to `soft` when the current hard
/// ceiling leaves no room.
pub(crate) fn cpu_hard_value(soft: u64, ceiling: Option<HardCeiling>) -> libc::rlim_t {
    let soft = to_rlim(soft);
    if soft >= libc::RLIM_INFINITY {
        return libc::RLIM_INFINITY;
    }
    let wanted = soft.saturating_add(1);
    match ceiling {
        Some(c) if !c.privileged && c.hard != libc::RLIM_INFINITY && c.hard < wanted => soft,
        _ => wanted,
    }
}

/// Plain conversion for limits whose soft and hard values match.
pub(crate) fn native(value: u64) -> libc::rlim_t {
    to_rlim(value)
}

/// Set the soft and hard ceilings of `resource`.
#[inline]
pub(crate) fn set_rlimit(
    resource: Resource,
    soft: libc::rlim_t,
    hard: libc::rlim_t,
) -> io::Result<()> {
    let rlim = libc::rlimit {
        rlim_cur: soft,
        rlim_max: hard,
    };
    // SAFETY: rlim is valid, resource is a libc constant.
    if unsafe { libc::setrlimit(resource, &rlim) } != 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

/// User plus system CPU time of all reaped children of this process.
pub(crate) fn children_cpu_time() -> Option<Duration> {
    // SAFETY: the all-zero bit pattern is a valid rusage.
    let mut usage: libc::rusage = unsafe { std::mem::zeroed() };
    // SAFETY: usage is valid and writable.
    if unsafe { libc::getrusage(libc::RUSAGE_CHILDREN, &mut usage) } != 0 {
        return None;
    }
    Some(timeval(usage.ru_utime)? + timeval(usage.ru_stime)?)
}

fn timeval(tv: libc::timeval) -> Option<Duration> {
    let secs = u64::try_from(tv.tv_sec).ok()?;
    let micros = u32::try_from(tv.tv_usec).ok()?;
    Some(Duration::from_secs(secs) + Duration::from_micros(u64::from(micros)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpu_and_fsize_always_available() {
        assert!(resource_for(LimitKind::Cpu).is_some());
        assert!(resource_for(LimitKind::FileSize).is_some());
    }

    #[test]
    fn test_hard_limit_readable() {
        let hard = hard_limit(libc::RLIMIT_CPU).unwrap();
        assert!(hard > 0);
    }

    #[test]
    fn test_ceiling_blocks_only_unprivileged_raises() {
        let user = HardCeiling {
            hard: 5,
            privileged: false,
        };
        assert_eq!(user.blocks(10), Some(5));
        assert_eq!(user.blocks(5), None);

        let root = HardCeiling {
            privileged: true,
            ..user
        };
        assert_eq!(root.blocks(10), None);

        let open = HardCeiling {
            hard: libc::RLIM_INFINITY,
            privileged: false,
        };
        assert_eq!(open.blocks(u64::MAX), None);
    }

    #[test]
    fn test_cpu_hard_value_leaves_room_for_sigxcpu() {
        assert_eq!(cpu_hard_value(5, None), 6);

        let open = HardCeiling {
            hard: libc::RLIM_INFINITY,
            privileged: false,
        };
        assert_eq!(cpu_hard_value(5, Some(open)), 6);

        let roomy = HardCeiling {
            hard: 10,
            privileged: false,
        };
        assert_eq!(cpu_hard_value(5, Some(roomy)), 6);
    }

    #[test]
    fn test_cpu_hard_value_falls_back_to_soft() {
        let tight = HardCeiling {
            hard: 5,
            privileged: false,
        };
        assert_eq!(cpu_hard_value(5, Some(tight)), 5);

        let root = HardCeiling {
            privileged: true,
            ..tight
        };
        assert_eq!(cpu_hard_value(5, Some(root)), 6);
    }

    #[test]
    fn test_children_cpu_time_readable() {
        assert!(children_cpu_time().is_some());
    }
}
