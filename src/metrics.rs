use std::sync::{Mutex, OnceLock};

use serde::Serialize;
use sysinfo::{MemoryRefreshKind, RefreshKind, System};

/// Host memory at one instant, in MiB.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MemorySnapshot {
    pub total_mb: u64,
    pub used_mb: u64,
    pub avail_mb: u64,
}

static SYS: OnceLock<Mutex<System>> = OnceLock::new();

fn sys_handle() -> &'static Mutex<System> {
    SYS.get_or_init(|| {
        Mutex::new(System::new_with_specifics(
            RefreshKind::nothing().with_memory(MemoryRefreshKind::everything()),
        ))
    })
}

impl MemorySnapshot {
    /// Refresh and read host memory. A poisoned lock yields an all-zero snapshot.
    pub fn capture() -> Self {
        let Ok(mut sys) = sys_handle().lock() else {
            return Self::default();
        };
        sys.refresh_memory();
        // sysinfo reports bytes
        let total_mb = sys.total_memory() / (1024 * 1024);
        let avail_mb = sys.available_memory() / (1024 * 1024);
        Self {
            total_mb,
            used_mb: total_mb.saturating_sub(avail_mb),
            avail_mb,
        }
    }
}
