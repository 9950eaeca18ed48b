//! CPU pinning and scheduling for the pipeline thread
//!
//! The hot path runs on one pinned, ideally isolated, core. Pinning
//! prevents migrations (cache eviction, latency spikes); SCHED_FIFO
//! keeps the kernel from preempting mid-tick.

use anyhow::Result;
use core_affinity::CoreId;

/// Pin the current thread to a CPU core.
pub fn pin_to_core(core: usize) -> Result<()> {
    let core_id = CoreId { id: core };
    if core_affinity::set_for_current(core_id) {
        tracing::info!(core, "pinned pipeline thread");
        Ok(())
    } else {
        anyhow::bail!("failed to pin thread to core {}", core)
    }
}

/// Set SCHED_FIFO real-time priority. Needs CAP_SYS_NICE or root.
#[cfg(target_os = "linux")]
pub fn set_realtime_priority(priority: i32) -> Result<()> {
    use libc::{sched_param, sched_setscheduler, SCHED_FIFO};

    unsafe {
        let param = sched_param {
            sched_priority: priority,
        };
        if sched_setscheduler(0, SCHED_FIFO, &param) == 0 {
            tracing::info!(priority, "set SCHED_FIFO priority");
            Ok(())
        } else {
            anyhow::bail!("failed to set realtime priority (needs CAP_SYS_NICE)")
        }
    }
}

/// No-op on non-Linux platforms.
#[cfg(not(target_os = "linux"))]
pub fn set_realtime_priority(_priority: i32) -> Result<()> {
    tracing::warn!("realtime priority not supported on this platform");
    Ok(())
}

/// Number of cores visible to the process.
pub fn num_cores() -> usize {
    core_affinity::get_core_ids()
        .map(|ids| ids.len())
        .unwrap_or(1)
}

/// Pin and elevate the current thread for hot-path work. Pinning
/// failures are fatal; a priority failure degrades with a warning since
/// it usually just means missing privileges.
pub fn isolate_hot_thread(core: usize, priority: i32) -> Result<()> {
    pin_to_core(core)?;
    if let Err(e) = set_realtime_priority(priority) {
        tracing::warn!(error = %e, "continuing without realtime priority");
    }
    Ok(())
}
