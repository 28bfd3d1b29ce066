//! Process resource sampling.
//!
//! Linux values come from `/proc/self/stat`, `/proc/self/status` and
//! `/proc/uptime`. Anything unreadable is reported as zero.

use std::sync::OnceLock;
use std::time::Instant;

use serde::Serialize;

/// Kernel clock ticks per second on every mainstream Linux build.
const CLOCK_TICKS_PER_SEC: u64 = 100;
const MICROS_PER_TICK: u64 = 1_000_000 / CLOCK_TICKS_PER_SEC;

static PROCESS_EPOCH: OnceLock<Instant> = OnceLock::new();

/// CPU time consumed, in microseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CpuUsage {
    pub user: u64,
    pub system: u64,
}

impl CpuUsage {
    /// Time spent since `previous`.
    pub fn since(&self, previous: &CpuUsage) -> CpuUsage {
        CpuUsage {
            user: self.user.saturating_sub(previous.user),
            system: self.system.saturating_sub(previous.system),
        }
    }
}

/// Memory footprint in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryUsage {
    pub rss: u64,
    pub peak_rss: u64,
    pub virtual_size: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeapStatistics {
    pub total_heap_size: u64,
    pub peak_virtual_size: u64,
    pub stack_size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeapSpaceStatistics {
    pub space_name: &'static str,
    pub space_size: u64,
}

/// One sample of the current process.
#[derive(Debug, Clone, Default)]
pub struct ProcessSnapshot {
    pub pid: u32,
    pub cpu: CpuUsage,
    pub memory: MemoryUsage,
    pub heap: HeapStatistics,
    pub heap_spaces: Vec<HeapSpaceStatistics>,
    /// Seconds since the process started.
    pub uptime: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct StatFields {
    utime: u64,
    stime: u64,
    start_ticks: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct StatusFields {
    vm_rss: u64,
    vm_hwm: u64,
    vm_size: u64,
    vm_peak: u64,
    vm_data: u64,
    vm_stk: u64,
    vm_exe: u64,
    vm_lib: u64,
}

/// Record the process start reference. Called once during bootstrap.
pub fn mark_process_start() {
    PROCESS_EPOCH.get_or_init(Instant::now);
}

/// Sample the current process.
pub fn sample() -> ProcessSnapshot {
    let epoch = *PROCESS_EPOCH.get_or_init(Instant::now);

    let stat = std::fs::read_to_string("/proc/self/stat")
        .ok()
        .and_then(|raw| parse_stat(&raw))
        .unwrap_or_default();
    let status = std::fs::read_to_string("/proc/self/status")
        .map(|raw| parse_status(&raw))
        .unwrap_or_default();
    let system_uptime = std::fs::read_to_string("/proc/uptime")
        .ok()
        .and_then(|raw| parse_uptime(&raw));

    let uptime = match system_uptime {
        Some(system) if stat.start_ticks > 0 => {
            (system - stat.start_ticks as f64 / CLOCK_TICKS_PER_SEC as f64).max(0.0)
        }
        _ => epoch.elapsed().as_secs_f64(),
    };

    ProcessSnapshot {
        pid: std::process::id(),
        cpu: CpuUsage {
            user: stat.utime * MICROS_PER_TICK,
            system: stat.stime * MICROS_PER_TICK,
        },
        memory: MemoryUsage {
            rss: status.vm_rss,
            peak_rss: status.vm_hwm,
            virtual_size: status.vm_size,
        },
        heap: HeapStatistics {
            total_heap_size: status.vm_data,
            peak_virtual_size: status.vm_peak,
            stack_size: status.vm_stk,
        },
        heap_spaces: vec![
            HeapSpaceStatistics { space_name: "data", space_size: status.vm_data },
            HeapSpaceStatistics { space_name: "stack", space_size: status.vm_stk },
            HeapSpaceStatistics { space_name: "text", space_size: status.vm_exe },
            HeapSpaceStatistics { space_name: "shared_libraries", space_size: status.vm_lib },
        ],
        uptime,
    }
}

fn parse_stat(raw: &str) -> Option<StatFields> {
    // The command name may contain spaces and parentheses; fields resume after the last ')'.
    let rest = &raw[raw.rfind(')')? + 1..];
    let fields: Vec<&str> = rest.split_whitespace().collect();
    // `fields[0]` is field 3 (state) of proc(5).
    Some(StatFields {
        utime: fields.get(11)?.parse().ok()?,
        stime: fields.get(12)?.parse().ok()?,
        start_ticks: fields.get(19)?.parse().ok()?,
    })
}

fn parse_status(raw: &str) -> StatusFields {
    let mut fields = StatusFields::default();
    for line in raw.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let slot = match key {
            "VmRSS" => &mut fields.vm_rss,
            "VmHWM" => &mut fields.vm_hwm,
            "VmSize" => &mut fields.vm_size,
            "VmPeak" => &mut fields.vm_peak,
            "VmData" => &mut fields.vm_data,
            "VmStk" => &mut fields.vm_stk,
            "VmExe" => &mut fields.vm_exe,
            "VmLib" => &mut fields.vm_lib,
            _ => continue,
        };
        *slot = parse_kib(value);
    }
    fields
}

fn parse_kib(value: &str) -> u64 {
    value
        .split_whitespace()
        .next()
        .and_then(|n| n.parse::<u64>().ok())
        .map_or(0, |kib| kib * 1024)
}

fn parse_uptime(raw: &str) -> Option<f64> {
    raw.split_whitespace().next()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_stat_with_odd_command_name() {
        let raw = "4242 (bridge (v1) x) S 1 4242 4242 0 -1 4194560 500 0 0 0 \
                   150 30 0 0 20 0 8 0 12345 100000 2000 18446744073709551615";
        let fields = parse_stat(raw).unwrap();
        assert_eq!(fields.utime, 150);
        assert_eq!(fields.stime, 30);
        assert_eq!(fields.start_ticks, 12345);
    }

    #[test]
    fn truncated_stat_is_rejected() {
        assert!(parse_stat("1 (x) S 1 2").is_none());
        assert!(parse_stat("garbage").is_none());
    }

    #[test]
    fn parses_status_sizes_in_bytes() {
        let raw = "Name:\tbridge\nVmPeak:\t  2048 kB\nVmSize:\t  1024 kB\nVmHWM:\t 600 kB\n\
                   VmRSS:\t  512 kB\nVmData:\t 256 kB\nVmStk:\t 132 kB\nVmExe:\t 64 kB\nVmLib:\t 8 kB\n";
        let fields = parse_status(raw);
        assert_eq!(fields.vm_rss, 512 * 1024);
        assert_eq!(fields.vm_peak, 2048 * 1024);
        assert_eq!(fields.vm_stk, 132 * 1024);
        assert_eq!(fields.vm_lib, 8 * 1024);
    }

    #[test]
    fn cpu_delta_saturates() {
        let earlier = CpuUsage { user: 500, system: 100 };
        let later = CpuUsage { user: 800, system: 90 };
        assert_eq!(later.since(&earlier), CpuUsage { user: 300, system: 0 });
    }

    #[test]
    fn sample_reports_own_pid() {
        let snapshot = sample();
        assert_eq!(snapshot.pid, std::process::id());
        assert_eq!(snapshot.heap_spaces.len(), 4);
        assert!(snapshot.uptime >= 0.0);
    }
}
