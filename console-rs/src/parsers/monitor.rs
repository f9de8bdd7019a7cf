//! Resource-monitor snapshot parser
//!
//! Extracts uptime, task counts, CPU percentages and memory figures from
//! a top-style snapshot report. This parser runs unattended on a polling
//! schedule: non-matching input yields empty sub-objects, never an
//! error. Numeric fields stay strings; callers decide coercion.

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;
use tracing::debug;

/// Parsed snapshot. Any sub-object may be empty when its source line was
/// missing or malformed.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct MonitorSnapshot {
    pub uptime: BTreeMap<String, String>,
    pub tasks: BTreeMap<String, String>,
    pub cpu: BTreeMap<String, String>,
    pub memory: BTreeMap<String, String>,
}

fn uptime_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"top - (\S+) up\s+(?:(\d+) days?,\s+)?(?:(\d+:\d+)|\d+ min),.*load average:\s*([\d.]+),\s*([\d.]+),\s*([\d.]+)",
        )
        .unwrap()
    })
}

fn tasks_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"Tasks:\s+(\d+) total,\s+(\d+) running,\s+(\d+) sleeping,\s+(\d+) stopped,\s+(\d+) zombie",
        )
        .unwrap()
    })
}

fn cpu_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"%Cpu\(s\):\s+([\d.]+) us,\s+([\d.]+) sy,\s+([\d.]+) ni,\s+([\d.]+) id,\s+([\d.]+) wa,\s+([\d.]+) hi,\s+([\d.]+) si,\s+([\d.]+) st",
        )
        .unwrap()
    })
}

fn memory_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"MiB Mem\s*:\s+([\d.]+) total,\s+([\d.]+) free,\s+([\d.]+) used,\s+([\d.]+) buff/cache",
        )
        .unwrap()
    })
}

/// Parse a five-to-seven-line resource snapshot.
pub fn parse(text: &str) -> MonitorSnapshot {
    let mut snapshot = MonitorSnapshot::default();

    if let Some(caps) = uptime_re().captures(text) {
        snapshot
            .uptime
            .insert("time".to_string(), caps[1].to_string());
        snapshot.uptime.insert(
            "days".to_string(),
            caps.get(2).map_or("0", |m| m.as_str()).to_string(),
        );
        snapshot.uptime.insert(
            "hours_minutes".to_string(),
            caps.get(3).map_or("0:00", |m| m.as_str()).to_string(),
        );
        snapshot
            .uptime
            .insert("load_1".to_string(), caps[4].to_string());
        snapshot
            .uptime
            .insert("load_5".to_string(), caps[5].to_string());
        snapshot
            .uptime
            .insert("load_15".to_string(), caps[6].to_string());
    } else {
        debug!("monitor snapshot: no uptime line matched");
    }

    if let Some(caps) = tasks_re().captures(text) {
        for (key, idx) in [
            ("total", 1),
            ("running", 2),
            ("sleeping", 3),
            ("stopped", 4),
            ("zombie", 5),
        ] {
            snapshot.tasks.insert(key.to_string(), caps[idx].to_string());
        }
    }

    if let Some(caps) = cpu_re().captures(text) {
        for (key, idx) in [
            ("us", 1),
            ("sy", 2),
            ("ni", 3),
            ("id", 4),
            ("wa", 5),
            ("hi", 6),
            ("si", 7),
            ("st", 8),
        ] {
            snapshot.cpu.insert(key.to_string(), caps[idx].to_string());
        }
    }

    if let Some(caps) = memory_re().captures(text) {
        for (key, idx) in [("total", 1), ("free", 2), ("used", 3), ("buff_cache", 4)] {
            snapshot
                .memory
                .insert(key.to_string(), caps[idx].to_string());
        }
    }

    snapshot
}
