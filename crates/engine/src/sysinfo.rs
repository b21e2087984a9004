// SPDX-License-Identifier: MIT

//! Post-run system-info summaries.
//!
//! Collectors drop a `system_info.json` per host; after the run each file is
//! condensed to a one-line summary and stored in the journal metadata.

use fleetbench_journal::JournalHandle;
use std::collections::BTreeMap;
use std::path::Path;

/// Summarize available system info and attach it to the journal metadata.
/// Returns true when anything was attached (callers may log the summaries).
pub fn attach_system_info(
    journal: &JournalHandle,
    base_dir: &Path,
    hosts: &[String],
) -> BTreeMap<String, String> {
    let summaries = collect_system_info(hosts, base_dir);
    if summaries.is_empty() {
        return summaries;
    }
    let to_store = summaries.clone();
    let stored = journal.with_mut(move |journal| {
        journal.metadata.system_info.extend(to_store);
    });
    if let Err(err) = stored {
        tracing::warn!(%err, "failed to persist system info summaries");
    }
    summaries
}

fn collect_system_info(hosts: &[String], base_dir: &Path) -> BTreeMap<String, String> {
    let mut summaries = BTreeMap::new();
    for host in hosts {
        let candidates = [
            base_dir.join(host).join("system_info.json"),
            base_dir.join("system_info.json"),
        ];
        for candidate in candidates {
            if let Some(summary) = summarize_system_info(&candidate) {
                summaries.insert(host.clone(), summary);
                break;
            }
        }
    }
    summaries
}

/// One-line `OS | Kernel | CPU | RAM | Disk` summary of a system_info.json.
pub fn summarize_system_info(path: &Path) -> Option<String> {
    let text = std::fs::read_to_string(path).ok()?;
    let data: serde_json::Value = serde_json::from_str(&text).ok()?;
    let data = data.as_object()?;

    let mut parts = Vec::new();
    parts.push(os_summary(data));
    parts.push(cpu_summary(data));
    parts.push(memory_summary(data));
    if let Some(disk) = disk_summary(data) {
        parts.push(disk);
    }
    Some(parts.join(" | "))
}

fn str_field<'a>(value: &'a serde_json::Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|key| value.get(key).and_then(|v| v.as_str()))
}

fn os_summary(data: &serde_json::Map<String, serde_json::Value>) -> String {
    let os = data.get("os").cloned().unwrap_or_default();
    let kernel = data.get("kernel").cloned().unwrap_or_default();
    let name = str_field(&os, &["name", "id"]).unwrap_or("Unknown OS");
    let version = str_field(&os, &["version", "version_id"]).unwrap_or("");
    let release = str_field(&kernel, &["release", "version"]).unwrap_or("kernel ?");
    format!("OS: {} | Kernel: {release}", format!("{name} {version}").trim())
}

fn cpu_summary(data: &serde_json::Map<String, serde_json::Value>) -> String {
    let cpu = data.get("cpu").cloned().unwrap_or_default();
    let model = str_field(&cpu, &["model_name", "model", "architecture"]).unwrap_or("?");
    let physical = cpu
        .get("physical_cpus")
        .or_else(|| cpu.get("cpu_cores"))
        .and_then(|v| v.as_u64())
        .map(|v| v.to_string())
        .unwrap_or_else(|| "?".to_string());
    let logical = cpu
        .get("logical_cpus")
        .or_else(|| cpu.get("cpus"))
        .and_then(|v| v.as_u64())
        .map(|v| v.to_string())
        .unwrap_or_else(|| "?".to_string());
    format!("CPU: {model} ({physical}c/{logical}t)")
}

fn memory_summary(data: &serde_json::Map<String, serde_json::Value>) -> String {
    let total = data
        .get("memory")
        .and_then(|mem| mem.get("total_bytes").or_else(|| mem.get("memtotal")))
        .and_then(|v| v.as_u64());
    match total {
        Some(bytes) => format!("RAM: {}", to_gib(bytes)),
        None => "RAM: ?".to_string(),
    }
}

fn disk_summary(data: &serde_json::Map<String, serde_json::Value>) -> Option<String> {
    let first = data.get("disks")?.as_array()?.first()?.as_object()?;
    let name = first.get("name").and_then(|v| v.as_str()).unwrap_or("disk");
    let kind = match first.get("rotational").and_then(|v| v.as_bool()) {
        Some(false) => "SSD",
        Some(true) => "HDD",
        None => "disk",
    };
    let size = first
        .get("size_bytes")
        .or_else(|| first.get("size"))
        .and_then(|v| v.as_u64())
        .map(to_gib)
        .unwrap_or_default();
    Some(format!("Disk: {}", format!("{name} {kind} {size}").trim()))
}

fn to_gib(bytes: u64) -> String {
    format!("{:.1}G", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
}

#[cfg(test)]
#[path = "sysinfo_tests.rs"]
mod tests;
