use crate::constants::{DEVICE_LIST_HEADER, NOT_AVAILABLE, UNKNOWN_MODEL};
use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub serial: String,
    pub model: String,
}

impl Device {
    pub fn new(serial: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            serial: serial.into(),
            model: model.into(),
        }
    }

    pub fn label(&self) -> String {
        format!("{} ({})", self.model, self.serial)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDetails {
    pub serial: String,
    pub manufacturer: String,
    pub model: String,
    pub build_id: String,
    pub ram_total: String,
    pub storage: String,
    pub cpu: String,
}

impl DeviceDetails {
    pub fn empty(serial: &str) -> Self {
        Self {
            serial: serial.to_string(),
            manufacturer: NOT_AVAILABLE.to_string(),
            model: NOT_AVAILABLE.to_string(),
            build_id: NOT_AVAILABLE.to_string(),
            ram_total: NOT_AVAILABLE.to_string(),
            storage: NOT_AVAILABLE.to_string(),
            cpu: NOT_AVAILABLE.to_string(),
        }
    }

    /// Label/value pairs in display order.
    pub fn rows(&self) -> [(&'static str, &str); 7] {
        [
            ("Company Name", self.manufacturer.as_str()),
            ("Model Name", self.model.as_str()),
            ("Serial Number", self.serial.as_str()),
            ("Build Number", self.build_id.as_str()),
            ("RAM", self.ram_total.as_str()),
            ("Storage", self.storage.as_str()),
            ("CPU", self.cpu.as_str()),
        ]
    }
}

/// Parses `adb devices -l`.
///
/// The header line is dropped, as are the `* daemon ...` lines adb prints when it
/// has to start its server first. Every other non-blank line is one device.
pub fn parse_device_list(output: &str) -> Vec<Device> {
    let mut lines = output.lines();

    // Skip everything up to and including the header. Old adb builds print no
    // daemon chatter, so the header is simply the first line.
    if output.contains(DEVICE_LIST_HEADER) {
        for line in lines.by_ref() {
            if line.trim_start().starts_with(DEVICE_LIST_HEADER) {
                break;
            }
        }
    } else {
        lines.next();
    }

    lines
        .filter(|line| !line.trim().is_empty())
        .filter(|line| !line.trim_start().starts_with('*'))
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let serial = parts.next()?.to_string();
            let model = parts
                .find_map(|part| part.strip_prefix("model:"))
                .filter(|model| !model.is_empty())
                .unwrap_or(UNKNOWN_MODEL)
                .to_string();
            Some(Device { serial, model })
        })
        .collect()
}

/// `MemTotal` from `/proc/meminfo`, rendered in GB.
pub fn parse_mem_total(meminfo: &str) -> Option<String> {
    let re = Regex::new(r"MemTotal:\s*(\d+)").ok()?;
    let caps = re.captures(meminfo)?;
    let kb: f64 = caps.get(1)?.as_str().parse().ok()?;
    Some(format!("{:.2} GB", kb / 1024.0 / 1024.0))
}

/// Size column of the first data row of `df -h /data`.
pub fn parse_data_size(df: &str) -> Option<String> {
    df.lines()
        .nth(1)
        .and_then(|line| line.split_whitespace().nth(1))
        .map(str::to_string)
}

pub fn parse_cpu_hardware(cpuinfo: &str) -> Option<String> {
    cpuinfo
        .lines()
        .find(|line| line.contains("Hardware"))
        .and_then(|line| line.rsplit(':').next())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
