//! Process memory observation.

/// Reports how much memory the process currently has in use.
pub trait MemoryProbe: Send + Sync {
    /// Resident bytes, or `None` when the platform cannot report it.
    fn used_bytes(&self) -> Option<u64>;
}

/// Reads resident set size from procfs. Reports `None` off Linux.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessMemory;

impl MemoryProbe for ProcessMemory {
    fn used_bytes(&self) -> Option<u64> {
        read_proc_kb("/proc/self/status", "VmRSS:")
    }
}

/// Constant probe, for tests and platforms without procfs.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedMemory(pub Option<u64>);

impl MemoryProbe for FixedMemory {
    fn used_bytes(&self) -> Option<u64> {
        self.0
    }
}

/// Memory the OS reports as available for new allocations, if known.
pub fn system_available_bytes() -> Option<u64> {
    read_proc_kb("/proc/meminfo", "MemAvailable:")
}

/// Parse a `Key:   1234 kB` line out of a procfs file.
fn read_proc_kb(path: &str, key: &str) -> Option<u64> {
    let contents = std::fs::read_to_string(path).ok()?;
    parse_kb_field(&contents, key)
}

fn parse_kb_field(contents: &str, key: &str) -> Option<u64> {
    let line = contents.lines().find(|l| l.starts_with(key))?;
    let kb: u64 = line[key.len()..].split_whitespace().next()?.parse().ok()?;
    Some(kb * 1024)
}
