//! Backend selection for edgegen.
//!
//! Provides:
//! - [`Backend`]: where the forward pass executes
//! - [`BackendSelector`]: picks a backend from the caller's settings and
//!   what the runtime supports
//! - [`HardwareInfo`]: acceleration report for callers

use std::fmt;

use edgegen_engine::ModelRuntime;

/// Compute backend for the forward pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    Cpu,
    /// GPU/NPU execution provider.
    Accelerated,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Cpu => write!(f, "cpu"),
            Backend::Accelerated => write!(f, "accelerated"),
        }
    }
}

/// Picks the backend a port should be constructed on.
#[derive(Debug, Clone)]
pub struct BackendSelector {
    supported: Vec<Backend>,
}

impl BackendSelector {
    /// `supported` lists the backends the runtime can execute on.
    pub fn new(supported: &[Backend]) -> Self {
        Self {
            supported: supported.to_vec(),
        }
    }

    pub fn supports(&self, backend: Backend) -> bool {
        self.supported.contains(&backend)
    }

    /// Backends a runtime reports through [`ModelRuntime::supports_acceleration`].
    pub fn for_runtime(runtime: &dyn ModelRuntime) -> Self {
        if runtime.supports_acceleration() {
            Self::new(&[Backend::Cpu, Backend::Accelerated])
        } else {
            Self::new(&[Backend::Cpu])
        }
    }

    /// Accelerated when requested and supported; CPU otherwise.
    pub fn select(&self, use_acceleration: bool) -> Backend {
        if use_acceleration && self.supports(Backend::Accelerated) {
            Backend::Accelerated
        } else {
            Backend::Cpu
        }
    }

    /// Acceleration report for this host and runtime.
    pub fn hardware_info(&self) -> HardwareInfo {
        let available = self.supports(Backend::Accelerated);
        HardwareInfo {
            available,
            backend: if available {
                Backend::Accelerated
            } else {
                Backend::Cpu
            },
            device: format!("{} ({})", std::env::consts::ARCH, std::env::consts::OS),
        }
    }
}

/// Whether accelerated execution is available, and on what.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HardwareInfo {
    pub available: bool,
    pub backend: Backend,
    pub device: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpu_only_falls_back() {
        let selector = BackendSelector::new(&[Backend::Cpu]);
        assert_eq!(selector.select(true), Backend::Cpu);
        assert_eq!(selector.select(false), Backend::Cpu);
    }

    #[test]
    fn accelerated_selected_when_supported() {
        let selector = BackendSelector::new(&[Backend::Cpu, Backend::Accelerated]);
        assert_eq!(selector.select(true), Backend::Accelerated);
        assert_eq!(selector.select(false), Backend::Cpu);
    }

    #[test]
    fn hardware_info_reflects_support() {
        let info = BackendSelector::new(&[Backend::Cpu]).hardware_info();
        assert!(!info.available);
        assert_eq!(info.backend, Backend::Cpu);
        assert!(info.device.contains(std::env::consts::OS));

        let info = BackendSelector::new(&[Backend::Accelerated]).hardware_info();
        assert!(info.available);
        assert_eq!(info.backend.to_string(), "accelerated");
    }

    #[test]
    fn selector_follows_runtime_capability() {
        let cpu = crate::CpuRuntime::new();
        assert!(!BackendSelector::for_runtime(&cpu).supports(Backend::Accelerated));

        let scripted = crate::ScriptedRuntime::constant(3).with_acceleration(true);
        let selector = BackendSelector::for_runtime(&scripted);
        assert_eq!(selector.select(true), Backend::Accelerated);
    }
}
