//! Memory-pressure probes for adaptive batch sizing.

use sysinfo::System;

/// Reports the fraction of memory currently in use.
pub trait MemoryProbe: Send + Sync {
    /// Used / total, in `[0, 1]`.
    fn pressure(&self) -> f64;
}

/// Reads system RAM usage through `sysinfo`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemMemoryProbe;

impl MemoryProbe for SystemMemoryProbe {
    fn pressure(&self) -> f64 {
        let mut sys = System::new();
        sys.refresh_memory();
        let total = sys.total_memory();
        if total == 0 {
            return 0.0;
        }
        (sys.used_memory() as f64 / total as f64).clamp(0.0, 1.0)
    }
}

/// Always reports the same pressure.
#[derive(Debug, Clone, Copy)]
pub struct FixedMemoryProbe(pub f64);

impl MemoryProbe for FixedMemoryProbe {
    fn pressure(&self) -> f64 {
        self.0
    }
}
