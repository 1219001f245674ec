//! Traits do Hardware Abstraction Layer (HAL).
//! Interfaces públicas que o subsistema usa para falar com o hardware.

pub mod cpu;
pub mod portio;

// Re-exportar para facilitar uso: `use crate::arch::traits::CpuOps;`
pub use cpu::CpuOps;
pub use portio::PortIo;
