//! Implementação x86 (modo protegido de 32 bits) do HAL.
//!
//! As estruturas de descritores e page tables são dados puros e
//! compilam em qualquer alvo; apenas `hw` emite instruções
//! privilegiadas (e só existe de verdade em `x86`/bare-metal).

pub mod cpu;
pub mod gdt;
pub mod hw;
pub mod idt;
pub mod paging;
pub mod ports;
pub mod tss;
