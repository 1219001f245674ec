//! # Hardware Abstraction Layer (HAL)
//!
//! O módulo `arch` atua como a **única** ponte entre a lógica do
//! subsistema (agnóstica) e o hardware real. Toda interação com
//! registradores, instruções privilegiadas e tabelas de descritores
//! passa por aqui.
//!
//! ## 🎯 Propósito e Responsabilidade
//! - **Isolamento:** `dom`, `strategy` e `fault` **não devem** emitir
//!   instruções privilegiadas diretamente.
//! - **Abstração:** Define traits (em `traits/`) que as implementações
//!   (`x86/`) devem satisfazer.
//! - **Testabilidade:** O único módulo que exige o alvo bare-metal é
//!   `x86::hw`; o restante (descritores, paging, decodificação) é
//!   estrutura de dados pura e compila no host.

pub mod traits;

pub mod x86;

pub use x86 as platform;

// Re-exports globais
pub use platform::cpu::X86Cpu as Cpu;
pub use traits::*;
