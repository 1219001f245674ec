//! Muralha — Subsistema de Domínios de Proteção x86.
//!
//! Ponto central de exportação dos módulos do subsistema.
//!
//! Vários domínios mutuamente desconfiados (kernel, aplicação, um por
//! driver) compartilham um único espaço de endereçamento plano em um
//! único core. Cada domínio enxerga apenas a própria janela MMIO e a
//! própria janela de metadados; toda transição entre domínios passa
//! pelo dispatcher (call gate auditável). Três estratégias de hardware
//! intercambiáveis aplicam o confinamento: paging, task switch de
//! hardware e troca de segmentos por software.
//!
//! O crate é uma biblioteca: o binário do kernel, os drivers e o boot
//! firmware são os embedders. Todo código privilegiado (lgdt, CR0,
//! trampolins de trap) vive isolado em `arch::x86::hw`; o restante é
//! fluxo de controle comum e compila (e roda os testes) no host.

#![cfg_attr(not(test), no_std)]

// --- Módulos de Baixo Nível (Hardware) ---
pub mod arch; // HAL (CPU, GDT, IDT, TSS, Paging, Ports)

// --- Módulos Centrais ---
pub mod config; // Constantes de compile-time do subsistema
pub mod core; // Console, Logging, Fatal
pub mod klib; // Utilitários Internos (test framework)

// --- Subsistema de Proteção ---
pub mod boot; // Sequência de inicialização
pub mod dom; // Registry, Call Stack, Dispatcher, Entries, Validação
pub mod fault; // GPF (emulação de port I/O) e Double Fault
pub mod strategy; // Estratégias de isolamento (paging/hw_task/sw_seg)

// Re-exports de conveniência para os embedders
pub use crate::dom::dispatcher::{current_domain, Dispatcher, TrapFrame, DISPATCHER};
pub use crate::dom::id::DomainId;
pub use crate::dom::DomainError;
pub use crate::dom::registry::{Domain, DomainFlags};
pub use crate::strategy::{ActiveStrategy, IsolationStrategy};
