//! # Configuração do Subsistema de Domínios
//!
//! Define as constantes de compile-time do subsistema. Este é o único
//! ponto de configuração além da seleção de estratégia via feature.

// =============================================================================
// DOMÍNIOS
// =============================================================================

/// Número máximo de domínios de proteção (slots alocados estaticamente).
///
/// Dois são built-in (kernel e aplicação); o restante é para drivers.
/// Válido: 2..=10.
pub const MAX_DOMAINS: usize = 8;

/// Profundidade máxima de chamadas inter-domínio aninhadas em voo,
/// acima da entrada raiz (domínio de aplicação). Exceder é fatal.
pub const CALLSTACK_DEPTH: usize = 4;

/// Capacidade da tabela estática de syscall entries.
pub const MAX_SYSCALL_ENTRIES: usize = 32;

// =============================================================================
// MEMÓRIA
// =============================================================================

/// Tamanho de uma página (4 KiB)
pub const PAGE_SIZE: usize = 4096;

/// Máscara para alinhar endereços a página
pub const PAGE_MASK: usize = !(PAGE_SIZE - 1);

/// Base da região de dados do kernel (fornecida pelo linker no alvo real;
/// aqui fixada para o layout clássico de 1 MiB).
pub const KERNEL_DATA_BASE: usize = 0x0010_0000;

/// Fim (exclusivo) da região de dados do kernel.
pub const KERNEL_DATA_END: usize = 0x0014_0000;

/// Capacidade (em páginas) de cada slot linear fixo da estratégia paging.
pub const SLOT_PAGES: usize = 16;

/// Base linear do slot MMIO — imediatamente acima dos dados do kernel.
pub const MMIO_LINEAR_BASE: usize = KERNEL_DATA_END;

/// Base linear do slot de metadados — imediatamente acima do slot MMIO.
pub const META_LINEAR_BASE: usize = MMIO_LINEAR_BASE + SLOT_PAGES * PAGE_SIZE;

/// Maior janela aceita pelas estratégias byte-granulares (limite de 20 bits
/// de um descritor de segmento sem granularidade de página).
pub const SEG_MAX_BYTE_WINDOW: usize = 1 << 20;

/// Tamanho da stack privada de cada domínio (estratégia hw_task).
pub const DOMAIN_STACK_SIZE: usize = 4096;

// =============================================================================
// VETORES DE TRAP
// =============================================================================

/// Vetor de exceção de double fault.
pub const DOUBLE_FAULT_VECTOR: u8 = 8;

/// Vetor de exceção de General Protection Fault.
pub const GPF_VECTOR: u8 = 13;

/// Vetor de software-interrupt do dispatch de syscall (chamada).
pub const SYSCALL_DISPATCH_VECTOR: u8 = 100;

/// Vetor de software-interrupt do dispatch de retorno.
pub const SYSRET_DISPATCH_VECTOR: u8 = 101;

// Sanidade de configuração. Falha no build, não no boot.
const _: () = assert!(MAX_DOMAINS >= 2 && MAX_DOMAINS <= 10);
const _: () = assert!(KERNEL_DATA_BASE % PAGE_SIZE == 0);
const _: () = assert!(KERNEL_DATA_END % PAGE_SIZE == 0);
const _: () = assert!(MAX_SYSCALL_ENTRIES <= u16::MAX as usize);
