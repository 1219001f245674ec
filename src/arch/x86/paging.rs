/// Arquivo: x86/paging.rs
///
/// Propósito: Primitivas de paginação IA-32 (2 níveis, páginas de 4 KiB).
/// Define as entradas de page directory/table e os helpers de índice
/// usados pela estratégia de isolamento por paging para remapear os
/// slots lineares fixos de MMIO/metadados a cada troca de domínio.
///
/// Detalhes de Implementação:
/// - `Pte` é um newtype transparente sobre u32 (entrada crua).
/// - `PageTable` tem 1024 entradas e alinhamento de 4 KiB.
/// - Sem suporte a huge pages: o subsistema só opera páginas de 4 KiB.
use crate::config::{PAGE_MASK, PAGE_SIZE};
use bitflags::bitflags;

bitflags! {
    /// Flags de uma entrada de page table (IA-32).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PageFlags: u32 {
        const PRESENT       = 1 << 0;
        const WRITABLE      = 1 << 1;
        const USER          = 1 << 2;
        const WRITE_THROUGH = 1 << 3;
        /// Cache desabilitado — obrigatório para janelas MMIO.
        const NO_CACHE      = 1 << 4;
        const ACCESSED      = 1 << 5;
        const DIRTY         = 1 << 6;
        const GLOBAL        = 1 << 8;
    }
}

/// Entrada de page table (ou de page directory — mesmo formato cru).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct Pte(u32);

impl Pte {
    pub const fn absent() -> Self {
        Self(0)
    }

    /// Monta uma entrada presente. O frame físico deve estar alinhado
    /// a página — desalinhamento aqui é corrupção de chamador, fatal.
    pub fn map(frame: usize, flags: PageFlags) -> Self {
        if frame & !PAGE_MASK != 0 {
            crate::fatal!("(PAGING) frame desalinhado, addr=", frame);
        }
        Self(frame as u32 | flags.bits() | PageFlags::PRESENT.bits())
    }

    pub const fn is_present(self) -> bool {
        self.0 & 1 != 0
    }

    pub fn frame(self) -> usize {
        (self.0 as usize) & PAGE_MASK
    }

    pub fn flags(self) -> PageFlags {
        PageFlags::from_bits_truncate(self.0)
    }

    /// Liga/desliga o bit de escrita preservando o resto.
    pub fn set_writable(&mut self, writable: bool) {
        if writable {
            self.0 |= PageFlags::WRITABLE.bits();
        } else {
            self.0 &= !PageFlags::WRITABLE.bits();
        }
    }

    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// Uma page table (ou page directory) de 1024 entradas.
#[repr(C, align(4096))]
pub struct PageTable {
    entries: [Pte; 1024],
}

impl PageTable {
    pub const fn new() -> Self {
        Self {
            entries: [Pte::absent(); 1024],
        }
    }

    pub fn entry(&self, idx: usize) -> Pte {
        self.entries[idx]
    }

    pub fn entry_mut(&mut self, idx: usize) -> &mut Pte {
        &mut self.entries[idx]
    }

    pub fn as_ptr(&self) -> *const Pte {
        self.entries.as_ptr()
    }
}

/// Índice no page directory para o endereço linear dado.
pub const fn pd_index(linear: usize) -> usize {
    (linear >> 22) & 0x3FF
}

/// Índice na page table para o endereço linear dado.
pub const fn pt_index(linear: usize) -> usize {
    (linear >> 12) & 0x3FF
}

/// Número de páginas necessárias para cobrir `len` bytes.
pub const fn pages_for(len: usize) -> usize {
    (len + PAGE_SIZE - 1) / PAGE_SIZE
}
