/// Arquivo: x86/gdt.rs
///
/// Propósito: Gerenciamento da Global Descriptor Table (GDT) em modo
/// protegido de 32 bits. A GDT define os segmentos planos de Código/Dados
/// para Kernel e Usuário e abriga, por domínio de proteção, os descritores
/// de TSS (estratégia hw_task) e de LDT (estratégias hw_task e sw_seg).
///
/// Detalhes de Implementação:
/// - Layout fixo: null, kernel code/data, user data/code, TSS principal,
///   e uma região por-domínio com stride de 2 slots (TSS + LDT).
/// - Inserção é boot-time-only: slot fora de faixa ou já ocupado é fatal.
/// - Descritores de janela (MMIO/metadados) usam granularidade de byte,
///   logo o limite máximo é 1 MiB (20 bits).
/// - O carregamento (`lgdt`) vive em `hw.rs`, junto do resto do código
///   privilegiado.
use crate::config::{MAX_DOMAINS, SEG_MAX_BYTE_WINDOW};
use bitflags::bitflags;

/// Seletor de segmento
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct SegmentSelector(pub u16);

impl SegmentSelector {
    /// Seletor na GDT (TI = 0).
    pub const fn new(index: u16, rpl: u8) -> Self {
        Self((index << 3) | (rpl as u16))
    }

    /// Seletor na LDT corrente (TI = 1).
    pub const fn local(index: u16, rpl: u8) -> Self {
        Self((index << 3) | 0x4 | (rpl as u16))
    }

    pub const fn index(self) -> u16 {
        self.0 >> 3
    }

    pub const fn rpl(self) -> u8 {
        (self.0 & 0x3) as u8
    }

    pub const fn is_local(self) -> bool {
        (self.0 & 0x4) != 0
    }
}

/// Constantes de seletores fixos
// Index 0: Null
// Index 1: Kernel Code
// Index 2: Kernel Data
// Index 3: User Data
// Index 4: User Code
// Index 5: TSS principal
// Index 6+: região por-domínio (stride 2: TSS, LDT)
pub const KERNEL_CODE_SEL: SegmentSelector = SegmentSelector::new(1, 0);
pub const KERNEL_DATA_SEL: SegmentSelector = SegmentSelector::new(2, 0);
pub const USER_DATA_SEL: SegmentSelector = SegmentSelector::new(3, 3);
pub const USER_CODE_SEL: SegmentSelector = SegmentSelector::new(4, 3);
pub const MAIN_TSS_SEL: SegmentSelector = SegmentSelector::new(5, 0);

/// Primeiro índice da região por-domínio.
pub const GDT_NUM_FIXED: usize = 6;

/// Slots por domínio na região por-domínio.
pub const GDT_DOMAIN_STRIDE: usize = 2;

/// Total de entradas da GDT.
pub const GDT_ENTRIES: usize = GDT_NUM_FIXED + MAX_DOMAINS * GDT_DOMAIN_STRIDE;

/// Índice do descritor de TSS do domínio `dom`.
pub const fn domain_tss_idx(dom: usize) -> usize {
    GDT_NUM_FIXED + dom * GDT_DOMAIN_STRIDE
}

/// Índice do descritor de LDT do domínio `dom`.
pub const fn domain_ldt_idx(dom: usize) -> usize {
    GDT_NUM_FIXED + dom * GDT_DOMAIN_STRIDE + 1
}

bitflags! {
    /// Byte de acesso de um descritor de segmento.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SegAccess: u8 {
        /// Acessado (setado pelo hardware).
        const ACCESSED   = 1 << 0;
        /// Dados: gravável. Código: legível.
        const RW         = 1 << 1;
        /// Dados: expand-down. Código: conforming.
        const DC         = 1 << 2;
        /// Segmento de código.
        const EXEC       = 1 << 3;
        /// Descritor de código/dados (0 = descritor de sistema).
        const CODE_DATA  = 1 << 4;
        /// DPL bit baixo.
        const DPL_LO     = 1 << 5;
        /// DPL bit alto.
        const DPL_HI     = 1 << 6;
        /// Presente.
        const PRESENT    = 1 << 7;
    }
}

// Tipos de descritor de sistema (nibble baixo quando CODE_DATA = 0)
const SYS_TYPE_LDT: u8 = 0x2;
const SYS_TYPE_TSS32_AVAIL: u8 = 0x9;

// Nibble alto de flags_limit_high
const FLAG_32BIT: u8 = 0x40; // D/B: operandos de 32 bits
const FLAG_GRAN_4K: u8 = 0x80; // G: limite em páginas de 4 KiB

/// Entrada da GDT (descritor legado de 8 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C, packed)]
pub struct GdtEntry {
    limit_low: u16,
    base_low: u16,
    base_mid: u8,
    access: u8,
    flags_limit_high: u8,
    base_high: u8,
}

impl GdtEntry {
    pub const fn null() -> Self {
        Self {
            limit_low: 0,
            base_low: 0,
            base_mid: 0,
            access: 0,
            flags_limit_high: 0,
            base_high: 0,
        }
    }

    /// Monta um descritor arbitrário. `limit` é o limite cru (20 bits).
    const fn raw(base: u32, limit: u32, access: u8, flags: u8) -> Self {
        Self {
            limit_low: (limit & 0xFFFF) as u16,
            base_low: (base & 0xFFFF) as u16,
            base_mid: ((base >> 16) & 0xFF) as u8,
            access,
            flags_limit_high: (flags & 0xF0) | (((limit >> 16) & 0xF) as u8),
            base_high: ((base >> 24) & 0xFF) as u8,
        }
    }

    pub const fn kernel_code() -> Self {
        // Present, Ring 0, Code, Readable, flat 4 GiB
        Self::raw(0, 0xFFFFF, 0x9A, FLAG_32BIT | FLAG_GRAN_4K)
    }

    pub const fn kernel_data() -> Self {
        // Present, Ring 0, Data, Writable, flat 4 GiB
        Self::raw(0, 0xFFFFF, 0x92, FLAG_32BIT | FLAG_GRAN_4K)
    }

    pub const fn user_code() -> Self {
        // Present, Ring 3, Code, Readable, flat 4 GiB
        Self::raw(0, 0xFFFFF, 0xFA, FLAG_32BIT | FLAG_GRAN_4K)
    }

    pub const fn user_data() -> Self {
        // Present, Ring 3, Data, Writable, flat 4 GiB
        Self::raw(0, 0xFFFFF, 0xF2, FLAG_32BIT | FLAG_GRAN_4K)
    }

    /// Descritor de dados byte-granular para uma janela (MMIO/metadados).
    ///
    /// Fatal se a janela estourar o limite de 20 bits — isto é erro de
    /// configuração de boot, não condição de runtime.
    pub fn data_window(base: usize, len: usize, dpl: u8) -> Self {
        if len == 0 || len > SEG_MAX_BYTE_WINDOW {
            crate::fatal!("(GDT) janela fora do limite byte-granular, len=", len);
        }
        let access = SegAccess::PRESENT.bits()
            | SegAccess::CODE_DATA.bits()
            | SegAccess::RW.bits()
            | ((dpl & 0x3) << 5);
        Self::raw(base as u32, (len - 1) as u32, access, FLAG_32BIT)
    }

    /// Descritor de TSS de 32 bits (disponível).
    pub fn tss32(base: usize, limit: usize, dpl: u8) -> Self {
        let access = SegAccess::PRESENT.bits() | ((dpl & 0x3) << 5) | SYS_TYPE_TSS32_AVAIL;
        Self::raw(base as u32, limit as u32, access, 0)
    }

    /// Descritor de LDT.
    pub fn ldt(base: usize, limit: usize) -> Self {
        let access = SegAccess::PRESENT.bits() | SYS_TYPE_LDT;
        Self::raw(base as u32, limit as u32, access, 0)
    }

    // --- Decodificação (inspeção e testes de confinamento) ---

    pub fn present(&self) -> bool {
        (self.access & SegAccess::PRESENT.bits()) != 0
    }

    pub fn dpl(&self) -> u8 {
        (self.access >> 5) & 0x3
    }

    pub fn base(&self) -> usize {
        (self.base_low as usize)
            | ((self.base_mid as usize) << 16)
            | ((self.base_high as usize) << 24)
    }

    /// Limite em bytes (inclusive), já expandido se granularidade 4K.
    pub fn limit_bytes(&self) -> usize {
        let raw = (self.limit_low as usize) | (((self.flags_limit_high & 0xF) as usize) << 16);
        if (self.flags_limit_high & FLAG_GRAN_4K) != 0 {
            (raw << 12) | 0xFFF
        } else {
            raw
        }
    }

    /// Endereço (exclusivo) do primeiro byte FORA do segmento.
    pub fn bound(&self) -> usize {
        self.base() + self.limit_bytes() + 1
    }
}

/// A GDT propriamente dita.
#[repr(C, align(8))]
pub struct Gdt {
    entries: [GdtEntry; GDT_ENTRIES],
}

impl Gdt {
    pub const fn new() -> Self {
        Self {
            entries: [GdtEntry::null(); GDT_ENTRIES],
        }
    }

    /// Popula os segmentos fixos (código/dados de kernel e usuário).
    /// O descritor do TSS principal é inserido depois, pela estratégia.
    pub fn init_fixed(&mut self) {
        self.entries[KERNEL_CODE_SEL.index() as usize] = GdtEntry::kernel_code();
        self.entries[KERNEL_DATA_SEL.index() as usize] = GdtEntry::kernel_data();
        // O segmento plano de dados de usuário só existe na estratégia
        // paging (o confinamento é por PTE). Nas estratégias de
        // segmento ele abriria os dados do kernel e as janelas de todos
        // os domínios a qualquer `mov` de ring 3: o slot fica nulo e os
        // dados visíveis vêm dos descritores da LDT de cada domínio.
        #[cfg(not(any(feature = "hw_task", feature = "sw_seg")))]
        {
            self.entries[USER_DATA_SEL.index() as usize] = GdtEntry::user_data();
        }
        self.entries[USER_CODE_SEL.index() as usize] = GdtEntry::user_code();
    }

    /// Insere um descritor em um slot livre. Duplo uso do slot é fatal
    /// (configuração de boot defeituosa).
    pub fn insert(&mut self, idx: usize, entry: GdtEntry) {
        if idx == 0 || idx >= GDT_ENTRIES {
            crate::fatal!("(GDT) índice de slot fora de faixa, idx=", idx);
        }
        if self.entries[idx].present() {
            crate::fatal!("(GDT) slot já ocupado, idx=", idx);
        }
        self.entries[idx] = entry;
    }

    /// Consulta um descritor.
    pub fn entry(&self, idx: usize) -> &GdtEntry {
        if idx >= GDT_ENTRIES {
            crate::fatal!("(GDT) consulta fora de faixa, idx=", idx);
        }
        &self.entries[idx]
    }

    pub const fn selector(idx: usize, rpl: u8) -> SegmentSelector {
        SegmentSelector::new(idx as u16, rpl)
    }

    pub fn as_ptr(&self) -> *const GdtEntry {
        self.entries.as_ptr()
    }

    pub const fn size_bytes() -> usize {
        GDT_ENTRIES * core::mem::size_of::<GdtEntry>()
    }
}
