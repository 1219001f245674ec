/// Arquivo: x86/tss.rs
///
/// Propósito: Task State Segment de 32 bits — a imagem completa de uma
/// task de hardware. Na estratégia hw_task cada domínio de proteção é
/// uma task: o far call para o descritor de TSS do destino salva e
/// carrega atomicamente todo o estado de registradores, incluindo o
/// seletor de LDT que codifica as janelas MMIO/metadados do domínio.
use crate::arch::x86::gdt::SegmentSelector;

/// TSS de 32 bits, layout de hardware (104 bytes).
#[derive(Debug, Clone, Copy)]
#[repr(C, packed)]
pub struct TaskStateSegment {
    pub back_link: u16,
    _pad0: u16,
    pub esp0: u32,
    pub ss0: u16,
    _pad1: u16,
    pub esp1: u32,
    pub ss1: u16,
    _pad2: u16,
    pub esp2: u32,
    pub ss2: u16,
    _pad3: u16,
    pub cr3: u32,
    pub eip: u32,
    pub eflags: u32,
    pub eax: u32,
    pub ecx: u32,
    pub edx: u32,
    pub ebx: u32,
    pub esp: u32,
    pub ebp: u32,
    pub esi: u32,
    pub edi: u32,
    pub es: u16,
    _pad4: u16,
    pub cs: u16,
    _pad5: u16,
    pub ss: u16,
    _pad6: u16,
    pub ds: u16,
    _pad7: u16,
    pub fs: u16,
    _pad8: u16,
    pub gs: u16,
    _pad9: u16,
    pub ldt_sel: u16,
    _pad10: u16,
    pub trap: u16,
    pub iomap_base: u16,
}

impl TaskStateSegment {
    pub const fn zeroed() -> Self {
        Self {
            back_link: 0,
            _pad0: 0,
            esp0: 0,
            ss0: 0,
            _pad1: 0,
            esp1: 0,
            ss1: 0,
            _pad2: 0,
            esp2: 0,
            ss2: 0,
            _pad3: 0,
            cr3: 0,
            eip: 0,
            eflags: 0,
            eax: 0,
            ecx: 0,
            edx: 0,
            ebx: 0,
            esp: 0,
            ebp: 0,
            esi: 0,
            edi: 0,
            es: 0,
            _pad4: 0,
            cs: 0,
            _pad5: 0,
            ss: 0,
            _pad6: 0,
            ds: 0,
            _pad7: 0,
            fs: 0,
            _pad8: 0,
            gs: 0,
            _pad9: 0,
            ldt_sel: 0,
            trap: 0,
            _pad10: 0,
            // Sem bitmap de I/O: aponta para além do limite do TSS,
            // negando acesso direto a portas (o GPF emula, se autorizado).
            iomap_base: core::mem::size_of::<TaskStateSegment>() as u16,
        }
    }

    /// Limite (inclusive) para o descritor de TSS na GDT.
    pub const fn limit() -> usize {
        core::mem::size_of::<TaskStateSegment>() - 1
    }

    pub fn set_ldt(&mut self, sel: SegmentSelector) {
        self.ldt_sel = sel.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hardware_layout_is_104_bytes() {
        assert_eq!(core::mem::size_of::<TaskStateSegment>(), 104);
        assert_eq!(TaskStateSegment::limit(), 103);
    }
}
