/// Arquivo: x86/idt.rs
///
/// Propósito: Gerenciamento da Interrupt Descriptor Table (IDT) de 32 bits.
/// Define a estrutura da tabela usada pela CPU para despachar exceções
/// (GPF, Double Fault) e os dois vetores de software-interrupt do
/// dispatcher (chamada e retorno), alcançáveis a partir de ring 3.
///
/// Detalhes de Implementação:
/// - Define `IdtEntry` de 8 bytes conforme especificação IA-32.
/// - Mantém uma tabela de 256 entradas.
/// - Trap gates (tipo 0xF) não mascaram IF; interrupt gates (0xE) mascaram.
///   Os vetores do dispatcher usam interrupt gate: a transição de domínio
///   executa com interrupções mascaradas do início ao fim.
/// - O carregamento (`lidt`) vive em `hw.rs`.
use crate::arch::x86::gdt::KERNEL_CODE_SEL;

/// Handler "cru": endereço de um trampolim assembly.
pub type HandlerAddr = usize;

const GATE_INTERRUPT32: u8 = 0xE;
const GATE_TRAP32: u8 = 0xF;
const GATE_PRESENT: u8 = 0x80;

/// Entrada da IDT (8 bytes em modo protegido)
#[derive(Debug, Clone, Copy)]
#[repr(C, packed)]
pub struct IdtEntry {
    offset_low: u16,
    selector: u16,
    zero: u8,
    type_attr: u8,
    offset_high: u16,
}

impl IdtEntry {
    /// Cria uma entrada vazia (não presente)
    pub const fn missing() -> Self {
        Self {
            offset_low: 0,
            selector: 0,
            zero: 0,
            type_attr: 0,
            offset_high: 0,
        }
    }

    fn gate(handler: HandlerAddr, gate_type: u8, dpl: u8) -> Self {
        Self {
            offset_low: (handler & 0xFFFF) as u16,
            selector: KERNEL_CODE_SEL.0,
            zero: 0,
            type_attr: GATE_PRESENT | ((dpl & 0x3) << 5) | gate_type,
            offset_high: ((handler >> 16) & 0xFFFF) as u16,
        }
    }

    /// Interrupt gate (mascara IF na entrada).
    pub fn interrupt(handler: HandlerAddr, dpl: u8) -> Self {
        Self::gate(handler, GATE_INTERRUPT32, dpl)
    }

    /// Trap gate (não mascara IF).
    pub fn trap(handler: HandlerAddr, dpl: u8) -> Self {
        Self::gate(handler, GATE_TRAP32, dpl)
    }

    pub fn present(&self) -> bool {
        (self.type_attr & GATE_PRESENT) != 0
    }

    pub fn dpl(&self) -> u8 {
        (self.type_attr >> 5) & 0x3
    }

    pub fn handler(&self) -> HandlerAddr {
        (self.offset_low as usize) | ((self.offset_high as usize) << 16)
    }

    pub fn masks_interrupts(&self) -> bool {
        (self.type_attr & 0xF) == GATE_INTERRUPT32
    }
}

/// A Tabela IDT propriamente dita
#[repr(C, align(8))]
pub struct Idt {
    entries: [IdtEntry; 256],
}

impl Idt {
    pub const fn new() -> Self {
        Self {
            entries: [IdtEntry::missing(); 256],
        }
    }

    /// Instala um interrupt gate no vetor dado. Reinstalar um vetor já
    /// presente é fatal: os vetores deste subsistema são fixos no boot.
    pub fn set_gate(&mut self, vector: u8, entry: IdtEntry) {
        if self.entries[vector as usize].present() {
            crate::fatal!("(IDT) vetor já instalado, vector=", vector);
        }
        self.entries[vector as usize] = entry;
    }

    pub fn entry(&self, vector: u8) -> &IdtEntry {
        &self.entries[vector as usize]
    }

    pub fn as_ptr(&self) -> *const IdtEntry {
        self.entries.as_ptr()
    }

    pub const fn size_bytes() -> usize {
        256 * core::mem::size_of::<IdtEntry>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SYSCALL_DISPATCH_VECTOR, SYSRET_DISPATCH_VECTOR};

    #[test]
    fn dispatcher_gates_are_user_reachable_and_masked() {
        let mut idt = Idt::new();
        idt.set_gate(SYSCALL_DISPATCH_VECTOR, IdtEntry::interrupt(0x1234, 3));
        idt.set_gate(SYSRET_DISPATCH_VECTOR, IdtEntry::interrupt(0x5678, 3));

        let call = idt.entry(SYSCALL_DISPATCH_VECTOR);
        assert!(call.present());
        assert_eq!(call.dpl(), 3);
        assert_eq!(call.handler(), 0x1234);
        assert!(call.masks_interrupts());
    }

    #[test]
    #[should_panic(expected = "vetor já instalado")]
    fn reinstalling_vector_is_fatal() {
        let mut idt = Idt::new();
        idt.set_gate(13, IdtEntry::interrupt(0x1000, 0));
        idt.set_gate(13, IdtEntry::interrupt(0x2000, 0));
    }
}
