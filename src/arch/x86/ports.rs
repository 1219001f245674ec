/// Arquivo: x86/ports.rs
///
/// Propósito: Abstração para instruções de entrada/saída (I/O Ports) do x86.
/// Primitivas de leitura e escrita em portas de I/O (inb, outb, etc.),
/// usadas pela emulação de port I/O do handler de GPF e pelo embedder
/// para hardware legado (PIC, PIT, UART de debug).
///
/// Detalhes de Implementação:
/// - Usa `core::arch::asm!` para emitir instruções `in` e `out`.
/// - Todas as funções são marcadas como `#[inline]` para evitar overhead.
/// - `X86PortBus` implementa a trait `PortIo` sobre estas primitivas.
use crate::arch::traits::PortIo;

/// Lê um byte de uma porta IO
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
#[inline]
pub fn inb(port: u16) -> u8 {
    let value: u8;
    // SAFETY: IO ports são operações privilegiadas mas seguras do ponto de vista de memória
    unsafe {
        core::arch::asm!(
            "in al, dx",
            in("dx") port,
            out("al") value,
            options(nomem, nostack)
        );
    }
    value
}

/// Escreve um byte em uma porta IO
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
#[inline]
pub fn outb(port: u16, value: u8) {
    // SAFETY: IO ports são operações privilegiadas mas seguras do ponto de vista de memória
    unsafe {
        core::arch::asm!(
            "out dx, al",
            in("dx") port,
            in("al") value,
            options(nomem, nostack)
        );
    }
}

/// Lê um dword (32 bits) de uma porta IO
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
#[inline]
pub fn inl(port: u16) -> u32 {
    let value: u32;
    // SAFETY: IO ports são operações privilegiadas mas seguras do ponto de vista de memória
    unsafe {
        core::arch::asm!(
            "in eax, dx",
            in("dx") port,
            out("eax") value,
            options(nomem, nostack)
        );
    }
    value
}

/// Escreve um dword em uma porta IO
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
#[inline]
pub fn outl(port: u16, value: u32) {
    // SAFETY: IO ports são operações privilegiadas mas seguras do ponto de vista de memória
    unsafe {
        core::arch::asm!(
            "out dx, eax",
            in("dx") port,
            in("eax") value,
            options(nomem, nostack)
        );
    }
}

// Stubs para arquiteturas sem port I/O (o handler de GPF nunca roda nelas).
#[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
pub fn inb(_port: u16) -> u8 {
    0
}
#[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
pub fn outb(_port: u16, _value: u8) {}
#[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
pub fn inl(_port: u16) -> u32 {
    0
}
#[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
pub fn outl(_port: u16, _value: u32) {}

/// O barramento de portas real.
pub struct X86PortBus;

impl PortIo for X86PortBus {
    #[inline]
    fn inb(&mut self, port: u16) -> u8 {
        inb(port)
    }

    #[inline]
    fn outb(&mut self, port: u16, value: u8) {
        outb(port, value)
    }

    #[inline]
    fn inl(&mut self, port: u16) -> u32 {
        inl(port)
    }

    #[inline]
    fn outl(&mut self, port: u16, value: u32) {
        outl(port, value)
    }
}
