//! Interface Abstrata de Port I/O (HAL).
//!
//! A emulação de port I/O do handler de GPF acessa o espaço de portas
//! através desta trait: o barramento real no alvo, um barramento falso
//! nos testes. Apenas as quatro larguras alcançáveis pelos opcodes de
//! um byte são expostas.

pub trait PortIo {
    /// Lê um byte da porta.
    fn inb(&mut self, port: u16) -> u8;

    /// Escreve um byte na porta.
    fn outb(&mut self, port: u16, value: u8);

    /// Lê um dword da porta.
    fn inl(&mut self, port: u16) -> u32;

    /// Escreve um dword na porta.
    fn outl(&mut self, port: u16, value: u32);
}
