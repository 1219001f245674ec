//! Accessor da janela MMIO do domínio corrente.
//!
//! Os drivers não recebem ponteiros crus para os registradores do
//! dispositivo: recebem um `MmioWindow` com offsets checados e acessos
//! voláteis. Na estratégia paging a base é o slot linear fixo; nas
//! estratégias de segmento a base vem do descritor carregado. Em ambas,
//! um offset fora da janela registrada nunca vira um acesso.
//!
//! Com a estratégia sw_seg ativa, todo acesso exige ainda a janela
//! armada (`strategy::sw_seg::mmio_enable`): fora do par
//! enable/disable o accessor é fatal antes de tocar o barramento.

use core::ptr::NonNull;
use volatile::VolatilePtr;

/// Uma janela MMIO com acessos voláteis e offsets checados.
#[derive(Debug, Clone, Copy)]
pub struct MmioWindow {
    base: usize,
    len: usize,
}

impl MmioWindow {
    /// # Safety
    /// `base..base + len` deve ser a janela MMIO materializada para o
    /// domínio corrente (slot linear ou segmento carregado).
    pub const unsafe fn new(base: usize, len: usize) -> Self {
        Self { base, len }
    }

    pub const fn len(&self) -> usize {
        self.len
    }

    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn slot<T>(&self, offset: usize) -> NonNull<T> {
        #[cfg(all(feature = "sw_seg", not(feature = "hw_task")))]
        {
            if !crate::strategy::sw_seg::window_armed() {
                crate::fatal!("(MMIO) acesso com janela desarmada, offset=", offset);
            }
        }
        let size = core::mem::size_of::<T>();
        if offset % size != 0 {
            crate::fatal!("(MMIO) offset desalinhado, offset=", offset);
        }
        if offset + size > self.len {
            crate::fatal!("(MMIO) offset fora da janela, offset=", offset);
        }
        // base não-nulo garantido pelo registro (janela validada).
        match NonNull::new((self.base + offset) as *mut T) {
            Some(ptr) => ptr,
            None => crate::fatal!("(MMIO) janela com base nula"),
        }
    }

    pub fn read8(&self, offset: usize) -> u8 {
        // SAFETY: offset checado contra a janela registrada.
        unsafe { VolatilePtr::new(self.slot::<u8>(offset)).read() }
    }

    pub fn write8(&self, offset: usize, value: u8) {
        // SAFETY: idem read8.
        unsafe { VolatilePtr::new(self.slot::<u8>(offset)).write(value) }
    }

    pub fn read16(&self, offset: usize) -> u16 {
        // SAFETY: idem read8.
        unsafe { VolatilePtr::new(self.slot::<u16>(offset)).read() }
    }

    pub fn write16(&self, offset: usize, value: u16) {
        // SAFETY: idem read8.
        unsafe { VolatilePtr::new(self.slot::<u16>(offset)).write(value) }
    }

    pub fn read32(&self, offset: usize) -> u32 {
        // SAFETY: idem read8.
        unsafe { VolatilePtr::new(self.slot::<u32>(offset)).read() }
    }

    pub fn write32(&self, offset: usize, value: u32) {
        // SAFETY: idem read8.
        unsafe { VolatilePtr::new(self.slot::<u32>(offset)).write(value) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Arma a janela quando a estratégia sw_seg está ativa (e serializa
    /// os testes que dependem do flag global); unit nas demais.
    #[cfg(all(feature = "sw_seg", not(feature = "hw_task")))]
    fn armed() -> std::sync::MutexGuard<'static, ()> {
        let guard = crate::strategy::sw_seg::arm_guard();
        crate::strategy::sw_seg::mmio_enable();
        guard
    }

    #[cfg(not(all(feature = "sw_seg", not(feature = "hw_task"))))]
    fn armed() {}

    fn window(buf: &mut [u8]) -> MmioWindow {
        // SAFETY: janela de teste apoiada em buffer do próprio teste.
        unsafe { MmioWindow::new(buf.as_mut_ptr() as usize, buf.len()) }
    }

    #[test]
    fn checked_volatile_access() {
        let _armed = armed();
        let mut buf = [0u8; 16];
        let win = window(&mut buf);

        win.write32(4, 0xCAFE_BABE);
        assert_eq!(win.read32(4), 0xCAFE_BABE);
        assert_eq!(win.read8(4), 0xBE); // little-endian
        win.write8(0, 0x5A);
        assert_eq!(win.read8(0), 0x5A);
    }

    #[test]
    #[should_panic(expected = "fora da janela")]
    fn access_past_window_is_fatal() {
        let _armed = armed();
        let mut buf = [0u8; 16];
        let win = window(&mut buf);
        let _ = win.read32(16);
    }

    #[test]
    #[should_panic(expected = "fora da janela")]
    fn straddling_access_is_fatal() {
        let _armed = armed();
        let mut buf = [0u8; 14];
        let win = window(&mut buf);
        // Começa dentro, termina fora.
        let _ = win.read32(12);
    }

    #[test]
    #[should_panic(expected = "desalinhado")]
    fn misaligned_access_is_fatal() {
        let _armed = armed();
        let mut buf = [0u8; 16];
        let win = window(&mut buf);
        let _ = win.read32(2);
    }

    #[cfg(all(feature = "sw_seg", not(feature = "hw_task")))]
    #[test]
    #[should_panic(expected = "janela desarmada")]
    fn access_with_disarmed_window_is_fatal() {
        let _guard = crate::strategy::sw_seg::arm_guard();
        crate::strategy::sw_seg::mmio_disable();
        let mut buf = [0u8; 16];
        let win = window(&mut buf);
        let _ = win.read8(0);
    }
}
