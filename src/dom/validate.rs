//! Validação de proveniência de ponteiros vindos de outro domínio.
//!
//! Uma entry que recebe um ponteiro do chamador não pode confiar nele:
//! um chamador malicioso pode apontar para dentro da stack ou dos dados
//! de controle do callee e transformar a chamada em escrita arbitrária.
//! O funil aqui aceita o ponteiro apenas se o intervalo inteiro
//! `[raw, raw + span)` cabe ABAIXO do piso do frame corrente, sem
//! overflow aritmético. Falha de validação é ataque ou corrupção:
//! halt, nunca erro recuperável.

use core::marker::PhantomData;

/// Um ponteiro de chamador que sobreviveu à validação. Só nasce pelo
/// funil `validate`; os acessos continuam `unsafe` porque o apontado é
/// memória compartilhada com um domínio desconfiado.
#[derive(Debug, Clone, Copy)]
pub struct ValidatedPtr<T> {
    addr: usize,
    _marker: PhantomData<*const T>,
}

impl<T> ValidatedPtr<T> {
    /// Valida `raw` como um array de `count` elementos `T`, todo ele
    /// abaixo de `frame_floor` (o endereço mais baixo do frame de stack
    /// da entry corrente).
    pub fn validate(raw: usize, count: usize, frame_floor: usize) -> Self {
        let span = match count.checked_mul(core::mem::size_of::<T>()) {
            Some(span) => span,
            None => crate::fatal!("(DOM) overflow no tamanho do buffer do chamador"),
        };
        let end = match raw.checked_add(span) {
            Some(end) => end,
            None => crate::fatal!("(DOM) overflow no ponteiro do chamador, addr=", raw),
        };
        if end >= frame_floor {
            crate::fatal!("(DOM) ponteiro do chamador invade o frame, addr=", raw);
        }
        Self { addr: raw, _marker: PhantomData }
    }

    pub fn as_ptr(self) -> *const T {
        self.addr as *const T
    }

    pub fn as_mut_ptr(self) -> *mut T {
        self.addr as *mut T
    }

    /// Lê o elemento `idx`.
    ///
    /// # Safety
    /// `idx` deve estar dentro do `count` validado; o conteúdo continua
    /// controlado pelo chamador e não deve ser revalidado depois de lido
    /// (TOCTOU: leia uma vez, decida sobre a cópia).
    pub unsafe fn read(self, idx: usize) -> T {
        (self.addr as *const T).add(idx).read_volatile()
    }

    /// Escreve o elemento `idx`.
    ///
    /// # Safety
    /// Mesmas condições de `read`.
    pub unsafe fn write(self, idx: usize, value: T) {
        (self.addr as *mut T).add(idx).write_volatile(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_buffer_below_frame() {
        let mut buf = [7u32; 4];
        let base = buf.as_mut_ptr() as usize;
        let floor = base + core::mem::size_of_val(&buf) + 0x100;

        let ptr = ValidatedPtr::<u32>::validate(base, 4, floor);
        assert_eq!(unsafe { ptr.read(0) }, 7);
        unsafe { ptr.write(2, 99) };
        assert_eq!(buf[2], 99);
    }

    #[test]
    #[should_panic(expected = "invade o frame")]
    fn buffer_reaching_frame_is_fatal() {
        let buf = [0u8; 16];
        let base = buf.as_ptr() as usize;
        // Piso no meio do buffer: o span validado o alcança.
        let _ = ValidatedPtr::<u8>::validate(base, 16, base + 8);
    }

    #[test]
    #[should_panic(expected = "invade o frame")]
    fn exact_floor_hit_is_fatal() {
        // end == frame_floor também é recusado (>= e não >).
        let _ = ValidatedPtr::<u8>::validate(0x1000, 0x10, 0x1010);
    }

    #[test]
    #[should_panic(expected = "overflow no ponteiro")]
    fn address_overflow_is_fatal() {
        let _ = ValidatedPtr::<u8>::validate(usize::MAX - 2, 8, 0x1000);
    }

    #[test]
    #[should_panic(expected = "overflow no tamanho")]
    fn size_overflow_is_fatal() {
        let _ = ValidatedPtr::<u64>::validate(0x1000, usize::MAX / 2, usize::MAX);
    }
}
