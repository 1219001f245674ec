//! Identidade de domínio — newtype checado.
//!
//! Um `DomainId` só nasce de `new` (checagem de faixa) ou das constantes
//! built-in. Isso elimina em compile-time a confusão entre ids de domínio
//! e inteiros crus vindos de um trap frame: o payload não confiável tem
//! que passar pelo funil de validação antes de indexar qualquer tabela.

use crate::config::MAX_DOMAINS;

/// Id denso de um domínio de proteção. Fixado em compile-time, nunca
/// reutilizado, nunca destruído.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(transparent)]
pub struct DomainId(u8);

impl DomainId {
    /// O domínio kernel (privilegiado sobre os dados do kernel).
    pub const KERNEL: Self = Self(0);

    /// O domínio da aplicação — raiz da execução cooperativa.
    pub const APP: Self = Self(1);

    /// Constrói um id validado. `None` se fora de faixa.
    pub const fn new(raw: usize) -> Option<Self> {
        if raw < MAX_DOMAINS {
            Some(Self(raw as u8))
        } else {
            None
        }
    }

    /// Funil para payload de trap: id inválido implica dados de controle
    /// corrompidos, logo fatal.
    pub fn from_trap(raw: usize) -> Self {
        match Self::new(raw) {
            Some(id) => id,
            None => crate::fatal!("(DOM) id de domínio fora de faixa, raw=", raw),
        }
    }

    /// Variante de consulta (diagnóstico): erro recuperável em vez de
    /// halt, para payloads que não vêm de um trap.
    pub const fn parse(raw: usize) -> Result<Self, crate::dom::DomainError> {
        match Self::new(raw) {
            Some(id) => Ok(id),
            None => Err(crate::dom::DomainError::IdOutOfRange),
        }
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Bit correspondente no bitmap de autorização.
    pub const fn bit(self) -> u32 {
        1 << self.0
    }
}
