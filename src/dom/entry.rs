//! Tabela de syscall entries entre domínios.
//!
//! Cada entry liga um id denso a um entrypoint e a um bitmap dos
//! domínios callee nos quais a entry pode executar. O bitmap é a
//! autorização inteira: publicar a entry não autoriza ninguém, e um
//! dispatch cujo bit do callee não está ligado é halt.

use crate::config::MAX_SYSCALL_ENTRIES;
use crate::dom::id::DomainId;

/// Id denso de uma syscall entry publicada.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct EntryId(u16);

impl EntryId {
    pub const fn new(raw: usize) -> Option<Self> {
        if raw < MAX_SYSCALL_ENTRIES {
            Some(Self(raw as u16))
        } else {
            None
        }
    }

    /// Funil para payload de trap: entry fora de faixa é fatal.
    pub fn from_trap(raw: usize) -> Self {
        match Self::new(raw) {
            Some(id) => id,
            None => crate::fatal!("(DOM) entry de syscall fora de faixa, raw=", raw),
        }
    }

    /// Variante de consulta (diagnóstico): erro recuperável em vez de
    /// halt, para payloads que não vêm de um trap.
    pub const fn parse(raw: usize) -> Result<Self, crate::dom::DomainError> {
        match Self::new(raw) {
            Some(id) => Ok(id),
            None => Err(crate::dom::DomainError::EntryOutOfRange),
        }
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy)]
struct SyscallEntry {
    entrypoint: usize,
    /// Bitmap dos domínios callee autorizados (bit i = DomainId i).
    doms: u32,
}

/// Tabela estática de entries. Append-only: entries nunca são
/// despublicadas, só desautorizadas.
pub struct EntryTable {
    slots: [SyscallEntry; MAX_SYSCALL_ENTRIES],
    used: usize,
}

impl EntryTable {
    pub const fn new() -> Self {
        Self {
            slots: [SyscallEntry { entrypoint: 0, doms: 0 }; MAX_SYSCALL_ENTRIES],
            used: 0,
        }
    }

    /// Publica uma entry e devolve seu id. Nenhum domínio autorizado
    /// ainda. Esgotar a tabela é defeito de configuração, fatal.
    pub fn publish(&mut self, entrypoint: usize) -> EntryId {
        if self.used == MAX_SYSCALL_ENTRIES {
            crate::fatal!("(DOM) tabela de syscall entries esgotada");
        }
        let id = EntryId(self.used as u16);
        self.slots[self.used] = SyscallEntry { entrypoint, doms: 0 };
        self.used += 1;
        crate::kdebug!("(DOM) entry publicada, id=", id.index());
        id
    }

    /// Liga o bit do domínio callee no bitmap da entry.
    pub fn authorize(&mut self, entry: EntryId, callee: DomainId) {
        self.slot_mut(entry).doms |= callee.bit();
    }

    /// Desliga o bit do domínio callee. Dispatches subsequentes para
    /// esse par passam a ser fatais.
    pub fn deauthorize(&mut self, entry: EntryId, callee: DomainId) {
        self.slot_mut(entry).doms &= !callee.bit();
    }

    /// A entry pode executar no domínio `callee`?
    pub fn is_authorized(&self, entry: EntryId, callee: DomainId) -> bool {
        self.slot(entry).doms & callee.bit() != 0
    }

    pub fn entrypoint(&self, entry: EntryId) -> usize {
        self.slot(entry).entrypoint
    }

    fn slot(&self, entry: EntryId) -> &SyscallEntry {
        if entry.index() >= self.used {
            crate::fatal!("(DOM) entry de syscall não publicada, id=", entry.index());
        }
        &self.slots[entry.index()]
    }

    fn slot_mut(&mut self, entry: EntryId) -> &mut SyscallEntry {
        if entry.index() >= self.used {
            crate::fatal!("(DOM) entry de syscall não publicada, id=", entry.index());
        }
        &mut self.slots[entry.index()]
    }
}
