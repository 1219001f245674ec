//! Registry de Domínios de Proteção.
//!
//! Estado por-domínio: janelas MMIO/metadados, flags e o slot protegido
//! de endereço de retorno. Os slots são um array fixo alocado em tempo
//! de link (lifetime = uptime do processo); `register` roda exatamente
//! uma vez por domínio, no boot — qualquer violação aqui é defeito de
//! configuração e o tratamento é halt, não erro recuperável.
//!
//! Os drivers nunca enxergam o array cru: só leem as próprias janelas
//! através dos accessors entregues no registro (`dom::mmio`).

use crate::config::MAX_DOMAINS;
use crate::dom::id::DomainId;
use bitflags::bitflags;

bitflags! {
    /// Flags de estado de um domínio.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DomainFlags: u8 {
        /// Registrado (register é once-only).
        const INITIALIZED     = 1 << 0;
        /// Uma ativação em voo — o dispatcher é não-reentrante por domínio.
        const BUSY            = 1 << 1;
        /// Autorizado a port I/O emulado pelo handler de GPF.
        const REQUIRES_PORT_IO = 1 << 2;
    }
}

/// Janela de memória (base física + comprimento em bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub base: usize,
    pub len: usize,
}

impl Window {
    pub const fn end(self) -> usize {
        self.base + self.len
    }
}

/// Um domínio de proteção.
#[derive(Debug, Clone, Copy)]
pub struct Domain {
    id: DomainId,
    pub flags: DomainFlags,
    mmio: Option<Window>,
    meta: Option<Window>,
    /// Endereço de retorno do chamador, salvo pelo dispatcher no
    /// dispatch e consumido no retorno. Propriedade do kernel: o
    /// próprio domínio jamais escreve aqui.
    pub(crate) saved_return_address: usize,
}

impl Domain {
    const fn empty(raw: usize) -> Self {
        Self {
            // raw < MAX_DOMAINS garantido pelo array fixo abaixo.
            id: match DomainId::new(raw) {
                Some(id) => id,
                None => DomainId::KERNEL,
            },
            flags: DomainFlags::empty(),
            mmio: None,
            meta: None,
            saved_return_address: 0,
        }
    }

    pub const fn id(&self) -> DomainId {
        self.id
    }

    pub const fn mmio(&self) -> Option<Window> {
        self.mmio
    }

    pub const fn meta(&self) -> Option<Window> {
        self.meta
    }

    pub fn is_initialized(&self) -> bool {
        self.flags.contains(DomainFlags::INITIALIZED)
    }

    pub fn is_busy(&self) -> bool {
        self.flags.contains(DomainFlags::BUSY)
    }

    pub fn requires_port_io(&self) -> bool {
        self.flags.contains(DomainFlags::REQUIRES_PORT_IO)
    }
}

/// A tabela estática de domínios.
pub struct DomainTable {
    slots: [Domain; MAX_DOMAINS],
}

impl DomainTable {
    pub const fn new() -> Self {
        let mut slots = [Domain::empty(0); MAX_DOMAINS];
        let mut i = 0;
        while i < MAX_DOMAINS {
            slots[i] = Domain::empty(i);
            i += 1;
        }
        Self { slots }
    }

    /// Registra um domínio: grava janelas e flag de port I/O e marca
    /// INITIALIZED. As janelas já chegam validadas contra a
    /// granularidade da estratégia ativa (ver `Dispatcher::register_domain`).
    ///
    /// Segundo registro do mesmo id é fatal.
    pub(crate) fn register(
        &mut self,
        id: DomainId,
        mmio: Option<Window>,
        meta: Option<Window>,
        requires_port_io: bool,
    ) {
        let dom = &mut self.slots[id.index()];
        if dom.is_initialized() {
            crate::fatal!("(DOM) registro duplicado de domínio, id=", id.index());
        }
        dom.mmio = mmio;
        dom.meta = meta;
        if requires_port_io {
            dom.flags.insert(DomainFlags::REQUIRES_PORT_IO);
        }
        dom.flags.insert(DomainFlags::INITIALIZED);
        crate::kinfo!("(DOM) domínio registrado, id=", id.index());
    }

    pub fn domain(&self, id: DomainId) -> &Domain {
        &self.slots[id.index()]
    }

    /// Variante de consulta (diagnóstico): erro recuperável para
    /// domínios nunca registrados.
    pub fn try_domain(&self, id: DomainId) -> Result<&Domain, crate::dom::DomainError> {
        let dom = &self.slots[id.index()];
        if dom.is_initialized() {
            Ok(dom)
        } else {
            Err(crate::dom::DomainError::NotInitialized)
        }
    }

    pub(crate) fn domain_mut(&mut self, id: DomainId) -> &mut Domain {
        &mut self.slots[id.index()]
    }

    /// Base física da janela de metadados de um domínio — a válvula de
    /// escape estreita para o próprio domínio montar ponteiros DMA.
    /// Consulta sem janela registrada é fatal.
    pub fn lookup_metadata_base(&self, id: DomainId) -> usize {
        match self.slots[id.index()].meta {
            Some(w) => w.base,
            None => crate::fatal!("(DOM) domínio sem janela de metadados, id=", id.index()),
        }
    }
}
