//! Estratégia de isolamento por troca de segmentos em software.
//!
//! Sem tasks de hardware e sem reescrita de PTEs: cada domínio tem uma
//! LDT de três descritores e a troca de domínio é só recarregar LDTR e
//! os registradores de segmento auxiliares. É a estratégia mais barata
//! por troca, ao custo de exigir acessos segment-relative explícitos
//! nos drivers (via `dom::mmio`).
//!
//! Slots da LDT:
//! - slot 0: alias dos dados do kernel (presente apenas na LDT do
//!   domínio kernel; nos demais o slot é nulo e os dados do kernel
//!   ficam inalcançáveis)
//! - slot 1: janela MMIO (carregada em FS sob demanda)
//! - slot 2: janela de metadados (GS enquanto o domínio executa)

use crate::arch::x86::gdt::{domain_ldt_idx, Gdt, GdtEntry, SegmentSelector};
use crate::arch::x86::hw;
use crate::config::{KERNEL_DATA_BASE, KERNEL_DATA_END, MAX_DOMAINS, SEG_MAX_BYTE_WINDOW};
use crate::dom::id::DomainId;
use crate::dom::registry::Domain;
use crate::strategy::{HwContext, IsolationStrategy};
use core::sync::atomic::{AtomicBool, Ordering};

pub const LDT_SLOT_KERN: u16 = 0;
pub const LDT_SLOT_MMIO: u16 = 1;
pub const LDT_SLOT_META: u16 = 2;
const LDT_SLOTS: usize = 3;

/// Seletor local do alias de dados do kernel (só resolve na LDT do
/// domínio kernel).
pub const KERN_ALIAS_SEL: SegmentSelector = SegmentSelector::local(LDT_SLOT_KERN, 0);
pub const MMIO_SEL: SegmentSelector = SegmentSelector::local(LDT_SLOT_MMIO, 3);
pub const META_SEL: SegmentSelector = SegmentSelector::local(LDT_SLOT_META, 3);

const NULL_SEL: SegmentSelector = SegmentSelector(0);

/// FS carregado com a janela MMIO (só entre enable/disable). Estado de
/// registrador de um único core, logo um único flag basta.
static MMIO_ARMED: AtomicBool = AtomicBool::new(false);

/// Carrega FS com a janela MMIO do domínio corrente. Os accessors de
/// `dom::mmio` exigem a janela armada.
pub fn mmio_enable() {
    // SAFETY: MMIO_SEL resolve na LDT corrente (carregada no switch).
    unsafe { hw::load_fs(MMIO_SEL) };
    MMIO_ARMED.store(true, Ordering::SeqCst);
}

/// Descarrega FS. Um acesso fora do par enable/disable é fatal no
/// accessor e GPF no hardware.
pub fn mmio_disable() {
    // SAFETY: seletor nulo é sempre carregável.
    unsafe { hw::load_fs(NULL_SEL) };
    MMIO_ARMED.store(false, Ordering::SeqCst);
}

/// A janela MMIO está armada?
pub fn window_armed() -> bool {
    MMIO_ARMED.load(Ordering::SeqCst)
}

/// Seletor de dados do domínio que entra: o domínio kernel enxerga o
/// alias dos próprios dados; os demais ficam com o seletor nulo e só
/// alcançam memória pelas janelas em FS/GS.
fn data_selector(to: &Domain) -> SegmentSelector {
    if to.id() == DomainId::KERNEL {
        KERN_ALIAS_SEL
    } else {
        NULL_SEL
    }
}

pub struct SwSegStrategy {
    ldts: [[GdtEntry; LDT_SLOTS]; MAX_DOMAINS],
}

impl SwSegStrategy {
    pub const fn new() -> Self {
        Self {
            ldts: [[GdtEntry::null(); LDT_SLOTS]; MAX_DOMAINS],
        }
    }

    pub fn ldt_entry(&self, id: DomainId, slot: u16) -> &GdtEntry {
        &self.ldts[id.index()][slot as usize]
    }
}

impl IsolationStrategy for SwSegStrategy {
    fn granularity(&self) -> usize {
        1
    }

    fn max_window(&self) -> usize {
        SEG_MAX_BYTE_WINDOW
    }

    /// Monta a LDT do domínio e publica o descritor dela na GDT.
    fn register(&mut self, dom: &Domain, hw: &mut HwContext<'_>) {
        let idx = dom.id().index();

        if dom.id() == DomainId::KERNEL {
            self.ldts[idx][LDT_SLOT_KERN as usize] =
                GdtEntry::data_window(KERNEL_DATA_BASE, KERNEL_DATA_END - KERNEL_DATA_BASE, 0);
        }
        if let Some(w) = dom.mmio() {
            self.ldts[idx][LDT_SLOT_MMIO as usize] = GdtEntry::data_window(w.base, w.len, 3);
        }
        if let Some(w) = dom.meta() {
            self.ldts[idx][LDT_SLOT_META as usize] = GdtEntry::data_window(w.base, w.len, 3);
        }

        let base = self.ldts[idx].as_ptr() as usize;
        hw.gdt.insert(
            domain_ldt_idx(idx),
            GdtEntry::ldt(base, LDT_SLOTS * core::mem::size_of::<GdtEntry>() - 1),
        );
    }

    /// Troca = recarregar LDTR e os registradores de dados. DS/ES
    /// seguem o domínio (alias do kernel ou nulo); FS sempre sai
    /// descarregado e a janela MMIO é rearmada sob demanda.
    fn switch(&mut self, _from: &Domain, to: &Domain) {
        let ldt_sel = Gdt::selector(domain_ldt_idx(to.id().index()), 0);
        let data = data_selector(to);
        // SAFETY: descritores inseridos no register do domínio.
        unsafe {
            hw::load_ldt(ldt_sel);
            hw::load_ds(data);
            hw::load_es(data);
            hw::load_fs(NULL_SEL);
            let gs = if to.meta().is_some() { META_SEL } else { NULL_SEL };
            hw::load_gs(gs);
        }
        MMIO_ARMED.store(false, Ordering::SeqCst);
    }

    fn begin_dispatch(&mut self) {
        // As LDTs vivem em memória protegida contra escrita.
        // SAFETY: fechado no end_dispatch, caminho sem interrupções.
        unsafe { hw::set_write_protect(false) };
    }

    fn end_dispatch(&mut self) {
        // SAFETY: fecha a seção aberta no begin_dispatch.
        unsafe { hw::set_write_protect(true) };
    }
}

// O flag de armamento é global: testes que o manipulam (daqui e de
// `dom::mmio`) se serializam neste lock.
#[cfg(test)]
pub(crate) static ARM_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
pub(crate) fn arm_guard() -> std::sync::MutexGuard<'static, ()> {
    match ARM_LOCK.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
