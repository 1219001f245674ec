//! Estratégia de isolamento por task switch de hardware.
//!
//! Cada domínio é uma task de 32 bits: um TSS próprio (com stack
//! privada e seletor de LDT) e uma LDT de três descritores que codifica
//! tudo o que o domínio enxerga além do espaço plano de código:
//!
//! - slot 0: dados/stack do próprio domínio
//! - slot 1: janela MMIO (se registrada)
//! - slot 2: janela de metadados (se registrada)
//!
//! A troca é o far call através do descritor de TSS do destino: o
//! hardware salva o estado da task de saída e carrega o da de entrada,
//! incluindo a LDT. Os dados do kernel ficam selados porque os
//! segmentos de dados das tasks não-kernel simplesmente não os cobrem.

use crate::arch::x86::gdt::{
    domain_ldt_idx, domain_tss_idx, Gdt, GdtEntry, SegmentSelector, KERNEL_CODE_SEL,
    KERNEL_DATA_SEL, MAIN_TSS_SEL, USER_CODE_SEL,
};
use crate::arch::x86::hw;
use crate::arch::x86::tss::TaskStateSegment;
use crate::config::{DOMAIN_STACK_SIZE, MAX_DOMAINS, SEG_MAX_BYTE_WINDOW};
use crate::dom::id::DomainId;
use crate::dom::registry::Domain;
use crate::strategy::{HwContext, IsolationStrategy};
use core::sync::atomic::{AtomicUsize, Ordering};

/// Slots fixos da LDT de cada domínio.
pub const LDT_SLOT_DATA: u16 = 0;
pub const LDT_SLOT_MMIO: u16 = 1;
pub const LDT_SLOT_META: u16 = 2;
const LDT_SLOTS: usize = 3;

/// Seletor local da janela MMIO (carregado em FS pela task do domínio).
pub const MMIO_SEL: SegmentSelector = SegmentSelector::local(LDT_SLOT_MMIO, 3);
/// Seletor local da janela de metadados (GS).
pub const META_SEL: SegmentSelector = SegmentSelector::local(LDT_SLOT_META, 3);

#[repr(C, align(16))]
struct DomainStack([u8; DOMAIN_STACK_SIZE]);

pub struct HwTaskStrategy {
    main_tss: TaskStateSegment,
    tss: [TaskStateSegment; MAX_DOMAINS],
    ldts: [[GdtEntry; LDT_SLOTS]; MAX_DOMAINS],
    stacks: [DomainStack; MAX_DOMAINS],
}

impl HwTaskStrategy {
    pub const fn new() -> Self {
        const ZERO_STACK: DomainStack = DomainStack([0; DOMAIN_STACK_SIZE]);
        Self {
            main_tss: TaskStateSegment::zeroed(),
            tss: [TaskStateSegment::zeroed(); MAX_DOMAINS],
            ldts: [[GdtEntry::null(); LDT_SLOTS]; MAX_DOMAINS],
            stacks: [ZERO_STACK; MAX_DOMAINS],
        }
    }

    pub fn tss_image(&self, id: DomainId) -> &TaskStateSegment {
        &self.tss[id.index()]
    }

    pub fn ldt_entry(&self, id: DomainId, slot: u16) -> &GdtEntry {
        &self.ldts[id.index()][slot as usize]
    }
}

impl IsolationStrategy for HwTaskStrategy {
    fn granularity(&self) -> usize {
        // Descritores de segmento são byte-granulares.
        1
    }

    fn max_window(&self) -> usize {
        SEG_MAX_BYTE_WINDOW
    }

    /// Insere o TSS principal (a task que executa o boot e os handlers)
    /// e o carrega no task register.
    fn hardware_init(&mut self, hw: &mut HwContext<'_>) {
        let base = &self.main_tss as *const _ as usize;
        hw.gdt.insert(
            MAIN_TSS_SEL.index() as usize,
            GdtEntry::tss32(base, TaskStateSegment::limit(), 0),
        );
        // SAFETY: GDT carregada pelo boot antes desta chamada; o slot
        // acabou de ser populado.
        unsafe {
            hw::load_gdt(hw.gdt);
            hw::load_task_register(MAIN_TSS_SEL);
        }
        crate::kinfo!("(HW_TASK) task principal instalada");
    }

    /// Monta a LDT e a imagem de TSS do domínio e publica ambos na GDT.
    fn register(&mut self, dom: &Domain, hw: &mut HwContext<'_>) {
        let idx = dom.id().index();
        let is_kernel = dom.id() == DomainId::KERNEL;

        let stack_base = self.stacks[idx].0.as_ptr() as usize;
        self.ldts[idx][LDT_SLOT_DATA as usize] =
            GdtEntry::data_window(stack_base, DOMAIN_STACK_SIZE, 3);
        if let Some(w) = dom.mmio() {
            self.ldts[idx][LDT_SLOT_MMIO as usize] = GdtEntry::data_window(w.base, w.len, 3);
        }
        if let Some(w) = dom.meta() {
            self.ldts[idx][LDT_SLOT_META as usize] = GdtEntry::data_window(w.base, w.len, 3);
        }

        let ldt_sel = Gdt::selector(domain_ldt_idx(idx), 0);
        let tss = &mut self.tss[idx];
        // Toda task de domínio nasce no gate: o primeiro far call para
        // ela executa o corpo preparado pelo dispatcher. O domínio raiz
        // recebe a main da aplicação depois, via `set_root_entry`.
        tss.eip = hw::task_gate_addr() as u32;
        tss.cr3 = hw::read_cr3() as u32;
        tss.esp = (stack_base + DOMAIN_STACK_SIZE) as u32;
        tss.esp0 = tss.esp;
        tss.ss0 = KERNEL_DATA_SEL.0;
        if is_kernel {
            // O domínio kernel roda em ring 0 com o espaço plano: é o
            // único com os dados do kernel no alcance dos segmentos.
            tss.cs = KERNEL_CODE_SEL.0;
            tss.ss = KERNEL_DATA_SEL.0;
            tss.ds = KERNEL_DATA_SEL.0;
            tss.es = KERNEL_DATA_SEL.0;
        } else {
            tss.cs = USER_CODE_SEL.0;
            let data = SegmentSelector::local(LDT_SLOT_DATA, 3);
            tss.ss = data.0;
            tss.ds = data.0;
            tss.es = data.0;
        }
        if dom.mmio().is_some() {
            tss.fs = MMIO_SEL.0;
        }
        if dom.meta().is_some() {
            tss.gs = META_SEL.0;
        }
        // IF limpo: interrupções só no domínio raiz, fora de task de
        // chamada (bit 1 de EFLAGS é reservado em 1).
        tss.eflags = 0x2;
        tss.set_ldt(ldt_sel);

        let ldt_base = self.ldts[idx].as_ptr() as usize;
        hw.gdt.insert(
            domain_ldt_idx(idx),
            GdtEntry::ldt(ldt_base, LDT_SLOTS * core::mem::size_of::<GdtEntry>() - 1),
        );
        let tss_base = &self.tss[idx] as *const _ as usize;
        hw.gdt.insert(
            domain_tss_idx(idx),
            GdtEntry::tss32(tss_base, TaskStateSegment::limit(), 3),
        );
    }

    /// Entrada da aplicação, fixada no launch: a task raiz não passa
    /// pelo gate, começa direto na main.
    fn set_root_entry(&mut self, entry: usize) {
        self.tss[DomainId::APP.index()].eip = entry as u32;
    }

    /// Publica o entrypoint que o gate da task destino vai executar.
    fn stage_entry(&mut self, entrypoint: usize) {
        PENDING_ENTRYPOINT.store(entrypoint, Ordering::SeqCst);
    }

    /// O far call faz todo o trabalho: salva a task de saída no TSS
    /// dela e carrega registradores, segmentos e LDT do destino.
    fn switch(&mut self, _from: &Domain, to: &Domain) {
        let sel = Gdt::selector(domain_tss_idx(to.id().index()), 3);
        // SAFETY: descritor inserido no register do domínio.
        unsafe { hw::task_far_call(sel) };
    }

    fn begin_dispatch(&mut self) {
        // Os TSS e LDTs vivem em memória protegida contra escrita.
        // SAFETY: fechado no end_dispatch, caminho sem interrupções.
        unsafe { hw::set_write_protect(false) };
    }

    fn end_dispatch(&mut self) {
        // SAFETY: fecha a seção aberta no begin_dispatch.
        unsafe { hw::set_write_protect(true) };
    }

    /// A pilha esvaziou de volta à raiz: entrega a interrupção
    /// estacionada (se houver) ao receptor do embedder.
    fn root_resumed(&mut self) {
        if let Some((_main_esp, vector)) = interrupt_drain() {
            crate::kdebug!("(HW_TASK) drenando interrupção estacionada, vetor=", vector);
            let raw = DRAIN_HANDLER.load(Ordering::SeqCst);
            if raw == 0 {
                crate::fatal!("(HW_TASK) interrupção drenada sem receptor, vetor=", vector);
            }
            // SAFETY: gravado a partir de um fn(usize) em set_drain_handler.
            let handler: fn(usize) = unsafe { core::mem::transmute(raw) };
            handler(vector);
        }
    }
}

// -----------------------------------------------------------------------------
// Interrupções durante uma task de domínio
// -----------------------------------------------------------------------------
//
// Uma interrupção que chega no meio de uma chamada inter-domínio não
// pode ser servida ali (o handler rodaria com a visibilidade do
// domínio). O trampolim de interrupção estaciona o ESP da task
// principal e o vetor pendente aqui; o dispatcher drena o pendente
// quando a pilha de chamadas esvazia de volta à raiz.

const NO_PENDING: usize = usize::MAX;

static MAIN_ESP: AtomicUsize = AtomicUsize::new(0);
static PENDING_VECTOR: AtomicUsize = AtomicUsize::new(NO_PENDING);

/// Entrypoint da próxima ativação, publicado pelo dispatcher antes do
/// far call (ver `stage_entry`). Consumido pelo gate da task destino.
static PENDING_ENTRYPOINT: AtomicUsize = AtomicUsize::new(0);

/// Receptor das interrupções drenadas (fn(vetor)). O embedder liga aqui
/// o despacho real de vetores, antes de habilitar interrupções.
static DRAIN_HANDLER: AtomicUsize = AtomicUsize::new(0);

pub fn set_drain_handler(handler: fn(usize)) {
    DRAIN_HANDLER.store(handler as usize, Ordering::SeqCst);
}

/// Entrypoint atualmente preparado para o gate (inspeção).
pub fn staged_entry() -> usize {
    PENDING_ENTRYPOINT.load(Ordering::SeqCst)
}

/// Corpo do gate de task: executa o entrypoint preparado pelo
/// dispatcher. Gate alcançado sem entrypoint é corrupção de controle.
pub fn run_staged_entry() {
    let entry = PENDING_ENTRYPOINT.swap(0, Ordering::SeqCst);
    if entry == 0 {
        crate::fatal!("(HW_TASK) task ativada sem entrypoint preparado");
    }
    // SAFETY: entry veio de uma syscall entry publicada no boot.
    let body: fn() = unsafe { core::mem::transmute(entry) };
    body();
}

/// Estaciona uma interrupção chegada durante uma task de domínio.
/// Duas pendentes ao mesmo tempo indicam que o dreno não rodou: fatal.
pub fn interrupt_park(main_esp: usize, vector: usize) {
    if PENDING_VECTOR.swap(vector, Ordering::SeqCst) != NO_PENDING {
        crate::fatal!("(HW_TASK) interrupção pendente sobrescrita, vetor=", vector);
    }
    MAIN_ESP.store(main_esp, Ordering::SeqCst);
}

/// Drena a interrupção estacionada, se houver.
pub fn interrupt_drain() -> Option<(usize, usize)> {
    let vector = PENDING_VECTOR.swap(NO_PENDING, Ordering::SeqCst);
    if vector == NO_PENDING {
        None
    } else {
        Some((MAIN_ESP.load(Ordering::SeqCst), vector))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::registry::{DomainTable, Window};

    // O estacionamento de interrupções é estado global: os testes que o
    // tocam se serializam aqui.
    static PARK_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

    fn park_guard() -> std::sync::MutexGuard<'static, ()> {
        match PARK_LOCK.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn registered() -> (std::boxed::Box<HwTaskStrategy>, Gdt, DomainTable) {
        let mut strat = std::boxed::Box::new(HwTaskStrategy::new());
        let mut gdt = Gdt::new();
        gdt.init_fixed();
        let mut doms = DomainTable::new();
        doms.register(DomainId::KERNEL, None, None, false);
        doms.register(DomainId::APP, None, None, false);
        doms.register(
            DomainId::new(2).unwrap(),
            Some(Window { base: 0x00A0_0000, len: 0x100 }),
            Some(Window { base: 0x00B0_0000, len: 0x40 }),
            true,
        );
        {
            let mut hw = HwContext { gdt: &mut gdt };
            strat.hardware_init(&mut hw);
            strat.register(doms.domain(DomainId::KERNEL), &mut hw);
            strat.register(doms.domain(DomainId::APP), &mut hw);
            strat.register(doms.domain(DomainId::new(2).unwrap()), &mut hw);
        }
        (strat, gdt, doms)
    }

    #[test]
    fn driver_task_is_confined_to_its_ldt() {
        let (strat, gdt, _doms) = registered();
        let drv = DomainId::new(2).unwrap();

        // Campos copiados para locais (struct packed).
        let tss = *strat.tss_image(drv);
        let (cs, ds, fs, gs, eflags) = (tss.cs, tss.ds, tss.fs, tss.gs, tss.eflags);
        assert_eq!(cs, USER_CODE_SEL.0);
        assert!(SegmentSelector(ds).is_local());
        assert_eq!(fs, MMIO_SEL.0);
        assert_eq!(gs, META_SEL.0);
        assert_eq!(eflags & (1 << 9), 0);

        let mmio = strat.ldt_entry(drv, LDT_SLOT_MMIO);
        assert_eq!(mmio.base(), 0x00A0_0000);
        assert_eq!(mmio.bound(), 0x00A0_0100);
        assert_eq!(mmio.dpl(), 3);

        // O descritor de TSS do domínio está publicado e alcançável
        // de ring 3 (o far call parte do stub user-side).
        let tss_desc = gdt.entry(domain_tss_idx(drv.index()));
        assert!(tss_desc.present());
        assert_eq!(tss_desc.dpl(), 3);
    }

    #[test]
    fn kernel_task_keeps_flat_ring0_segments() {
        let (strat, _gdt, _doms) = registered();
        let tss = *strat.tss_image(DomainId::KERNEL);
        let (cs, ds) = (tss.cs, tss.ds);
        assert_eq!(cs, KERNEL_CODE_SEL.0);
        assert_eq!(ds, KERNEL_DATA_SEL.0);
    }

    #[test]
    fn parked_interrupt_round_trip() {
        let _park = park_guard();
        assert_eq!(interrupt_drain(), None);
        interrupt_park(0xCAFE_0000, 32);
        assert_eq!(interrupt_drain(), Some((0xCAFE_0000, 32)));
        assert_eq!(interrupt_drain(), None);
    }

    #[test]
    fn fresh_task_images_enter_through_gate() {
        let (strat, _gdt, _doms) = registered();
        for id in [DomainId::KERNEL, DomainId::new(2).unwrap()] {
            let tss = *strat.tss_image(id);
            let (eip, cr3) = (tss.eip, tss.cr3);
            assert_eq!(eip, hw::task_gate_addr() as u32);
            assert_eq!(cr3, hw::read_cr3() as u32);
        }
    }

    #[test]
    fn root_entry_overrides_gate_at_launch() {
        let (mut strat, _gdt, _doms) = registered();
        strat.set_root_entry(0x8000);
        let tss = *strat.tss_image(DomainId::APP);
        let eip = tss.eip;
        assert_eq!(eip, 0x8000);
    }

    static DRAINED_VECTOR: AtomicUsize = AtomicUsize::new(0);

    fn record_drained(vector: usize) {
        DRAINED_VECTOR.store(vector, Ordering::SeqCst);
    }

    #[test]
    fn parked_interrupt_delivered_when_root_resumes() {
        use crate::dom::dispatcher::{Dispatcher, TrapFrame, EFLAGS_IF};

        let _park = park_guard();
        let mut gdt = Gdt::new();
        gdt.init_fixed();
        let mut disp = std::boxed::Box::new(Dispatcher::new(HwTaskStrategy::new()));
        {
            let mut hw = HwContext { gdt: &mut gdt };
            disp.install_hardware(&mut hw);
            disp.register_domain(DomainId::KERNEL, None, None, false, &mut hw);
            disp.register_domain(DomainId::APP, None, None, false, &mut hw);
        }
        let entry = disp.publish_entry(0x4000);
        disp.authorize_entry(entry, DomainId::KERNEL);
        set_drain_handler(record_drained);

        // Interrupção chega no meio da chamada; o retorno à raiz drena.
        let mut ret_slot = 0usize;
        let mut frame = TrapFrame {
            eax: entry.index(),
            ecx: DomainId::KERNEL.index(),
            cs: 0x23,
            eflags: EFLAGS_IF,
            esp: &mut ret_slot as *mut usize as usize,
            ..TrapFrame::default()
        };
        disp.dispatch(&mut frame);
        // O entrypoint ficou preparado para o gate da task destino.
        assert_eq!(staged_entry(), 0x4000);
        interrupt_park(0xBEEF_0000, 33);
        assert_eq!(DRAINED_VECTOR.load(Ordering::SeqCst), 0);

        disp.sysret(&mut frame);
        assert_eq!(DRAINED_VECTOR.load(Ordering::SeqCst), 33);
        assert_eq!(interrupt_drain(), None);
    }
}
