//! O dispatcher de transições entre domínios.
//!
//! Máquina de estados única do subsistema: todo cruzamento de fronteira
//! de domínio (chamada e retorno) passa por aqui, vindo dos trampolins
//! de trap (`arch::x86::hw`). O dispatcher valida o payload do frame,
//! consulta autorização, mantém a pilha de ativações e delega a troca
//! de visibilidade de memória para a estratégia de isolamento ativa.
//!
//! Disciplina fail-closed: toda violação detectada (entry não
//! autorizada, reentrância, estouro de pilha, payload fora de faixa) é
//! halt imediato ANTES de qualquer mutação de estado ou troca de
//! contexto. Não existe caminho de erro recuperável num dispatch.

use crate::dom::callstack::DomainCallStack;
use crate::dom::entry::{EntryId, EntryTable};
use crate::dom::id::DomainId;
use crate::dom::registry::{DomainTable, Window};
use crate::strategy::{ActiveStrategy, HwContext, IsolationStrategy};

/// Bit IF (interrupt enable) em EFLAGS.
pub const EFLAGS_IF: usize = 1 << 9;

/// O frame salvo pelos trampolins: `pushad` seguido do frame de
/// interrupção do hardware. Campos em `usize` para que a mesma lógica
/// rode nos testes de host.
#[derive(Debug, Clone, Copy, Default)]
#[repr(C)]
pub struct TrapFrame {
    pub edi: usize,
    pub esi: usize,
    pub ebp: usize,
    /// ESP no momento do `pushad` (ignorado pelo `popad`).
    pub esp_dummy: usize,
    pub ebx: usize,
    pub edx: usize,
    pub ecx: usize,
    pub eax: usize,
    // Frame de interrupção empilhado pelo hardware.
    pub eip: usize,
    pub cs: usize,
    pub eflags: usize,
    /// Presente apenas em traps com troca de privilégio; os trampolins
    /// só são alcançáveis de ring 3, então sempre presente aqui.
    pub esp: usize,
    pub ss: usize,
}

pub struct Dispatcher<S: IsolationStrategy> {
    domains: DomainTable,
    entries: EntryTable,
    stack: DomainCallStack,
    strategy: S,
}

impl<S: IsolationStrategy> Dispatcher<S> {
    pub const fn new(strategy: S) -> Self {
        Self {
            domains: DomainTable::new(),
            entries: EntryTable::new(),
            stack: DomainCallStack::new(),
            strategy,
        }
    }

    /// Domínio no topo da pilha (o que está executando).
    pub fn current(&self) -> DomainId {
        self.stack.top()
    }

    pub fn domains(&self) -> &DomainTable {
        &self.domains
    }

    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    // -------------------------------------------------------------------------
    // Configuração (boot)
    // -------------------------------------------------------------------------

    /// Instala o estado de hardware global da estratégia. Chamado pelo
    /// boot depois do placement final da instância (os descritores
    /// apontam para dentro dela).
    pub fn install_hardware(&mut self, hw: &mut HwContext<'_>) {
        self.strategy.hardware_init(hw);
    }

    /// Registra um domínio, validando as janelas contra a estratégia
    /// ativa antes de qualquer efeito.
    pub fn register_domain(
        &mut self,
        id: DomainId,
        mmio: Option<Window>,
        meta: Option<Window>,
        requires_port_io: bool,
        hw: &mut HwContext<'_>,
    ) {
        let gran = self.strategy.granularity();
        let max = self.strategy.max_window();
        for win in [mmio, meta].into_iter().flatten() {
            if win.base % gran != 0 || win.len % gran != 0 {
                crate::fatal!("(DOM) janela desalinhada para a estratégia, base=", win.base);
            }
            if win.len > max {
                crate::fatal!("(DOM) janela excede o máximo da estratégia, len=", win.len);
            }
        }
        self.domains.register(id, mmio, meta, requires_port_io);
        self.strategy.register(self.domains.domain(id), hw);
    }

    /// Publica uma syscall entry (nenhum domínio autorizado ainda).
    pub fn publish_entry(&mut self, entrypoint: usize) -> EntryId {
        self.entries.publish(entrypoint)
    }

    pub fn authorize_entry(&mut self, entry: EntryId, callee: DomainId) {
        self.entries.authorize(entry, callee);
    }

    pub fn deauthorize_entry(&mut self, entry: EntryId, callee: DomainId) {
        self.entries.deauthorize(entry, callee);
    }

    /// Fixa o entrypoint do domínio raiz na estratégia ativa (chamado
    /// pelo `boot::launch` antes de entregar o controle à aplicação).
    pub fn set_root_entry(&mut self, entry: usize) {
        self.strategy.set_root_entry(entry);
    }

    // -------------------------------------------------------------------------
    // Caminho quente: dispatch e retorno
    // -------------------------------------------------------------------------

    /// Dispatch de chamada (vetor de chamada): eax = entry, ecx = callee.
    ///
    /// Toda a validação acontece antes de qualquer mutação; a partir
    /// daí a sequência é: marca BUSY, empilha, pivota o slot de retorno
    /// para o gate protegido, troca a visibilidade de memória e aponta
    /// o frame para o entrypoint no domínio destino.
    pub fn dispatch(&mut self, frame: &mut TrapFrame) {
        let entry = EntryId::from_trap(frame.eax);
        let callee = DomainId::from_trap(frame.ecx);
        let caller = self.stack.top();

        if !self.domains.domain(callee).is_initialized() {
            crate::fatal!("(DOM) dispatch para domínio não registrado, id=", callee.index());
        }
        if !self.entries.is_authorized(entry, callee) {
            crate::fatal!("(DOM) dispatch não autorizado, entry=", entry.index());
        }
        if self.domains.domain(callee).is_busy() {
            crate::fatal!("(DOM) reentrada em domínio ocupado, id=", callee.index());
        }

        self.strategy.begin_dispatch();

        self.domains
            .domain_mut(callee)
            .flags
            .insert(crate::dom::registry::DomainFlags::BUSY);
        self.stack.push(callee);

        // Pivô do endereço de retorno: guarda o retorno real do
        // chamador no slot protegido e deixa no lugar o gate que
        // dispara o vetor de retorno. O corpo da entry "retorna" para
        // o gate, nunca direto para o chamador.
        let ret_slot = frame.esp as *mut usize;
        // SAFETY: esp aponta para a pilha do chamador validada pelo
        // hardware na entrada do trap (nos testes, para um buffer do
        // próprio teste).
        unsafe {
            self.domains.domain_mut(callee).saved_return_address = ret_slot.read();
            ret_slot.write(crate::arch::x86::hw::return_gate_addr());
        }

        self.strategy.stage_entry(self.entries.entrypoint(entry));

        let from = *self.domains.domain(caller);
        let to = *self.domains.domain(callee);
        self.strategy.switch(&from, &to);

        frame.eip = self.entries.entrypoint(entry);
        apply_interrupt_policy(frame, callee);

        self.strategy.end_dispatch();
        crate::ktrace!("(DOM) dispatch concluído, callee=", callee.index());
    }

    /// Dispatch de retorno (vetor de retorno): desempilha a ativação
    /// corrente e retoma o chamador no endereço salvo.
    pub fn sysret(&mut self, frame: &mut TrapFrame) {
        if self.stack.depth() == 0 {
            crate::fatal!("(DOM) retorno sem chamada em voo");
        }

        self.strategy.begin_dispatch();

        let returning = self.stack.pop();
        let resumed = self.stack.top();

        let dom = self.domains.domain_mut(returning);
        if !dom.is_busy() {
            crate::fatal!("(DOM) retorno de domínio que não estava ocupado, id=", returning.index());
        }
        dom.flags.remove(crate::dom::registry::DomainFlags::BUSY);
        frame.eip = dom.saved_return_address;

        let from = *self.domains.domain(returning);
        let to = *self.domains.domain(resumed);
        self.strategy.switch(&from, &to);

        apply_interrupt_policy(frame, resumed);

        self.strategy.end_dispatch();
        if self.stack.depth() == 0 {
            // De volta à raiz: a estratégia entrega o trabalho que
            // segurou durante as chamadas em voo.
            self.strategy.root_resumed();
        }
        crate::ktrace!("(DOM) retorno concluído, retomado=", resumed.index());
    }

    /// Despeja o estado do dispatcher no log (debug de travamentos).
    pub fn dump(&self) {
        crate::kinfo!("(DOM) dump: domínio corrente=", self.current().index());
        crate::kinfo!("(DOM) dump: profundidade da pilha=", self.stack.depth());
        for frame in self.stack.frames() {
            crate::kinfo!("(DOM) dump: frame=", frame.index());
        }
        for raw in 0..crate::config::MAX_DOMAINS {
            if let Some(id) = DomainId::new(raw) {
                let dom = self.domains.domain(id);
                if dom.is_initialized() {
                    crate::kinfo!("(DOM) dump: flags do domínio=", dom.flags.bits() as usize);
                }
            }
        }
    }
}

/// Interrupções só ficam habilitadas no domínio da aplicação em ring 3.
/// Nos demais domínios o trabalho em voo roda com IF limpo; interrupções
/// pendentes são entregues quando a pilha esvazia de volta à raiz.
fn apply_interrupt_policy(frame: &mut TrapFrame, dom: DomainId) {
    if dom == DomainId::APP && frame.cs & 3 == 3 {
        frame.eflags |= EFLAGS_IF;
    } else {
        frame.eflags &= !EFLAGS_IF;
    }
}

/// A instância global, criada pelo boot. `None` antes da inicialização.
pub static DISPATCHER: spin::Mutex<Option<Dispatcher<ActiveStrategy>>> = spin::Mutex::new(None);

/// Domínio corrente segundo a instância global.
pub fn current_domain() -> DomainId {
    match DISPATCHER.lock().as_ref() {
        Some(disp) => disp.current(),
        None => crate::fatal!("(DOM) dispatcher não inicializado"),
    }
}

// Handlers chamados pelos trampolins de trap com o ponteiro do frame.
#[cfg(all(target_arch = "x86", target_os = "none"))]
#[no_mangle]
pub extern "C" fn prot_dispatch_handler(frame: *mut TrapFrame) {
    // SAFETY: o trampolim passa o ESP após o pushad, que é exatamente
    // o layout do TrapFrame.
    let frame = unsafe { &mut *frame };
    match DISPATCHER.lock().as_mut() {
        Some(disp) => disp.dispatch(frame),
        None => crate::fatal!("(DOM) trap antes da inicialização do dispatcher"),
    }
}

#[cfg(all(target_arch = "x86", target_os = "none"))]
#[no_mangle]
pub extern "C" fn prot_sysret_handler(frame: *mut TrapFrame) {
    // SAFETY: idem ao handler de dispatch.
    let frame = unsafe { &mut *frame };
    match DISPATCHER.lock().as_mut() {
        Some(disp) => disp.sysret(frame),
        None => crate::fatal!("(DOM) trap antes da inicialização do dispatcher"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CALLSTACK_DEPTH;
    use crate::strategy::HwContext;
    use crate::arch::x86::gdt::Gdt;

    /// Estratégia de gravação: registra as trocas para inspeção.
    struct Recorder {
        switches: std::vec::Vec<(usize, usize)>,
        staged: std::vec::Vec<usize>,
        root_resumes: usize,
        dispatch_depth: isize,
    }

    impl Recorder {
        fn new() -> Self {
            Self {
                switches: std::vec::Vec::new(),
                staged: std::vec::Vec::new(),
                root_resumes: 0,
                dispatch_depth: 0,
            }
        }
    }

    impl IsolationStrategy for Recorder {
        fn granularity(&self) -> usize {
            crate::config::PAGE_SIZE
        }

        fn max_window(&self) -> usize {
            crate::config::SLOT_PAGES * crate::config::PAGE_SIZE
        }

        fn register(&mut self, _dom: &crate::dom::registry::Domain, _hw: &mut HwContext<'_>) {}

        fn stage_entry(&mut self, entrypoint: usize) {
            self.staged.push(entrypoint);
        }

        fn switch(&mut self, from: &crate::dom::registry::Domain, to: &crate::dom::registry::Domain) {
            assert_eq!(self.dispatch_depth, 1, "switch fora da seção begin/end");
            self.switches.push((from.id().index(), to.id().index()));
        }

        fn begin_dispatch(&mut self) {
            self.dispatch_depth += 1;
        }

        fn end_dispatch(&mut self) {
            self.dispatch_depth -= 1;
        }

        fn root_resumed(&mut self) {
            assert_eq!(self.dispatch_depth, 0, "entrega pendente dentro da seção begin/end");
            self.root_resumes += 1;
        }
    }

    fn setup() -> (Dispatcher<Recorder>, Gdt) {
        (Dispatcher::new(Recorder::new()), Gdt::new())
    }

    fn register_basics(disp: &mut Dispatcher<Recorder>, gdt: &mut Gdt) {
        let mut hw = HwContext { gdt };
        disp.register_domain(DomainId::KERNEL, None, None, false, &mut hw);
        disp.register_domain(DomainId::APP, None, None, false, &mut hw);
    }

    fn ring3_frame(eax: usize, ecx: usize, ret_slot: &mut usize) -> TrapFrame {
        TrapFrame {
            eax,
            ecx,
            cs: 0x23, // ring 3
            eflags: EFLAGS_IF,
            esp: ret_slot as *mut usize as usize,
            ..TrapFrame::default()
        }
    }

    #[test]
    fn dispatch_and_return_round_trip() {
        let (mut disp, mut gdt) = setup();
        register_basics(&mut disp, &mut gdt);
        let entry = disp.publish_entry(0x4000);
        disp.authorize_entry(entry, DomainId::KERNEL);

        let mut ret_slot = 0xDEAD_0010usize;
        let mut frame = ring3_frame(entry.index(), DomainId::KERNEL.index(), &mut ret_slot);

        disp.dispatch(&mut frame);
        assert_eq!(disp.current(), DomainId::KERNEL);
        assert_eq!(frame.eip, 0x4000);
        // Pivô: o slot na pilha do chamador agora aponta para o gate.
        assert_eq!(ret_slot, crate::arch::x86::hw::return_gate_addr());
        // Kernel roda com interrupções mascaradas.
        assert_eq!(frame.eflags & EFLAGS_IF, 0);
        assert!(disp.domains().domain(DomainId::KERNEL).is_busy());

        disp.sysret(&mut frame);
        assert_eq!(disp.current(), DomainId::APP);
        // Retoma exatamente no endereço de retorno salvo do chamador.
        assert_eq!(frame.eip, 0xDEAD_0010);
        assert_eq!(frame.eflags & EFLAGS_IF, EFLAGS_IF);
        assert!(!disp.domains().domain(DomainId::KERNEL).is_busy());

        assert_eq!(disp.strategy().switches, vec![(1, 0), (0, 1)]);
        // O entrypoint foi preparado para a estratégia antes do switch,
        // e a volta à raiz disparou exatamente uma entrega pendente.
        assert_eq!(disp.strategy().staged, vec![0x4000]);
        assert_eq!(disp.strategy().root_resumes, 1);
    }

    #[test]
    fn nested_dispatch_restores_in_order() {
        let (mut disp, mut gdt) = setup();
        register_basics(&mut disp, &mut gdt);
        let mut hw = HwContext { gdt: &mut gdt };
        let drv = DomainId::new(2).unwrap();
        disp.register_domain(drv, None, None, false, &mut hw);

        let e_kern = disp.publish_entry(0x4000);
        disp.authorize_entry(e_kern, DomainId::KERNEL);
        let e_drv = disp.publish_entry(0x5000);
        disp.authorize_entry(e_drv, drv);

        let mut slot_a = 0x1111_0000usize;
        let mut frame = ring3_frame(e_kern.index(), DomainId::KERNEL.index(), &mut slot_a);
        disp.dispatch(&mut frame);

        // O kernel chama o driver: novo frame com outro slot de retorno.
        let mut slot_b = 0x2222_0000usize;
        frame.eax = e_drv.index();
        frame.ecx = drv.index();
        frame.esp = &mut slot_b as *mut usize as usize;
        disp.dispatch(&mut frame);
        assert_eq!(disp.current(), drv);

        disp.sysret(&mut frame);
        assert_eq!(disp.current(), DomainId::KERNEL);
        assert_eq!(frame.eip, 0x2222_0000);
        // Retorno intermediário: ainda não voltamos à raiz.
        assert_eq!(disp.strategy().root_resumes, 0);

        disp.sysret(&mut frame);
        assert_eq!(disp.current(), DomainId::APP);
        assert_eq!(frame.eip, 0x1111_0000);
        assert_eq!(disp.strategy().root_resumes, 1);
    }

    #[test]
    #[should_panic(expected = "não autorizado")]
    fn unauthorized_dispatch_is_fatal() {
        let (mut disp, mut gdt) = setup();
        register_basics(&mut disp, &mut gdt);
        let entry = disp.publish_entry(0x4000);
        // Entry publicada mas sem nenhum callee autorizado.
        let mut slot = 0usize;
        let mut frame = ring3_frame(entry.index(), DomainId::KERNEL.index(), &mut slot);
        disp.dispatch(&mut frame);
    }

    #[test]
    #[should_panic(expected = "não autorizado")]
    fn revoked_entry_is_fatal() {
        let (mut disp, mut gdt) = setup();
        register_basics(&mut disp, &mut gdt);
        let entry = disp.publish_entry(0x4000);
        disp.authorize_entry(entry, DomainId::KERNEL);
        disp.deauthorize_entry(entry, DomainId::KERNEL);
        let mut slot = 0usize;
        let mut frame = ring3_frame(entry.index(), DomainId::KERNEL.index(), &mut slot);
        disp.dispatch(&mut frame);
    }

    #[test]
    #[should_panic(expected = "domínio ocupado")]
    fn reentrant_dispatch_is_fatal() {
        let (mut disp, mut gdt) = setup();
        register_basics(&mut disp, &mut gdt);
        let entry = disp.publish_entry(0x4000);
        disp.authorize_entry(entry, DomainId::KERNEL);

        let mut slot = 0usize;
        let mut frame = ring3_frame(entry.index(), DomainId::KERNEL.index(), &mut slot);
        disp.dispatch(&mut frame);
        // Segunda ativação do kernel sem retorno: reentrância proibida.
        disp.dispatch(&mut frame);
    }

    #[test]
    #[should_panic(expected = "não registrado")]
    fn dispatch_to_unregistered_domain_is_fatal() {
        let (mut disp, mut gdt) = setup();
        register_basics(&mut disp, &mut gdt);
        let entry = disp.publish_entry(0x4000);
        let drv = DomainId::new(5).unwrap();
        disp.authorize_entry(entry, drv);
        let mut slot = 0usize;
        let mut frame = ring3_frame(entry.index(), drv.index(), &mut slot);
        disp.dispatch(&mut frame);
    }

    #[test]
    #[should_panic(expected = "retorno sem chamada")]
    fn sysret_at_root_is_fatal() {
        let (mut disp, mut gdt) = setup();
        register_basics(&mut disp, &mut gdt);
        let mut frame = TrapFrame::default();
        disp.sysret(&mut frame);
    }

    #[test]
    #[should_panic(expected = "estouro da pilha")]
    fn depth_bound_is_enforced() {
        let (mut disp, mut gdt) = setup();
        register_basics(&mut disp, &mut gdt);
        let mut hw = HwContext { gdt: &mut gdt };

        // Uma cadeia de domínios distintos, cada um chamando o próximo,
        // até passar do limite de profundidade.
        let mut slots = [0usize; CALLSTACK_DEPTH + 1];
        for i in 0..=CALLSTACK_DEPTH {
            let dom = DomainId::new(2 + i).unwrap();
            disp.register_domain(dom, None, None, false, &mut hw);
            let entry = disp.publish_entry(0x4000 + i * 0x100);
            disp.authorize_entry(entry, dom);
            let mut frame = ring3_frame(entry.index(), dom.index(), &mut slots[i]);
            disp.dispatch(&mut frame);
        }
    }

    #[test]
    #[should_panic(expected = "janela desalinhada")]
    fn misaligned_window_is_fatal() {
        let (mut disp, mut gdt) = setup();
        let mut hw = HwContext { gdt: &mut gdt };
        disp.register_domain(
            DomainId::KERNEL,
            Some(crate::dom::registry::Window { base: 0xA000_0100, len: 0x1000 }),
            None,
            false,
            &mut hw,
        );
    }

    #[test]
    #[should_panic(expected = "excede o máximo")]
    fn oversized_window_is_fatal() {
        let (mut disp, mut gdt) = setup();
        let mut hw = HwContext { gdt: &mut gdt };
        let max = crate::config::SLOT_PAGES * crate::config::PAGE_SIZE;
        disp.register_domain(
            DomainId::KERNEL,
            Some(crate::dom::registry::Window { base: 0xA000_0000, len: max + crate::config::PAGE_SIZE }),
            None,
            false,
            &mut hw,
        );
    }

    #[test]
    fn interrupt_policy_follows_domain() {
        let mut frame = TrapFrame { cs: 0x23, ..TrapFrame::default() };
        apply_interrupt_policy(&mut frame, DomainId::APP);
        assert_eq!(frame.eflags & EFLAGS_IF, EFLAGS_IF);
        apply_interrupt_policy(&mut frame, DomainId::KERNEL);
        assert_eq!(frame.eflags & EFLAGS_IF, 0);
    }
}
