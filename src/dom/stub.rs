//! Stubs caller-side de syscall entries.
//!
//! O chamador nunca salta direto para o corpo de uma entry em outro
//! domínio: ele executa um stub que dispara o vetor de chamada com o id
//! da entry em EAX e o id do domínio callee em ECX. O dispatcher
//! valida, troca a visibilidade e aponta o retorno do trap para o corpo
//! da entry já dentro do domínio destino.
//!
//! Se o chamador JÁ está no domínio callee, o stub chama o corpo
//! diretamente: uma chamada intra-domínio não cruza fronteira nenhuma e
//! não paga o trap.

/// Gera um stub caller-side para uma syscall entry.
///
/// ```ignore
/// syscall!(eth_send(eth_send_body) -> ETH_SEND_ENTRY => ETH_DOM);
/// ```
#[macro_export]
macro_rules! syscall {
    ($name:ident($body:path) -> $entry:expr => $callee:expr) => {
        pub fn $name() {
            let same_domain = $crate::dom::dispatcher::DISPATCHER
                .lock()
                .as_ref()
                .map(|disp| disp.current() == $callee)
                .unwrap_or(false);
            if same_domain {
                // Caminho rápido: já estamos no domínio da entry.
                $body();
            } else {
                $crate::arch::x86::hw::syscall_trap(($entry).index(), ($callee).index());
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use crate::dom::dispatcher::{Dispatcher, DISPATCHER};
    use crate::dom::entry::EntryId;
    use crate::dom::id::DomainId;
    use crate::strategy::ActiveStrategy;
    use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    const TEST_ENTRY: EntryId = match EntryId::new(0) {
        Some(e) => e,
        None => unreachable!(),
    };

    static BODY_CALLED: AtomicBool = AtomicBool::new(false);

    fn body() {
        BODY_CALLED.store(true, Ordering::SeqCst);
    }

    // O domínio raiz é APP: um stub cujo callee é APP pega o caminho
    // rápido; um cujo callee é KERNEL precisa do trap.
    syscall!(same_domain_ping(body) -> TEST_ENTRY => DomainId::APP);
    syscall!(cross_domain_ping(body) -> TEST_ENTRY => DomainId::KERNEL);

    #[test]
    fn same_domain_fast_path_calls_body_directly() {
        DISPATCHER
            .lock()
            .get_or_insert_with(|| Dispatcher::new(ActiveStrategy::new()));
        same_domain_ping();
        assert!(BODY_CALLED.load(Ordering::SeqCst));
    }

    #[test]
    #[should_panic(expected = "indisponível fora do alvo")]
    fn cross_domain_stub_traps_through_dispatch_vector() {
        // No host o trap não existe; o stub cai no halt do hw::stub,
        // provando que o caminho cross-domain é só o vetor de dispatch.
        cross_domain_ping();
    }

    static EFFECT: AtomicUsize = AtomicUsize::new(0);

    fn effect_body() {
        EFFECT.fetch_add(1, Ordering::SeqCst);
    }

    // Os dois caminhos de um stub têm que produzir o mesmo efeito
    // observável: a chamada direta (intra-domínio) e o ciclo completo
    // dispatch -> corpo no domínio destino -> retorno.
    #[test]
    fn fast_and_slow_paths_are_equivalent() {
        use crate::arch::x86::gdt::Gdt;
        use crate::dom::dispatcher::{TrapFrame, EFLAGS_IF};
        use crate::strategy::paging::PagingStrategy;
        use crate::strategy::HwContext;

        let mut disp = Dispatcher::new(PagingStrategy::new());
        let mut gdt = Gdt::new();
        let mut hw = HwContext { gdt: &mut gdt };
        disp.register_domain(DomainId::KERNEL, None, None, false, &mut hw);
        disp.register_domain(DomainId::APP, None, None, false, &mut hw);
        let entry = disp.publish_entry(effect_body as usize);
        disp.authorize_entry(entry, DomainId::KERNEL);

        // Caminho rápido: o corpo direto.
        let before = EFFECT.load(Ordering::SeqCst);
        effect_body();
        let after_fast = EFFECT.load(Ordering::SeqCst);

        // Caminho lento: dispatch, corpo apontado pelo frame, retorno.
        let mut ret_slot = 0xCAFE_0000usize;
        let mut frame = TrapFrame {
            eax: entry.index(),
            ecx: DomainId::KERNEL.index(),
            cs: 0x23,
            eflags: EFLAGS_IF,
            esp: &mut ret_slot as *mut usize as usize,
            ..TrapFrame::default()
        };
        disp.dispatch(&mut frame);
        // SAFETY: frame.eip é o entrypoint publicado acima.
        let dispatched: fn() = unsafe { core::mem::transmute(frame.eip) };
        dispatched();
        disp.sysret(&mut frame);
        let after_slow = EFFECT.load(Ordering::SeqCst);

        assert_eq!(after_fast - before, 1);
        assert_eq!(after_slow - after_fast, after_fast - before);
        // O chamador retoma onde estava, de volta ao domínio raiz.
        assert_eq!(frame.eip, 0xCAFE_0000);
        assert_eq!(disp.current(), DomainId::APP);
    }
}
