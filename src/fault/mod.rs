//! Tratamento de exceções do subsistema.
//!
//! - `gpf`: General Protection Fault. O único caminho de GPF que não é
//!   fatal: a emulação de port I/O para domínios autorizados.
//! - Double fault: backstop. Se chegou aqui, o estado de proteção já
//!   está inconsistente e a única resposta segura é parar.

pub mod gpf;

use crate::dom::dispatcher::TrapFrame;

/// Double fault é sempre terminal.
pub fn handle_double_fault(frame: &TrapFrame) -> ! {
    crate::fatal!("(FAULT) double fault, eip=", frame.eip);
}

// Handlers chamados pelos trampolins de exceção.
#[cfg(all(target_arch = "x86", target_os = "none"))]
#[no_mangle]
pub extern "C" fn prot_gpf_handler(frame: *mut TrapFrame) {
    use crate::dom::dispatcher::DISPATCHER;

    // SAFETY: o trampolim passa o ESP após o pushad (error code já
    // descartado), que é o layout do TrapFrame.
    let frame = unsafe { &mut *frame };
    // Um GPF pode ocorrer com o lock do dispatcher já tomado (dentro da
    // própria seção crítica de um dispatch). Esperar aqui seria spin
    // eterno em um único core: falha fechada.
    let mut guard = match DISPATCHER.try_lock() {
        Some(guard) => guard,
        None => crate::fatal!("(FAULT) GPF com o dispatcher travado, eip=", frame.eip),
    };
    let disp = match guard.as_mut() {
        Some(disp) => disp,
        None => crate::fatal!("(FAULT) GPF antes da inicialização, eip=", frame.eip),
    };
    let dom = *disp.domains().domain(disp.current());
    let mut bus = crate::arch::x86::ports::X86PortBus;
    gpf::handle_gpf(&dom, frame, &mut bus, crate::boot::code_bound());
}

#[cfg(all(target_arch = "x86", target_os = "none"))]
#[no_mangle]
pub extern "C" fn prot_df_handler(frame: *mut TrapFrame) -> ! {
    // SAFETY: idem ao handler de GPF.
    handle_double_fault(unsafe { &*frame })
}
