//! Sequência de inicialização do subsistema.
//!
//! O embedder chama `init` exatamente uma vez, cedo no boot, com o
//! limite do texto executável dos domínios (vindo do linker script).
//! A sequência é fixa:
//!
//! 1. GDT: segmentos planos fixos, lgdt
//! 2. IDT: vetores de exceção (DF, GPF) e de dispatch (100/101), lidt
//! 3. Dispatcher global com a estratégia ativa
//! 4. Hardware da estratégia (TSS principal / page table dos slots)
//! 5. Domínios built-in: kernel e aplicação
//!
//! Drivers são registrados depois, via `register_driver`, ainda antes
//! de `launch` entregar o controle à aplicação.

use crate::arch::traits::CpuOps;
use crate::arch::x86::gdt::Gdt;
use crate::arch::x86::hw;
use crate::arch::x86::idt::{Idt, IdtEntry};
use crate::arch::Cpu;
use crate::config::{
    DOUBLE_FAULT_VECTOR, GPF_VECTOR, SYSCALL_DISPATCH_VECTOR, SYSRET_DISPATCH_VECTOR,
};
use crate::dom::dispatcher::{Dispatcher, DISPATCHER};
use crate::dom::id::DomainId;
use crate::dom::registry::Window;
use crate::strategy::{ActiveStrategy, HwContext};
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

static GDT: spin::Mutex<Gdt> = spin::Mutex::new(Gdt::new());
static IDT: spin::Mutex<Idt> = spin::Mutex::new(Idt::new());
static BOOTED: AtomicBool = AtomicBool::new(false);

/// Primeiro endereço fora do texto executável dos domínios. O handler
/// de GPF recusa emulação para faults além daqui.
static CODE_BOUND: AtomicUsize = AtomicUsize::new(0);

pub fn code_bound() -> usize {
    CODE_BOUND.load(Ordering::Relaxed)
}

/// Inicializa o subsistema. Segunda chamada é fatal.
pub fn init(code_bound: usize) {
    if BOOTED.swap(true, Ordering::SeqCst) {
        crate::fatal!("(BOOT) dupla inicialização do subsistema");
    }
    CODE_BOUND.store(code_bound, Ordering::Relaxed);

    let mut gdt = GDT.lock();
    gdt.init_fixed();
    // SAFETY: a GDT vive em um static; seletores fixos já populados.
    unsafe { hw::load_gdt(&gdt) };

    let mut idt = IDT.lock();
    idt.set_gate(DOUBLE_FAULT_VECTOR, IdtEntry::interrupt(hw::df_stub_addr(), 0));
    idt.set_gate(GPF_VECTOR, IdtEntry::interrupt(hw::gpf_stub_addr(), 0));
    // Os vetores de dispatch são os únicos alcançáveis de ring 3.
    idt.set_gate(
        SYSCALL_DISPATCH_VECTOR,
        IdtEntry::interrupt(hw::dispatch_stub_addr(), 3),
    );
    idt.set_gate(
        SYSRET_DISPATCH_VECTOR,
        IdtEntry::interrupt(hw::sysret_stub_addr(), 3),
    );
    // SAFETY: a IDT vive em um static; vetores instalados acima.
    unsafe { hw::load_idt(&idt) };
    drop(idt);

    // O dispatcher entra no slot global ANTES do install_hardware: os
    // descritores da estratégia apontam para dentro da instância e o
    // endereço dela tem que ser o final.
    *DISPATCHER.lock() = Some(Dispatcher::new(ActiveStrategy::new()));

    let mut guard = DISPATCHER.lock();
    let disp = match guard.as_mut() {
        Some(disp) => disp,
        None => crate::fatal!("(BOOT) dispatcher global ausente"),
    };
    let mut hwctx = HwContext { gdt: &mut gdt };
    disp.install_hardware(&mut hwctx);
    disp.register_domain(DomainId::KERNEL, None, None, false, &mut hwctx);
    disp.register_domain(DomainId::APP, None, None, false, &mut hwctx);

    crate::kinfo!("(BOOT) subsistema de domínios inicializado");
}

/// Registra um domínio de driver (depois do `init`, antes do `launch`).
pub fn register_driver(
    id: DomainId,
    mmio: Option<Window>,
    meta: Option<Window>,
    requires_port_io: bool,
) {
    let mut gdt = GDT.lock();
    let mut guard = DISPATCHER.lock();
    let disp = match guard.as_mut() {
        Some(disp) => disp,
        None => crate::fatal!("(BOOT) driver registrado antes do init"),
    };
    let mut hwctx = HwContext { gdt: &mut gdt };
    disp.register_domain(id, mmio, meta, requires_port_io, &mut hwctx);
}

/// Entrega o controle à aplicação (domínio raiz). Se a aplicação
/// retornar, a máquina para.
pub fn launch(app_main: fn()) -> ! {
    if !BOOTED.load(Ordering::SeqCst) {
        crate::fatal!("(BOOT) launch antes do init");
    }
    {
        // A estratégia ativa fixa a main como entrada do domínio raiz
        // (a hw_task grava a imagem de TSS da aplicação).
        let mut guard = DISPATCHER.lock();
        match guard.as_mut() {
            Some(disp) => disp.set_root_entry(app_main as usize),
            None => crate::fatal!("(BOOT) dispatcher global ausente no launch"),
        }
    }
    crate::kinfo!("(BOOT) entregando controle à aplicação");
    Cpu::enable_interrupts();
    app_main();
    crate::kwarn!("(BOOT) aplicação retornou; parando");
    Cpu::hang()
}

#[cfg(test)]
mod tests {
    use super::*;

    // O boot usa statics globais: um único teste cobre a sequência
    // inteira, incluindo o rechaço da segunda inicialização.
    #[test]
    fn init_wires_vectors_and_builtin_domains() {
        init(0x0010_0000);

        let idt = IDT.lock();
        let call = idt.entry(SYSCALL_DISPATCH_VECTOR);
        assert!(call.present());
        assert_eq!(call.dpl(), 3);
        assert!(call.masks_interrupts());
        let gpf = idt.entry(GPF_VECTOR);
        assert!(gpf.present());
        assert_eq!(gpf.dpl(), 0);
        drop(idt);

        let guard = DISPATCHER.lock();
        let disp = guard.as_ref().unwrap();
        assert_eq!(disp.current(), DomainId::APP);
        assert!(disp.domains().domain(DomainId::KERNEL).is_initialized());
        assert!(disp.domains().domain(DomainId::APP).is_initialized());
        drop(guard);

        assert_eq!(code_bound(), 0x0010_0000);
        assert!(std::panic::catch_unwind(|| init(0x0010_0000)).is_err());
    }
}
