//! Fronteira de hardware do subsistema.
//!
//! ÚNICO módulo autorizado a emitir instruções privilegiadas e a conter
//! os trampolins de trap. Tudo aqui é um par: a implementação real
//! (apenas `target_arch = "x86"` bare-metal) e um stub de host, para que
//! a lógica do dispatcher e das estratégias compile e seja testada em
//! qualquer alvo. Os stubs não simulam hardware: ou são no-ops inócuos
//! (flush de TLB, recarga de registrador de segmento) ou halt fatal
//! (trap real de syscall, que não existe fora do alvo).
//!
//! Trampolins:
//! - `prot_dispatch_stub`: vetor de chamada (int 100). Salva os
//!   registradores no formato `TrapFrame`, chama o handler Rust e
//!   retorna com `iretd` para o corpo da entry apontado pelo frame.
//! - `prot_sysret_stub`: vetor de retorno (int 101). Mesmo formato;
//!   o handler restaura o EIP salvo do domínio retomado.

use crate::arch::x86::gdt::SegmentSelector;

// =============================================================================
// IMPLEMENTAÇÃO REAL (x86 bare-metal)
// =============================================================================

#[cfg(all(target_arch = "x86", target_os = "none"))]
mod real {
    use super::SegmentSelector;
    use crate::arch::x86::gdt::Gdt;
    use crate::arch::x86::idt::Idt;
    use crate::config::PAGE_MASK;

    core::arch::global_asm!(
        // int 100: dispatch de chamada entre domínios
        ".global prot_dispatch_stub",
        "prot_dispatch_stub:",
        "pushad",
        "mov eax, esp",
        "push eax",
        "call prot_dispatch_handler",
        "add esp, 4",
        "popad",
        "iretd",
        // int 101: dispatch de retorno
        ".global prot_sysret_stub",
        "prot_sysret_stub:",
        "pushad",
        "mov eax, esp",
        "push eax",
        "call prot_sysret_handler",
        "add esp, 4",
        "popad",
        "iretd",
        // Alvo do pivô do slot de retorno: o corpo da entry "retorna"
        // para cá, e daqui cai no vetor de retorno.
        ".global prot_return_gate",
        "prot_return_gate:",
        "int 101",
        // Ponto de entrada de toda task de domínio (hw_task): executa o
        // corpo preparado pelo dispatcher, retorna pelo vetor de retorno
        // e fica pronta para a próxima ativação.
        ".global prot_task_gate",
        "prot_task_gate:",
        "3:",
        "call prot_task_body",
        "int 101",
        "jmp 3b",
        // Vetor 13 (GPF): descarta o error code para casar o layout
        // do TrapFrame e chama o emulador de port I/O.
        ".global prot_gpf_stub",
        "prot_gpf_stub:",
        "add esp, 4",
        "pushad",
        "mov eax, esp",
        "push eax",
        "call prot_gpf_handler",
        "add esp, 4",
        "popad",
        "iretd",
        // Vetor 8 (double fault): o handler nunca retorna.
        ".global prot_df_stub",
        "prot_df_stub:",
        "add esp, 4",
        "pushad",
        "mov eax, esp",
        "push eax",
        "call prot_df_handler",
        "2:",
        "hlt",
        "jmp 2b",
    );

    extern "C" {
        fn prot_dispatch_stub();
        fn prot_sysret_stub();
        fn prot_return_gate();
        fn prot_task_gate();
        fn prot_gpf_stub();
        fn prot_df_stub();
    }

    /// Corpo chamado pelo gate de task. Só a estratégia hw_task prepara
    /// entrypoints; com outra estratégia ativa o gate é inalcançável.
    #[no_mangle]
    extern "C" fn prot_task_body() {
        #[cfg(feature = "hw_task")]
        crate::strategy::hw_task::run_staged_entry();
        #[cfg(not(feature = "hw_task"))]
        crate::fatal!("(HW) task gate sem estratégia hw_task");
    }

    pub fn dispatch_stub_addr() -> usize {
        prot_dispatch_stub as usize
    }

    pub fn sysret_stub_addr() -> usize {
        prot_sysret_stub as usize
    }

    pub fn return_gate_addr() -> usize {
        prot_return_gate as usize
    }

    pub fn task_gate_addr() -> usize {
        prot_task_gate as usize
    }

    pub fn gpf_stub_addr() -> usize {
        prot_gpf_stub as usize
    }

    pub fn df_stub_addr() -> usize {
        prot_df_stub as usize
    }

    /// Trap de syscall do stub caller-side (caminho lento).
    /// eax = entry id, ecx = id do domínio callee.
    #[inline]
    pub fn syscall_trap(entry: usize, dom: usize) {
        // SAFETY: o vetor 100 está instalado pelo boot antes de qualquer stub.
        unsafe {
            core::arch::asm!(
                "int 100",
                in("eax") entry,
                in("ecx") dom,
            );
        }
    }

    pub unsafe fn load_gdt(gdt: &Gdt) {
        #[repr(C, packed)]
        struct Descriptor {
            limit: u16,
            base: u32,
        }
        let descriptor = Descriptor {
            limit: (Gdt::size_bytes() - 1) as u16,
            base: gdt.as_ptr() as u32,
        };
        core::arch::asm!("lgdt [{}]", in(reg) &descriptor, options(readonly, nostack, preserves_flags));
    }

    pub unsafe fn load_idt(idt: &Idt) {
        #[repr(C, packed)]
        struct Descriptor {
            limit: u16,
            base: u32,
        }
        let descriptor = Descriptor {
            limit: (Idt::size_bytes() - 1) as u16,
            base: idt.as_ptr() as u32,
        };
        core::arch::asm!("lidt [{}]", in(reg) &descriptor, options(readonly, nostack, preserves_flags));
    }

    pub unsafe fn load_ldt(sel: SegmentSelector) {
        core::arch::asm!("lldt {0:x}", in(reg) sel.0, options(nomem, nostack, preserves_flags));
    }

    pub unsafe fn load_task_register(sel: SegmentSelector) {
        core::arch::asm!("ltr {0:x}", in(reg) sel.0, options(nomem, nostack, preserves_flags));
    }

    pub unsafe fn load_ds(sel: SegmentSelector) {
        core::arch::asm!("mov ds, {0:x}", in(reg) sel.0, options(nomem, nostack, preserves_flags));
    }

    pub unsafe fn load_es(sel: SegmentSelector) {
        core::arch::asm!("mov es, {0:x}", in(reg) sel.0, options(nomem, nostack, preserves_flags));
    }

    pub unsafe fn load_fs(sel: SegmentSelector) {
        core::arch::asm!("mov fs, {0:x}", in(reg) sel.0, options(nomem, nostack, preserves_flags));
    }

    pub unsafe fn load_gs(sel: SegmentSelector) {
        core::arch::asm!("mov gs, {0:x}", in(reg) sel.0, options(nomem, nostack, preserves_flags));
    }

    /// Liga/desliga CR0.WP — enforcement de write-protect em ring 0.
    /// Desligado apenas dentro da seção crítica do dispatcher, para que
    /// ele próprio possa escrever descritores protegidos.
    pub unsafe fn set_write_protect(enabled: bool) {
        let mut cr0: u32;
        core::arch::asm!("mov {}, cr0", out(reg) cr0, options(nomem, nostack, preserves_flags));
        if enabled {
            cr0 |= 1 << 16;
        } else {
            cr0 &= !(1 << 16);
        }
        core::arch::asm!("mov cr0, {}", in(reg) cr0, options(nomem, nostack, preserves_flags));
    }

    /// Page directory físico corrente (base de CR3).
    pub fn read_cr3() -> usize {
        let cr3: u32;
        // SAFETY: leitura pura de registrador de controle.
        unsafe {
            core::arch::asm!("mov {}, cr3", out(reg) cr3, options(nomem, nostack, preserves_flags));
        }
        cr3 as usize & PAGE_MASK
    }

    /// Invalida a tradução de uma página linear.
    pub unsafe fn invlpg(linear: usize) {
        core::arch::asm!("invlpg [{}]", in(reg) linear, options(nostack, preserves_flags));
    }

    /// Liga as page tables dos slots do subsistema no page directory
    /// ativo (CR3). Assume identity map do PD durante o boot.
    pub unsafe fn wire_slot_table(linear_base: usize, pt_phys: usize) {
        let cr3: u32;
        core::arch::asm!("mov {}, cr3", out(reg) cr3, options(nomem, nostack, preserves_flags));
        let pd = (cr3 as usize & PAGE_MASK) as *mut u32;
        let pde = pd.add(crate::arch::x86::paging::pd_index(linear_base));
        // PDE: presente, gravável, user (as PTEs individuais restringem).
        pde.write_volatile(pt_phys as u32 | 0x7);
    }

    /// Far call através do descritor de TSS do domínio destino: o
    /// hardware salva a task de saída e carrega a de entrada.
    pub unsafe fn task_far_call(sel: SegmentSelector) {
        let target: [u16; 3] = [0, 0, sel.0];
        core::arch::asm!("call fword ptr [{}]", in(reg) &target, options(readonly));
    }
}

// =============================================================================
// STUBS DE HOST (testes e análise estática)
// =============================================================================

#[cfg(not(all(target_arch = "x86", target_os = "none")))]
mod stub {
    use super::SegmentSelector;
    use crate::arch::x86::gdt::Gdt;
    use crate::arch::x86::idt::Idt;

    fn dispatch_marker() {}
    fn sysret_marker() {}
    fn return_gate_marker() {}
    fn task_gate_marker() {}
    fn gpf_marker() {}
    fn df_marker() {}

    pub fn dispatch_stub_addr() -> usize {
        dispatch_marker as usize
    }

    pub fn sysret_stub_addr() -> usize {
        sysret_marker as usize
    }

    pub fn return_gate_addr() -> usize {
        return_gate_marker as usize
    }

    pub fn task_gate_addr() -> usize {
        task_gate_marker as usize
    }

    pub fn gpf_stub_addr() -> usize {
        gpf_marker as usize
    }

    pub fn df_stub_addr() -> usize {
        df_marker as usize
    }

    pub fn syscall_trap(_entry: usize, _dom: usize) {
        crate::fatal!("(HW) trap de syscall indisponível fora do alvo x86");
    }

    pub unsafe fn load_gdt(_gdt: &Gdt) {}
    pub unsafe fn load_idt(_idt: &Idt) {}
    pub unsafe fn load_ldt(_sel: SegmentSelector) {}
    pub unsafe fn load_task_register(_sel: SegmentSelector) {}
    pub unsafe fn load_ds(_sel: SegmentSelector) {}
    pub unsafe fn load_es(_sel: SegmentSelector) {}
    pub unsafe fn load_fs(_sel: SegmentSelector) {}
    pub unsafe fn load_gs(_sel: SegmentSelector) {}
    pub fn read_cr3() -> usize {
        0
    }
    pub unsafe fn set_write_protect(_enabled: bool) {}
    pub unsafe fn invlpg(_linear: usize) {}
    pub unsafe fn wire_slot_table(_linear_base: usize, _pt_phys: usize) {}
    pub unsafe fn task_far_call(_sel: SegmentSelector) {}
}

#[cfg(all(target_arch = "x86", target_os = "none"))]
pub use real::*;
#[cfg(not(all(target_arch = "x86", target_os = "none")))]
pub use stub::*;
