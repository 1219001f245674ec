//! Implementação x86 das operações de CPU (HAL).
//!
//! Usa Assembly inline para controle de interrupções e halt. Fora do
//! alvo bare-metal as operações viram no-ops: o harness de teste nunca
//! deve executar CLI/STI/HLT reais.

use crate::arch::traits::cpu::CpuOps;

pub struct X86Cpu;

#[cfg(all(target_arch = "x86", target_os = "none"))]
impl CpuOps for X86Cpu {
    #[inline]
    fn halt() {
        // SAFETY: hlt apenas suspende a CPU até a próxima interrupção.
        unsafe { core::arch::asm!("hlt", options(nomem, nostack, preserves_flags)) }
    }

    #[inline]
    fn disable_interrupts() {
        // SAFETY: cli em ring 0.
        unsafe { core::arch::asm!("cli", options(nomem, nostack)) }
    }

    #[inline]
    fn enable_interrupts() {
        // SAFETY: sti em ring 0.
        unsafe { core::arch::asm!("sti", options(nomem, nostack)) }
    }

    #[inline]
    fn are_interrupts_enabled() -> bool {
        let eflags: usize;
        // SAFETY: pushfd/pop apenas lê EFLAGS.
        unsafe {
            core::arch::asm!("pushfd", "pop {}", out(reg) eflags, options(nomem, preserves_flags))
        }
        (eflags & crate::dom::dispatcher::EFLAGS_IF) != 0
    }
}

#[cfg(not(all(target_arch = "x86", target_os = "none")))]
impl CpuOps for X86Cpu {
    fn halt() {}
    fn disable_interrupts() {}
    fn enable_interrupts() {}
    fn are_interrupts_enabled() -> bool {
        false
    }
}
