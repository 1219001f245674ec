//! Self-test on-target do subsistema (feature `self_test`).
//!
//! Rodado pelo embedder depois do boot, com o hardware real instalado.
//! Não substitui os testes de host: verifica o que só existe no alvo
//! (dispatcher global populado, vetores instalados) mais um smoke das
//! primitivas puras.

use crate::arch::x86::gdt::{GdtEntry, KERNEL_CODE_SEL, USER_DATA_SEL};
use crate::arch::x86::paging::{PageFlags, Pte};
use crate::config::{SYSCALL_DISPATCH_VECTOR, SYSRET_DISPATCH_VECTOR};
use crate::dom::dispatcher::DISPATCHER;
use crate::dom::id::DomainId;
use crate::fault::gpf::{decode_port_insn, PortInsn};
use crate::klib::test_framework::{run_test_suite, TestCase, TestResult};

fn test_selectors() -> TestResult {
    if KERNEL_CODE_SEL.0 == 0x08 && USER_DATA_SEL.0 == 0x1B {
        TestResult::Passed
    } else {
        TestResult::Failed
    }
}

fn test_descriptor_roundtrip() -> TestResult {
    let w = GdtEntry::data_window(0x00A0_0000, 0x100, 3);
    if w.present() && w.base() == 0x00A0_0000 && w.bound() == 0x00A0_0100 {
        TestResult::Passed
    } else {
        TestResult::Failed
    }
}

fn test_pte_roundtrip() -> TestResult {
    let pte = Pte::map(0x0010_0000, PageFlags::WRITABLE | PageFlags::USER);
    if pte.is_present() && pte.frame() == 0x0010_0000 {
        TestResult::Passed
    } else {
        TestResult::Failed
    }
}

fn test_port_opcodes() -> TestResult {
    let ok = decode_port_insn(0xEC) == Some(PortInsn::InByte)
        && decode_port_insn(0xEF) == Some(PortInsn::OutDword)
        && decode_port_insn(0x90).is_none();
    if ok {
        TestResult::Passed
    } else {
        TestResult::Failed
    }
}

fn test_vectors_distinct() -> TestResult {
    if SYSCALL_DISPATCH_VECTOR != SYSRET_DISPATCH_VECTOR {
        TestResult::Passed
    } else {
        TestResult::Failed
    }
}

fn test_dispatcher_booted() -> TestResult {
    match DISPATCHER.lock().as_ref() {
        Some(disp) if disp.current() == DomainId::APP => TestResult::Passed,
        Some(_) => TestResult::Failed,
        // Suite rodada antes do boot do subsistema.
        None => TestResult::Skipped,
    }
}

/// Roda a suite inteira e devolve (passed, failed, skipped).
pub fn run_all() -> (usize, usize, usize) {
    const TESTS: &[TestCase] = &[
        TestCase { name: "selectors", func: test_selectors },
        TestCase { name: "descriptor_roundtrip", func: test_descriptor_roundtrip },
        TestCase { name: "pte_roundtrip", func: test_pte_roundtrip },
        TestCase { name: "port_opcodes", func: test_port_opcodes },
        TestCase { name: "vectors_distinct", func: test_vectors_distinct },
        TestCase { name: "dispatcher_booted", func: test_dispatcher_booted },
    ];
    run_test_suite("dom", TESTS)
}
