//! Framework de self-test on-target.
//!
//! Os testes de host cobrem a lógica; esta suite roda no alvo real
//! (feature `self_test`) para validar o que os stubs de host não
//! exercitam: descritores carregados, trap de dispatch de verdade,
//! emulação de GPF com o barramento físico.

/// Resultado de teste
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TestResult {
    Passed,
    Failed,
    Skipped,
}

/// Um caso de teste
pub struct TestCase {
    pub name: &'static str,
    pub func: fn() -> TestResult,
}

/// Executa uma suite e devolve (passed, failed, skipped).
pub fn run_test_suite(name: &str, tests: &[TestCase]) -> (usize, usize, usize) {
    crate::core::console::emit_str("=== suite: ");
    crate::core::console::emit_str(name);
    crate::core::console::emit_nl();

    let mut passed = 0;
    let mut failed = 0;
    let mut skipped = 0;

    for test in tests {
        let result = (test.func)();
        let tag = match result {
            TestResult::Passed => {
                passed += 1;
                "[PASS] "
            }
            TestResult::Failed => {
                failed += 1;
                "[FAIL] "
            }
            TestResult::Skipped => {
                skipped += 1;
                "[SKIP] "
            }
        };
        crate::core::console::emit_str(tag);
        crate::core::console::emit_str(test.name);
        crate::core::console::emit_nl();
    }

    if failed > 0 {
        crate::kerror!("suite com falhas, failed=", failed);
    } else {
        crate::kinfo!("suite ok, passed=", passed);
    }
    (passed, failed, skipped)
}
