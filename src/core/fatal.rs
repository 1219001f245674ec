//! Halt Fatal.
//!
//! Política de erro do subsistema: toda violação de integridade em uma
//! transferência de controle entre domínios é irrecuperável. O `fatal!`
//! loga na console (quando há sink) e chama `panic!`, de propósito —
//! um `Result` poderia ser capturado e ignorado; um panic não. No alvo
//! embarcado o panic handler do embedder trava a CPU; no harness de
//! teste o halt é observável via `#[should_panic]`.

/// Halt fatal com mensagem de diagnóstico (e valor hex opcional).
///
/// Uso:
/// ```ignore
/// fatal!("(DOM) registro duplicado de domínio");
/// fatal!("(DOM) janela desalinhada, base=", base);
/// ```
#[macro_export]
macro_rules! fatal {
    ($msg:expr) => {{
        $crate::kerror!($msg);
        panic!($msg);
    }};
    ($msg:expr, $val:expr) => {{
        $crate::kerror!($msg, $val);
        panic!($msg);
    }};
}

#[cfg(test)]
mod tests {
    #[test]
    #[should_panic(expected = "integridade")]
    fn fatal_is_a_panic() {
        fatal!("(TEST) violação de integridade simulada");
    }
}
