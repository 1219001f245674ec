// =============================================================================
// LOGGING DO SUBSISTEMA - ZERO OVERHEAD
// =============================================================================
//
// Sistema de logging com custo ZERO em release.
//
// ARQUITETURA:
// Este sistema foi projetado para ser completamente removível em release:
// - Usa features do Cargo para compile-time filtering
// - Com feature "no_logs", TODOS os macros viram expressões vazias
// - SEM core::fmt - Evita geração de código SSE/AVX
// - SEM alocação - Apenas strings literais
// - Escreve apenas no sink instalado no console (core/console.rs)
//
// NÍVEIS DE LOG (do mais crítico ao menos):
// - ERROR: Erros fatais ou críticos
// - WARN:  Situações suspeitas mas recuperáveis
// - INFO:  Fluxo normal de execução
// - DEBUG: Informações de debugging
// - TRACE: Detalhes extremos (cada dispatch, cada switch)
//
// COMO USAR:
//   kinfo!("(DOM) Registrando domínio...");       // Apenas string
//   kinfo!("(DOM) mmio_base=", base);             // String + hex
//
// =============================================================================

// =============================================================================
// PREFIXOS COM CORES ANSI
// =============================================================================

pub const P_ERROR: &str = "\x1b[1;31m[ERRO]\x1b[0m ";
pub const P_WARN: &str = "\x1b[1;33m[WARN]\x1b[0m ";
pub const P_INFO: &str = "\x1b[32m[INFO]\x1b[0m ";
pub const P_DEBUG: &str = "\x1b[36m[DEBG]\x1b[0m ";
pub const P_TRACE: &str = "\x1b[35m[TRAC]\x1b[0m ";

// =============================================================================
// MACROS DE LOG - NÍVEL ERROR
// =============================================================================
//
// kerror! - Sempre ativo (exceto com no_logs)
// Usado para erros críticos, tipicamente logo antes de um halt.
//

#[cfg(not(feature = "no_logs"))]
#[macro_export]
macro_rules! kerror {
    // Apenas string literal
    ($msg:expr) => {{
        $crate::core::console::emit_str($crate::core::logging::P_ERROR);
        $crate::core::console::emit_str($msg);
        $crate::core::console::emit_nl();
    }};
    // String + valor hex
    ($msg:expr, $val:expr) => {{
        $crate::core::console::emit_str($crate::core::logging::P_ERROR);
        $crate::core::console::emit_str($msg);
        $crate::core::console::emit_hex($val as u64);
        $crate::core::console::emit_nl();
    }};
}

#[cfg(feature = "no_logs")]
#[macro_export]
macro_rules! kerror {
    ($($t:tt)*) => {{}};
}

// =============================================================================
// MACROS DE LOG - NÍVEL WARN
// =============================================================================

#[cfg(not(feature = "no_logs"))]
#[macro_export]
macro_rules! kwarn {
    ($msg:expr) => {{
        $crate::core::console::emit_str($crate::core::logging::P_WARN);
        $crate::core::console::emit_str($msg);
        $crate::core::console::emit_nl();
    }};
    ($msg:expr, $val:expr) => {{
        $crate::core::console::emit_str($crate::core::logging::P_WARN);
        $crate::core::console::emit_str($msg);
        $crate::core::console::emit_hex($val as u64);
        $crate::core::console::emit_nl();
    }};
}

#[cfg(feature = "no_logs")]
#[macro_export]
macro_rules! kwarn {
    ($($t:tt)*) => {{}};
}

// =============================================================================
// MACROS DE LOG - NÍVEL INFO
// =============================================================================

#[cfg(any(feature = "log_info", feature = "log_debug", feature = "log_trace"))]
#[macro_export]
macro_rules! kinfo {
    ($msg:expr) => {{
        $crate::core::console::emit_str($crate::core::logging::P_INFO);
        $crate::core::console::emit_str($msg);
        $crate::core::console::emit_nl();
    }};
    ($msg:expr, $val:expr) => {{
        $crate::core::console::emit_str($crate::core::logging::P_INFO);
        $crate::core::console::emit_str($msg);
        $crate::core::console::emit_hex($val as u64);
        $crate::core::console::emit_nl();
    }};
}

#[cfg(not(any(feature = "log_info", feature = "log_debug", feature = "log_trace")))]
#[macro_export]
macro_rules! kinfo {
    ($($t:tt)*) => {{}};
}

// =============================================================================
// MACROS DE LOG - NÍVEL DEBUG
// =============================================================================

#[cfg(any(feature = "log_debug", feature = "log_trace"))]
#[macro_export]
macro_rules! kdebug {
    ($msg:expr) => {{
        $crate::core::console::emit_str($crate::core::logging::P_DEBUG);
        $crate::core::console::emit_str($msg);
        $crate::core::console::emit_nl();
    }};
    ($msg:expr, $val:expr) => {{
        $crate::core::console::emit_str($crate::core::logging::P_DEBUG);
        $crate::core::console::emit_str($msg);
        $crate::core::console::emit_hex($val as u64);
        $crate::core::console::emit_nl();
    }};
}

#[cfg(not(any(feature = "log_debug", feature = "log_trace")))]
#[macro_export]
macro_rules! kdebug {
    ($($t:tt)*) => {{}};
}

// =============================================================================
// MACROS DE LOG - NÍVEL TRACE
// =============================================================================

#[cfg(feature = "log_trace")]
#[macro_export]
macro_rules! ktrace {
    ($msg:expr) => {{
        $crate::core::console::emit_str($crate::core::logging::P_TRACE);
        $crate::core::console::emit_str($msg);
        $crate::core::console::emit_nl();
    }};
    ($msg:expr, $val:expr) => {{
        $crate::core::console::emit_str($crate::core::logging::P_TRACE);
        $crate::core::console::emit_str($msg);
        $crate::core::console::emit_hex($val as u64);
        $crate::core::console::emit_nl();
    }};
}

#[cfg(not(feature = "log_trace"))]
#[macro_export]
macro_rules! ktrace {
    ($($t:tt)*) => {{}};
}
