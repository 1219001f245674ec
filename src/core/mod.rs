//! Core Module
//!
//! Contém a lógica central do subsistema, independente de arquitetura:
//! console de diagnóstico, macros de log e a política de halt fatal.

pub mod console;
pub mod fatal;
pub mod logging;
