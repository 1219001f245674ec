//! Subsistema de Domínios de Proteção.
//!
//! - `id`: newtype checado de identidade de domínio
//! - `registry`: estado por-domínio (janelas, flags, retorno protegido)
//! - `callstack`: pilha limitada de chamadas inter-domínio em voo
//! - `entry`: tabela de syscall entries + autorização
//! - `dispatcher`: a máquina de estados de transição entre domínios
//! - `validate`: validação de proveniência de ponteiros de chamador
//! - `mmio`: accessor volátil da janela MMIO do próprio domínio
//! - `stub`: convenção de geração de stubs caller-side

/// Erros recuperáveis das superfícies de consulta (diagnóstico).
///
/// Só existem fora do caminho de dispatch: lá dentro toda violação é
/// halt via `fatal!`, nunca um `Result` que alguém possa ignorar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainError {
    /// Id de domínio fora de `0..MAX_DOMAINS`.
    IdOutOfRange,
    /// Id de entry fora da tabela publicada.
    EntryOutOfRange,
    /// Domínio existe mas nunca foi registrado.
    NotInitialized,
}

pub mod callstack;
pub mod dispatcher;
pub mod entry;
pub mod id;
pub mod mmio;
pub mod registry;
pub mod stub;
pub mod validate;

#[cfg(feature = "self_test")]
pub mod test;
