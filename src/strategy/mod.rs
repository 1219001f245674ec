//! Estratégias de isolamento intercambiáveis.
//!
//! Três formas de materializar a mesma política (janelas por domínio e
//! dados do kernel selados fora do kernel), selecionadas por feature em
//! compile-time:
//!
//! - `paging`: reescrita de PTEs em slots lineares fixos (default)
//! - `hw_task`: task switch de hardware via TSS por domínio
//! - `sw_seg`: troca de LDT com descritores de segmento por domínio
//!
//! O dispatcher só conhece o trait; as estratégias nunca decidem
//! política (quem pode chamar o quê), só materializam a visibilidade.

use crate::arch::x86::gdt::Gdt;
use crate::dom::registry::Domain;

pub mod paging;

#[cfg(feature = "hw_task")]
pub mod hw_task;

#[cfg(feature = "sw_seg")]
pub mod sw_seg;

/// Acesso às estruturas de hardware compartilhadas que uma estratégia
/// precisa popular no registro (descritores de TSS/LDT na GDT).
pub struct HwContext<'a> {
    pub gdt: &'a mut Gdt,
}

/// O contrato de uma estratégia de isolamento.
pub trait IsolationStrategy {
    /// Alinhamento exigido de base e comprimento de janela.
    fn granularity(&self) -> usize;

    /// Maior janela representável pela estratégia.
    fn max_window(&self) -> usize;

    /// Instala o estado de hardware global da estratégia (boot, uma
    /// vez, depois do placement final da instância).
    fn hardware_init(&mut self, _hw: &mut HwContext<'_>) {}

    /// Prepara o estado por-domínio no registro (boot-time-only).
    fn register(&mut self, dom: &Domain, hw: &mut HwContext<'_>);

    /// Fixa o entrypoint do domínio raiz (a main da aplicação), no
    /// launch. Só estratégias com imagem de contexto pré-montada
    /// precisam materializar isto.
    fn set_root_entry(&mut self, _entry: usize) {}

    /// Publica o entrypoint da ativação que o switch seguinte vai
    /// executar. Chamado pelo dispatcher antes do switch de um dispatch
    /// de chamada (não de retorno).
    fn stage_entry(&mut self, _entrypoint: usize) {}

    /// Materializa a visibilidade do domínio `to`, desfazendo a de
    /// `from`. Chamado dentro da seção begin/end de um dispatch.
    fn switch(&mut self, from: &Domain, to: &Domain);

    /// A pilha de chamadas esvaziou de volta ao domínio raiz. Estratégias
    /// que seguram trabalho durante chamadas em voo (interrupções
    /// estacionadas) o entregam aqui.
    fn root_resumed(&mut self) {}

    /// Abre a seção crítica de um dispatch (antes de qualquer escrita
    /// em estado protegido).
    fn begin_dispatch(&mut self) {}

    /// Fecha a seção crítica (última coisa num dispatch).
    fn end_dispatch(&mut self) {}
}

// Precedência quando mais de uma feature de estratégia está ligada:
// hw_task > sw_seg > paging.
#[cfg(feature = "hw_task")]
pub type ActiveStrategy = hw_task::HwTaskStrategy;

#[cfg(all(feature = "sw_seg", not(feature = "hw_task")))]
pub type ActiveStrategy = sw_seg::SwSegStrategy;

#[cfg(all(not(feature = "hw_task"), not(feature = "sw_seg")))]
pub type ActiveStrategy = paging::PagingStrategy;
