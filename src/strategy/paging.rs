//! Estratégia de isolamento por paginação (default).
//!
//! Um único par de slots lineares fixos (MMIO e metadados) logo acima
//! dos dados do kernel. Cada troca de domínio reescreve as PTEs dos
//! slots para apontarem para os frames das janelas do domínio que
//! entra e desmapeia o excedente do que saiu; os dados do kernel têm
//! o bit de escrita ligado apenas enquanto o domínio kernel executa.
//!
//! A estratégia é dona da page table que cobre os primeiros 4 MiB
//! lineares (dados do kernel e ambos os slots caem nesse intervalo), o
//! que deixa todo o efeito de um `switch` inspecionável nos testes.

use crate::arch::x86::hw;
use crate::arch::x86::paging::{pages_for, pt_index, PageFlags, PageTable, Pte};
use crate::config::{
    KERNEL_DATA_BASE, KERNEL_DATA_END, META_LINEAR_BASE, MMIO_LINEAR_BASE, PAGE_SIZE, SLOT_PAGES,
};
use crate::dom::id::DomainId;
use crate::dom::registry::Domain;
use crate::strategy::{HwContext, IsolationStrategy};

pub struct PagingStrategy {
    /// Page table dos primeiros 4 MiB lineares (identity-mapped).
    table: PageTable,
    cur_mmio_pages: usize,
    cur_meta_pages: usize,
}

impl PagingStrategy {
    pub const fn new() -> Self {
        Self {
            table: PageTable::new(),
            cur_mmio_pages: 0,
            cur_meta_pages: 0,
        }
    }

    /// Reaponta um slot linear para a janela dada (ou o esvazia) e
    /// devolve o novo número de páginas mapeadas.
    fn remap_slot(
        &mut self,
        linear_base: usize,
        window: Option<crate::dom::registry::Window>,
        flags: PageFlags,
        old_pages: usize,
    ) -> usize {
        let first = pt_index(linear_base);
        let new_pages = match window {
            Some(w) => {
                let n = pages_for(w.len);
                for i in 0..n {
                    *self.table.entry_mut(first + i) = Pte::map(w.base + i * PAGE_SIZE, flags);
                }
                n
            }
            None => 0,
        };
        // Desmapeia o rabo deixado pelo domínio anterior.
        for i in new_pages..old_pages {
            *self.table.entry_mut(first + i) = Pte::absent();
        }
        for i in 0..new_pages.max(old_pages) {
            // SAFETY: invalidação de TLB de página linear conhecida.
            unsafe { hw::invlpg(linear_base + i * PAGE_SIZE) };
        }
        new_pages
    }

    pub fn table(&self) -> &PageTable {
        &self.table
    }
}

impl IsolationStrategy for PagingStrategy {
    fn granularity(&self) -> usize {
        PAGE_SIZE
    }

    fn max_window(&self) -> usize {
        SLOT_PAGES * PAGE_SIZE
    }

    /// Popula o identity map inicial e liga a page table no page
    /// directory ativo. Estado de partida é a visibilidade do domínio
    /// raiz: dados do kernel read-only, slots vazios.
    fn hardware_init(&mut self, _hw: &mut HwContext<'_>) {
        let kern_first = pt_index(KERNEL_DATA_BASE);
        let kern_last = pt_index(KERNEL_DATA_END);
        let slot_first = pt_index(MMIO_LINEAR_BASE);
        let slot_last = slot_first + 2 * SLOT_PAGES;

        for idx in 0..1024 {
            let frame = idx * PAGE_SIZE;
            let pte = if idx >= slot_first && idx < slot_last {
                // Slots começam desmapeados.
                Pte::absent()
            } else if idx >= kern_first && idx < kern_last {
                // Dados do kernel: presentes, read-only fora do kernel.
                Pte::map(frame, PageFlags::empty())
            } else {
                // Texto e dados da aplicação: o espaço plano compartilhado.
                Pte::map(frame, PageFlags::WRITABLE | PageFlags::USER)
            };
            *self.table.entry_mut(idx) = pte;
        }

        // SAFETY: a page table é 'static na prática (vive no dispatcher
        // global) e o PD está identity-mapped no boot.
        unsafe {
            hw::wire_slot_table(0, self.table.as_ptr() as usize);
        }
        crate::kinfo!("(PAGING) slots lineares ligados, base=", MMIO_LINEAR_BASE);
    }

    fn register(&mut self, dom: &Domain, _hw: &mut HwContext<'_>) {
        // Janelas já validadas contra granularidade e máximo; a
        // materialização acontece toda no switch.
        crate::kdebug!("(PAGING) domínio preparado, id=", dom.id().index());
    }

    fn switch(&mut self, _from: &Domain, to: &Domain) {
        // Escrita nos dados do kernel só com o kernel executando.
        let kern_writable = to.id() == DomainId::KERNEL;
        let kern_first = pt_index(KERNEL_DATA_BASE);
        let kern_last = pt_index(KERNEL_DATA_END);
        for idx in kern_first..kern_last {
            self.table.entry_mut(idx).set_writable(kern_writable);
            // SAFETY: invalidação de página do identity map.
            unsafe { hw::invlpg(idx * PAGE_SIZE) };
        }

        let mmio_flags = PageFlags::WRITABLE | PageFlags::USER | PageFlags::NO_CACHE;
        let meta_flags = PageFlags::WRITABLE | PageFlags::USER;
        self.cur_mmio_pages =
            self.remap_slot(MMIO_LINEAR_BASE, to.mmio(), mmio_flags, self.cur_mmio_pages);
        self.cur_meta_pages =
            self.remap_slot(META_LINEAR_BASE, to.meta(), meta_flags, self.cur_meta_pages);
    }

    fn begin_dispatch(&mut self) {
        // O dispatcher precisa escrever PTEs e slots protegidos.
        // SAFETY: reativado no end_dispatch, no mesmo caminho sem
        // interrupções (vetores de dispatch mascaram IF).
        unsafe { hw::set_write_protect(false) };
    }

    fn end_dispatch(&mut self) {
        // SAFETY: fecha a seção aberta no begin_dispatch.
        unsafe { hw::set_write_protect(true) };
    }
}
