//! Pilha de chamadas inter-domínio em voo.
//!
//! Profundidade fixa e pequena: estouro ou underflow significa que o
//! estado de controle do dispatcher foi corrompido ou que um driver
//! entrou em recursão entre domínios que o design proíbe. Ambos são
//! halt, nunca erro recuperável.

use crate::config::CALLSTACK_DEPTH;
use crate::dom::id::DomainId;

/// Pilha limitada de ativações. O slot 0 é a raiz (o domínio da
/// aplicação) e nunca sai da pilha; as chamadas reais ocupam os
/// `CALLSTACK_DEPTH` slots acima.
pub struct DomainCallStack {
    slots: [DomainId; CALLSTACK_DEPTH + 1],
    top: usize,
}

impl DomainCallStack {
    pub const fn new() -> Self {
        Self {
            slots: [DomainId::APP; CALLSTACK_DEPTH + 1],
            top: 0,
        }
    }

    /// Domínio no topo (o que está executando).
    pub fn top(&self) -> DomainId {
        self.slots[self.top]
    }

    /// Profundidade de chamadas em voo (0 = só a raiz).
    pub fn depth(&self) -> usize {
        self.top
    }

    /// As ativações em voo, da raiz ao topo (diagnóstico).
    pub fn frames(&self) -> &[DomainId] {
        &self.slots[..=self.top]
    }

    /// Empilha a ativação de `callee`. Estourar o limite é fatal.
    pub fn push(&mut self, callee: DomainId) {
        if self.top == CALLSTACK_DEPTH {
            crate::fatal!("(DOM) estouro da pilha de chamadas entre domínios");
        }
        self.top += 1;
        self.slots[self.top] = callee;
    }

    /// Desempilha a ativação corrente e devolve o domínio desempilhado.
    /// Retorno na raiz é fatal (não há quem retomar).
    pub fn pop(&mut self) -> DomainId {
        if self.top == 0 {
            crate::fatal!("(DOM) retorno entre domínios com pilha vazia");
        }
        let popped = self.slots[self.top];
        self.top -= 1;
        popped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_is_application() {
        let stack = DomainCallStack::new();
        assert_eq!(stack.top(), DomainId::APP);
        assert_eq!(stack.depth(), 0);
    }

    #[test]
    fn push_pop_tracks_top() {
        let mut stack = DomainCallStack::new();
        let drv = DomainId::new(2).unwrap();
        stack.push(DomainId::KERNEL);
        stack.push(drv);
        assert_eq!(stack.top(), drv);
        assert_eq!(stack.depth(), 2);
        assert_eq!(stack.pop(), drv);
        assert_eq!(stack.top(), DomainId::KERNEL);
        assert_eq!(stack.pop(), DomainId::KERNEL);
        assert_eq!(stack.top(), DomainId::APP);
    }

    #[test]
    fn full_depth_is_usable() {
        let mut stack = DomainCallStack::new();
        for _ in 0..CALLSTACK_DEPTH {
            stack.push(DomainId::KERNEL);
        }
        assert_eq!(stack.depth(), CALLSTACK_DEPTH);
    }

    #[test]
    #[should_panic(expected = "estouro da pilha")]
    fn overflow_is_fatal() {
        let mut stack = DomainCallStack::new();
        for _ in 0..=CALLSTACK_DEPTH {
            stack.push(DomainId::KERNEL);
        }
    }

    #[test]
    #[should_panic(expected = "pilha vazia")]
    fn pop_at_root_is_fatal() {
        let mut stack = DomainCallStack::new();
        let _ = stack.pop();
    }
}
