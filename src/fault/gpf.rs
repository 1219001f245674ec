//! Emulação de port I/O no General Protection Fault.
//!
//! Nenhum domínio executa instruções de porta diretamente (IOPL e o
//! bitmap de I/O do TSS negam tudo em ring 3). Quando um driver
//! autorizado executa `in`/`out`, o GPF resultante cai aqui: o handler
//! confere a autorização do domínio corrente, decodifica a instrução
//! faltante e executa o acesso em nome dele, avançando o EIP por cima
//! do opcode de um byte.
//!
//! Qualquer outra origem de GPF é violação de proteção: halt.

use crate::arch::traits::PortIo;
use crate::dom::dispatcher::TrapFrame;
use crate::dom::registry::Domain;

/// As quatro formas de porta emuláveis (todas opcodes de um byte, porta
/// em DX). As variantes com operando imediato não são emitidas pelos
/// drivers e não são emuladas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortInsn {
    /// 0xEC: `in al, dx`
    InByte,
    /// 0xED: `in eax, dx`
    InDword,
    /// 0xEE: `out dx, al`
    OutByte,
    /// 0xEF: `out dx, eax`
    OutDword,
}

/// Decodifica o opcode de uma instrução de porta. `None` se o byte não
/// é uma das quatro formas emuláveis.
pub fn decode_port_insn(opcode: u8) -> Option<PortInsn> {
    match opcode {
        0xEC => Some(PortInsn::InByte),
        0xED => Some(PortInsn::InDword),
        0xEE => Some(PortInsn::OutByte),
        0xEF => Some(PortInsn::OutDword),
        _ => None,
    }
}

/// Trata um GPF vindo do domínio `dom`.
///
/// `code_bound` é o primeiro endereço fora do texto executável do
/// domínio: um EIP além dele significa que o fault não veio de código
/// legítimo e a emulação é recusada.
pub fn handle_gpf(dom: &Domain, frame: &mut TrapFrame, ports: &mut dyn PortIo, code_bound: usize) {
    if !dom.requires_port_io() {
        crate::fatal!("(GPF) domínio sem autorização de port I/O, id=", dom.id().index());
    }
    if frame.eip >= code_bound {
        crate::fatal!("(GPF) fault fora do texto do domínio, eip=", frame.eip);
    }

    // SAFETY: eip aponta para o texto do domínio, checado acima (nos
    // testes, para um buffer do próprio teste).
    let opcode = unsafe { (frame.eip as *const u8).read() };
    let insn = match decode_port_insn(opcode) {
        Some(insn) => insn,
        None => crate::fatal!("(GPF) violação de proteção, eip=", frame.eip),
    };

    let port = (frame.edx & 0xFFFF) as u16;
    match insn {
        PortInsn::InByte => {
            frame.eax = (frame.eax & !0xFF) | ports.inb(port) as usize;
        }
        PortInsn::InDword => {
            frame.eax = ports.inl(port) as usize;
        }
        PortInsn::OutByte => {
            ports.outb(port, (frame.eax & 0xFF) as u8);
        }
        PortInsn::OutDword => {
            ports.outl(port, frame.eax as u32);
        }
    }
    frame.eip += 1;
    crate::ktrace!("(GPF) port I/O emulado, porta=", port as usize);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::id::DomainId;
    use crate::dom::registry::DomainTable;

    /// Barramento de portas de mentira: grava acessos e devolve valores
    /// pré-carregados.
    struct FakeBus {
        last_out: Option<(u16, u32)>,
        in_value: u32,
    }

    impl PortIo for FakeBus {
        fn inb(&mut self, _port: u16) -> u8 {
            self.in_value as u8
        }
        fn outb(&mut self, port: u16, value: u8) {
            self.last_out = Some((port, value as u32));
        }
        fn inl(&mut self, _port: u16) -> u32 {
            self.in_value
        }
        fn outl(&mut self, port: u16, value: u32) {
            self.last_out = Some((port, value));
        }
    }

    fn driver(port_io: bool) -> DomainTable {
        let mut doms = DomainTable::new();
        doms.register(DomainId::new(2).unwrap(), None, None, port_io);
        doms
    }

    fn frame_at(code: &[u8], eax: usize, edx: usize) -> (TrapFrame, usize) {
        let eip = code.as_ptr() as usize;
        let bound = eip + code.len();
        (TrapFrame { eip, eax, edx, ..TrapFrame::default() }, bound)
    }

    #[test]
    fn opcode_table() {
        assert_eq!(decode_port_insn(0xEC), Some(PortInsn::InByte));
        assert_eq!(decode_port_insn(0xED), Some(PortInsn::InDword));
        assert_eq!(decode_port_insn(0xEE), Some(PortInsn::OutByte));
        assert_eq!(decode_port_insn(0xEF), Some(PortInsn::OutDword));
        assert_eq!(decode_port_insn(0x90), None);
        assert_eq!(decode_port_insn(0xE4), None); // in al, imm8: não emulado
    }

    #[test]
    fn emulates_byte_input() {
        let doms = driver(true);
        let dom = doms.domain(DomainId::new(2).unwrap());
        let mut bus = FakeBus { last_out: None, in_value: 0xAB };
        let code = [0xECu8];
        let (mut frame, bound) = frame_at(&code, 0xFFFF_FF00, 0x3F8);

        handle_gpf(dom, &mut frame, &mut bus, bound);
        // Só AL muda; o resto de EAX sobrevive.
        assert_eq!(frame.eax, 0xFFFF_FFAB);
        assert_eq!(frame.eip, code.as_ptr() as usize + 1);
    }

    #[test]
    fn emulates_dword_output() {
        let doms = driver(true);
        let dom = doms.domain(DomainId::new(2).unwrap());
        let mut bus = FakeBus { last_out: None, in_value: 0 };
        let code = [0xEFu8];
        let (mut frame, bound) = frame_at(&code, 0xDEAD_BEEF, 0xCF8);

        handle_gpf(dom, &mut frame, &mut bus, bound);
        assert_eq!(bus.last_out, Some((0xCF8, 0xDEAD_BEEF)));
        assert_eq!(frame.eip, code.as_ptr() as usize + 1);
    }

    #[test]
    #[should_panic(expected = "sem autorização de port I/O")]
    fn unauthorized_domain_is_fatal() {
        let doms = driver(false);
        let dom = doms.domain(DomainId::new(2).unwrap());
        let mut bus = FakeBus { last_out: None, in_value: 0 };
        let code = [0xECu8];
        let (mut frame, bound) = frame_at(&code, 0, 0x3F8);
        handle_gpf(dom, &mut frame, &mut bus, bound);
    }

    #[test]
    #[should_panic(expected = "fora do texto")]
    fn fault_outside_domain_text_is_fatal() {
        let doms = driver(true);
        let dom = doms.domain(DomainId::new(2).unwrap());
        let mut bus = FakeBus { last_out: None, in_value: 0 };
        let code = [0xECu8];
        let (mut frame, bound) = frame_at(&code, 0, 0x3F8);
        frame.eip = bound;
        handle_gpf(dom, &mut frame, &mut bus, bound);
    }

    #[test]
    #[should_panic(expected = "violação de proteção")]
    fn forged_opcode_is_fatal() {
        let doms = driver(true);
        let dom = doms.domain(DomainId::new(2).unwrap());
        let mut bus = FakeBus { last_out: None, in_value: 0 };
        // hlt: um GPF legítimo de violação, não uma instrução de porta.
        let code = [0xF4u8];
        let (mut frame, bound) = frame_at(&code, 0, 0);
        handle_gpf(dom, &mut frame, &mut bus, bound);
    }
}
