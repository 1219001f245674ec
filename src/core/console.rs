// =============================================================================
// CONSOLE DE DIAGNÓSTICO - ZERO OVERHEAD
// =============================================================================
//
// Saída de diagnóstico do subsistema, byte a byte, através de um sink
// plugável instalado pelo embedder (tipicamente a UART de debug).
//
// ARQUITETURA:
// - SEM core::fmt - Evita geração de código SSE/AVX
// - SEM alocação - Apenas strings literais e valores imediatos
// - O subsistema NÃO possui driver de serial próprio: quem embute o
//   crate chama `set_sink` no early-boot apontando para o driver real.
//   Sem sink instalado, toda emissão é descartada em silêncio.
//
// FUNÇÕES DISPONÍVEIS:
// - emit(byte)       : Envia um byte
// - emit_str(s)      : Envia string literal
// - emit_hex(v)      : Envia u64 em hexadecimal (prefixo 0x)
// - emit_dec(v)      : Envia u64 em decimal
// - emit_nl()        : Envia newline (\r\n)
//
// =============================================================================

use core::sync::atomic::{AtomicUsize, Ordering};

// Ponteiro para o sink instalado (0 = nenhum). Armazenado como usize
// para permitir store/load atômico sem lock no caminho de emissão.
static SINK: AtomicUsize = AtomicUsize::new(0);

/// Instala o sink de saída. Chamado uma vez pelo embedder no early-boot.
pub fn set_sink(sink: fn(u8)) {
    SINK.store(sink as usize, Ordering::Release);
}

/// Remove o sink (silencia o console).
pub fn clear_sink() {
    SINK.store(0, Ordering::Release);
}

/// Envia um byte para o sink, se houver.
#[inline]
pub fn emit(byte: u8) {
    let raw = SINK.load(Ordering::Acquire);
    if raw != 0 {
        // SAFETY: o valor só é escrito por set_sink a partir de um fn(u8)
        // válido; 0 é filtrado acima.
        let sink: fn(u8) = unsafe { core::mem::transmute(raw) };
        sink(byte);
    }
}

/// Envia uma string literal.
pub fn emit_str(s: &str) {
    for b in s.bytes() {
        emit(b);
    }
}

/// Formata um u64 em hexadecimal (sem prefixo) no buffer dado.
/// Retorna a fatia com os dígitos. Suprime zeros à esquerda.
fn hex_digits(value: u64, buf: &mut [u8; 16]) -> &[u8] {
    const DIGITS: &[u8; 16] = b"0123456789ABCDEF";
    let mut i = buf.len();
    let mut v = value;
    loop {
        i -= 1;
        buf[i] = DIGITS[(v & 0xF) as usize];
        v >>= 4;
        if v == 0 {
            break;
        }
    }
    &buf[i..]
}

/// Formata um u64 em decimal no buffer dado.
fn dec_digits(value: u64, buf: &mut [u8; 20]) -> &[u8] {
    let mut i = buf.len();
    let mut v = value;
    loop {
        i -= 1;
        buf[i] = b'0' + (v % 10) as u8;
        v /= 10;
        if v == 0 {
            break;
        }
    }
    &buf[i..]
}

/// Envia um u64 em hexadecimal com prefixo `0x`.
pub fn emit_hex(value: u64) {
    let mut buf = [0u8; 16];
    emit(b'0');
    emit(b'x');
    for &b in hex_digits(value, &mut buf) {
        emit(b);
    }
}

/// Envia um u64 em decimal.
pub fn emit_dec(value: u64) {
    let mut buf = [0u8; 20];
    for &b in dec_digits(value, &mut buf) {
        emit(b);
    }
}

/// Envia newline (\r\n).
pub fn emit_nl() {
    emit(b'\r');
    emit(b'\n');
}
