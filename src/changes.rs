//! Value-change records of the trace body.

use crate::error::RecordError;
use crate::symbols::{StateArena, SymbolTable};

/// One classified body line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Record<'a> {
    /// `#<time>`
    Time(u64),
    /// `0<id>`, `1<id>` or `b<bits> <id>`
    Change { bits: &'a [u8], id: &'a [u8] },
    Blank,
}

#[inline]
fn is_white_space(b: u8) -> bool {
    b.is_ascii_whitespace() || b == 0
}

fn lossy(line: &[u8]) -> String {
    String::from_utf8_lossy(line).into_owned()
}

/// The identifier at the start of `s`, up to the next whitespace.
#[inline]
fn take_id(s: &[u8]) -> &[u8] {
    let end = s.iter().position(|&b| is_white_space(b)).unwrap_or(s.len());
    &s[..end]
}

/// Classify one body line (line terminator included or not).
pub fn classify(line: &[u8]) -> Result<Record<'_>, RecordError> {
    let line = match line.iter().rposition(|&b| !is_white_space(b)) {
        Some(last) => &line[..=last],
        None => return Ok(Record::Blank),
    };
    match line[0] {
        b'#' => {
            let digits = &line[1..];
            let n = digits.iter().take_while(|b| b.is_ascii_digit()).count();
            std::str::from_utf8(&digits[..n])
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .map(Record::Time)
                .ok_or_else(|| RecordError::MalformedTime(lossy(line)))
        }
        b'0' | b'1' => Ok(Record::Change { bits: &line[..1], id: take_id(&line[1..]) }),
        b'b' | b'B' => {
            let rest = &line[1..];
            let n = rest.iter().take_while(|&&b| b == b'0' || b == b'1').count();
            let (bits, tail) = rest.split_at(n);
            let skip = tail.iter().take_while(|&&b| b == b' ' || b == b'\t').count();
            if skip == 0 && !tail.is_empty() {
                // x/z/etc inside the bit run
                return Err(RecordError::MalformedBits(lossy(line)));
            }
            Ok(Record::Change { bits, id: take_id(&tail[skip..]) })
        }
        _ => Err(RecordError::Unrecognized(lossy(line))),
    }
}

/// Outcome of an accepted value change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Update {
    /// Position of the variable in the symbol table.
    pub var: usize,
    /// Number of bits that changed; always 0 on the first update.
    pub distance: u64,
    /// Number of bits compared, 0 on the first update.
    pub bits: u64,
    pub first: bool,
}

/// Overwrite `old` with `new` and return the number of differing bits.
#[inline]
pub fn hamming_update(old: &mut [u8], new: &[u8]) -> u64 {
    let mut d = 0;
    for (o, &n) in old.iter_mut().zip(new) {
        if *o != n {
            d += 1;
            *o = n;
        }
    }
    d
}

/// Apply a value change to the state of its variable.
///
/// `line` is only used for error messages.
pub fn apply_change(
    table: &mut SymbolTable, arena: &mut StateArena,
    bits: &[u8], id: &[u8], line: &[u8]
) -> Result<Update, RecordError> {
    let id_str = String::from_utf8_lossy(id);
    let var = table.find(id_str.as_bytes()).ok_or_else(|| RecordError::UnknownId {
        id: id_str.as_ref().into(),
        record: lossy(line.trim_ascii_end()),
    })?;
    let v = table.var_mut(var);
    if bits.len() != v.width as usize {
        return Err(RecordError::WidthMismatch {
            expected: v.width,
            found: bits.len(),
            record: lossy(line.trim_ascii_end()),
        });
    }
    let first = v.update_count == 0;
    v.update_count += 1;
    let state = arena.get_mut(v);
    if first {
        state.copy_from_slice(bits);
        Ok(Update { var, distance: 0, bits: 0, first })
    } else {
        let distance = hamming_update(state, bits);
        Ok(Update { var, distance, bits: bits.len() as u64, first })
    }
}
