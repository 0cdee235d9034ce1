//! Symbol table: the declarations preamble, the sorted variable
//! table, the identifier index and the bit-state arena.

use crate::error::{FormatError, Result};
use crate::hid::ScopeStack;
use crate::ToggleOptions;
use compact_str::CompactString;
use std::cmp::Ordering;
use std::io::BufRead;

/// Number of buckets in the identifier index (three base-96 digits).
pub const ID_HASH_MAX: usize = 96 * 96 * 96;

/// Initial value of every state bit.
pub const UNKNOWN: u8 = b'x';

/// Hash of the first three bytes of an identifier.
///
/// Printable ASCII maps to the digits `0..96`; a missing byte counts
/// as 0. Bytes outside `0x20..=0x7f` saturate the remaining digits
/// (to 0 below the range, to 95 above it), which keeps the hash
/// monotone with the byte-wise order of identifiers.
pub fn id_hash3(id: &[u8]) -> usize {
    let mut h = 0;
    let mut saturated = None;
    for k in 0..3 {
        let d = match saturated {
            Some(d) => d,
            None => match id.get(k) {
                Some(&b) if (0x20..=0x7f).contains(&b) => (b - 0x20) as usize,
                Some(&b) if b > 0x7f => {
                    saturated = Some(95);
                    95
                }
                _ => {
                    saturated = Some(0);
                    0
                }
            },
        };
        h = h * 96 + d;
    }
    h
}

/// One `$var` declaration.
#[derive(Debug, Clone)]
struct NameRecord {
    identifier: CompactString,
    width: u32,
    name: String,
    /// `"<width> <name>"`, the tie-break among equal identifiers.
    key: String,
}

/// Append-only list of every declaration, aliases included.
#[derive(Debug, Default)]
pub struct NameTable {
    records: Vec<NameRecord>,
    /// Number of preamble lines consumed.
    pub lines: u64,
}

impl NameTable {
    #[inline]
    pub fn new() -> NameTable {
        NameTable::default()
    }

    pub fn push(&mut self, identifier: &str, width: u32, name: String) {
        self.records.push(NameRecord {
            identifier: identifier.into(),
            width,
            key: format!("{} {}", width, name),
            name,
        });
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Parse a width token the way `atoi` would: optional sign, leading
/// digits, anything else ends the number. Negative widths clamp to 0.
fn parse_width(tok: &[u8]) -> u32 {
    let (neg, digits) = match tok.first() {
        Some(b'-') => (true, &tok[1..]),
        Some(b'+') => (false, &tok[1..]),
        _ => (false, tok),
    };
    let mut w: u64 = 0;
    for &b in digits.iter().take_while(|b| b.is_ascii_digit()) {
        w = (w * 10 + (b - b'0') as u64).min(u32::MAX as u64);
    }
    if neg { 0 } else { w as u32 }
}

/// Read the declarations preamble, up to and including
/// `$enddefinitions`.
///
/// Only `$scope`, `$upscope`, `$var` and `$enddefinitions` are
/// interpreted, each expected on a line of its own.
/// `line` is advanced by the number of lines consumed.
pub fn read_preamble<R: BufRead>(
    input: &mut R, opts: &ToggleOptions, line: &mut u64
) -> Result<NameTable> {
    let mut table = NameTable::new();
    let mut scopes = ScopeStack::new();
    let mut buf = Vec::with_capacity(1024);
    let start = *line;
    loop {
        buf.clear();
        if input.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        *line += 1;
        let tok: Vec<&[u8]> = buf
            .split(|b| b.is_ascii_whitespace())
            .filter(|t| !t.is_empty())
            .collect();
        match tok.first().copied() {
            Some(b"$enddefinitions") => break,
            Some(b"$scope") if tok.len() >= 3 => {
                let name = String::from_utf8_lossy(tok[2]);
                if scopes.depth() >= opts.max_scope_depth {
                    return Err(FormatError::ScopeTooDeep {
                        line: *line,
                        depth: scopes.depth() + 1,
                        max: opts.max_scope_depth,
                    }.into());
                }
                let len = scopes.prefix_len() + name.len() + 1;
                if len > opts.max_name_len {
                    return Err(FormatError::NameTooLong {
                        line: *line, len, max: opts.max_name_len
                    }.into());
                }
                scopes.push(&name);
            }
            Some(b"$upscope") => scopes.pop(),
            Some(b"$var") if tok.len() >= 5 => {
                let width = parse_width(tok[2]);
                let id = String::from_utf8_lossy(tok[3]);
                let short = String::from_utf8_lossy(tok[4]);
                let range = tok.get(5)
                    .filter(|t| **t != b"$end")
                    .map(|t| String::from_utf8_lossy(t));
                let name = scopes.qualify(&short, range.as_deref());
                if name.len() > opts.max_name_len {
                    return Err(FormatError::NameTooLong {
                        line: *line, len: name.len(), max: opts.max_name_len
                    }.into());
                }
                table.push(&id, width, name.to_string());
            }
            _ => {}
        }
    }
    table.lines = *line - start;
    Ok(table)
}

/// One distinct signal identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    pub identifier: CompactString,
    /// Number of bits.
    pub width: u32,
    /// Number of declarations sharing this identifier.
    pub alias_count: u32,
    /// Index of the first declaration in the sorted name list.
    pub name_offset: usize,
    /// Number of accepted value changes so far.
    pub update_count: u64,
    /// Start of this variable's bits in the state arena.
    pub state_offset: usize,
}

impl Variable {
    #[inline]
    pub fn state_range(&self) -> std::ops::Range<usize> {
        self.state_offset..self.state_offset + self.width as usize
    }
}

/// Maps an identifier hash to a start position in the sorted
/// variable table; lookups scan forward from there.
pub struct IdIndex {
    buckets: Vec<usize>,
}

impl IdIndex {
    /// Build the index in one pass over a table sorted by identifier.
    ///
    /// Buckets between two consecutive hashes point at the earlier
    /// variable, buckets past the last hash at the end of the table.
    pub fn build(vars: &[Variable]) -> IdIndex {
        let mut buckets = vec![vars.len(); ID_HASH_MAX];
        let mut next = 0;
        let mut prev = 0;
        for (i, v) in vars.iter().enumerate() {
            let h = id_hash3(v.identifier.as_bytes());
            if h >= next {
                buckets[next..h].fill(prev);
                buckets[h] = i;
                next = h + 1;
            }
            prev = i;
        }
        IdIndex { buckets }
    }

    /// Find the table position of `id`.
    pub fn lookup(&self, vars: &[Variable], id: &[u8]) -> Option<usize> {
        let start = self.buckets[id_hash3(id)];
        for (i, v) in vars.iter().enumerate().skip(start) {
            match v.identifier.as_bytes().cmp(id) {
                Ordering::Equal => return Some(i),
                Ordering::Greater => return None,
                Ordering::Less => {}
            }
        }
        None
    }
}

/// The deduplicated variables, sorted by identifier, with their
/// identifier index.
pub struct SymbolTable {
    vars: Vec<Variable>,
    /// Qualified names in sorted declaration order.
    names: Vec<String>,
    index: IdIndex,
    /// Sum of all widths.
    state_bits: usize,
    max_width: u32,
}

impl SymbolTable {
    /// Sort the declarations and fold aliases into variables.
    pub fn build(table: NameTable) -> SymbolTable {
        let mut records = table.records;
        records.sort_by(|a, b| {
            a.identifier.cmp(&b.identifier).then_with(|| a.key.cmp(&b.key))
        });
        let mut vars: Vec<Variable> = Vec::new();
        let mut names = Vec::with_capacity(records.len());
        let mut state_bits = 0;
        let mut max_width = 0;
        for (i, rec) in records.into_iter().enumerate() {
            match vars.last_mut() {
                Some(last) if last.identifier == rec.identifier => {
                    if last.width != rec.width {
                        clilog::warn!(
                            VCD_ALIAS_WIDTH,
                            "width mismatch for id {}: {} != {} ({})",
                            rec.identifier, rec.width, last.width, rec.name
                        );
                    }
                    last.alias_count += 1;
                }
                _ => {
                    vars.push(Variable {
                        identifier: rec.identifier,
                        width: rec.width,
                        alias_count: 1,
                        name_offset: i,
                        update_count: 0,
                        state_offset: state_bits,
                    });
                    state_bits += rec.width as usize;
                    max_width = max_width.max(rec.width);
                }
            }
            names.push(rec.name);
        }
        let index = IdIndex::build(&vars);
        SymbolTable { vars, names, index, state_bits, max_width }
    }

    #[inline]
    pub fn find(&self, id: &[u8]) -> Option<usize> {
        self.index.lookup(&self.vars, id)
    }

    #[inline]
    pub fn vars(&self) -> &[Variable] {
        &self.vars
    }

    #[inline]
    pub fn var(&self, i: usize) -> &Variable {
        &self.vars[i]
    }

    #[inline]
    pub fn var_mut(&mut self, i: usize) -> &mut Variable {
        &mut self.vars[i]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// The first qualified name of a variable.
    #[inline]
    pub fn name(&self, i: usize) -> &str {
        &self.names[self.vars[i].name_offset]
    }

    /// All qualified names sharing the identifier of a variable.
    #[inline]
    pub fn aliases(&self, i: usize) -> &[String] {
        let v = &self.vars[i];
        &self.names[v.name_offset..v.name_offset + v.alias_count as usize]
    }

    #[inline]
    pub fn state_bits(&self) -> usize {
        self.state_bits
    }

    #[inline]
    pub fn max_width(&self) -> u32 {
        self.max_width
    }

    /// First variable (in table order) whose first name contains
    /// `fragment`.
    pub fn find_by_fragment(&self, fragment: &str) -> Option<usize> {
        (0..self.vars.len()).find(|&i| self.name(i).contains(fragment))
    }

    /// A state arena sized for this table, every bit unknown.
    #[inline]
    pub fn new_arena(&self) -> StateArena {
        StateArena { bits: vec![UNKNOWN; self.state_bits] }
    }
}

/// Current bit values of every variable, back to back in table order.
pub struct StateArena {
    bits: Vec<u8>,
}

impl StateArena {
    #[inline]
    pub fn get(&self, v: &Variable) -> &[u8] {
        &self.bits[v.state_range()]
    }

    #[inline]
    pub fn get_mut(&mut self, v: &Variable) -> &mut [u8] {
        &mut self.bits[v.state_range()]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bits.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }
}
