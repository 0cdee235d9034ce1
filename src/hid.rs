//! Hierarchical (scope-qualified) signal names

use compact_str::CompactString;
use std::fmt;
use itertools::Itertools;

/// A signal name qualified by the scopes it is declared in.
///
/// Renders as `top.sub.name` with an optional range token appended
/// directly, e.g. `top.bus[1:0]`.
#[derive(Hash, Copy, Clone, PartialEq, Eq)]
pub struct HierName<'a> {
    pub scopes: &'a [CompactString],
    pub name: &'a str,
    pub range: Option<&'a str>,
}

impl HierName<'_> {
    /// Length of the rendered name in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.scopes.iter().map(|s| s.len() + 1).sum::<usize>()
            + self.name.len()
            + self.range.map_or(0, str::len)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for HierName<'_> {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.scopes.is_empty() {
            write!(f, "{}.", self.scopes.iter().format("."))?;
        }
        write!(f, "{}", self.name)?;
        if let Some(r) = self.range {
            write!(f, "{}", r)?;
        }
        Ok(())
    }
}

impl fmt::Debug for HierName<'_> {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

/// The stack of currently open scopes while reading the preamble.
#[derive(Debug, Default, Clone)]
pub struct ScopeStack {
    scopes: Vec<CompactString>,
    /// Length of the rendered prefix, `top.sub.` including the dots.
    prefix_len: usize,
}

impl ScopeStack {
    #[inline]
    pub fn new() -> ScopeStack {
        ScopeStack::default()
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Length of the qualified-name prefix contributed by open scopes.
    #[inline]
    pub fn prefix_len(&self) -> usize {
        self.prefix_len
    }

    #[inline]
    pub fn push(&mut self, scope: &str) {
        self.prefix_len += scope.len() + 1;
        self.scopes.push(scope.into());
    }

    /// Close the innermost scope. Unbalanced closes are ignored.
    #[inline]
    pub fn pop(&mut self) {
        if let Some(s) = self.scopes.pop() {
            self.prefix_len -= s.len() + 1;
        }
    }

    /// Qualify a declared short name with the open scopes.
    #[inline]
    pub fn qualify<'a>(&'a self, name: &'a str, range: Option<&'a str>) -> HierName<'a> {
        HierName { scopes: &self.scopes, name, range }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qualify() {
        let mut st = ScopeStack::new();
        assert_eq!(st.qualify("clk", None).to_string(), "clk");
        st.push("top");
        st.push("cpu");
        assert_eq!(st.prefix_len(), 8);
        let n = st.qualify("pc", Some("[31:0]"));
        assert_eq!(n.to_string(), "top.cpu.pc[31:0]");
        assert_eq!(n.len(), "top.cpu.pc[31:0]".len());
        st.pop();
        assert_eq!(st.qualify("bus", None).to_string(), "top.bus");
        st.pop();
        st.pop();
        assert_eq!(st.depth(), 0);
        assert_eq!(st.prefix_len(), 0);
    }
}
