// Copyright 2025 the Mosaic Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-batch string interning for item names and render groups.

use alloc::boxed::Box;
use alloc::vec::Vec;

use hashbrown::HashMap;

/// Interned string handle. Only meaningful for the [`Interner`] that produced it.
///
/// Ordering follows interning order, which is what render-group sorting compares.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Symbol(u32);

/// A string table owned by one batch.
#[derive(Clone, Debug, Default)]
pub struct Interner {
    map: HashMap<Box<str>, Symbol>,
    strings: Vec<Box<str>>,
}

impl Interner {
    /// Create an empty interner.
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern `s`, returning the existing symbol if it was seen before.
    pub fn intern(&mut self, s: &str) -> Symbol {
        if let Some(sym) = self.map.get(s) {
            return *sym;
        }
        #[allow(
            clippy::cast_possible_truncation,
            reason = "Symbols are 32-bit; a batch never holds 2^32 distinct strings."
        )]
        let sym = Symbol(self.strings.len() as u32);
        self.strings.push(s.into());
        self.map.insert(s.into(), sym);
        sym
    }

    /// Forget every string. Symbols handed out earlier become meaningless.
    pub fn clear(&mut self) {
        self.map.clear();
        self.strings.clear();
    }

    /// Look up `s` without interning it.
    pub fn get(&self, s: &str) -> Option<Symbol> {
        self.map.get(s).copied()
    }

    /// The string behind `sym`.
    pub fn resolve(&self, sym: Symbol) -> Option<&str> {
        self.strings.get(sym.0 as usize).map(|s| &**s)
    }

    /// Number of distinct strings.
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    /// Whether nothing has been interned.
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}
