//! Architecture name table
//!
//! Rather than expanding every template for every block index, templates are
//! stored with their numeric path segments abstracted out. A lookup abstracts
//! the query the same way, then checks the captured indices against the
//! block and expert bounds.

use super::{Architecture, TensorKind, MAX_EXPERTS};
use log::debug;
use std::collections::HashMap;

const SLOT: &str = "#";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Block,
    Expert,
}

#[derive(Debug, Clone)]
struct Entry {
    kind: TensorKind,
    slots: Vec<Slot>,
}

/// Immutable source-name to canonical-name table for one architecture
#[derive(Debug, Clone)]
pub struct TensorNameTable {
    arch: Architecture,
    max_blocks: usize,
    entries: HashMap<String, Entry>,
}

impl TensorNameTable {
    /// Build the table for `arch`, accepting block indices below `max_blocks`.
    pub fn build(arch: Architecture, max_blocks: usize) -> Self {
        let mut entries = HashMap::new();
        for kind in TensorKind::ALL {
            if !arch.tensor_kinds().contains(&kind) {
                continue;
            }
            insert_template(&mut entries, kind, kind.canonical());
            for source in kind.sources() {
                insert_template(&mut entries, kind, source);
                if arch.accepts_bare_decoder() {
                    if let Some(bare) = source.strip_prefix("model.") {
                        if bare.starts_with("layers.") {
                            insert_template(&mut entries, kind, bare);
                        }
                    }
                }
            }
        }
        debug!(
            "Built name table for {} with {} templates (max {} blocks)",
            arch,
            entries.len(),
            max_blocks
        );
        Self {
            arch,
            max_blocks,
            entries,
        }
    }

    pub fn arch(&self) -> Architecture {
        self.arch
    }

    /// Number of distinct templates in the table
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Canonical name for a source tensor stem, if the architecture has one.
    pub fn get(&self, key: &str) -> Option<String> {
        let (pattern, indices) = abstract_key(key);
        let entry = self.entries.get(&pattern)?;
        if indices.len() != entry.slots.len() {
            return None;
        }
        let mut bid = None;
        let mut xid = None;
        for (slot, &index) in entry.slots.iter().zip(&indices) {
            match slot {
                Slot::Block if index < self.max_blocks => bid = Some(index),
                Slot::Expert if index < MAX_EXPERTS => xid = Some(index),
                _ => return None,
            }
        }
        let mut name = entry.kind.canonical().to_string();
        if let Some(bid) = bid {
            name = name.replace("{bid}", &bid.to_string());
        }
        if let Some(xid) = xid {
            name = name.replace("{xid}", &xid.to_string());
        }
        Some(name)
    }
}

// Later inserts overwrite earlier ones.
fn insert_template(entries: &mut HashMap<String, Entry>, kind: TensorKind, template: &str) {
    let mut slots = Vec::new();
    let pattern: Vec<&str> = template
        .split('.')
        .map(|seg| match seg {
            "{bid}" => {
                slots.push(Slot::Block);
                SLOT
            }
            "{xid}" => {
                slots.push(Slot::Expert);
                SLOT
            }
            other => other,
        })
        .collect();
    entries.insert(pattern.join("."), Entry { kind, slots });
}

/// Replace each decimal path segment with a slot marker, returning the
/// pattern and the captured indices in order. Segments with leading zeros
/// stay literal since no template renders them.
fn abstract_key(key: &str) -> (String, Vec<usize>) {
    let mut indices = Vec::new();
    let pattern: Vec<&str> = key
        .split('.')
        .map(|seg| match seg.parse::<usize>() {
            Ok(n) if n.to_string() == seg => {
                indices.push(n);
                SLOT
            }
            _ => seg,
        })
        .collect();
    (pattern.join("."), indices)
}
