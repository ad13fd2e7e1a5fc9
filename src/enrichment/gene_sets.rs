//! Gene set collections and identifier mapping

use std::collections::HashMap;

/// A named gene set, as read from one GMT line
#[derive(Debug, Clone, PartialEq)]
pub struct GeneSet {
    pub id: String,
    pub description: String,
    /// Member identifiers, deduplicated in first-seen order
    pub genes: Vec<String>,
}

impl GeneSet {
    pub fn new(id: &str, description: &str, genes: Vec<String>) -> Self {
        let mut seen = std::collections::HashSet::new();
        let genes = genes
            .into_iter()
            .filter(|g| !g.is_empty() && seen.insert(g.clone()))
            .collect();
        Self {
            id: id.to_string(),
            description: description.to_string(),
            genes,
        }
    }

    pub fn len(&self) -> usize {
        self.genes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }
}

/// Gene symbol -> database identifier(s)
#[derive(Debug, Clone, Default)]
pub struct IdMap {
    map: HashMap<String, Vec<String>>,
}

impl IdMap {
    pub fn new(map: HashMap<String, Vec<String>>) -> Self {
        Self { map }
    }

    pub fn lookup(&self, symbol: &str) -> Option<&[String]> {
        self.map.get(symbol).map(|v| v.as_slice())
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Map symbols to identifiers, returning (identifier, symbol) pairs
    ///
    /// Unmapped symbols are dropped; the fraction that failed is logged.
    pub fn translate<'a>(&'a self, symbols: &[&'a str]) -> Vec<(String, &'a str)> {
        let mut pairs = Vec::new();
        let mut unmapped = 0usize;
        for &symbol in symbols {
            match self.lookup(symbol) {
                Some(ids) => pairs.extend(ids.iter().map(|id| (id.clone(), symbol))),
                None => unmapped += 1,
            }
        }
        if unmapped > 0 && !symbols.is_empty() {
            log::warn!(
                "{:.2}% of input gene IDs fail to map",
                100.0 * unmapped as f64 / symbols.len() as f64
            );
        }
        pairs
    }
}
