use std::fmt;

/// Which side of the migration a store sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreKind {
    /// Neo4j, the store being migrated away from.
    Source,
    /// FalkorDB, the store being migrated into.
    Target,
}

impl StoreKind {
    pub fn label(self) -> &'static str {
        match self {
            StoreKind::Source => "Neo4j",
            StoreKind::Target => "FalkorDB",
        }
    }
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
