use crate::codec::IndexKind;
use serde::{Serialize, Serializer};
use std::fmt;
use std::path::PathBuf;

pub const ITEMS_KEY: &str = "040000";
pub const UI_KEY: &str = "060000";

/// One logical archive family, identified on disk by its key.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Items,
    Ui,
    Other(String),
}

/// Which shard holds relocated assets and, by implication, which shards are
/// untouched originals (everything below it).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ShardRule {
    pub mod_shard: Option<u8>,
}

/// Categories with a reserved mod shard. Extend here to give a new
/// category the cross-referenced rules.
const BESPOKE_RULES: &[(&str, u8)] = &[(ITEMS_KEY, 4), (UI_KEY, 1)];

impl ShardRule {
    pub const GENERIC: ShardRule = ShardRule { mod_shard: None };

    /// Highest shard an unmodified entry may live in.
    pub fn max_original_shard(self) -> Option<u8> {
        self.mod_shard.map(|m| m.saturating_sub(1))
    }

    pub fn is_bespoke(self) -> bool {
        self.mod_shard.is_some()
    }
}

impl Category {
    pub fn from_key(key: &str) -> Self {
        match key {
            ITEMS_KEY => Category::Items,
            UI_KEY => Category::Ui,
            other => Category::Other(other.to_string()),
        }
    }

    pub fn key(&self) -> &str {
        match self {
            Category::Items => ITEMS_KEY,
            Category::Ui => UI_KEY,
            Category::Other(k) => k,
        }
    }

    pub fn rule(&self) -> ShardRule {
        let key = self.key();
        BESPOKE_RULES
            .iter()
            .find(|(k, _)| *k == key)
            .map(|&(_, m)| ShardRule { mod_shard: Some(m) })
            .unwrap_or(ShardRule::GENERIC)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl Serialize for Category {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(self.key())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CategoryPaths {
    pub index: PathBuf,
    pub index2: PathBuf,
    pub backup_index: PathBuf,
    pub backup_index2: PathBuf,
}

impl CategoryPaths {
    pub fn live(&self, kind: IndexKind) -> &PathBuf {
        match kind {
            IndexKind::Primary => &self.index,
            IndexKind::Secondary => &self.index2,
        }
    }

    pub fn backup(&self, kind: IndexKind) -> &PathBuf {
        match kind {
            IndexKind::Primary => &self.backup_index,
            IndexKind::Secondary => &self.backup_index2,
        }
    }
}

/// Everything the checks need to know about one category.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CategorySpec {
    pub category: Category,
    pub expected_shards: u16,
    pub paths: CategoryPaths,
}
