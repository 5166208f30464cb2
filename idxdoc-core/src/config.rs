use crate::category::{Category, CategoryPaths, CategorySpec, ITEMS_KEY, UI_KEY};
use crate::codec::IndexKind;
use crate::error::{IdxError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Where the game and the patcher keep their files, and which categories
/// to audit. Every field has a default so a partial JSON file is enough.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct CheckConfig {
    pub game_dir: PathBuf,
    pub backup_dir: PathBuf,
    pub modlist: PathBuf,
    /// Patch the shard-count header during a full check when it is wrong.
    pub auto_repair: bool,
    /// Category key -> number of shards the client should open.
    pub categories: BTreeMap<String, u16>,
}

impl Default for CheckConfig {
    fn default() -> Self {
        let mut categories = BTreeMap::new();
        categories.insert(ITEMS_KEY.to_string(), 5);
        categories.insert(UI_KEY.to_string(), 2);
        Self {
            game_dir: PathBuf::from("game/sqpack/ffxiv"),
            backup_dir: PathBuf::from("index_backup"),
            modlist: PathBuf::from("modlist.dat"),
            auto_repair: true,
            categories,
        }
    }
}

impl CheckConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let f = File::open(path).map_err(|e| IdxError::io(path, e))?;
        serde_json::from_reader(BufReader::new(f))
            .map_err(|source| IdxError::Config { path: path.to_path_buf(), source })
    }

    pub fn expected_shard_count(&self, category: &Category) -> Option<u16> {
        self.categories.get(category.key()).copied()
    }

    pub fn category_paths(&self, category: &Category) -> CategoryPaths {
        let name = |dir: &Path, kind: IndexKind| {
            dir.join(format!("{}.{}", category.key(), kind.file_suffix()))
        };
        CategoryPaths {
            index: name(&self.game_dir, IndexKind::Primary),
            index2: name(&self.game_dir, IndexKind::Secondary),
            backup_index: name(&self.backup_dir, IndexKind::Primary),
            backup_index2: name(&self.backup_dir, IndexKind::Secondary),
        }
    }

    pub fn category_specs(&self) -> Vec<CategorySpec> {
        self.categories
            .iter()
            .map(|(key, &expected_shards)| {
                let category = Category::from_key(key);
                let paths = self.category_paths(&category);
                CategorySpec { category, expected_shards, paths }
            })
            .collect()
    }
}
