use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::ids::{ObjectId, TurnNumber};

/// Static description of a civilization, fixed for the lifetime of a context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Civilization {
    pub civ_id: ObjectId,
    pub key: String,
    pub short_name: String,
    pub is_empire: bool,
}

impl Civilization {
    pub fn new(civ_id: ObjectId, key: impl Into<String>, short_name: impl Into<String>) -> Self {
        Self {
            civ_id,
            key: key.into(),
            short_name: short_name.into(),
            is_empire: true,
        }
    }

    pub fn minor(civ_id: ObjectId, key: impl Into<String>, short_name: impl Into<String>) -> Self {
        Self {
            is_empire: false,
            ..Self::new(civ_id, key, short_name)
        }
    }
}

/// Read-only registry of every civilization in a match, indexed by id and key.
#[derive(Debug, Clone, Default)]
pub struct CivDatabase {
    by_id: BTreeMap<ObjectId, Arc<Civilization>>,
    by_key: BTreeMap<String, ObjectId>,
}

impl CivDatabase {
    pub fn new(civilizations: impl IntoIterator<Item = Civilization>) -> Self {
        let mut database = Self::default();
        for civ in civilizations {
            database.by_key.insert(civ.key.clone(), civ.civ_id);
            database.by_id.insert(civ.civ_id, Arc::new(civ));
        }
        database
    }

    pub fn get(&self, civ_id: ObjectId) -> Option<&Arc<Civilization>> {
        self.by_id.get(&civ_id)
    }

    pub fn get_by_key(&self, key: &str) -> Option<&Arc<Civilization>> {
        self.by_key.get(key).and_then(|id| self.by_id.get(id))
    }

    /// Civilizations in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Civilization>> {
        self.by_id.values()
    }

    pub fn empires(&self) -> impl Iterator<Item = &Arc<Civilization>> {
        self.by_id.values().filter(|civ| civ.is_empire)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SitRepEntry {
    pub turn: TurnNumber,
    pub summary: String,
}

/// Per-civilization economic and bookkeeping state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CivilizationManager {
    pub civ_id: ObjectId,
    pub credits: i64,
    pub research: i64,
    pub colony_ids: Vec<ObjectId>,
    pub global_bonuses: Vec<String>,
    pub sitrep: Vec<SitRepEntry>,
}

impl CivilizationManager {
    pub fn new(civ_id: ObjectId) -> Self {
        Self {
            civ_id,
            credits: 0,
            research: 0,
            colony_ids: Vec::new(),
            global_bonuses: Vec::new(),
            sitrep: Vec::new(),
        }
    }

    /// Trim collection capacity ahead of serialization. Contents are untouched.
    pub fn compact(&mut self) {
        self.colony_ids.shrink_to_fit();
        self.global_bonuses.shrink_to_fit();
        self.sitrep.shrink_to_fit();
    }
}

/// Managers keyed by the civilization they belong to.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CivilizationManagerSet {
    managers: BTreeMap<ObjectId, CivilizationManager>,
}

impl CivilizationManagerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, manager: CivilizationManager) -> Option<CivilizationManager> {
        self.managers.insert(manager.civ_id, manager)
    }

    pub fn get(&self, civ_id: ObjectId) -> Option<&CivilizationManager> {
        self.managers.get(&civ_id)
    }

    pub fn get_mut(&mut self, civ_id: ObjectId) -> Option<&mut CivilizationManager> {
        self.managers.get_mut(&civ_id)
    }

    pub fn clear(&mut self) {
        self.managers.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &CivilizationManager> {
        self.managers.values()
    }

    pub fn len(&self) -> usize {
        self.managers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.managers.is_empty()
    }

    pub fn to_vec(&self) -> Vec<CivilizationManager> {
        self.managers.values().cloned().collect()
    }
}

impl Extend<CivilizationManager> for CivilizationManagerSet {
    fn extend<T: IntoIterator<Item = CivilizationManager>>(&mut self, iter: T) {
        for manager in iter {
            self.insert(manager);
        }
    }
}

impl FromIterator<CivilizationManager> for CivilizationManagerSet {
    fn from_iter<T: IntoIterator<Item = CivilizationManager>>(iter: T) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}
