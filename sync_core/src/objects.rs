use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ids::ObjectId;
use crate::location::MapLocation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    StarSystem,
    Colony,
    Fleet,
    Station,
    Agent,
}

/// Anything in the universe addressable by [`ObjectId`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniverseObject {
    pub object_id: ObjectId,
    pub owner_id: ObjectId,
    pub location: MapLocation,
    pub kind: ObjectKind,
    pub name: String,
}

/// Every live object of a simulation, keyed by id.
///
/// Serialized as a flat list in id order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<UniverseObject>", into = "Vec<UniverseObject>")]
pub struct UniverseObjectSet {
    objects: BTreeMap<ObjectId, UniverseObject>,
}

impl UniverseObjectSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Objects with an invalid id are not addressable and are dropped.
    pub fn insert(&mut self, object: UniverseObject) -> Option<UniverseObject> {
        if !object.object_id.is_valid() {
            return None;
        }
        self.objects.insert(object.object_id, object)
    }

    pub fn get(&self, object_id: ObjectId) -> Option<&UniverseObject> {
        self.objects.get(&object_id)
    }

    pub fn remove(&mut self, object_id: ObjectId) -> Option<UniverseObject> {
        self.objects.remove(&object_id)
    }

    pub fn contains(&self, object_id: ObjectId) -> bool {
        self.objects.contains_key(&object_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &UniverseObject> {
        self.objects.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.objects.keys().copied()
    }

    pub fn owned_by(&self, owner_id: ObjectId) -> impl Iterator<Item = &UniverseObject> {
        self.objects
            .values()
            .filter(move |object| object.owner_id == owner_id)
    }

    pub fn max_object_id(&self) -> Option<ObjectId> {
        self.objects.keys().next_back().copied()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

impl From<Vec<UniverseObject>> for UniverseObjectSet {
    fn from(objects: Vec<UniverseObject>) -> Self {
        let mut set = Self::new();
        for object in objects {
            set.insert(object);
        }
        set
    }
}

impl From<UniverseObjectSet> for Vec<UniverseObject> {
    fn from(set: UniverseObjectSet) -> Self {
        set.objects.into_values().collect()
    }
}
