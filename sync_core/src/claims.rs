use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::civilization::Civilization;
use crate::context::SimulationContext;
use crate::diplomacy::DiplomacyMatrix;
use crate::ids::ObjectId;
use crate::location::MapLocation;

/// Largest weight a single claim can carry.
pub const MAX_CLAIM_VALUE: i32 = 0xFF;

const OWNER_SHIFT: u32 = 24;
const X_SHIFT: u32 = 16;
const Y_SHIFT: u32 = 8;
const BYTE_MASK: u32 = 0xFF;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ClaimError {
    #[error("sector claim requires an owner")]
    MissingOwner,
}

/// A civilization's claim on a sector, packed into one 32-bit word.
///
/// Layout, most significant byte first: owner id, x, y, weight. Each component
/// is masked to its low byte when packed, so owner ids or coordinates above 255
/// wrap silently. Equality and hashing use the packed word.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SectorClaim(u32);

impl SectorClaim {
    pub fn new(owner_id: ObjectId, location: MapLocation, weight: i32) -> Result<Self, ClaimError> {
        if !owner_id.is_valid() {
            return Err(ClaimError::MissingOwner);
        }
        Ok(Self::pack(owner_id.value(), location.x, location.y, weight))
    }

    const fn pack(owner: i32, x: i32, y: i32, weight: i32) -> Self {
        let word = ((owner as u32 & BYTE_MASK) << OWNER_SHIFT)
            | ((x as u32 & BYTE_MASK) << X_SHIFT)
            | ((y as u32 & BYTE_MASK) << Y_SHIFT)
            | (weight as u32 & BYTE_MASK);
        Self(word)
    }

    pub const fn from_raw(word: u32) -> Self {
        Self(word)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub const fn owner_id(self) -> ObjectId {
        ObjectId::new(((self.0 >> OWNER_SHIFT) & BYTE_MASK) as i32)
    }

    pub const fn location(self) -> MapLocation {
        MapLocation::new(
            ((self.0 >> X_SHIFT) & BYTE_MASK) as i32,
            ((self.0 >> Y_SHIFT) & BYTE_MASK) as i32,
        )
    }

    pub const fn weight(self) -> i32 {
        (self.0 & BYTE_MASK) as i32
    }

    /// Resolves the owner through the calling thread's current context.
    ///
    /// `None` when no context is pushed or the id is unknown to it.
    pub fn owner(self) -> Option<Arc<Civilization>> {
        let context = SimulationContext::current()?;
        context.civilizations().get(self.owner_id()).cloned()
    }

    fn with_weight(self, weight: i32) -> Self {
        Self((self.0 & !BYTE_MASK) | (weight as u32 & BYTE_MASK))
    }
}

impl From<u32> for SectorClaim {
    fn from(word: u32) -> Self {
        Self::from_raw(word)
    }
}

impl From<SectorClaim> for u32 {
    fn from(claim: SectorClaim) -> Self {
        claim.raw()
    }
}

impl fmt::Debug for SectorClaim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SectorClaim")
            .field("owner_id", &self.owner_id().value())
            .field("location", &format_args!("{}", self.location()))
            .field("weight", &self.weight())
            .finish()
    }
}

/// Wrap a location the same way [`SectorClaim`] packs it.
fn packed_location(location: MapLocation) -> MapLocation {
    MapLocation::new(
        (location.x as u32 & BYTE_MASK) as i32,
        (location.y as u32 & BYTE_MASK) as i32,
    )
}

/// The owner id a claim would store. `INVALID` stays invalid.
fn packed_owner(owner_id: ObjectId) -> ObjectId {
    if !owner_id.is_valid() {
        return owner_id;
    }
    ObjectId::new((owner_id.value() as u32 & BYTE_MASK) as i32)
}

/// Every sector claim in the galaxy, indexed by sector and by claimant.
///
/// Locations are wrapped to the packed byte range on every call, so lookups
/// agree with what a claim decodes to.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<SectorClaim>", into = "Vec<SectorClaim>")]
pub struct SectorClaimGrid {
    by_location: BTreeMap<MapLocation, Vec<SectorClaim>>,
    by_owner: BTreeMap<ObjectId, Vec<SectorClaim>>,
}

impl SectorClaimGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `weight` to `owner_id`'s claim on `location`.
    ///
    /// Negative weights and invalid owners are ignored. The stored weight,
    /// accumulated or not, never exceeds [`MAX_CLAIM_VALUE`]. Returns the
    /// resulting claim.
    pub fn add_claim(
        &mut self,
        location: MapLocation,
        owner_id: ObjectId,
        weight: i32,
    ) -> Option<SectorClaim> {
        if weight < 0 || !owner_id.is_valid() {
            return None;
        }
        let location = packed_location(location);
        let existing = self.claim_of(location, owner_id);
        let total = existing
            .map_or(0, SectorClaim::weight)
            .saturating_add(weight)
            .min(MAX_CLAIM_VALUE);

        let claim = match existing {
            Some(previous) => {
                let updated = previous.with_weight(total);
                self.replace(previous, updated);
                updated
            }
            None => {
                let claim = SectorClaim::new(owner_id, location, total).ok()?;
                self.by_location.entry(location).or_default().push(claim);
                self.by_owner.entry(claim.owner_id()).or_default().push(claim);
                claim
            }
        };
        Some(claim)
    }

    fn claim_of(&self, location: MapLocation, owner_id: ObjectId) -> Option<SectorClaim> {
        let owner_byte = packed_owner(owner_id);
        self.claims_at(location)
            .iter()
            .copied()
            .find(|claim| claim.owner_id() == owner_byte)
    }

    fn replace(&mut self, previous: SectorClaim, updated: SectorClaim) {
        let indexes = [
            self.by_location.get_mut(&previous.location()),
            self.by_owner.get_mut(&previous.owner_id()),
        ];
        for claims in indexes.into_iter().flatten() {
            for slot in claims.iter_mut().filter(|claim| **claim == previous) {
                *slot = updated;
            }
        }
    }

    pub fn claims_at(&self, location: MapLocation) -> &[SectorClaim] {
        self.by_location
            .get(&packed_location(location))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Owner ids compare by their low byte, like the packed word.
    pub fn claims_by(&self, owner_id: ObjectId) -> &[SectorClaim] {
        self.by_owner
            .get(&packed_owner(owner_id))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// At least one civilization claims `location`, disputed or not.
    pub fn is_owned(&self, location: MapLocation) -> bool {
        !self.claims_at(location).is_empty()
    }

    pub fn is_disputed(&self, location: MapLocation) -> bool {
        self.claims_at(location).len() > 1
    }

    /// The sole claimant of `location`. Disputed sectors have no owner.
    pub fn owner_id(&self, location: MapLocation) -> Option<ObjectId> {
        match self.claims_at(location) {
            [claim] => Some(claim.owner_id()),
            _ => None,
        }
    }

    /// Resolves [`Self::owner_id`] through the current context.
    pub fn owner(&self, location: MapLocation) -> Option<Arc<Civilization>> {
        match self.claims_at(location) {
            [claim] => claim.owner(),
            _ => None,
        }
    }

    /// The owner of `location` as far as `as_seen_by` can tell.
    ///
    /// Only claims by `as_seen_by` and civilizations it has met are visible.
    pub fn perceived_owner(
        &self,
        location: MapLocation,
        as_seen_by: ObjectId,
        diplomacy: &DiplomacyMatrix,
    ) -> Option<ObjectId> {
        let mut visible = self.visible_claims(location, as_seen_by, diplomacy);
        match (visible.next(), visible.next()) {
            (Some(claim), None) => Some(claim.owner_id()),
            _ => None,
        }
    }

    /// Whether `according_to` can see more than one claim on `location`.
    pub fn is_disputed_for(
        &self,
        location: MapLocation,
        according_to: ObjectId,
        diplomacy: &DiplomacyMatrix,
    ) -> bool {
        self.visible_claims(location, according_to, diplomacy).nth(1).is_some()
    }

    /// Whether `civ_id` claims `location`, optionally restricted to what
    /// `as_seen_by` knows about.
    pub fn is_claimed_by(
        &self,
        location: MapLocation,
        civ_id: ObjectId,
        as_seen_by: Option<ObjectId>,
        diplomacy: &DiplomacyMatrix,
    ) -> bool {
        let owner_byte = packed_owner(civ_id);
        let claimed = self
            .claims_at(location)
            .iter()
            .any(|claim| claim.owner_id() == owner_byte);
        match as_seen_by {
            Some(observer) => claimed && diplomacy.is_contact_made(observer, civ_id),
            None => claimed,
        }
    }

    fn visible_claims<'a>(
        &'a self,
        location: MapLocation,
        as_seen_by: ObjectId,
        diplomacy: &'a DiplomacyMatrix,
    ) -> impl Iterator<Item = &'a SectorClaim> + 'a {
        self.claims_at(location)
            .iter()
            .filter(move |claim| diplomacy.is_contact_made(as_seen_by, claim.owner_id()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &SectorClaim> {
        self.by_location.values().flatten()
    }

    pub fn len(&self) -> usize {
        self.by_location.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_location.is_empty()
    }

    pub fn clear(&mut self) {
        self.by_location.clear();
        self.by_owner.clear();
    }
}

// The owner index is derived, so only the per-sector lists take part.
impl PartialEq for SectorClaimGrid {
    fn eq(&self, other: &Self) -> bool {
        self.by_location == other.by_location
    }
}

impl Eq for SectorClaimGrid {}

impl From<Vec<SectorClaim>> for SectorClaimGrid {
    fn from(claims: Vec<SectorClaim>) -> Self {
        let mut grid = Self::new();
        for claim in claims {
            grid.add_claim(claim.location(), claim.owner_id(), claim.weight());
        }
        grid
    }
}

impl From<SectorClaimGrid> for Vec<SectorClaim> {
    fn from(grid: SectorClaimGrid) -> Self {
        grid.by_location.into_values().flatten().collect()
    }
}
