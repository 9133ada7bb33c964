use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ids::{ObjectId, TurnNumber};

pub const REGARD_MIN: i32 = 0;
pub const REGARD_MAX: i32 = 1000;
pub const REGARD_DEFAULT: i32 = 500;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ForeignPowerStatus {
    #[default]
    NoContact,
    Neutral,
    Peace,
    Friendly,
    Affiliated,
    Allied,
    AtWar,
}

/// One direction of the relationship between two civilizations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiplomacyData {
    pub owner_id: ObjectId,
    pub counterparty_id: ObjectId,
    pub regard: i32,
    pub trust: i32,
    pub contact_turn: TurnNumber,
    pub status: ForeignPowerStatus,
    pub last_status_change: TurnNumber,
}

impl DiplomacyData {
    pub fn new(owner_id: ObjectId, counterparty_id: ObjectId) -> Self {
        Self {
            owner_id,
            counterparty_id,
            regard: REGARD_DEFAULT,
            trust: REGARD_DEFAULT,
            contact_turn: TurnNumber::UNDEFINED,
            status: ForeignPowerStatus::NoContact,
            last_status_change: TurnNumber::UNDEFINED,
        }
    }

    pub fn is_contact_made(&self) -> bool {
        self.status != ForeignPowerStatus::NoContact
    }

    pub fn at_war(&self) -> bool {
        self.status == ForeignPowerStatus::AtWar
    }

    pub fn set_status(&mut self, status: ForeignPowerStatus, turn: TurnNumber) {
        if self.status != status {
            self.status = status;
            self.last_status_change = turn;
        }
    }

    pub fn adjust_regard(&mut self, delta: i32) {
        self.regard = self.regard.saturating_add(delta).clamp(REGARD_MIN, REGARD_MAX);
    }
}

/// Values keyed by an ordered `(owner, counterparty)` civilization pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CivilizationPairedMap<T> {
    entries: BTreeMap<(ObjectId, ObjectId), T>,
}

impl<T> Default for CivilizationPairedMap<T> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<T> CivilizationPairedMap<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, owner_id: ObjectId, counterparty_id: ObjectId) -> Option<&T> {
        self.entries.get(&(owner_id, counterparty_id))
    }

    pub fn get_mut(&mut self, owner_id: ObjectId, counterparty_id: ObjectId) -> Option<&mut T> {
        self.entries.get_mut(&(owner_id, counterparty_id))
    }

    pub fn set(&mut self, owner_id: ObjectId, counterparty_id: ObjectId, value: T) -> Option<T> {
        self.entries.insert((owner_id, counterparty_id), value)
    }

    pub fn remove(&mut self, owner_id: ObjectId, counterparty_id: ObjectId) -> Option<T> {
        self.entries.remove(&(owner_id, counterparty_id))
    }

    pub fn contains(&self, owner_id: ObjectId, counterparty_id: ObjectId) -> bool {
        self.entries.contains_key(&(owner_id, counterparty_id))
    }

    pub fn values_for_owner(&self, owner_id: ObjectId) -> impl Iterator<Item = &T> {
        self.entries
            .range((owner_id, ObjectId::INVALID)..)
            .take_while(move |((owner, _), _)| *owner == owner_id)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = ((ObjectId, ObjectId), &T)> {
        self.entries.iter().map(|(key, value)| (*key, value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub type DiplomacyMatrix = CivilizationPairedMap<DiplomacyData>;

impl CivilizationPairedMap<DiplomacyData> {
    /// A civilization is always in contact with itself.
    pub fn is_contact_made(&self, owner_id: ObjectId, counterparty_id: ObjectId) -> bool {
        owner_id == counterparty_id
            || self
                .get(owner_id, counterparty_id)
                .is_some_and(DiplomacyData::is_contact_made)
    }
}

/// A diplomat's view of one other civilization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignPower {
    pub owner_id: ObjectId,
    pub counterparty_id: ObjectId,
    pub diplomacy_data: DiplomacyData,
    pub is_embargo_in_place: bool,
}

impl ForeignPower {
    pub fn new(owner_id: ObjectId, counterparty_id: ObjectId) -> Self {
        Self {
            owner_id,
            counterparty_id,
            diplomacy_data: DiplomacyData::new(owner_id, counterparty_id),
            is_embargo_in_place: false,
        }
    }

    pub fn is_contact_made(&self) -> bool {
        self.diplomacy_data.is_contact_made()
    }

    pub fn make_contact(&mut self, turn: TurnNumber) {
        if self.is_contact_made() {
            return;
        }
        self.diplomacy_data.contact_turn = turn;
        self.diplomacy_data.set_status(ForeignPowerStatus::Neutral, turn);
    }
}

/// The diplomatic apparatus of a single civilization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diplomat {
    pub owner_id: ObjectId,
    pub seat_of_government_id: ObjectId,
    foreign_powers: BTreeMap<ObjectId, ForeignPower>,
}

impl Diplomat {
    pub fn new(owner_id: ObjectId) -> Self {
        Self {
            owner_id,
            seat_of_government_id: ObjectId::INVALID,
            foreign_powers: BTreeMap::new(),
        }
    }

    pub fn foreign_power(&self, counterparty_id: ObjectId) -> Option<&ForeignPower> {
        self.foreign_powers.get(&counterparty_id)
    }

    /// Returns the view of `counterparty_id`, creating it on first access.
    ///
    /// A diplomat has no foreign power for its own civilization.
    pub fn ensure_foreign_power(&mut self, counterparty_id: ObjectId) -> Option<&mut ForeignPower> {
        if counterparty_id == self.owner_id || !counterparty_id.is_valid() {
            return None;
        }
        let owner_id = self.owner_id;
        Some(
            self.foreign_powers
                .entry(counterparty_id)
                .or_insert_with(|| ForeignPower::new(owner_id, counterparty_id)),
        )
    }

    pub fn ensure_foreign_powers(&mut self, civ_ids: impl IntoIterator<Item = ObjectId>) {
        for civ_id in civ_ids {
            self.ensure_foreign_power(civ_id);
        }
    }

    pub fn foreign_powers(&self) -> impl Iterator<Item = &ForeignPower> {
        self.foreign_powers.values()
    }
}

/// Diplomats keyed by owning civilization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiplomatSet {
    diplomats: BTreeMap<ObjectId, Diplomat>,
}

impl DiplomatSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, diplomat: Diplomat) -> Option<Diplomat> {
        self.diplomats.insert(diplomat.owner_id, diplomat)
    }

    pub fn get(&self, owner_id: ObjectId) -> Option<&Diplomat> {
        self.diplomats.get(&owner_id)
    }

    pub fn get_mut(&mut self, owner_id: ObjectId) -> Option<&mut Diplomat> {
        self.diplomats.get_mut(&owner_id)
    }

    pub fn clear(&mut self) {
        self.diplomats.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diplomat> {
        self.diplomats.values()
    }

    pub fn len(&self) -> usize {
        self.diplomats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diplomats.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClauseType {
    NonAggression,
    OpenBorders,
    TradePact,
    ResearchPact,
    Affiliation,
    Alliance,
    Membership,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agreement {
    pub sender_id: ObjectId,
    pub recipient_id: ObjectId,
    pub clauses: Vec<ClauseType>,
    pub start_turn: TurnNumber,
}

impl Agreement {
    pub fn has_clause(&self, clause: ClauseType) -> bool {
        self.clauses.contains(&clause)
    }
}

/// Active agreements between unordered civilization pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgreementMatrix {
    map: CivilizationPairedMap<Vec<Agreement>>,
}

fn ordered(first: ObjectId, second: ObjectId) -> (ObjectId, ObjectId) {
    if first <= second {
        (first, second)
    } else {
        (second, first)
    }
}

impl AgreementMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_agreement(&mut self, agreement: Agreement) {
        let (first, second) = ordered(agreement.sender_id, agreement.recipient_id);
        match self.map.get_mut(first, second) {
            Some(active) => active.push(agreement),
            None => {
                self.map.set(first, second, vec![agreement]);
            }
        }
    }

    pub fn agreements_between(&self, first: ObjectId, second: ObjectId) -> &[Agreement] {
        let (first, second) = ordered(first, second);
        self.map
            .get(first, second)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn is_agreement_active(
        &self,
        first: ObjectId,
        second: ObjectId,
        clause: ClauseType,
    ) -> bool {
        self.find_agreement(first, second, |agreement| agreement.has_clause(clause))
            .is_some()
    }

    pub fn find_agreement<P>(
        &self,
        first: ObjectId,
        second: ObjectId,
        predicate: P,
    ) -> Option<&Agreement>
    where
        P: Fn(&Agreement) -> bool,
    {
        self.agreements_between(first, second)
            .iter()
            .find(|agreement| predicate(*agreement))
    }

    pub fn remove(&mut self, agreement: &Agreement) -> bool {
        let (first, second) = ordered(agreement.sender_id, agreement.recipient_id);
        let Some(active) = self.map.get_mut(first, second) else {
            return false;
        };
        let before = active.len();
        active.retain(|existing| existing != agreement);
        let removed = active.len() != before;
        if active.is_empty() {
            self.map.remove(first, second);
        }
        removed
    }

    pub fn iter(&self) -> impl Iterator<Item = &Agreement> {
        self.map.iter().flat_map(|(_, agreements)| agreements.iter())
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(value: i32) -> ObjectId {
        ObjectId::new(value)
    }

    #[test]
    fn diplomat_has_no_view_of_itself() {
        let mut diplomat = Diplomat::new(id(1));
        assert!(diplomat.ensure_foreign_power(id(1)).is_none());
        assert!(diplomat.ensure_foreign_power(ObjectId::INVALID).is_none());
        diplomat.ensure_foreign_powers([id(0), id(1), id(2)]);
        let counterparties: Vec<_> = diplomat
            .foreign_powers()
            .map(|fp| fp.counterparty_id)
            .collect();
        assert_eq!(counterparties, vec![id(0), id(2)]);
    }

    #[test]
    fn make_contact_records_turn_once() {
        let mut fp = ForeignPower::new(id(0), id(1));
        assert!(!fp.is_contact_made());
        fp.make_contact(TurnNumber::new(4));
        fp.make_contact(TurnNumber::new(9));
        assert!(fp.is_contact_made());
        assert_eq!(fp.diplomacy_data.contact_turn, TurnNumber::new(4));
        assert_eq!(fp.diplomacy_data.last_status_change, TurnNumber::new(4));
    }

    #[test]
    fn paired_map_is_directional() {
        let mut matrix = DiplomacyMatrix::new();
        matrix.set(id(0), id(1), DiplomacyData::new(id(0), id(1)));
        matrix.set(id(0), id(2), DiplomacyData::new(id(0), id(2)));
        matrix.set(id(1), id(0), DiplomacyData::new(id(1), id(0)));
        assert!(matrix.contains(id(0), id(1)));
        assert!(!matrix.contains(id(2), id(0)));
        assert_eq!(matrix.values_for_owner(id(0)).count(), 2);
        assert_eq!(matrix.values_for_owner(id(1)).count(), 1);
    }

    #[test]
    fn regard_is_bounded() {
        let mut data = DiplomacyData::new(id(0), id(1));
        data.adjust_regard(10_000);
        assert_eq!(data.regard, REGARD_MAX);
        data.adjust_regard(-20_000);
        assert_eq!(data.regard, REGARD_MIN);
        data.adjust_regard(i32::MIN);
        assert_eq!(data.regard, REGARD_MIN);
        data.adjust_regard(i32::MAX);
        assert_eq!(data.regard, REGARD_MAX);
    }

    #[test]
    fn agreements_ignore_pair_order() {
        let mut agreements = AgreementMatrix::new();
        let pact = Agreement {
            sender_id: id(3),
            recipient_id: id(1),
            clauses: vec![ClauseType::TradePact],
            start_turn: TurnNumber::new(2),
        };
        agreements.add_agreement(pact.clone());
        assert!(agreements.is_agreement_active(id(1), id(3), ClauseType::TradePact));
        assert!(!agreements.is_agreement_active(id(1), id(3), ClauseType::Alliance));
        assert_eq!(agreements.len(), 1);

        assert!(agreements.remove(&pact));
        assert!(!agreements.remove(&pact));
        assert!(agreements.is_empty());
    }
}
