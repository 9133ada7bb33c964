//! Ambient simulation context.
//!
//! Each thread keeps its own stack of [`SimulationContext`] handles. Code deep
//! inside a turn resolves "the current simulation" with
//! [`SimulationContext::current`] instead of threading it through every call.
//! Several matches can be processed in parallel as long as each runs on its
//! own thread; the stacks never see each other.

use std::cell::RefCell;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicI32, AtomicU16, AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use tracing::debug;

use crate::civilization::{CivDatabase, CivilizationManagerSet};
use crate::claims::SectorClaimGrid;
use crate::diplomacy::{AgreementMatrix, DiplomacyMatrix, DiplomatSet};
use crate::ids::{ObjectId, TurnNumber};
use crate::objects::UniverseObjectSet;
use crate::options::GameOptions;

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<Arc<SimulationContext>>> = const { RefCell::new(Vec::new()) };
}

/// One simulation instance: a hosted match or a client's mirror of it.
///
/// Top-level collections sit behind [`ArcSwap`], so a replacement publishes a
/// whole new collection at once. Readers holding the previous `Arc` keep a
/// consistent view. Mutation of a single context is not synchronized; callers
/// serialize writers themselves, typically one worker thread per match.
pub struct SimulationContext {
    context_id: u64,
    civilizations: CivDatabase,
    options: GameOptions,
    is_multiplayer: bool,
    next_object_id: AtomicI32,
    turn_number: AtomicU16,
    managers: ArcSwap<CivilizationManagerSet>,
    objects: ArcSwap<UniverseObjectSet>,
    sector_claims: ArcSwap<SectorClaimGrid>,
    agreement_matrix: ArcSwap<AgreementMatrix>,
    diplomacy_data: ArcSwap<DiplomacyMatrix>,
    diplomats: ArcSwap<DiplomatSet>,
}

/// Read, replace and clone-then-modify accessors for one swappable collection.
macro_rules! swappable {
    ($field:ident, $replace:ident, $update:ident, $ty:ty) => {
        pub fn $field(&self) -> Arc<$ty> {
            self.$field.load_full()
        }

        pub fn $replace(&self, value: $ty) {
            self.$field.store(Arc::new(value));
        }

        pub fn $update<T>(&self, update: impl FnOnce(&mut $ty) -> T) -> T {
            let mut next = <$ty>::clone(&self.$field.load());
            let result = update(&mut next);
            self.$field.store(Arc::new(next));
            result
        }
    };
}

impl SimulationContext {
    pub fn new(
        civilizations: CivDatabase,
        options: GameOptions,
        is_multiplayer: bool,
    ) -> Arc<Self> {
        let context_id = NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed);
        debug!(
            target: "empire_sync::context",
            context_id,
            civilizations = civilizations.len(),
            is_multiplayer,
            "context.created"
        );
        Arc::new(Self {
            context_id,
            civilizations,
            options,
            is_multiplayer,
            next_object_id: AtomicI32::new(0),
            turn_number: AtomicU16::new(TurnNumber::UNDEFINED.value()),
            managers: ArcSwap::from_pointee(CivilizationManagerSet::new()),
            objects: ArcSwap::from_pointee(UniverseObjectSet::new()),
            sector_claims: ArcSwap::from_pointee(SectorClaimGrid::new()),
            agreement_matrix: ArcSwap::from_pointee(AgreementMatrix::new()),
            diplomacy_data: ArcSwap::from_pointee(DiplomacyMatrix::new()),
            diplomats: ArcSwap::from_pointee(DiplomatSet::new()),
        })
    }

    /// A new, empty context sharing this one's civilizations and options.
    pub fn empty_like(&self) -> Arc<Self> {
        Self::new(self.civilizations.clone(), self.options.clone(), self.is_multiplayer)
    }

    /// Process-unique id, for log correlation only.
    pub fn context_id(&self) -> u64 {
        self.context_id
    }

    pub fn civilizations(&self) -> &CivDatabase {
        &self.civilizations
    }

    pub fn options(&self) -> &GameOptions {
        &self.options
    }

    pub fn is_multiplayer(&self) -> bool {
        self.is_multiplayer
    }

    /// Next object id for this context. Never repeats, even across threads.
    ///
    /// # Panics
    ///
    /// When the non-negative `i32` id space is exhausted.
    pub fn generate_id(&self) -> ObjectId {
        match self
            .next_object_id
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |next| next.checked_add(1))
        {
            Ok(id) => ObjectId::new(id),
            Err(_) => panic!("object id space exhausted for context {}", self.context_id),
        }
    }

    pub fn turn_number(&self) -> TurnNumber {
        TurnNumber::from(self.turn_number.load(Ordering::Acquire))
    }

    pub fn set_turn_number(&self, turn: TurnNumber) {
        self.turn_number.store(turn.value(), Ordering::Release);
    }

    swappable!(managers, replace_managers, update_managers, CivilizationManagerSet);
    swappable!(objects, replace_objects, update_objects, UniverseObjectSet);
    swappable!(sector_claims, replace_sector_claims, update_sector_claims, SectorClaimGrid);
    swappable!(
        agreement_matrix,
        replace_agreement_matrix,
        update_agreement_matrix,
        AgreementMatrix
    );
    swappable!(diplomacy_data, replace_diplomacy_data, update_diplomacy_data, DiplomacyMatrix);
    swappable!(diplomats, replace_diplomats, update_diplomats, DiplomatSet);

    /// Called once received state has been installed.
    ///
    /// Moves the id generator past every id already in use so that locally
    /// generated ids cannot collide with received ones.
    pub fn on_deserialized(&self) {
        let highest = self
            .objects
            .load()
            .max_object_id()
            .into_iter()
            .chain(self.civilizations.iter().map(|civ| civ.civ_id))
            .max();
        if let Some(highest) = highest {
            let floor = highest.value().saturating_add(1);
            let previous = self.next_object_id.fetch_max(floor, Ordering::SeqCst);
            debug!(
                target: "empire_sync::context",
                context_id = self.context_id,
                previous,
                next = previous.max(floor),
                "context.ids_reserved"
            );
        }
    }

    /// Make `context` current on this thread until the matching [`pop`](Self::pop).
    ///
    /// Prefer [`enter`](Self::enter), which pops even when the caller unwinds.
    pub fn push(context: Arc<SimulationContext>) {
        CONTEXT_STACK.with(|stack| stack.borrow_mut().push(context));
    }

    /// Remove and return this thread's current context.
    pub fn pop() -> Option<Arc<SimulationContext>> {
        CONTEXT_STACK.with(|stack| stack.borrow_mut().pop())
    }

    pub fn current() -> Option<Arc<SimulationContext>> {
        CONTEXT_STACK.with(|stack| stack.borrow().last().cloned())
    }

    /// # Panics
    ///
    /// When no context has been pushed on this thread.
    pub fn expect_current() -> Arc<SimulationContext> {
        match Self::current() {
            Some(context) => context,
            None => panic!("no simulation context is current on this thread"),
        }
    }

    pub fn depth() -> usize {
        CONTEXT_STACK.with(|stack| stack.borrow().len())
    }

    /// Push `context` and return a guard that pops it when dropped.
    pub fn enter(context: &Arc<SimulationContext>) -> ContextScope {
        Self::push(Arc::clone(context));
        ContextScope {
            context: Arc::clone(context),
            _not_send: PhantomData,
        }
    }
}

impl fmt::Debug for SimulationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimulationContext")
            .field("context_id", &self.context_id)
            .field("turn_number", &self.turn_number())
            .field("civilizations", &self.civilizations.len())
            .field("is_multiplayer", &self.is_multiplayer)
            .finish_non_exhaustive()
    }
}

/// Keeps a context current for its lifetime, including during unwinding.
///
/// Tied to the thread whose stack it pushed onto.
#[must_use = "the context is popped as soon as the scope is dropped"]
pub struct ContextScope {
    context: Arc<SimulationContext>,
    _not_send: PhantomData<*const ()>,
}

impl ContextScope {
    pub fn context(&self) -> &Arc<SimulationContext> {
        &self.context
    }
}

impl Drop for ContextScope {
    fn drop(&mut self) {
        let popped = SimulationContext::pop();
        debug_assert!(
            popped.is_some_and(|top| Arc::ptr_eq(&top, &self.context)),
            "context stack popped out of order"
        );
    }
}

/// Run `work` with `context` current on the calling thread.
pub fn with_context<T>(context: &Arc<SimulationContext>, work: impl FnOnce() -> T) -> T {
    let _scope = SimulationContext::enter(context);
    work()
}
