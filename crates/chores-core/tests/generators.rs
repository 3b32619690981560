use chores_core::clock::ManualClock;
use chores_core::model::{Direction, Priority, Todo};
use chores_core::reconcile::ListReconciler;
use chores_core::store::MemoryStore;
use chrono::{DateTime, FixedOffset, TimeZone};
use proptest::prelude::*;
use std::sync::Arc;

/// A user action against the to-do screen. Positions are seeds reduced modulo
/// the current row count when the action is applied.
#[derive(Debug, Clone)]
pub enum Action {
    Add(Priority),
    AddCompleted(Priority),
    Edit(usize, Priority),
    Check(usize),
    Uncheck(usize),
    Delete(usize),
    Undo,
    Show,
    Hide,
    SortPriority(Direction),
    SortName(Direction),
    SortCreated,
    Tick,
}

pub fn arb_priority() -> impl Strategy<Value = Priority> + Clone {
    prop_oneof![
        Just(Priority::Low),
        Just(Priority::Normal),
        Just(Priority::High)
    ]
}

pub fn arb_direction() -> impl Strategy<Value = Direction> + Clone {
    prop_oneof![Just(Direction::Ascending), Just(Direction::Descending)]
}

pub fn arb_action() -> impl Strategy<Value = Action> {
    prop_oneof![
        4 => arb_priority().prop_map(Action::Add),
        1 => arb_priority().prop_map(Action::AddCompleted),
        2 => (any::<usize>(), arb_priority()).prop_map(|(p, prio)| Action::Edit(p, prio)),
        3 => any::<usize>().prop_map(Action::Check),
        2 => any::<usize>().prop_map(Action::Uncheck),
        2 => any::<usize>().prop_map(Action::Delete),
        1 => Just(Action::Undo),
        1 => Just(Action::Show),
        1 => Just(Action::Hide),
        1 => arb_direction().prop_map(Action::SortPriority),
        1 => arb_direction().prop_map(Action::SortName),
        1 => Just(Action::SortCreated),
        1 => Just(Action::Tick),
    ]
}

pub fn epoch() -> DateTime<FixedOffset> {
    FixedOffset::east_opt(0)
        .unwrap()
        .with_ymd_and_hms(2024, 3, 1, 9, 0, 0)
        .unwrap()
}

/// Reconciler over a fresh in-memory store, driven by a manual clock.
pub fn harness() -> (
    ListReconciler<Todo>,
    Arc<MemoryStore<Todo>>,
    Arc<ManualClock>,
) {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(epoch()));
    let list = ListReconciler::<Todo>::new(store.clone()).with_clock(clock.clone());
    (list, store, clock)
}
