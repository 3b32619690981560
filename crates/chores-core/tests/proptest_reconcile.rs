use chores_core::controller::TodoController;
use chores_core::model::{Direction, Priority, Record, SortKey, Todo};
use chores_core::reconcile::CompletedItems;
use chrono::Duration as TimeDelta;
use proptest::prelude::*;
use std::collections::HashSet;
use std::time::Duration;

#[path = "generators.rs"]
mod generators;
use generators::*;

const WAIT: Duration = Duration::from_secs(5);

fn ids(items: &[Todo]) -> HashSet<String> {
    items.iter().map(|t| t.id.clone()).collect()
}

/// Apply one action through the controller. Reloads are left in flight, so
/// later actions write while a query is outstanding.
fn perform(c: &mut TodoController, clock: &ManualClockHandle, action: &Action, n: &mut usize) {
    let len = c.list().len();
    match *action {
        Action::Add(priority) => {
            *n += 1;
            c.add(&format!("task {n}"), priority).unwrap();
        }
        Action::AddCompleted(priority) => {
            *n += 1;
            let now = c.list().now();
            let todo = Todo::new(&format!("done {n}"), priority, now).with_completed_at(Some(now));
            c.list_mut().insert(todo, true).unwrap();
        }
        Action::Edit(seed, priority) if len > 0 => {
            c.edit(seed % len, "edited", priority).unwrap();
        }
        Action::Check(seed) if len > 0 => {
            c.toggle(seed % len, true).unwrap();
        }
        Action::Uncheck(seed) if len > 0 => {
            c.toggle(seed % len, false).unwrap();
        }
        Action::Delete(seed) if len > 0 => {
            c.delete(seed % len).unwrap();
        }
        Action::Undo => {
            c.undo_delete().unwrap();
        }
        Action::Show => c.set_completed(CompletedItems::Shown),
        Action::Hide => c.set_completed(CompletedItems::Hidden),
        Action::SortPriority(direction) => c.sort(SortKey::Priority, direction),
        Action::SortName(direction) => c.sort(SortKey::Name, direction),
        Action::SortCreated => c.sort(SortKey::Created, Direction::Ascending),
        Action::Tick => clock.advance(TimeDelta::seconds(1)),
        Action::Edit(..) | Action::Check(_) | Action::Uncheck(_) | Action::Delete(_) => {}
    }
}

type ManualClockHandle = std::sync::Arc<chores_core::clock::ManualClock>;

proptest! {
    #![proptest_config(proptest::test_runner::Config::with_cases(64))]

    #[test]
    fn collections_stay_consistent(actions in prop::collection::vec(arb_action(), 1..40)) {
        let (list, store, clock) = harness();
        let mut c = TodoController::new(list);
        let mut n = 0;

        for action in &actions {
            perform(&mut c, &clock, action, &mut n);
            let problems = c.list().violations();
            prop_assert!(problems.is_empty(), "after {:?}: {:?}", action, problems);
        }

        prop_assert!(c.list_mut().wait_pending(WAIT));
        let local: HashSet<String> = ids(c.list().visible())
            .union(&ids(c.list().completed()))
            .cloned()
            .collect();
        let saved = store.snapshot();
        prop_assert_eq!(local, ids(&saved));
        prop_assert_eq!(
            ids(c.list().completed()),
            saved.iter().filter(|t| t.is_completed()).map(|t| t.id.clone()).collect::<HashSet<_>>()
        );
    }

    #[test]
    fn ascending_priority_sort_is_stable_and_idempotent(
        priorities in prop::collection::vec(arb_priority(), 0..30)
    ) {
        let (mut list, _store, clock) = harness();
        for (i, priority) in priorities.iter().enumerate() {
            let todo = Todo::with_id(&format!("td-{i:03}"), &format!("t{i}"), *priority, list.now());
            list.insert(todo, false).unwrap();
            clock.advance(TimeDelta::seconds(1));
        }

        list.sort_by_priority(CompletedItems::Hidden, Direction::Ascending);
        let once: Vec<Todo> = list.visible().to_vec();
        for pair in once.windows(2) {
            prop_assert!(pair[0].priority <= pair[1].priority);
            if pair[0].priority == pair[1].priority {
                prop_assert!(pair[0].id < pair[1].id);
            }
        }

        list.sort_by_priority(CompletedItems::Hidden, Direction::Ascending);
        prop_assert_eq!(list.visible(), once.as_slice());
    }

    #[test]
    fn complete_then_incomplete_restores_the_row(
        priorities in prop::collection::vec(arb_priority(), 1..12),
        seed in any::<usize>(),
    ) {
        let (list, _store, _clock) = harness();
        let mut c = TodoController::new(list);
        for (i, priority) in priorities.iter().enumerate() {
            c.add(&format!("t{i}"), *priority).unwrap();
        }
        let before = c.list().visible().to_vec();
        let position = seed % before.len();

        let done = c.toggle(position, true).unwrap();
        prop_assert!(done.is_completed());
        prop_assert!(c.list().position_of(&done.id).is_none());
        prop_assert_eq!(c.list().completed().len(), 1);

        let active = c.list_mut().mark_incomplete(position, &done).unwrap();
        prop_assert!(!active.is_completed());
        prop_assert_eq!(c.list().visible(), before.as_slice());
        prop_assert!(c.list().completed().is_empty());
    }

    #[test]
    fn hide_then_show_restores_every_item(
        flags in prop::collection::vec(any::<bool>(), 0..20)
    ) {
        let (list, _store, _clock) = harness();
        let mut c = TodoController::new(list);
        c.set_completed(CompletedItems::Shown);
        for (i, _) in flags.iter().enumerate() {
            c.add(&format!("t{i}"), Priority::Normal).unwrap();
        }
        for (i, complete) in flags.iter().enumerate() {
            if *complete {
                c.toggle(i, true).unwrap();
            }
        }
        let completed_order: Vec<String> =
            c.list().completed().iter().map(|t| t.id.clone()).collect();
        let everything = ids(c.list().visible());

        c.set_completed(CompletedItems::Hidden);
        prop_assert!(c.list().visible().iter().all(|t| !t.is_completed()));

        c.set_completed(CompletedItems::Shown);
        prop_assert_eq!(ids(c.list().visible()), everything);
        let active = c.list().len() - completed_order.len();
        let tail: Vec<String> =
            c.list().visible()[active..].iter().map(|t| t.id.clone()).collect();
        prop_assert_eq!(tail, completed_order);
        prop_assert!(c.list().violations().is_empty());
    }
}
