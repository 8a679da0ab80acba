use crate::domain::state::{OnOff, OpenClosed, State};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// The last known value per value name of a device or channel.
///
/// Used to suppress duplicate publications: protocols routinely redeliver identical values
/// through polling or re-announcements. Check and store happen under one lock.
#[derive(Debug, Default)]
pub struct StateMap {
    values: Mutex<HashMap<String, State>>,
}

impl StateMap {
    pub fn new() -> Self {
        StateMap::default()
    }

    /// Whether `candidate` would be a change for `value_name`.
    pub fn is_updated(&self, value_name: &str, candidate: &State) -> bool {
        is_updated(&self.lock(), value_name, candidate)
    }

    /// Stores `candidate` if it is a change and reports whether it was stored.
    pub fn apply(&self, value_name: &str, candidate: State) -> bool {
        let mut values = self.lock();
        if !is_updated(&values, value_name, &candidate) {
            return false;
        }

        values.insert(value_name.to_string(), candidate);
        true
    }

    pub fn get(&self, value_name: &str) -> Option<State> {
        self.lock().get(value_name).cloned()
    }

    /// Whether the value is currently `ON` or `OPEN`.
    pub fn is_on(&self, value_name: &str) -> bool {
        matches!(
            self.lock().get(value_name),
            Some(State::OnOff(OnOff::On)) | Some(State::OpenClosed(OpenClosed::Open))
        )
    }

    pub fn snapshot(&self) -> HashMap<String, State> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, State>> {
        self.values.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn is_updated(values: &HashMap<String, State>, value_name: &str, candidate: &State) -> bool {
    if candidate.is_undefined() {
        return false;
    }

    match values.get(value_name) {
        None => true,
        Some(previous) if previous.is_undefined() => true,
        Some(previous) => previous != candidate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::state::StateKind;
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    fn decimal(value: i64) -> State {
        State::Decimal(Decimal::from(value))
    }

    #[test]
    fn apply_only_accepts_changes() {
        let map = StateMap::new();

        let results = vec![
            map.apply("TEMPERATURE", decimal(21)),
            map.apply("TEMPERATURE", decimal(21)),
            map.apply("TEMPERATURE", decimal(22)),
        ];

        assert_eq!(results, vec![true, false, true]);
        assert_eq!(map.get("TEMPERATURE"), Some(decimal(22)));
    }

    #[test]
    fn undefined_is_never_stored() {
        let map = StateMap::new();
        map.apply("TEMPERATURE", decimal(21));

        assert!(!map.is_updated("TEMPERATURE", &State::Undefined));
        assert!(!map.apply("TEMPERATURE", State::Undefined));
        assert!(!map.apply("HUMIDITY", State::Undefined));

        assert_eq!(map.get("TEMPERATURE"), Some(decimal(21)));
        assert_eq!(map.get("HUMIDITY").map(|state| state.kind()), None);
    }

    #[test]
    fn value_names_are_tracked_independently() {
        let map = StateMap::new();

        assert!(map.apply("TEMPERATURE", decimal(21)));
        assert!(map.apply("HUMIDITY", decimal(21)));
        assert!(!map.apply("HUMIDITY", decimal(21)));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn a_kind_change_is_an_update() {
        let map = StateMap::new();
        map.apply("LEVEL", decimal(50));

        assert!(map.is_updated("LEVEL", &State::percent(50)));
    }

    #[test]
    fn is_on_reflects_the_stored_value() {
        let map = StateMap::new();
        assert!(!map.is_on("ON"));

        map.apply("ON", State::OnOff(OnOff::On));
        map.apply("CONTACT", State::OpenClosed(OpenClosed::Closed));

        assert!(map.is_on("ON"));
        assert!(!map.is_on("CONTACT"));
    }

    #[test]
    fn snapshot_is_a_copy() {
        let map = StateMap::new();
        map.apply("ON", State::OnOff(OnOff::On));

        let snapshot = map.snapshot();
        map.apply("ON", State::OnOff(OnOff::Off));

        assert_eq!(snapshot["ON"].kind(), StateKind::OnOff);
        assert_eq!(snapshot["ON"], State::OnOff(OnOff::On));
    }

    #[test]
    fn concurrent_applies_of_the_same_value_accept_it_once() {
        let map = Arc::new(StateMap::new());
        let accepted = Arc::new(AtomicUsize::new(0));

        let handles = (0..8)
            .map(|_| {
                let map = map.clone();
                let accepted = accepted.clone();
                thread::spawn(move || {
                    if map.apply("LEVEL", decimal(7)) {
                        accepted.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect::<Vec<_>>();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(accepted.load(Ordering::SeqCst), 1);
    }
}
