//! # Counter
//!
//! A single integer count changed by three actions.
//!
//! - `increment`: `count + 1`
//! - `decrement`: `count - 1`
//! - `multiplyByLast(m)`: `count * m`, where the caller passes the count it
//!   read just before dispatching, so the front end's "× last" squares it
//!
//! Every transition builds a new [`CounterState`] from the old one; the store
//! commits the result. Arithmetic saturates at the `i64` bounds.
//!
//! ## Example
//!
//! ```no_run
//! use counter::{CounterAction, CounterEnvironment, CounterReducer, CounterState};
//! use tally_runtime::Store;
//!
//! # async fn example() -> Result<(), tally_runtime::StoreError> {
//! let store = Store::new(CounterState::default(), CounterReducer, CounterEnvironment);
//!
//! store.send(CounterAction::Increment).await?;
//! store.dispatch("increment", None).await?;
//! counter::multiply_by_last(&store).await?;
//!
//! let count = store.state(|s| s.count).await;
//! assert_eq!(count, 4);
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};
use tally_core::{effect::Effect, reducer::Reducer, smallvec, SmallVec};
use tally_macros::Action;
use tally_runtime::{EffectHandle, Store, StoreError};

/// Line commands for the terminal front end
pub mod command;

/// Environment-variable configuration
pub mod config;

/// Counter state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CounterState {
    /// Current count value
    pub count: i64,
}

impl CounterState {
    /// State with the given count
    #[must_use]
    pub const fn new(count: i64) -> Self {
        Self { count }
    }

    /// New state with `count + 1`
    #[must_use]
    pub const fn incremented(&self) -> Self {
        Self::new(self.count.saturating_add(1))
    }

    /// New state with `count - 1`
    #[must_use]
    pub const fn decremented(&self) -> Self {
        Self::new(self.count.saturating_sub(1))
    }

    /// New state with `count * multiplier`
    #[must_use]
    pub const fn multiplied_by(&self, multiplier: i64) -> Self {
        Self::new(self.count.saturating_mul(multiplier))
    }
}

/// Counter actions
///
/// Also accepted under the names earlier versions of the app dispatched:
/// `addCount`/`ADD_COUNT`, `subCount`/`SUB_COUNT`, `multiCount`/`MULTI_COUNT`.
#[derive(Action, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterAction {
    /// Add one
    #[action(alias = "addCount", alias = "ADD_COUNT")]
    Increment,

    /// Subtract one
    #[action(alias = "subCount", alias = "SUB_COUNT")]
    Decrement,

    /// Multiply by the given value, normally the count observed before dispatch
    #[action(alias = "multiCount", alias = "MULTI_COUNT")]
    MultiplyByLast(i64),
}

/// Counter environment
///
/// The counter is a pure state machine and needs no dependencies.
#[derive(Debug, Clone, Copy, Default)]
pub struct CounterEnvironment;

/// Counter reducer
///
/// Replaces the committed state with the value the matching transition returns.
#[derive(Debug, Clone, Copy, Default)]
pub struct CounterReducer;

impl Reducer for CounterReducer {
    type State = CounterState;
    type Action = CounterAction;
    type Environment = CounterEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        _environment: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        *state = match action {
            CounterAction::Increment => state.incremented(),
            CounterAction::Decrement => state.decremented(),
            CounterAction::MultiplyByLast(multiplier) => state.multiplied_by(multiplier),
        };

        // Pure state machine - no side effects
        smallvec![Effect::None]
    }
}

/// Store specialised to the counter
pub type CounterStore = Store<CounterState, CounterAction, CounterEnvironment, CounterReducer>;

/// Dispatch `multiplyByLast` with the count read right before the dispatch
///
/// # Errors
///
/// Returns [`StoreError::ShutdownInProgress`] if the store is shutting down.
pub async fn multiply_by_last(store: &CounterStore) -> Result<EffectHandle, StoreError> {
    let last = store.state(|s| s.count).await;
    store.send(CounterAction::MultiplyByLast(last)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tally_core::action::{ActionError, Envelope, NamedAction};
    use tally_testing::{assertions, ReducerTest};

    #[test]
    fn test_increment() {
        ReducerTest::new(CounterReducer)
            .with_env(CounterEnvironment)
            .given_state(CounterState::default())
            .when_action(CounterAction::Increment)
            .then_state(|state| assert_eq!(state.count, 1))
            .then_effects(|effects| assertions::assert_no_effects(effects))
            .run();
    }

    #[test]
    fn test_decrement() {
        ReducerTest::new(CounterReducer)
            .with_env(CounterEnvironment)
            .given_state(CounterState::new(5))
            .when_action(CounterAction::Decrement)
            .then_state(|state| assert_eq!(state.count, 4))
            .run();
    }

    #[test]
    fn test_multiply_by_last() {
        ReducerTest::new(CounterReducer)
            .with_env(CounterEnvironment)
            .given_state(CounterState::new(-3))
            .when_action(CounterAction::MultiplyByLast(-3))
            .then_state(|state| assert_eq!(state.count, 9))
            .run();
    }

    #[test]
    fn test_documented_scenario() {
        ReducerTest::new(CounterReducer)
            .with_env(CounterEnvironment)
            .given_state(CounterState::default())
            .when_actions([
                CounterAction::Increment,
                CounterAction::Increment,
                CounterAction::MultiplyByLast(2),
                CounterAction::Decrement,
            ])
            .then_state(|state| assert_eq!(state.count, 3))
            .then_effects(|effects| assertions::assert_effects_count(effects, 4))
            .run();
    }

    #[test]
    fn test_transitions_leave_input_untouched() {
        let before = CounterState::new(7);

        let after = before.incremented().multiplied_by(3).decremented();

        assert_eq!(before, CounterState::new(7));
        assert_eq!(after, CounterState::new(23));
    }

    #[test]
    fn test_saturates_at_bounds() {
        assert_eq!(CounterState::new(i64::MAX).incremented().count, i64::MAX);
        assert_eq!(CounterState::new(i64::MIN).decremented().count, i64::MIN);
        assert_eq!(CounterState::new(i64::MAX).multiplied_by(2).count, i64::MAX);
        assert_eq!(CounterState::new(i64::MIN).multiplied_by(i64::MIN).count, i64::MAX);
    }

    #[test]
    fn test_action_names() {
        assert_eq!(CounterAction::Increment.name(), "increment");
        assert_eq!(CounterAction::Decrement.name(), "decrement");
        assert_eq!(CounterAction::MultiplyByLast(2).name(), "multiplyByLast");
        assert_eq!(
            CounterAction::known_names(),
            &["increment", "decrement", "multiplyByLast"]
        );
    }

    #[test]
    fn test_legacy_action_names() {
        let cases = [
            (Envelope::new("addCount"), CounterAction::Increment),
            (Envelope::new("ADD_COUNT"), CounterAction::Increment),
            (Envelope::new("subCount"), CounterAction::Decrement),
            (Envelope::new("SUB_COUNT"), CounterAction::Decrement),
            (Envelope::new("multiCount").with_payload(3), CounterAction::MultiplyByLast(3)),
            (Envelope::new("MULTI_COUNT").with_payload(3), CounterAction::MultiplyByLast(3)),
        ];

        for (envelope, expected) in cases {
            assert_eq!(
                CounterAction::from_envelope(&envelope).unwrap(),
                Some(expected),
                "{}",
                envelope.kind
            );
        }
    }

    #[test]
    fn test_multiply_requires_integer_payload() {
        for payload in [None, Some(json!(1.5)), Some(json!("2")), Some(json!(null))] {
            let envelope = Envelope {
                kind: "multiplyByLast".to_string(),
                payload,
            };
            assert!(matches!(
                CounterAction::from_envelope(&envelope),
                Err(ActionError::InvalidArgument { action: "multiplyByLast", .. })
            ));
        }
    }

    #[test]
    fn test_unknown_action_name() {
        assert_eq!(CounterAction::from_envelope(&Envelope::new("noop")).unwrap(), None);
    }

    #[test]
    fn test_state_serialization() {
        let json = serde_json::to_value(CounterState::new(12)).unwrap();
        assert_eq!(json, json!({ "count": 12 }));

        let state: CounterState = serde_json::from_value(json!({ "count": -4 })).unwrap();
        assert_eq!(state, CounterState::new(-4));
    }
}
