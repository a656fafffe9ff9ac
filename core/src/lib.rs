//! # Tally Core
//!
//! Core traits and types for Tally stores.
//!
//! A Tally application keeps one committed state value and changes it only by
//! dispatching actions through a reducer.
//!
//! ## Core Concepts
//!
//! - **State**: Owned, cloneable domain data
//! - **Action**: Every input a reducer understands
//! - **Reducer**: Pure function `(State, Action, Environment) → (State, Effects)`
//! - **Effect**: Side effect descriptions (not execution)
//! - **Envelope**: The `{ type, payload }` wire form used to dispatch by name
//!
//! ## Example
//!
//! ```ignore
//! use tally_core::*;
//!
//! #[derive(Clone, Debug, Default)]
//! struct CounterState {
//!     count: i64,
//! }
//!
//! impl Reducer for CounterReducer {
//!     type State = CounterState;
//!     type Action = CounterAction;
//!     type Environment = CounterEnvironment;
//!
//!     fn reduce(
//!         &self,
//!         state: &mut CounterState,
//!         action: CounterAction,
//!         env: &CounterEnvironment,
//!     ) -> SmallVec<[Effect<CounterAction>; 4]> {
//!         *state = state.incremented();
//!         smallvec![Effect::None]
//!     }
//! }
//! ```

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use serde::{Deserialize, Serialize};
pub use smallvec::{smallvec, SmallVec};

/// Named actions and the envelope wire form
pub mod action;

/// Reducer module - The core trait for business logic
///
/// Reducers are pure functions: `(State, Action, Environment) → (State, Effects)`
///
/// They contain all business logic and are deterministic and testable.
pub mod reducer {
    use super::effect::Effect;
    use smallvec::SmallVec;

    /// The Reducer trait - core abstraction for business logic
    ///
    /// # Type Parameters
    ///
    /// - `State`: The domain state this reducer operates on
    /// - `Action`: The action type this reducer processes
    /// - `Environment`: The injected dependencies this reducer needs
    ///
    /// # Example
    ///
    /// ```ignore
    /// impl Reducer for CounterReducer {
    ///     type State = CounterState;
    ///     type Action = CounterAction;
    ///     type Environment = CounterEnvironment;
    ///
    ///     fn reduce(
    ///         &self,
    ///         state: &mut CounterState,
    ///         action: CounterAction,
    ///         env: &CounterEnvironment,
    ///     ) -> SmallVec<[Effect<CounterAction>; 4]> {
    ///         match action {
    ///             CounterAction::Increment => *state = state.incremented(),
    ///             CounterAction::Decrement => *state = state.decremented(),
    ///         }
    ///         smallvec![Effect::None]
    ///     }
    /// }
    /// ```
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The action type this reducer processes
        type Action;

        /// The environment type with injected dependencies
        type Environment;

        /// Reduce an action into a new committed state and effects
        ///
        /// Implementations replace `*state` with the value their transition
        /// computes and return effect descriptions for the runtime to execute.
        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Action>; 4]>;
    }
}

/// Effect module - Side effect descriptions
///
/// Effects describe side effects to be performed by the runtime.
/// They are values, returned from reducers and executed by the Store.
pub mod effect {
    use std::future::Future;
    use std::pin::Pin;

    /// Effect type - describes a side effect to be executed
    ///
    /// # Type Parameters
    ///
    /// - `Action`: The action type that effects can produce (feedback loop)
    pub enum Effect<Action> {
        /// No-op effect
        None,

        /// Run effects in parallel
        Parallel(Vec<Effect<Action>>),

        /// Arbitrary async computation
        ///
        /// Returns `Option<Action>` - if Some, the action is fed back into the reducer
        Future(Pin<Box<dyn Future<Output = Option<Action>> + Send>>),
    }

    // Manual Debug implementation since Future doesn't implement Debug
    impl<Action> std::fmt::Debug for Effect<Action>
    where
        Action: std::fmt::Debug,
    {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                Effect::None => write!(f, "Effect::None"),
                Effect::Parallel(effects) => {
                    f.debug_tuple("Effect::Parallel").field(effects).finish()
                },
                Effect::Future(_) => write!(f, "Effect::Future(<future>)"),
            }
        }
    }

    impl<Action> Effect<Action> {
        /// Combine effects to run in parallel
        #[must_use]
        pub const fn merge(effects: Vec<Effect<Action>>) -> Effect<Action> {
            Effect::Parallel(effects)
        }

        /// Wrap a future whose output is fed back into the store
        #[must_use]
        pub fn future<F>(future: F) -> Effect<Action>
        where
            F: Future<Output = Option<Action>> + Send + 'static,
        {
            Effect::Future(Box::pin(future))
        }

        /// Returns true for `Effect::None` and for a `Parallel` of only no-ops
        #[must_use]
        pub fn is_none(&self) -> bool {
            match self {
                Effect::None => true,
                Effect::Parallel(effects) => effects.iter().all(Effect::is_none),
                Effect::Future(_) => false,
            }
        }
    }
}

/// Environment module - Dependency injection traits
///
/// All external dependencies are abstracted behind traits and injected
/// into the store or the reducer environment.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```
    /// use tally_core::environment::{Clock, SystemClock};
    ///
    /// let clock = SystemClock;
    /// let earlier = clock.now();
    /// assert!(clock.now() >= earlier);
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Wall clock backed by [`Utc::now`]
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::effect::Effect;

    #[test]
    fn test_none_effects() {
        assert!(Effect::<()>::None.is_none());
        assert!(Effect::<()>::merge(vec![Effect::None, Effect::None]).is_none());
        assert!(Effect::<()>::merge(vec![]).is_none());
    }

    #[test]
    fn test_future_effect_is_not_none() {
        let effect = Effect::future(async { Some(1_u8) });
        assert!(!effect.is_none());
        assert!(!Effect::merge(vec![Effect::None, effect]).is_none());
    }

    #[test]
    fn test_future_effect_output() {
        let Effect::Future(future) = Effect::future(async { Some(7_u8) }) else {
            unreachable!("Effect::future always builds a Future variant");
        };
        assert_eq!(tokio_test::block_on(future), Some(7));
    }

    #[test]
    fn test_debug_output() {
        let effect = Effect::merge(vec![Effect::<u8>::None, Effect::future(async { None })]);
        assert_eq!(
            format!("{effect:?}"),
            "Effect::Parallel([Effect::None, Effect::Future(<future>)])"
        );
    }
}
