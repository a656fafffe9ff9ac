//! # Tally Runtime
//!
//! Runtime implementation for Tally.
//!
//! This crate provides the [`Store`]: the explicitly owned container that holds
//! the committed state, runs the reducer for every dispatched action, and
//! notifies observers of each new state.
//!
//! ## Core Components
//!
//! - **Store**: Committed state, dispatch by name or by typed action, read accessor
//! - **Subscriptions**: `watch` channel that always holds the latest committed state
//! - **History**: Bounded, read-only snapshots of past commits
//! - **Effect Executor**: Executes effect descriptions and feeds actions back
//!
//! ## Example
//!
//! ```ignore
//! use tally_runtime::Store;
//!
//! let store = Store::new(CounterState::default(), CounterReducer, CounterEnvironment);
//!
//! // Dispatch by name
//! store.dispatch("increment", None).await?;
//!
//! // Read state
//! let count = store.state(|s| s.count).await;
//! ```

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tally_core::{effect::Effect, environment::Clock, reducer::Reducer};
use tokio::sync::{watch, RwLock};

/// Bounded record of committed states
pub mod history;

/// Prometheus metrics for observability
pub mod metrics;

pub use history::{History, Snapshot};

/// Error types for the Store runtime
pub mod error {
    use tally_core::action::ActionError;
    use thiserror::Error;

    /// Errors that can occur during Store operations
    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum StoreError {
        /// The action name was recognized but its payload was not usable
        ///
        /// The committed state is left unchanged.
        #[error(transparent)]
        InvalidAction(#[from] ActionError),

        /// Store is shutting down and not accepting new actions
        ///
        /// This error is returned when a dispatch happens after shutdown initiated.
        #[error("Store is shutting down")]
        ShutdownInProgress,

        /// Shutdown timed out waiting for effects to complete
        ///
        /// Some effects were still running when the timeout elapsed.
        #[error("Shutdown timed out with {0} effects still running")]
        ShutdownTimeout(usize),
    }
}

pub use error::StoreError;

/// Configuration for Store instances
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use tally_runtime::StoreConfig;
///
/// let config = StoreConfig::default()
///     .with_history_capacity(16)
///     .with_shutdown_timeout(Duration::from_secs(1));
///
/// assert_eq!(config.history_capacity, 16);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Number of snapshots kept in the history (0 disables it)
    pub history_capacity: usize,
    /// Default timeout for graceful shutdown
    pub default_shutdown_timeout: Duration,
}

impl StoreConfig {
    /// Create a new configuration with custom values
    #[must_use]
    pub const fn new(history_capacity: usize, default_shutdown_timeout: Duration) -> Self {
        Self {
            history_capacity,
            default_shutdown_timeout,
        }
    }

    /// Set the history capacity
    #[must_use]
    pub const fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }

    /// Set the default shutdown timeout
    #[must_use]
    pub const fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.default_shutdown_timeout = timeout;
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            history_capacity: 64,
            default_shutdown_timeout: Duration::from_secs(5),
        }
    }
}

/// Handle for tracking effect completion
///
/// Returned by [`Store::send()`] to allow waiting for the effects started by
/// that action. Pure actions return an already completed handle.
///
/// # Example
///
/// ```ignore
/// let mut handle = store.send(Action::Start).await?;
/// handle.wait_with_timeout(Duration::from_secs(5)).await?;
/// ```
#[derive(Clone)]
pub struct EffectHandle {
    effects: Arc<AtomicUsize>,
    completion: watch::Receiver<()>,
}

impl EffectHandle {
    /// Create a new handle and the tracking half used during execution
    fn new() -> (Self, EffectTracking) {
        let counter = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = watch::channel(());

        let handle = Self {
            effects: Arc::clone(&counter),
            completion: rx,
        };

        let tracking = EffectTracking {
            counter,
            notifier: Arc::new(tx),
        };

        (handle, tracking)
    }

    /// Create a handle that's already complete
    #[must_use]
    pub fn completed() -> Self {
        let (tx, rx) = watch::channel(());
        let _ = tx.send(());

        Self {
            effects: Arc::new(AtomicUsize::new(0)),
            completion: rx,
        }
    }

    /// Returns true if no effect started by this action is still running
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.effects.load(Ordering::SeqCst) == 0
    }

    /// Wait for all effects to complete
    pub async fn wait(&mut self) {
        while self.effects.load(Ordering::SeqCst) > 0 {
            if self.completion.changed().await.is_err() {
                // Every tracker is gone, so nothing is left running
                break;
            }
        }
    }

    /// Wait for all effects to complete with a timeout
    ///
    /// # Errors
    ///
    /// Returns `Err(())` if the timeout expires before all effects complete.
    pub async fn wait_with_timeout(&mut self, timeout: Duration) -> Result<(), ()> {
        tokio::time::timeout(timeout, self.wait())
            .await
            .map_err(|_| ())
    }
}

impl std::fmt::Debug for EffectHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectHandle")
            .field("pending_effects", &self.effects.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

/// Internal: Effect tracking context passed through effect execution
#[derive(Clone)]
struct EffectTracking {
    counter: Arc<AtomicUsize>,
    notifier: Arc<watch::Sender<()>>,
}

impl EffectTracking {
    /// Increment the effect counter (effect started)
    fn increment(&self) {
        self.counter.fetch_add(1, Ordering::SeqCst);
    }

    /// Decrement the effect counter (effect completed)
    fn decrement(&self) {
        if self.counter.fetch_sub(1, Ordering::SeqCst) == 1 {
            // Counter reached zero, notify waiters
            let _ = self.notifier.send(());
        }
    }
}

/// Internal: RAII guard that decrements effect counter on drop
///
/// Ensures the effect counter is always decremented, even if the effect panics.
struct DecrementGuard(EffectTracking);

impl Drop for DecrementGuard {
    fn drop(&mut self) {
        self.0.decrement();
    }
}

/// Guard that decrements an atomic counter on drop (for shutdown tracking)
struct AtomicCounterGuard(Arc<AtomicUsize>);

impl Drop for AtomicCounterGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Internal: state and history committed together under one lock
struct Committed<S> {
    state: S,
    history: History<S>,
}

/// Store runtime for coordinating reducer execution and effect handling.
pub mod store {
    use super::{
        Arc, AtomicBool, AtomicCounterGuard, AtomicUsize, Clock, Committed, DecrementGuard,
        Duration, Effect, EffectHandle, EffectTracking, History, Ordering, Reducer, RwLock,
        Snapshot, StoreConfig, StoreError,
    };
    use crate::metrics::{EffectMetrics, StoreMetrics};
    use tally_core::action::{Envelope, NamedAction};
    use tally_core::environment::SystemClock;
    use tokio::sync::watch;

    /// The Store - owner of the committed state
    ///
    /// The Store manages:
    /// 1. State and its snapshot history (behind one `RwLock`)
    /// 2. Reducer (business logic)
    /// 3. Environment (injected dependencies)
    /// 4. Subscriber notification after every commit
    /// 5. Effect execution (with feedback loop)
    ///
    /// Cloning a Store gives another handle to the same committed state.
    ///
    /// # Type Parameters
    ///
    /// - `S`: State type
    /// - `A`: Action type
    /// - `E`: Environment type
    /// - `R`: Reducer implementation
    pub struct Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E>,
    {
        committed: Arc<RwLock<Committed<S>>>,
        reducer: R,
        environment: E,
        clock: Arc<dyn Clock>,
        config: StoreConfig,
        notifier: Arc<watch::Sender<S>>,
        shutdown: Arc<AtomicBool>,
        pending_effects: Arc<AtomicUsize>,
    }

    impl<S, A, E, R> Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E> + Clone + Send + Sync + 'static,
        A: NamedAction + Send + 'static,
        S: Clone + Send + Sync + 'static,
        E: Clone + Send + Sync + 'static,
    {
        /// Create a new store with initial state, reducer, and environment
        ///
        /// Uses [`StoreConfig::default()`] and the system clock.
        #[must_use]
        pub fn new(initial_state: S, reducer: R, environment: E) -> Self {
            Self::with_config(initial_state, reducer, environment, StoreConfig::default())
        }

        /// Create a new Store with custom configuration
        ///
        /// # Example
        ///
        /// ```ignore
        /// let config = StoreConfig::default().with_history_capacity(8);
        /// let store = Store::with_config(CounterState::default(), CounterReducer, env, config);
        /// ```
        #[must_use]
        pub fn with_config(
            initial_state: S,
            reducer: R,
            environment: E,
            config: StoreConfig,
        ) -> Self {
            let (notifier, _) = watch::channel(initial_state.clone());

            Self {
                committed: Arc::new(RwLock::new(Committed {
                    state: initial_state,
                    history: History::new(config.history_capacity),
                })),
                reducer,
                environment,
                clock: Arc::new(SystemClock),
                config,
                notifier: Arc::new(notifier),
                shutdown: Arc::new(AtomicBool::new(false)),
                pending_effects: Arc::new(AtomicUsize::new(0)),
            }
        }

        /// Replace the clock used to timestamp snapshots
        #[must_use]
        pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
            self.clock = clock;
            self
        }

        /// The configuration this store was built with
        #[must_use]
        pub const fn config(&self) -> &StoreConfig {
            &self.config
        }

        /// Send a typed action to the store
        ///
        /// 1. Acquires write lock on state
        /// 2. Calls reducer with (state, action, environment)
        /// 3. Records a snapshot and notifies subscribers
        /// 4. Starts the returned effects
        ///
        /// The new state is committed before this returns, so a following
        /// [`state()`](Self::state) call observes it.
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::ShutdownInProgress`] if the store is shutting down.
        #[tracing::instrument(skip(self, action), fields(action = action.name()), name = "store_send")]
        pub async fn send(&self, action: A) -> Result<EffectHandle, StoreError> {
            if self.shutdown.load(Ordering::Acquire) {
                tracing::warn!("Rejected action: store is shutting down");
                StoreMetrics::record_rejected("shutdown");
                return Err(StoreError::ShutdownInProgress);
            }

            tracing::debug!("Processing action");
            let name = action.name();
            let (handle, tracking) = EffectHandle::new();

            {
                let mut committed = self.committed.write().await;
                tracing::trace!("Acquired write lock on state");

                // Shutdown may have started while waiting for the lock
                if self.shutdown.load(Ordering::Acquire) {
                    tracing::warn!("Rejected action: store is shutting down");
                    StoreMetrics::record_rejected("shutdown");
                    return Err(StoreError::ShutdownInProgress);
                }

                let span = tracing::debug_span!("reducer_execution");
                let entered = span.enter();

                let start = std::time::Instant::now();
                let effects = self
                    .reducer
                    .reduce(&mut committed.state, action, &self.environment);
                StoreMetrics::record_action(name, start.elapsed());

                let Committed { state, history } = &mut *committed;
                let sequence = history.record(name, self.clock.now(), state);
                self.notifier.send_replace(state.clone());

                tracing::trace!(sequence, "Committed, reducer returned {} effects", effects.len());
                drop(entered);

                // Pending effects are counted before the lock is released
                for effect in effects {
                    self.execute_effect(effect, tracking.clone());
                }
            }

            Ok(handle)
        }

        /// Dispatch an action by name with an optional payload
        ///
        /// An unknown name leaves the state unchanged and is not an error.
        ///
        /// # Errors
        ///
        /// - [`StoreError::InvalidAction`] if the action requires a payload that is
        ///   missing or malformed; the state is unchanged
        /// - [`StoreError::ShutdownInProgress`] if the store is shutting down
        ///
        /// # Example
        ///
        /// ```ignore
        /// store.dispatch("multiplyByLast", Some(serde_json::json!(2))).await?;
        /// ```
        pub async fn dispatch(
            &self,
            name: &str,
            payload: Option<serde_json::Value>,
        ) -> Result<EffectHandle, StoreError> {
            let envelope = Envelope {
                kind: name.to_string(),
                payload,
            };
            self.dispatch_envelope(&envelope).await
        }

        /// Dispatch an action given in its `{ type, payload }` wire form
        ///
        /// # Errors
        ///
        /// Same as [`dispatch()`](Self::dispatch).
        pub async fn dispatch_envelope(&self, envelope: &Envelope) -> Result<EffectHandle, StoreError> {
            if self.shutdown.load(Ordering::Acquire) {
                tracing::warn!(action = %envelope.kind, "Rejected action: store is shutting down");
                StoreMetrics::record_rejected("shutdown");
                return Err(StoreError::ShutdownInProgress);
            }

            match A::from_envelope(envelope) {
                Ok(Some(action)) => self.send(action).await,
                Ok(None) => {
                    tracing::debug!(action = %envelope.kind, "Ignoring unknown action");
                    StoreMetrics::record_ignored();
                    Ok(EffectHandle::completed())
                },
                Err(error) => {
                    tracing::warn!(action = %envelope.kind, %error, "Rejected action");
                    StoreMetrics::record_rejected("invalid_argument");
                    Err(error.into())
                },
            }
        }

        /// Read current state via a closure
        ///
        /// Access state through a closure to ensure the lock is released promptly:
        ///
        /// ```ignore
        /// let count = store.state(|s| s.count).await;
        /// ```
        pub async fn state<F, T>(&self, f: F) -> T
        where
            F: FnOnce(&S) -> T,
        {
            let committed = self.committed.read().await;
            f(&committed.state)
        }

        /// Owned copy of the committed state
        pub async fn snapshot(&self) -> S {
            self.state(S::clone).await
        }

        /// Snapshots of past commits, oldest first
        pub async fn history(&self) -> Vec<Snapshot<S>> {
            self.committed.read().await.history.snapshots()
        }

        /// Number of actions committed since the store was created
        pub async fn commits(&self) -> u64 {
            self.committed.read().await.history.commits()
        }

        /// Subscribe to committed states
        ///
        /// The receiver starts at the current state and always holds the latest
        /// commit; intermediate states may be skipped by slow observers.
        ///
        /// ```ignore
        /// let mut rx = store.subscribe();
        /// while rx.changed().await.is_ok() {
        ///     println!("count = {}", rx.borrow_and_update().count);
        /// }
        /// ```
        #[must_use]
        pub fn subscribe(&self) -> watch::Receiver<S> {
            self.notifier.subscribe()
        }

        /// Initiate graceful shutdown of the store
        ///
        /// Sets the shutdown flag (rejecting new actions), then waits for pending
        /// effects to complete.
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::ShutdownTimeout`] if the timeout expires before all
        /// pending effects complete.
        pub async fn shutdown(&self, timeout: Duration) -> Result<(), StoreError> {
            tracing::info!("Initiating graceful shutdown");
            self.shutdown.store(true, Ordering::Release);

            // Wait out a commit already holding the lock; later ones see the flag
            drop(self.committed.write().await);

            let start = std::time::Instant::now();
            let poll_interval = Duration::from_millis(10);

            loop {
                let pending = self.pending_effects.load(Ordering::Acquire);

                if pending == 0 {
                    tracing::info!("All effects completed, shutdown successful");
                    return Ok(());
                }

                if start.elapsed() >= timeout {
                    tracing::error!(
                        pending_effects = pending,
                        "Shutdown timeout: {} effects still running", pending
                    );
                    return Err(StoreError::ShutdownTimeout(pending));
                }

                tracing::debug!(
                    pending_effects = pending,
                    elapsed_ms = start.elapsed().as_millis(),
                    "Waiting for effects to complete"
                );

                tokio::time::sleep(poll_interval).await;
            }
        }

        /// Returns true once shutdown has started
        #[must_use]
        pub fn is_shutting_down(&self) -> bool {
            self.shutdown.load(Ordering::Acquire)
        }

        fn execute_effect(&self, effect: Effect<A>, tracking: EffectTracking) {
            match effect {
                Effect::None => {
                    tracing::trace!("Executing Effect::None (no-op)");
                    EffectMetrics::record_execution("none");
                },
                Effect::Parallel(effects) => {
                    tracing::trace!("Executing Effect::Parallel with {} effects", effects.len());
                    EffectMetrics::record_execution("parallel");

                    for effect in effects {
                        self.execute_effect(effect, tracking.clone());
                    }
                },
                Effect::Future(fut) => {
                    tracing::trace!("Executing Effect::Future");
                    EffectMetrics::record_execution("future");
                    tracking.increment();

                    // Track global pending effects for shutdown
                    self.pending_effects.fetch_add(1, Ordering::SeqCst);
                    let pending_guard = AtomicCounterGuard(Arc::clone(&self.pending_effects));

                    let store = self.clone();

                    tokio::spawn(async move {
                        let _guard = DecrementGuard(tracking);
                        let _pending_guard = pending_guard; // Decrement on drop

                        if let Some(action) = fut.await {
                            tracing::trace!("Effect::Future produced an action, sending to store");
                            if let Err(error) = store.send(action).await {
                                tracing::warn!(%error, "Dropped action produced by effect");
                            }
                        } else {
                            tracing::trace!("Effect::Future completed with no action");
                        }
                    });
                },
            }
        }
    }

    impl<S, A, E, R> Clone for Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E> + Clone,
        E: Clone,
    {
        fn clone(&self) -> Self {
            Self {
                committed: Arc::clone(&self.committed),
                reducer: self.reducer.clone(),
                environment: self.environment.clone(),
                clock: Arc::clone(&self.clock),
                config: self.config.clone(),
                notifier: Arc::clone(&self.notifier),
                shutdown: Arc::clone(&self.shutdown),
                pending_effects: Arc::clone(&self.pending_effects),
            }
        }
    }
}

// Re-export for convenience
pub use store::Store;
