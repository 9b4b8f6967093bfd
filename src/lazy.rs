//! The background-initialized, retrying lazy value.
//!
//! [`Lazy<T, E>`] starts constructing its value the moment it is created. A
//! dedicated Tokio task runs the first attempt, publishes the outcome, fires
//! the completion signal, and then, only if that attempt failed, keeps
//! retrying along the configured [`Retry`](crate::Retry) schedule. Accessors
//! never construct anything: they wait for the first outcome (or their own
//! cancellation) and return a copy of whatever was published last.

use core::fmt;
use core::future::Future;
use std::error::Error as StdError;
use std::sync::Arc;

use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::Instrument;

use crate::error::Error;
use crate::retry::{Options, Retry};
use crate::signal::Signal;
use crate::slot::{Slot, State};

/// State shared by the driver task and every accessor handle.
struct Shared<T, E> {
   slot: Slot<T, E>,
   signal: Signal,
}

impl<T, E> Shared<T, E> {
   /// Writes the first outcome and fires the completion signal, in that order.
   fn publish_first(&self, outcome: Result<T, Error<E>>) {
      self.slot.store(outcome);
      self.signal.fire();
   }

   /// Returns the current outcome. Only meaningful once the signal has fired.
   fn snapshot(&self) -> Result<T, Error<E>>
   where
      T: Clone,
   {
      debug_assert!(self.signal.is_fired());
      self.slot.load().unwrap_or(Err(Error::Aborted))
   }
}

/// A value constructed in the background, retried on failure, and readable
/// from any number of tasks or threads.
///
/// Cloning a `Lazy` is cheap and yields another accessor for the same value.
/// When the last clone is dropped, the driver's cancellation token is
/// cancelled, which stops pending retries and lets a cooperative factory
/// bail out early.
///
/// # Examples
///
/// ```rust
/// use poly_lazy::{Lazy, Options, Retry};
/// use std::time::Duration;
/// use tokio_util::sync::CancellationToken;
///
/// # #[tokio::main]
/// # async fn main() {
/// let scope = CancellationToken::new();
/// let config = Lazy::with_options(
///    &scope,
///    |_token| async { Ok::<_, std::io::Error>("loaded".to_string()) },
///    Options::new().with_retry(Retry::fixed(Duration::from_millis(10), 3)),
/// );
///
/// let value = config.get(&CancellationToken::new()).await.unwrap();
/// assert_eq!(value, "loaded");
/// # }
/// ```
pub struct Lazy<T, E> {
   shared: Arc<Shared<T, E>>,
   _driver: Arc<DropGuard>,
}

impl<T, E> Lazy<T, E>
where
   T: Send + 'static,
   E: StdError + Send + Sync + 'static,
{
   /// Starts constructing the value in the background without retries.
   ///
   /// Equivalent to [`Lazy::with_options`] with [`Options::default`].
   ///
   /// # Panics
   ///
   /// Panics if called outside of a Tokio runtime.
   #[must_use]
   pub fn new<F, Fut>(scope: &CancellationToken, factory: F) -> Self
   where
      F: FnMut(CancellationToken) -> Fut + Send + 'static,
      Fut: Future<Output = Result<T, E>> + Send + 'static,
   {
      Self::with_options(scope, factory, Options::default())
   }

   /// Starts constructing the value in the background and returns immediately.
   ///
   /// The factory receives a child of `scope`. Cancelling `scope` stops the
   /// retry schedule; the factory itself is expected to observe the token it
   /// is given; an attempt that ignores it runs to completion.
   ///
   /// # Panics
   ///
   /// Panics if called outside of a Tokio runtime.
   #[must_use]
   pub fn with_options<F, Fut>(scope: &CancellationToken, factory: F, options: Options) -> Self
   where
      F: FnMut(CancellationToken) -> Fut + Send + 'static,
      Fut: Future<Output = Result<T, E>> + Send + 'static,
   {
      let shared = Arc::new(Shared {
         slot: Slot::new(),
         signal: Signal::new(),
      });
      let token = scope.child_token();

      let driver = Driver {
         first: FirstAttempt::new(Arc::clone(&shared)),
         token: token.clone(),
         factory,
         retry: options.retry,
      };
      tokio::spawn(driver.run().instrument(tracing::debug_span!("lazy_driver")));

      Self {
         shared,
         _driver: Arc::new(token.drop_guard()),
      }
   }
}

impl<T, E> Lazy<T, E> {
   /// Checks if the first construction attempt has completed.
   ///
   /// This method never blocks on construction.
   #[inline]
   pub fn is_done(&self) -> bool {
      self.shared.signal.is_fired()
   }

   /// Returns the current state of construction.
   #[inline]
   pub fn state(&self) -> State {
      self.shared.slot.state()
   }

   /// Returns the latest outcome without waiting, or `None` if the first
   /// attempt has not completed yet.
   #[inline]
   pub fn try_get(&self) -> Option<Result<T, Error<E>>>
   where
      T: Clone,
   {
      if self.is_done() {
         Some(self.shared.snapshot())
      } else {
         None
      }
   }

   /// Waits for the first attempt to complete, then returns the latest outcome.
   ///
   /// - If `cancel` fires first, returns [`Error::Cancelled`] right away
   ///   without waiting for the factory or for any retry.
   /// - Once the first attempt has completed this never waits, even if
   ///   `cancel` is already cancelled and retries are still in flight.
   ///
   /// Never triggers construction.
   pub async fn get(&self, cancel: &CancellationToken) -> Result<T, Error<E>>
   where
      T: Clone,
   {
      if let Some(outcome) = self.try_get() {
         return outcome;
      }
      tokio::select! {
         biased;
         () = self.shared.signal.wait() => self.shared.snapshot(),
         () = cancel.cancelled() => Err(Error::Cancelled),
      }
   }

   /// Like [`get`](Self::get), bounded by a deadline instead of a token.
   ///
   /// Returns [`Error::DeadlineExceeded`] if `deadline` passes first.
   pub async fn get_deadline(&self, deadline: tokio::time::Instant) -> Result<T, Error<E>>
   where
      T: Clone,
   {
      if let Some(outcome) = self.try_get() {
         return outcome;
      }
      match tokio::time::timeout_at(deadline, self.shared.signal.wait()).await {
         Ok(()) => self.shared.snapshot(),
         Err(_) => Err(Error::DeadlineExceeded),
      }
   }

   /// Blocks the current thread until the first attempt completes or
   /// `deadline` passes, then returns the latest outcome.
   ///
   /// A `None` deadline waits indefinitely. Must not be called from within an
   /// async context, where it would stall the executor thread.
   pub fn get_blocking(&self, deadline: Option<std::time::Instant>) -> Result<T, Error<E>>
   where
      T: Clone,
   {
      if self.shared.signal.wait_blocking(deadline) {
         self.shared.snapshot()
      } else {
         Err(Error::DeadlineExceeded)
      }
   }
}

impl<T, E> Clone for Lazy<T, E> {
   #[inline]
   fn clone(&self) -> Self {
      Self {
         shared: Arc::clone(&self.shared),
         _driver: Arc::clone(&self._driver),
      }
   }
}

impl<T, E> fmt::Debug for Lazy<T, E> {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.debug_struct("Lazy")
         .field("state", &self.state())
         .finish_non_exhaustive()
   }
}

/// The background retry driver, owned by its Tokio task.
///
/// Holds the [`FirstAttempt`] guard from the moment it is built, so a task
/// dropped before its first poll still publishes an outcome.
struct Driver<T, E, F> {
   first: FirstAttempt<T, E>,
   token: CancellationToken,
   factory: F,
   retry: Option<Retry>,
}

impl<T, E, F, Fut> Driver<T, E, F>
where
   F: FnMut(CancellationToken) -> Fut,
   Fut: Future<Output = Result<T, E>>,
   E: StdError,
{
   async fn run(self) {
      let Self {
         first,
         token,
         mut factory,
         retry,
      } = self;

      let outcome = factory(token.clone()).await;
      match &outcome {
         Ok(_) => tracing::debug!("first construction attempt succeeded"),
         Err(error) => tracing::warn!(%error, "first construction attempt failed"),
      }
      let failed = outcome.is_err();
      let shared = first.publish(outcome.map_err(|error| Error::Failed(Arc::new(error))));

      if !failed {
         return;
      }
      let Some(mut retry) = retry else {
         tracing::debug!("no retries configured, keeping the error");
         return;
      };

      let mut phase = RetryPhase::new();
      while let Some((attempt, delay)) = retry.wait_next(&token).await {
         phase.attempt = attempt;
         match factory(token.clone()).await {
            Ok(value) => {
               shared.slot.store(Ok(value));
               tracing::info!(attempt, ?delay, "construction retry succeeded");
               phase.finish();
               return;
            }
            Err(error) => {
               tracing::warn!(attempt, ?delay, %error, "construction retry failed");
               shared.slot.store(Err(Error::Retry {
                  attempt,
                  delay,
                  source: Arc::new(error),
               }));
            }
         }
      }
      phase.finish();

      if token.is_cancelled() {
         tracing::debug!("scope cancelled, stopping retries");
      } else {
         tracing::debug!("retry schedule exhausted, keeping the last error");
      }
   }
}

/// Publishes the first outcome exactly once.
///
/// If dropped unpublished (the task was torn down before its first poll, the
/// factory panicked, or the runtime shut down mid-attempt), publishes
/// [`Error::Aborted`] instead so no accessor waits forever.
struct FirstAttempt<T, E> {
   shared: Arc<Shared<T, E>>,
   armed: bool,
}

impl<T, E> FirstAttempt<T, E> {
   #[inline]
   fn new(shared: Arc<Shared<T, E>>) -> Self {
      Self {
         shared,
         armed: true,
      }
   }

   /// Publishes `outcome`, disarms the guard, and hands back the shared state.
   fn publish(mut self, outcome: Result<T, Error<E>>) -> Arc<Shared<T, E>> {
      self.shared.publish_first(outcome);
      self.armed = false;
      Arc::clone(&self.shared)
   }
}

impl<T, E> Drop for FirstAttempt<T, E> {
   fn drop(&mut self) {
      if !self.armed {
         return;
      }
      if self.shared.slot.store_if_empty(Err(Error::Aborted)) {
         tracing::error!("construction aborted before the first attempt completed");
      }
      self.shared.signal.fire();
   }
}

/// Reports a driver torn down in the middle of the retry phase.
///
/// The slot keeps the last published error in that case; this only makes the
/// stop visible in the logs.
struct RetryPhase {
   attempt: usize,
   finished: bool,
}

impl RetryPhase {
   #[inline]
   fn new() -> Self {
      Self {
         attempt: 0,
         finished: false,
      }
   }

   #[inline]
   fn finish(&mut self) {
      self.finished = true;
   }
}

impl Drop for RetryPhase {
   fn drop(&mut self) {
      if !self.finished {
         tracing::error!(
            attempt = self.attempt,
            "construction retries aborted, keeping the last error"
         );
      }
   }
}
