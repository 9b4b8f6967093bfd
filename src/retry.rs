//! Retry delay schedules.
//!
//! A [`Retry`] is a lazy, possibly infinite, possibly empty sequence of
//! delays. Each delay means "wait this long, then try again". Whether the
//! sequence ends is the caller's choice: [`Retry::fixed`] is bounded,
//! [`Retry::forever`] and [`Retry::exponential`] are not until capped with
//! [`Retry::limit`].
//!
//! Any `Iterator<Item = Duration>` can be used through [`Retry::new`],
//! including the backoffs produced by crates such as `backon`.

use core::fmt;
use std::iter;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// A retry delay schedule, consumed by the background driver only.
pub struct Retry {
   delays: Box<dyn Iterator<Item = Duration> + Send>,
   attempt: usize,
}

impl Retry {
   /// Creates a schedule from any sequence of delays.
   #[must_use]
   pub fn new<I>(delays: I) -> Self
   where
      I: IntoIterator<Item = Duration>,
      I::IntoIter: Send + 'static,
   {
      Self {
         delays: Box::new(delays.into_iter()),
         attempt: 0,
      }
   }

   /// Retries `times` times, waiting `delay` before each retry.
   #[must_use]
   pub fn fixed(delay: Duration, times: usize) -> Self {
      Self::new(iter::repeat(delay).take(times))
   }

   /// Retries until success (or until the scope is cancelled), waiting `delay`
   /// before each retry.
   #[must_use]
   pub fn forever(delay: Duration) -> Self {
      Self::new(iter::repeat(delay))
   }

   /// Retries until success, doubling the delay after every retry starting at
   /// `initial` and never exceeding `max`.
   #[must_use]
   pub fn exponential(initial: Duration, max: Duration) -> Self {
      let first = initial.min(max);
      Self::new(iter::successors(Some(first), move |prev| {
         Some(prev.saturating_mul(2).min(max))
      }))
   }

   /// Caps the schedule at `times` retries.
   #[must_use]
   pub fn limit(self, times: usize) -> Self {
      Self {
         delays: Box::new(self.delays.take(times)),
         attempt: self.attempt,
      }
   }

   /// Waits out the next delay and returns `(attempt, delay)`.
   ///
   /// Returns `None` when the schedule is exhausted or `scope` is cancelled,
   /// either before or during the wait.
   pub(crate) async fn wait_next(
      &mut self,
      scope: &CancellationToken,
   ) -> Option<(usize, Duration)> {
      if scope.is_cancelled() {
         return None;
      }
      let delay = self.delays.next()?;
      self.attempt += 1;

      tokio::select! {
         biased;
         _ = scope.cancelled() => None,
         _ = tokio::time::sleep(delay) => Some((self.attempt, delay)),
      }
   }
}

impl fmt::Debug for Retry {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.debug_struct("Retry")
         .field("attempt", &self.attempt)
         .finish_non_exhaustive()
   }
}

/// Configuration for a [`Lazy`](crate::Lazy).
///
/// The default configuration performs a single attempt and never retries.
#[derive(Debug, Default)]
pub struct Options {
   pub(crate) retry: Option<Retry>,
}

impl Options {
   /// Creates the default configuration: no retries.
   #[inline]
   #[must_use]
   pub fn new() -> Self {
      Self::default()
   }

   /// Retries failed construction according to `retry`.
   #[inline]
   #[must_use]
   pub fn with_retry(mut self, retry: Retry) -> Self {
      self.retry = Some(retry);
      self
   }
}

#[cfg(test)]
mod tests {
   use super::*;

   fn ms(millis: u64) -> Duration {
      Duration::from_millis(millis)
   }

   fn drain(retry: Retry, max: usize) -> Vec<Duration> {
      retry.delays.take(max).collect()
   }

   #[test]
   fn fixed_is_bounded() {
      assert_eq!(drain(Retry::fixed(ms(5), 3), 10), vec![ms(5); 3]);
      assert!(drain(Retry::fixed(ms(5), 0), 10).is_empty());
   }

   #[test]
   fn forever_never_ends() {
      assert_eq!(drain(Retry::forever(ms(1)), 100).len(), 100);
   }

   #[test]
   fn exponential_doubles_up_to_max() {
      assert_eq!(
         drain(Retry::exponential(ms(10), ms(100)), 6),
         vec![ms(10), ms(20), ms(40), ms(80), ms(100), ms(100)]
      );
      assert_eq!(
         drain(Retry::exponential(ms(500), ms(100)), 2),
         vec![ms(100), ms(100)]
      );
   }

   #[test]
   fn limit_caps_infinite_schedules() {
      assert_eq!(
         drain(Retry::exponential(ms(1), ms(8)).limit(3), 10),
         vec![ms(1), ms(2), ms(4)]
      );
   }

   #[tokio::test(start_paused = true)]
   async fn wait_next_numbers_attempts_and_sleeps() {
      let scope = CancellationToken::new();
      let mut retry = Retry::new([ms(100), ms(200)]);

      let start = tokio::time::Instant::now();
      assert_eq!(retry.wait_next(&scope).await, Some((1, ms(100))));
      assert!(start.elapsed() >= ms(100));
      assert_eq!(retry.wait_next(&scope).await, Some((2, ms(200))));
      assert!(start.elapsed() >= ms(300));
      assert_eq!(retry.wait_next(&scope).await, None);
   }

   #[tokio::test(start_paused = true)]
   async fn wait_next_stops_on_cancelled_scope() {
      let scope = CancellationToken::new();
      let mut retry = Retry::forever(ms(1_000));

      let canceller = scope.clone();
      tokio::spawn(async move {
         tokio::time::sleep(ms(10)).await;
         canceller.cancel();
      });

      let start = tokio::time::Instant::now();
      assert_eq!(retry.wait_next(&scope).await, None);
      assert!(start.elapsed() < ms(1_000));

      // Already cancelled: no further delays are taken.
      assert_eq!(retry.wait_next(&scope).await, None);
      assert_eq!(retry.attempt, 1);
   }
}
