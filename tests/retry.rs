use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use backon::{BackoffBuilder, ConstantBuilder, ExponentialBuilder};
use poly_lazy::{CancellationToken, Error, Lazy, Options, Retry, State};
use tokio::time::{sleep, timeout};

/// A factory that fails until `succeed_on` attempts have been made.
fn flaky(
   counter: &Arc<AtomicUsize>,
   succeed_on: usize,
) -> impl FnMut(CancellationToken) -> std::future::Ready<Result<usize, io::Error>> + Send + 'static
{
   let calls = Arc::clone(counter);
   move |_| {
      let attempt = calls.fetch_add(1, Ordering::SeqCst) + 1;
      std::future::ready(if attempt >= succeed_on {
         Ok(attempt)
      } else {
         Err(io::Error::other(format!("attempt {attempt} failed")))
      })
   }
}

async fn settle<T, E>(lazy: &Lazy<T, E>, done: impl Fn(State) -> bool) {
   timeout(Duration::from_secs(1), async {
      while !done(lazy.state()) {
         sleep(Duration::from_millis(5)).await;
      }
   })
   .await
   .expect("driver never settled");
}

#[tokio::test]
async fn test_backon_constant_backoff_bounds_retries() {
   let counter = Arc::new(AtomicUsize::new(0));
   let scope = CancellationToken::new();
   let backoff = ConstantBuilder::default()
      .with_delay(Duration::from_millis(2))
      .with_max_times(2)
      .build();
   let lazy = Lazy::with_options(
      &scope,
      flaky(&counter, usize::MAX),
      Options::new().with_retry(Retry::new(backoff)),
   );

   settle(&lazy, |_| counter.load(Ordering::SeqCst) == 3).await;
   sleep(Duration::from_millis(30)).await;

   assert_eq!(counter.load(Ordering::SeqCst), 3);
   let err = lazy.get(&CancellationToken::new()).await.unwrap_err();
   assert!(matches!(err, Error::Retry { attempt: 2, .. }));
   assert_eq!(err.construction_error().unwrap().to_string(), "attempt 3 failed");
}

#[tokio::test]
async fn test_backon_exponential_backoff_until_success() {
   let counter = Arc::new(AtomicUsize::new(0));
   let scope = CancellationToken::new();
   let backoff = ExponentialBuilder::default()
      .with_min_delay(Duration::from_millis(1))
      .with_max_delay(Duration::from_millis(8))
      .with_max_times(10)
      .build();
   let lazy = Lazy::with_options(
      &scope,
      flaky(&counter, 4),
      Options::new().with_retry(Retry::new(backoff)),
   );

   settle(&lazy, |state| state == State::Ready).await;
   assert_eq!(lazy.get(&CancellationToken::new()).await.unwrap(), 4);
   sleep(Duration::from_millis(30)).await;
   assert_eq!(counter.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_exponential_with_limit() {
   let counter = Arc::new(AtomicUsize::new(0));
   let scope = CancellationToken::new();
   let lazy = Lazy::with_options(
      &scope,
      flaky(&counter, usize::MAX),
      Options::new().with_retry(
         Retry::exponential(Duration::from_millis(1), Duration::from_millis(4)).limit(4),
      ),
   );

   settle(&lazy, |_| counter.load(Ordering::SeqCst) == 5).await;
   sleep(Duration::from_millis(30)).await;
   assert_eq!(counter.load(Ordering::SeqCst), 5);
   assert!(matches!(
      lazy.get(&CancellationToken::new()).await,
      Err(Error::Retry { attempt: 4, delay, .. }) if delay == Duration::from_millis(4)
   ));
}

#[tokio::test]
async fn test_empty_schedule_behaves_like_no_retry() {
   let counter = Arc::new(AtomicUsize::new(0));
   let scope = CancellationToken::new();
   let lazy = Lazy::with_options(
      &scope,
      flaky(&counter, 2),
      Options::new().with_retry(Retry::new(Vec::new())),
   );

   let err = lazy.get(&CancellationToken::new()).await.unwrap_err();
   assert!(matches!(err, Error::Failed(_)));
   sleep(Duration::from_millis(30)).await;
   assert_eq!(counter.load(Ordering::SeqCst), 1);
   assert_eq!(lazy.state(), State::Failed);
}
