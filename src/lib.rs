//! A lazily constructed value that initializes in the background and keeps
//! retrying on failure.
//!
//! [`Lazy<T, E>`] takes a (possibly slow, possibly unreliable) async factory
//! and returns immediately. Construction starts right away on a dedicated
//! Tokio task; any number of callers can then wait for the result
//! concurrently, each bounded by its own cancellation token or deadline.
//!
//! If the first attempt fails, every caller sees that error, while the
//! background driver keeps retrying along a caller-supplied [`Retry`]
//! schedule. Callers always receive the latest published outcome.
//!
//! # Features
//!
//! - **Non-blocking creation**: `Lazy::new` spawns the driver and returns.
//! - **Cancellable waits**: per-call [`CancellationToken`], async deadline,
//!   or a blocking wait with a `std::time::Instant` deadline.
//! - **Independent retries**: a cancelled wait never affects the driver or
//!   other callers; the driver is stopped only through its own scope token.
//! - **Sequential attempts**: the factory never runs concurrently with itself.
//! - **Cheap reads**: once the first attempt completed, reads only take a
//!   short-lived lock to clone the outcome.
//!
//! # Examples
//!
//! ```rust
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use poly_lazy::{Error, Lazy, Options, Retry};
//! use tokio_util::sync::CancellationToken;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let attempts = Arc::new(AtomicUsize::new(0));
//! let counter = Arc::clone(&attempts);
//!
//! let scope = CancellationToken::new();
//! let connection = Lazy::with_options(
//!    &scope,
//!    move |_token| {
//!       let attempt = counter.fetch_add(1, Ordering::SeqCst);
//!       async move {
//!          if attempt == 0 {
//!             Err(std::io::Error::other("not yet"))
//!          } else {
//!             Ok(42)
//!          }
//!       }
//!    },
//!    Options::new().with_retry(Retry::forever(Duration::from_millis(20))),
//! );
//!
//! // The first attempt failed, so the first read reports its error.
//! let cancel = CancellationToken::new();
//! assert!(matches!(connection.get(&cancel).await, Err(Error::Failed(_))));
//!
//! // The driver keeps retrying in the background.
//! tokio::time::sleep(Duration::from_millis(200)).await;
//! assert_eq!(connection.get(&cancel).await.unwrap(), 42);
//! # }
//! ```

/// Accessor errors.
mod error;

/// Background-initialized value and its retry driver.
mod lazy;

/// Retry schedules and configuration.
mod retry;

/// One-shot completion signal.
mod signal;

/// Shared result slot.
mod slot;

pub use error::Error;
pub use lazy::Lazy;
pub use retry::{Options, Retry};
pub use slot::State;
pub use tokio_util::sync::CancellationToken;
