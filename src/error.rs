//! Errors surfaced by [`Lazy`](crate::Lazy) accessors.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// The outcome of an accessor call that did not produce a value.
///
/// Construction errors are shared behind an [`Arc`], so every accessor gets a
/// cheap clone of the same error and `E` does not need to be `Clone`.
#[derive(Debug, Error)]
pub enum Error<E> {
   /// The first construction attempt failed.
   #[error(transparent)]
   Failed(Arc<E>),

   /// A retry failed. The slot keeps this error until a later retry succeeds
   /// or the schedule runs out.
   #[error("retry: attempt: {attempt}; delay: {delay:?}: {source}")]
   Retry {
      /// 1-based number of the retry (the first attempt is not counted).
      attempt: usize,
      /// Delay waited before this retry.
      delay: Duration,
      /// The construction error of this retry.
      source: Arc<E>,
   },

   /// The accessor's cancellation token fired before the first attempt completed.
   #[error("cancelled while waiting for the first construction attempt")]
   Cancelled,

   /// The accessor's deadline passed before the first attempt completed.
   #[error("deadline elapsed while waiting for the first construction attempt")]
   DeadlineExceeded,

   /// The background driver stopped before any attempt completed, either
   /// because the factory panicked or because the runtime shut down.
   #[error("background construction aborted before producing a result")]
   Aborted,
}

impl<E> Error<E> {
   /// Returns the construction error, if this is one.
   pub fn construction_error(&self) -> Option<&E> {
      match self {
         Self::Failed(source) | Self::Retry { source, .. } => Some(&**source),
         Self::Cancelled | Self::DeadlineExceeded | Self::Aborted => None,
      }
   }

   /// Returns `true` if the error comes from the accessor's own cancellation
   /// or deadline rather than from construction.
   pub fn is_cancellation(&self) -> bool {
      matches!(self, Self::Cancelled | Self::DeadlineExceeded)
   }
}

impl<E> Clone for Error<E> {
   fn clone(&self) -> Self {
      match self {
         Self::Failed(source) => Self::Failed(Arc::clone(source)),
         Self::Retry {
            attempt,
            delay,
            source,
         } => Self::Retry {
            attempt: *attempt,
            delay: *delay,
            source: Arc::clone(source),
         },
         Self::Cancelled => Self::Cancelled,
         Self::DeadlineExceeded => Self::DeadlineExceeded,
         Self::Aborted => Self::Aborted,
      }
   }
}
