//! The shared result slot.
//!
//! Holds the most recently published outcome behind a mutex. The lock is held
//! only long enough to swap an outcome in or clone one out, never across a
//! factory call or a schedule delay.

use parking_lot::Mutex;

use crate::error::Error;

/// Observable state of a [`Lazy`](crate::Lazy).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
   /// No attempt has completed yet.
   Pending,
   /// The latest attempt succeeded. Terminal.
   Ready,
   /// The latest attempt failed. Terminal unless retries are still scheduled.
   Failed,
}

pub(crate) struct Slot<T, E> {
   outcome: Mutex<Option<Result<T, Error<E>>>>,
}

impl<T, E> Slot<T, E> {
   #[inline]
   pub(crate) const fn new() -> Self {
      Self {
         outcome: Mutex::new(None),
      }
   }

   /// Replaces the current outcome.
   #[inline]
   pub(crate) fn store(&self, outcome: Result<T, Error<E>>) {
      // Swap under the lock, drop the old outcome after releasing it.
      let previous = self.outcome.lock().replace(outcome);
      drop(previous);
   }

   /// Stores `outcome` only if nothing has been published yet.
   /// Returns `true` if it was stored.
   pub(crate) fn store_if_empty(&self, outcome: Result<T, Error<E>>) -> bool {
      let mut guard = self.outcome.lock();
      if guard.is_some() {
         return false;
      }
      *guard = Some(outcome);
      true
   }

   /// Returns a copy of the current outcome, `None` while pending.
   #[inline]
   pub(crate) fn load(&self) -> Option<Result<T, Error<E>>>
   where
      T: Clone,
   {
      self.outcome.lock().clone()
   }

   pub(crate) fn state(&self) -> State {
      match &*self.outcome.lock() {
         None => State::Pending,
         Some(Ok(_)) => State::Ready,
         Some(Err(_)) => State::Failed,
      }
   }
}
