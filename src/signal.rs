//! One-shot completion signal shared by the driver and every accessor.
//!
//! The signal is a single `AtomicU8` flag word plus a [`Notify`] for async
//! waiters. Blocking waiters use futex-based parking via `parking_lot_core`
//! keyed on the address of the flag word.
//!
//! Layout of the flag word:
//! - Bit 0: DONE - The first attempt has published its outcome
//! - Bit 1: WAITING - At least one blocking waiter may be parked
//!
//! The signal fires at most once and is never re-armed.

use core::sync::atomic::{AtomicU8, Ordering};
use std::time::Instant;

use parking_lot_core::{ParkResult, DEFAULT_PARK_TOKEN, DEFAULT_UNPARK_TOKEN};
use tokio::sync::Notify;

pub(crate) struct Signal {
   state: AtomicU8,
   notify: Notify,
}

impl Signal {
   /// Bit flag: Signal has fired.
   const DONE: u8 = 1;
   /// Bit flag: A blocking waiter is (or is about to be) parked.
   const WAITING: u8 = 2;

   #[inline]
   pub(crate) fn new() -> Self {
      Self {
         state: AtomicU8::new(0),
         notify: Notify::new(),
      }
   }

   #[inline]
   fn key(&self) -> usize {
      self.state.as_ptr() as usize
   }

   /// Checks if the signal has fired.
   ///
   /// Acquire ordering pairs with the Release swap in [`fire`](Self::fire), so
   /// a `true` result makes the first slot write visible to the caller.
   #[inline]
   pub(crate) fn is_fired(&self) -> bool {
      self.state.load(Ordering::Acquire) & Self::DONE != 0
   }

   /// Fires the signal and wakes every waiter, async and blocking.
   /// Returns `true` if this call was the one that fired it.
   pub(crate) fn fire(&self) -> bool {
      let prev_state = self.state.swap(Self::DONE, Ordering::Release);
      if prev_state & Self::DONE != 0 {
         return false;
      }

      self.notify.notify_waiters();

      if prev_state & Self::WAITING != 0 {
         // SAFETY: The key is the address of `self.state`, the same one used by
         // `wait_blocking`, and it stays valid while `self` is borrowed.
         unsafe {
            parking_lot_core::unpark_all(self.key(), DEFAULT_UNPARK_TOKEN);
         }
      }
      true
   }

   /// Waits asynchronously until the signal fires.
   ///
   /// Cancel-safe: dropping the future leaves no trace behind.
   pub(crate) async fn wait(&self) {
      loop {
         // Register before checking, so a `fire` racing with the check still
         // wakes this future.
         let notified = self.notify.notified();
         if self.is_fired() {
            return;
         }
         notified.await;
      }
   }

   /// Blocks the current thread until the signal fires or `deadline` passes.
   /// Returns `true` if the signal fired.
   pub(crate) fn wait_blocking(&self, deadline: Option<Instant>) -> bool {
      loop {
         let current_state = self.state.load(Ordering::Acquire);
         if current_state & Self::DONE != 0 {
            return true;
         }

         if current_state & Self::WAITING == 0 {
            // Announce ourselves so `fire` knows to unpark.
            if self
               .state
               .compare_exchange_weak(
                  current_state,
                  current_state | Self::WAITING,
                  Ordering::Relaxed,
                  Ordering::Relaxed,
               )
               .is_err()
            {
               std::hint::spin_loop();
               continue;
            }
         }

         let expected_state = current_state | Self::WAITING;

         // SAFETY: See `fire`. `park` re-validates the state under the bucket
         // lock, so a `fire` between our CAS and the sleep is never missed.
         let result = unsafe {
            parking_lot_core::park(
               self.key(),
               || self.state.load(Ordering::Acquire) == expected_state,
               || {},
               |_, _| {},
               DEFAULT_PARK_TOKEN,
               deadline,
            )
         };

         if matches!(result, ParkResult::TimedOut) {
            return self.is_fired();
         }
         // Unparked, invalid, or spurious: re-check.
      }
   }
}
