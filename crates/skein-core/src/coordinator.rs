// ── Request coordination ──
//
// One logical request at a time per owner. Each request gets a ticket
// stamped with a generation number; issuing a new ticket cancels the
// previous token and makes the old generation stale. Results are written
// only while the coordinator lock is held and the ticket is still current.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Proof of having issued a request, checked again before applying its result.
#[derive(Debug, Clone)]
pub(crate) struct RequestTicket {
    generation: u64,
    cancel: CancellationToken,
}

impl RequestTicket {
    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    /// Token handed to the transport so it can abort early.
    pub(crate) fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

#[derive(Debug)]
struct Slot {
    generation: u64,
    in_flight: Option<CancellationToken>,
    mounted: bool,
}

/// Generation-counter currency check plus cooperative cancellation.
#[derive(Debug)]
pub(crate) struct Coordinator {
    slot: Mutex<Slot>,
}

impl Coordinator {
    pub(crate) fn new() -> Self {
        Self {
            slot: Mutex::new(Slot {
                generation: 0,
                in_flight: None,
                mounted: true,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Supersede whatever is in flight and issue a new ticket.
    /// Returns `None` once unmounted.
    pub(crate) fn begin(&self) -> Option<RequestTicket> {
        let mut slot = self.lock();
        if !slot.mounted {
            return None;
        }
        if let Some(previous) = slot.in_flight.take() {
            trace!(generation = slot.generation, "superseding in-flight request");
            previous.cancel();
        }
        slot.generation = slot.generation.wrapping_add(1);
        let cancel = CancellationToken::new();
        slot.in_flight = Some(cancel.clone());
        Some(RequestTicket {
            generation: slot.generation,
            cancel,
        })
    }

    /// Run `apply` only if `ticket` is still the current request. The lock
    /// is held for the duration, so no newer ticket can be issued between
    /// the check and the write.
    pub(crate) fn with_current<R>(
        &self,
        ticket: &RequestTicket,
        apply: impl FnOnce() -> R,
    ) -> Option<R> {
        let slot = self.lock();
        if slot.mounted && slot.generation == ticket.generation {
            Some(apply())
        } else {
            trace!(
                generation = ticket.generation,
                current = slot.generation,
                "discarding stale result"
            );
            None
        }
    }

    pub(crate) fn is_current(&self, ticket: &RequestTicket) -> bool {
        let slot = self.lock();
        slot.mounted && slot.generation == ticket.generation
    }

    /// Release the in-flight token if it still belongs to `ticket`.
    pub(crate) fn settle(&self, ticket: &RequestTicket) {
        let mut slot = self.lock();
        if slot.generation == ticket.generation {
            slot.in_flight = None;
        }
    }

    /// Run `apply` only while mounted, under the coordinator lock.
    pub(crate) fn while_mounted<R>(&self, apply: impl FnOnce() -> R) -> Option<R> {
        let slot = self.lock();
        slot.mounted.then(apply)
    }

    pub(crate) fn is_mounted(&self) -> bool {
        self.lock().mounted
    }

    /// Permanently stop accepting results. Pending requests are cancelled
    /// and their eventual completion becomes a no-op.
    pub(crate) fn unmount(&self) {
        let mut slot = self.lock();
        slot.mounted = false;
        slot.generation = slot.generation.wrapping_add(1);
        if let Some(token) = slot.in_flight.take() {
            token.cancel();
        }
    }
}
