//! Correlation of pending callbacks with inbound completions.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::Value;

use crate::command::{OperationKind, RequestId};
use crate::config::CorrelationPolicy;
use crate::error::SdkError;

/// Callback run once with the parsed completion payload.
pub type Completion = Box<dyn FnOnce(Result<Value, SdkError>) + Send + 'static>;

type Slots = HashMap<OperationKind, BTreeMap<RequestId, Completion>>;

/// Holds the callbacks waiting for a completion, keyed by operation kind.
///
/// Registration and removal happen under one lock, so a callback is handed
/// out at most once even when completions arrive from several threads.
pub struct CorrelationRegistry {
    policy: CorrelationPolicy,
    next_request: AtomicU64,
    slots: Mutex<Slots>,
}

impl CorrelationRegistry {
    pub fn new(policy: CorrelationPolicy) -> Self {
        Self {
            policy,
            next_request: AtomicU64::new(0),
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn policy(&self) -> CorrelationPolicy {
        self.policy
    }

    /// Store `callback` for `kind` and return the id assigned to it.
    ///
    /// Under [`CorrelationPolicy::LatestWins`] any callback already pending for
    /// `kind` is dropped without being run.
    pub fn register(&self, kind: OperationKind, callback: Completion) -> RequestId {
        let request_id = self.reserve(kind, callback);
        self.commit(kind, request_id);
        request_id
    }

    /// Store `callback` for `kind` without displacing earlier registrations.
    ///
    /// Pair with [`commit`](Self::commit) once the command is on its way, or
    /// [`cancel`](Self::cancel) if it never left.
    pub fn reserve(&self, kind: OperationKind, callback: Completion) -> RequestId {
        let request_id = RequestId::new(self.next_request.fetch_add(1, Ordering::SeqCst) + 1);
        self.lock()
            .entry(kind)
            .or_default()
            .insert(request_id, callback);
        request_id
    }

    /// Make `request_id` the live registration for `kind`.
    ///
    /// Under [`CorrelationPolicy::LatestWins`] older callbacks for `kind` are
    /// dropped without being run; under [`CorrelationPolicy::PerRequest`] this
    /// does nothing.
    pub fn commit(&self, kind: OperationKind, request_id: RequestId) {
        if self.policy == CorrelationPolicy::PerRequest {
            return;
        }

        let orphaned = {
            let mut slots = self.lock();
            let Some(pending) = slots.get_mut(&kind) else {
                return;
            };
            let newer = pending.split_off(&request_id);
            let orphaned = std::mem::replace(pending, newer);
            if pending.is_empty() {
                slots.remove(&kind);
            }
            orphaned
        };

        for previous in orphaned.keys() {
            log::warn!("{kind} request {previous} superseded by {request_id} before completing");
        }
    }

    /// Remove and return the callback a completion for `kind` should resolve.
    ///
    /// With a request id only that exact registration matches; without one the
    /// oldest pending registration for `kind` is taken. Returns `None` when
    /// nothing matches, which callers treat as a no-op.
    pub fn take_and_clear(
        &self,
        kind: OperationKind,
        request_id: Option<RequestId>,
    ) -> Option<Completion> {
        let mut slots = self.lock();
        let pending = slots.get_mut(&kind)?;
        let callback = match request_id {
            Some(id) => pending.remove(&id),
            None => pending.pop_first().map(|(_, callback)| callback),
        };
        if pending.is_empty() {
            slots.remove(&kind);
        }
        callback
    }

    /// Forget a registration without running its callback.
    pub fn cancel(&self, kind: OperationKind, request_id: RequestId) -> bool {
        self.take_and_clear(kind, Some(request_id)).is_some()
    }

    pub fn is_pending(&self, kind: OperationKind) -> bool {
        self.pending_count(kind) > 0
    }

    pub fn pending_count(&self, kind: OperationKind) -> usize {
        self.lock().get(&kind).map_or(0, BTreeMap::len)
    }

    /// Remove every pending callback, oldest first within each kind.
    pub fn drain(&self) -> Vec<(OperationKind, Completion)> {
        let slots = std::mem::take(&mut *self.lock());
        let mut drained: Vec<_> = slots
            .into_iter()
            .flat_map(|(kind, pending)| {
                pending
                    .into_iter()
                    .map(move |(id, callback)| (kind, id, callback))
            })
            .collect();
        drained.sort_by_key(|(kind, id, _)| (*kind, *id));
        drained
            .into_iter()
            .map(|(kind, _, callback)| (kind, callback))
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for CorrelationRegistry {
    fn default() -> Self {
        Self::new(CorrelationPolicy::default())
    }
}

impl std::fmt::Debug for CorrelationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let pending: BTreeMap<OperationKind, usize> = self
            .lock()
            .iter()
            .map(|(kind, pending)| (*kind, pending.len()))
            .collect();
        f.debug_struct("CorrelationRegistry")
            .field("policy", &self.policy)
            .field("pending", &pending)
            .finish()
    }
}
