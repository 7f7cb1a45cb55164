//! Role-gated approval workflows
//!
//! Four independent machines share one shape: Pending is the sole
//! non-terminal state, only the counterparty role may transition an item,
//! and a per-item in-flight flag suppresses duplicate submissions while a
//! transition is outstanding, without disabling the whole view. After any
//! mutation the owning view re-fetches its list from the service; nothing
//! is patched optimistically.

pub mod fulfillment;
pub mod moderation;
pub mod refund;
pub mod stock;

use std::collections::HashSet;
use std::hash::Hash;

use crate::{MarketError, Result};

/// Holds at most one command object awaiting user confirmation, decoupling
/// "what action was requested" from "how it is confirmed". The transition
/// logic stays headless-testable; a dialog is just one way to call
/// [`ConfirmGate::pending`] and then confirm or dismiss.
#[derive(Debug)]
pub struct ConfirmGate<C> {
    pending: Option<C>,
}

impl<C> Default for ConfirmGate<C> {
    fn default() -> Self {
        Self { pending: None }
    }
}

impl<C> ConfirmGate<C> {
    pub fn request(&mut self, command: C) -> &C {
        self.pending.insert(command)
    }

    pub fn pending(&self) -> Option<&C> {
        self.pending.as_ref()
    }

    pub fn dismiss(&mut self) {
        self.pending = None;
    }

    pub(crate) fn take(&mut self) -> Result<C> {
        self.pending.take().ok_or(MarketError::NothingPending)
    }
}

/// Per-item in-flight markers. `begin` refuses a key that is already
/// outstanding; `end` must run on success and failure alike.
#[derive(Debug, Default)]
pub(crate) struct InFlight<K: Eq + Hash + Copy> {
    keys: HashSet<K>,
}

impl<K: Eq + Hash + Copy> InFlight<K> {
    pub fn begin(&mut self, key: K) -> Result<()> {
        if self.keys.insert(key) {
            Ok(())
        } else {
            Err(MarketError::RequestInFlight)
        }
    }

    pub fn end(&mut self, key: K) {
        self.keys.remove(&key);
    }

    pub fn contains(&self, key: K) -> bool {
        self.keys.contains(&key)
    }
}
