// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! The signed-in user, as seen by the sync engine.

use tokio::sync::watch;

/// Source of the current user id.
///
/// Sync paths are scoped by user; the coordinator restarts namespaces when
/// the user changes and stops them on sign-out.
pub trait IdentityProvider: Send + Sync {
    /// The current user, `None` when signed out.
    fn current_user_id(&self) -> Option<String>;

    /// A receiver that observes every sign-in and sign-out.
    fn watch(&self) -> watch::Receiver<Option<String>>;
}

/// An identity the host updates directly.
#[derive(Debug)]
pub struct SessionIdentity {
    tx: watch::Sender<Option<String>>,
}

impl SessionIdentity {
    /// Starts signed out.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        SessionIdentity { tx }
    }

    /// Starts signed in as `user_id`.
    pub fn signed_in(user_id: impl Into<String>) -> Self {
        let (tx, _) = watch::channel(Some(user_id.into()));
        SessionIdentity { tx }
    }

    pub fn sign_in(&self, user_id: impl Into<String>) {
        self.tx.send_replace(Some(user_id.into()));
    }

    pub fn sign_out(&self) {
        self.tx.send_replace(None);
    }
}

impl Default for SessionIdentity {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityProvider for SessionIdentity {
    fn current_user_id(&self) -> Option<String> {
        self.tx.borrow().clone()
    }

    fn watch(&self) -> watch::Receiver<Option<String>> {
        self.tx.subscribe()
    }
}
