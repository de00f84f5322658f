//! The auth identity a connection runs under, published as a watch value.
//!
//! One [`Session`] exists per authenticated user. The connection manager
//! holds a receiver and reacts to every change: a rotated token forces a
//! fresh connection (there is no in-band re-auth), a cleared token parks the
//! connection idle, and a token appearing after absence connects immediately.

use tokio::sync::watch;

/// Current user id and credential, either of which may be absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Identity {
    pub user_id: Option<String>,
    pub token: Option<String>,
}

impl Identity {
    pub fn new(user_id: Option<String>, token: Option<String>) -> Self {
        Self { user_id, token }
    }

    /// Both halves needed to open a socket, when available.
    pub fn ready(&self) -> Option<(&str, &str)> {
        match (self.user_id.as_deref(), self.token.as_deref()) {
            (Some(user_id), Some(token)) => Some((user_id, token)),
            _ => None,
        }
    }
}

/// Owner side of the session identity.
#[derive(Debug)]
pub struct Session {
    tx: watch::Sender<Identity>,
}

impl Session {
    pub fn new(identity: Identity) -> Self {
        let (tx, _) = watch::channel(identity);
        Self { tx }
    }

    /// Receiver for the connection manager; notified on every change.
    pub fn subscribe(&self) -> watch::Receiver<Identity> {
        self.tx.subscribe()
    }

    pub fn identity(&self) -> Identity {
        self.tx.borrow().clone()
    }

    /// Rotate or clear the credential. No-op when the value is unchanged.
    pub fn set_token(&self, token: Option<String>) {
        self.tx.send_if_modified(|identity| {
            if identity.token == token {
                return false;
            }
            identity.token = token;
            true
        });
    }

    /// Switch or clear the user identity. No-op when the value is unchanged.
    pub fn set_user(&self, user_id: Option<String>) {
        self.tx.send_if_modified(|identity| {
            if identity.user_id == user_id {
                return false;
            }
            identity.user_id = user_id;
            true
        });
    }
}
