use std::fmt;
use std::sync::Arc;

use crate::peer::PeerIdentity;

/// One line of chat, tagged with the peer that produced it. Created by an
/// exchanger, handed to its sink exactly once, then dropped.
#[derive(Debug, Clone)]
pub struct Message {
    pub text: String,
    pub origin: Arc<PeerIdentity>,
}

impl Message {
    pub fn new(text: impl Into<String>, origin: Arc<PeerIdentity>) -> Self {
        Self {
            text: text.into(),
            origin,
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.origin.name, self.text)
    }
}
