//! Tag correlation window.

use crate::{Error, Result};

/// Tracks the outbound tag sequence and the tag expected on the next tagged
/// reply.
///
/// Tags observed on the wire must be strictly increasing by one; the next
/// unconsumed tag is the only one a tagged reply may legally carry. A
/// mismatch is a protocol violation, and the expected tag is left unchanged
/// so later, correctly-tagged lines still correlate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagWindow {
    next_cmd: u32,
    next_reply: u32,
}

impl TagWindow {
    /// Creates a window with both counters at 1.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            next_cmd: 1,
            next_reply: 1,
        }
    }

    /// Assigns the tag for the next outbound command.
    pub fn assign(&mut self) -> u32 {
        let tag = self.next_cmd;
        self.next_cmd += 1;
        tag
    }

    /// Number of commands sent whose replies have not arrived.
    #[must_use]
    pub const fn outstanding(&self) -> u32 {
        self.next_cmd - self.next_reply
    }

    /// Validates and consumes one tagged-reply tag.
    pub fn accept(&mut self, tag: u32) -> Result<()> {
        if self.outstanding() == 0 {
            return Err(Error::Protocol(format!(
                "tagged reply {tag} with no command outstanding"
            )));
        }
        if tag != self.next_reply {
            return Err(Error::Protocol(format!(
                "reply tag {tag} does not match expected tag {}",
                self.next_reply
            )));
        }
        self.next_reply += 1;
        Ok(())
    }
}

impl Default for TagWindow {
    fn default() -> Self {
        Self::new()
    }
}
