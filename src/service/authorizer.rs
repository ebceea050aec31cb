//! Authorization seam consulted before a frame is relayed.

use async_trait::async_trait;

use crate::domain::{ParticipantId, RoomKey};
use crate::error::RelayError;

/// Answers "may these two participants exchange a message right now?".
///
/// Implementations typically check that an approved, paid, unexpired
/// consultation links the pair.
#[async_trait]
pub trait ChatAuthorizer: Send + Sync + std::fmt::Debug {
    /// Returns whether `a` may send to `b` in `room`.
    ///
    /// # Errors
    ///
    /// Returns a [`RelayError`] if the answer cannot be determined; the
    /// relay treats that the same as a refusal.
    async fn is_allowed(
        &self,
        room: &RoomKey,
        a: &ParticipantId,
        b: &ParticipantId,
    ) -> Result<bool, RelayError>;
}
