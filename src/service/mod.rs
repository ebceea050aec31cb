//! Service layer: message relay orchestration.
//!
//! [`RelayService`] takes each frame read from a connection, asks the
//! optional [`ChatAuthorizer`] which peers may receive it, fans it out
//! through the [`crate::domain::ConnectionRegistry`], and hands delivered
//! text to the persistence side channel.

pub mod authorizer;
pub mod relay_service;

pub use authorizer::ChatAuthorizer;
pub use relay_service::{RelayOutcome, RelayService};
