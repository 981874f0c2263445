//! Access-control services.
//!
//! Each service depends on the registry trait and on configuration passed
//! in by the caller; none of them read the environment.

pub mod eligibility;
pub mod lifecycle;
pub mod room_codec;
pub mod token_issuer;
