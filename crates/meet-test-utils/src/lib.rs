//! # Meet Test Utilities
//!
//! Shared test utilities for the meeting access service.
//!
//! This crate provides:
//! - Deterministic key material (`keys`): RSA signing fixtures and an
//!   Ed25519 session keypair that mints upstream session tokens
//! - In-process server harness (`TestMeetServer`) over the in-memory
//!   room registry
//!
//! ## Usage
//!
//! ```rust,ignore
//! use meet_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> anyhow::Result<()> {
//!     let server = TestMeetServer::new()?;
//!     server.seed(MeetingSeed::new("test-app/standup", 1))?;
//!
//!     let response = server
//!         .post_json("/api/v1/tokens", None, serde_json::json!({
//!             "roomName": "standup",
//!             "guestName": "Bob",
//!         }))
//!         .await?;
//!
//!     assert_eq!(response.status, 200);
//!     Ok(())
//! }
//! ```

pub mod keys;
pub mod server_harness;

pub use keys::*;
pub use server_harness::*;

pub use meet_access::repositories::MeetingSeed;
