//! # Arena Client Library
//!
//! A headless participant for the kart arena. It never decides anything about
//! the match: it mirrors what the authority broadcasts and submits requests
//! back to it.
//!
//! ## Module Organization
//!
//! ### Mirror Module (`mirror`)
//! Read-only replica of the authority's state:
//! - Replicated kart fields (health, alive, weapon, ammo, drift) updated from events
//! - Scoreboard rows and match phase
//! - Best-effort positions from snapshots
//! - Presentation signals for the local participant (spectate, countdown, results)
//!
//! ### Controller Module (`controller`)
//! Turns intent into commands:
//! - Local weapon cooldown tracking before a request is even sent
//! - Fall detection reported once per breach
//! - Command sequence numbering
//!
//! ### Network Module (`network`)
//! UDP connection to the authority and a scripted bot loop that exercises the
//! whole command surface.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::network::Client;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = Client::new("127.0.0.1:8080", "ana", 0, 7).await?;
//!     client.run(Some(Duration::from_secs(60))).await?;
//!     Ok(())
//! }
//! ```

pub mod controller;
pub mod mirror;
pub mod network;
