//! # Arena Server Library
//!
//! This library provides the authoritative simulation for the multiplayer kart
//! arena. It owns every kart, projectile and mine, decides every hit, and
//! broadcasts the results so connected participants can present them.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! Health, inventory, scores and match phase only change here. Participants
//! submit requests (drive, fire, drop a mine, respawn) and the authority
//! validates each one against its own view of the world before acting.
//!
//! ### Deferred Work
//! Anything that happens "later" (mine arming, fuse expiry, pickup respawn,
//! countdown steps, automatic respawn, match restart) is a scheduled task on
//! the simulation clock. Each task re-checks its preconditions when it fires,
//! so a task for a mine that already exploded or a kart that already
//! respawned does nothing.
//!
//! ### State Broadcasting
//! Each tick publishes the events produced by that tick (effects, replicated
//! field changes, scoreboard rows) followed by a positional snapshot.
//!
//! ## Architecture Design
//!
//! ### Single Writer
//! Network tasks only queue commands. The game loop drains the queue between
//! ticks and is the only code that mutates [`game::GameState`], which keeps a
//! tick deterministic for a given seed and command sequence.
//!
//! ### UDP-Based Communication
//! Packets are bincode-encoded [`shared::Packet`] values over UDP. Commands
//! carry sequence numbers so duplicates and stale retransmissions are dropped.
//!
//! ## Module Organization
//!
//! - `config`: TOML-loaded arena layout, tuning and match rules
//! - `scheduler`: time-ordered continuations on the simulation clock
//! - `physics`: colliders, overlap queries and substep sizing
//! - `health`, `inventory`: per-kart damage and weapon ownership
//! - `kart`, `blade`, `mine`, `pickups`, `spawn`: arena entities
//! - `scoreboard`, `lifecycle`: scoring and match phases
//! - `game`: the world that ties the above together, one tick at a time
//! - `client_manager`, `network`: connections, command queues and the tick loop
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // 30Hz tick, up to 8 participants, default arena, two AI karts
//!     let mut server = Server::new(
//!         "127.0.0.1:8080",
//!         Duration::from_secs_f64(1.0 / 30.0),
//!         8,
//!         ServerConfig::default(),
//!         2,
//!     )
//!     .await?;
//!
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod blade;
pub mod client_manager;
pub mod config;
pub mod game;
pub mod health;
pub mod inventory;
pub mod kart;
pub mod lifecycle;
pub mod mine;
pub mod network;
pub mod physics;
pub mod pickups;
pub mod scheduler;
pub mod scoreboard;
pub mod spawn;
