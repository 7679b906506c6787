//! Bluetooth Module
//!
//! Connection core for the vario peripheral, built on an abstract
//! capability adapter instead of a concrete radio stack.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                      VarioService                        │
//! │  (Main coordinator - public API for the application)     │
//! └─────────────────────┬───────────────────────────────────┘
//!                       │
//!        ┌──────────────┼──────────────┬─────────────┐
//!        │              │              │             │
//!        ▼              ▼              ▼             ▼
//! ┌───────────┐  ┌────────────┐  ┌──────────┐  ┌──────────┐
//! │ Discovery │  │  Session   │  │ Protocol │  │ Command  │
//! │           │  │            │  │          │  │          │
//! │ - scan    │  │ - connect  │  │ - UUIDs  │  │ - buzzer │
//! │ - filter  │  │ - enumerate│  │ - decode │  │   writes │
//! │ - timeout │  │ - subscribe│  │ - filter │  │          │
//! └───────────┘  └────────────┘  └──────────┘  └──────────┘
//! ```
//!
//! ## Modules
//!
//! - [`adapter`] - capability adapter trait and event enum
//! - [`protocol`] - peripheral identity, classification, and decoding
//! - [`discovery`] - bounded-time device discovery
//! - [`session`] - connection session state machine
//! - [`command`] - outbound command dispatch
//! - [`service`] - main service coordinator
//! - [`mock`] - recording adapter for tests

pub mod adapter;
pub mod command;
pub mod discovery;
pub mod mock;
pub mod protocol;
pub mod session;
pub mod service;

// Re-export main service for convenience
pub use service::{ServiceCommand, VarioService};
