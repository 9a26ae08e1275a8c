//! Client for the BankID relying party API.
//!
//! [`BankId`] exposes the four order operations over a mutually authenticated
//! HTTPS session that is built on the first call. Orders live on the remote
//! endpoint; callers drive them by collecting every [`COLLECT_INTERVAL`] until
//! the status leaves pending.

pub mod client;
pub mod config;
pub mod domain;
pub mod telemetry;
pub mod tls;
pub mod transport;

pub use client::{BankId, COLLECT_INTERVAL, Error};
