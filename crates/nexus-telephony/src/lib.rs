//! Telephony provider REST client.
//!
//! Number management only: validate credentials, list the numbers the
//! account owns, search the marketplace for available numbers, and
//! purchase one. Call signaling and media are out of scope — numbers are
//! routed by the external call-execution backend, not by this crate.

mod client;
mod error;

pub use client::{AccountSummary, TelephonyClient, DEFAULT_API_BASE};
pub use error::TelephonyError;
