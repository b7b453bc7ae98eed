//! Router Module Index
//!
//! API routes split by access tier. Page routes are not listed here: they all reach the
//! page fallback, and their access is decided by the gate middleware in front of it.

/// Routes accessible to anyone (health, locale negotiation).
pub mod public;

/// Routes that require a verified session.
pub mod authenticated;
