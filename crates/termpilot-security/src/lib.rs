//! Resource locking and input hygiene for termpilot.
//!
//! Provides the cross-session advisory lock table that guards mutating
//! filesystem commands, the path normalization that keys it, and the input
//! sanitizer applied to every REPL line.
//!
//! # Main types
//!
//! - [`LockManager`]: File-backed lock table shared by every session on the host.
//! - [`LockGuard`]: RAII holder of one or more resource locks.
//! - [`PersistPolicy`]: What to do when the lock table cannot be written.
//! - [`Sanitizer`]: Input sanitization utilities.

/// Advisory resource locks.
pub mod lock;
/// Resource path normalization.
pub mod resource;
/// Input sanitization utilities.
pub mod sanitizer;

pub use lock::{LockEntry, LockGuard, LockManager, PersistPolicy, DEFAULT_LOCK_EXPIRY};
pub use resource::resolve_resource;
pub use sanitizer::{SanitizeResult, Sanitizer};
