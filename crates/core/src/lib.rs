//! Core functionality shared by the EventShield crypto workspace.
//!
//! This crate provides the configuration model, the core error type,
//! structured logging setup, and the wall-clock abstraction used by every
//! time-sensitive primitive (TOTP windows, timestamped MACs, key validity).

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{
    KeyLifecycleConfig, MacConfig, PasswordConfig, RsaConfig, ShieldConfig, TotpConfig,
};
pub use error::{CoreError, Result};
