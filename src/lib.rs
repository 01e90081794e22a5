//! Redfire DTMF - In-band DTMF detection for telephony media
//!
//! Detects the 16 standard DTMF digits inside 8 kHz / 16-bit / mono linear
//! PCM call audio using a bank of Goertzel resonators, with amplitude
//! gating, a two-axis dominance test, and guard-interval debouncing so
//! each physical key press is reported exactly once.
//!
//! **Sponsored by [Carrier One Inc](https://carrierone.com) - Professional Telecommunications Solutions**

pub mod config;
pub mod detector;
pub mod error;
pub mod event;
pub mod generator;
pub mod goertzel;

pub use config::DetectorConfig;
pub use detector::{DtmfDetector, HIGH_FREQUENCIES, LOW_FREQUENCIES};
pub use error::{Error, Result};
pub use event::{DtmfEvent, DtmfEventObserver, ObserverSet};
pub use generator::DtmfGenerator;

/// Crate version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
