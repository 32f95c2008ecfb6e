//! # Utility Modules
//!
//! Supporting utilities for cryptography, logging and metrics.
//!
//! ## Components
//! - **Crypto**: AES-128 stream (CFB) and block (ECB) modes, OS randomness
//! - **Logging**: `tracing-subscriber` setup from [`LoggingConfig`](crate::config::LoggingConfig)
//! - **Metrics**: Thread-safe link counters
//!
//! ## Security
//! - Cryptographically secure RNG (getrandom)
//! - Memory zeroing for key material (zeroize crate)

pub mod crypto;
pub mod logging;
pub mod metrics;

pub use metrics::{global_metrics, Metrics, MetricsSnapshot};
