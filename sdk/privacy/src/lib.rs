//! Shroud Privacy SDK
//!
//! MimbleWimble-style confidential transaction primitives.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                   Confidential Transfer                         │
//! │  ┌──────────────┐  ┌──────────────┐  ┌───────────────────────┐ │
//! │  │ Input tokens │  │ Output tokens│  │   Encrypted opening   │ │
//! │  │ (by id)      │  │ (C, proof)   │  │   (for each owner)    │ │
//! │  └──────────────┘  └──────────────┘  └───────────────────────┘ │
//! │         │                 │                     │               │
//! │         ▼                 ▼                     ▼               │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │              Kernel                                      │   │
//! │  │  • E = Σ C_out - Σ C_in                                  │   │
//! │  │  • Schnorr signature under H with x = Σ r_out - Σ r_in   │   │
//! │  │  • Each C_out carries a 64-bit Bulletproof               │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! [`verify_tally`] and [`verify_range_proof`] are pure functions; they
//! are what both the client and the confidential-asset contract run.

pub mod commitment;
pub mod encryption;
pub mod error;
pub mod kernel;
pub mod keys;
pub mod rangeproof;

pub use commitment::{BlindingFactor, Commitment};
pub use encryption::{EncryptedValue, Opening, decrypt_value, encrypt_value};
pub use error::{PrivacyError, Result};
pub use kernel::{excess_point, sign_kernel, verify_tally};
pub use keys::{generate_keypair, public_key_of};
pub use rangeproof::{RANGE_BITS, prove_range, verify_range_proof};
