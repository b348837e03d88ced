//! Pronunciation assessment engines.
//!
//! This module contains implementations of pronunciation assessment engines.
//!
//! # Available Engines
//!
//! - `pronunciation` - Phoneme-level assessment with L1 interference detection
//!
//! Optional grapheme-to-phoneme converters are enabled via Cargo features:
//! - `espeak` - espeak-ng converter (default, falls back to built-in rules)

pub mod pronunciation;
