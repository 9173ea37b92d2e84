//! # IGC Format Module
//!
//! Implementation of the IGC flight recorder file format.
//!
//! This module handles:
//! - Sexagesimal coordinate encoding (DDMMmmm / DDDMMmmm)
//! - A, H, I and B record formatting
//! - Seeded four-stream MD5 digests for the G records
//! - Trailer verification of written files

pub mod protocol;
pub mod coord;
pub mod encoder;
pub mod digest;
pub mod verify;
