//! # IGC Logger Library
//!
//! Write signed IGC flight logs from a stream of GNSS/barometer samples.
//!
//! Every fix append leaves the file ending in a G-record trailer that
//! covers all fixes written so far, so a log cut short by power loss still
//! verifies up to its last committed fix.

pub mod config;
pub mod error;
pub mod igc;
pub mod logging;
pub mod recorder;
pub mod storage;
