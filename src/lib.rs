//! A bus master for Bioloid/Dynamixel servos speaking protocol 1.0 over a
//! half-duplex serial line.
//!
//! Open a [`Bus`](bus::Bus) on a serial port and address devices by ID:
//!
//! ```rust
//! # use bioloid::bus::Bus;
//! # fn wrapper() -> Result<(), Box<dyn std::error::Error>> {
//! let mut bus = Bus::open_serial("/dev/ttyUSB0")?;
//! bus.scan(0, 32, |id| println!("found device {id}"), |_| {})?;
//! # Ok(())
//! # }
//! ```
//!
//! The [`packet`] and [`parse`] modules encode and decode packets without
//! any I/O and can be used on their own.

#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]
#![deny(missing_debug_implementations)]
#![cfg_attr(all(doc, feature = "doc_cfg"), feature(doc_cfg))]

pub mod backend;
pub mod bus;
pub mod error;
pub mod packet;
pub mod parse;
pub mod status;
pub mod timeout_guard;
pub mod transport;
