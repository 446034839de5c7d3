//! Options for opening a bus on a serial port.

use super::{Bus, Show};
use crate::{
	backend::{Backend, Serial},
	error::BusError,
};
use serialport as sp;
use std::time::Duration;

/// Options for configuring and opening a serial port.
///
/// ## Example
///
/// ```rust
/// # use bioloid::bus::{OpenSerialOptions, Show};
/// # use std::time::Duration;
/// # fn wrapper() -> Result<(), Box<dyn std::error::Error>> {
/// let mut bus = OpenSerialOptions::new()
///     .baud_rate(57_600)
///     .timeout(Some(Duration::from_millis(20)))
///     .show(Show::COMMANDS)
///     .open("/dev/ttyUSB0")?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct OpenSerialOptions {
	/// The custom baud rate
	baud_rate: u32,
	/// The custom timeout
	timeout: Option<Duration>,
	/// What the bus should log
	show: Show,
}

impl OpenSerialOptions {
	/// The factory default baud rate of most devices: 1,000,000.
	pub const DEFAULT_BAUD_RATE: u32 = 1_000_000;

	/// The default time to wait for each byte of a status packet.
	pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(100);

	/// Create a blank set of options ready for configuration.
	///
	/// The default baud rate and read timeout are 1,000,000 and 100
	/// milliseconds, respectively, and nothing extra is logged.
	///
	/// Equivalent to [`default`](OpenSerialOptions::default).
	pub fn new() -> Self {
		OpenSerialOptions {
			baud_rate: OpenSerialOptions::DEFAULT_BAUD_RATE,
			timeout: Some(OpenSerialOptions::DEFAULT_TIMEOUT),
			show: Show::NONE,
		}
	}

	/// Set a custom baud rate.
	///
	/// The default is 1,000,000.
	pub fn baud_rate(&mut self, baud_rate: u32) -> &mut Self {
		self.baud_rate = baud_rate;
		self
	}

	/// Set a custom read timeout.
	///
	/// If duration is `None`, reads will block indefinitely. The default is 100 milliseconds.
	pub fn timeout(&mut self, duration: Option<Duration>) -> &mut Self {
		self.timeout = duration;
		self
	}

	/// Set what the bus should log.
	///
	/// The default is [`Show::NONE`].
	pub fn show(&mut self, show: Show) -> &mut Self {
		self.show = show;
		self
	}

	/// Open a [`Serial`] port configured for the bus at the specified path.
	fn open_serial_port(&self, path: &str) -> Result<Serial, BusError> {
		// The baud rate passed to `new` is ignored by some serialport versions
		// (https://gitlab.com/susurrus/serialport-rs/-/issues/102), so it is
		// set again with `baud_rate` below.
		sp::new(path, OpenSerialOptions::DEFAULT_BAUD_RATE)
			.data_bits(sp::DataBits::Eight)
			.parity(sp::Parity::None)
			.flow_control(sp::FlowControl::None)
			.stop_bits(sp::StopBits::One)
			// The serialport API does not support infinite timeouts, so use
			// the largest possible duration instead.
			.timeout(self.timeout.unwrap_or(Duration::MAX))
			.baud_rate(self.baud_rate)
			.open_native()
			.map(Serial)
			.map_err(Into::into)
	}

	/// Open the bus on the serial port at the specified path with the custom options.
	pub fn open<'a>(&self, path: &str) -> Result<Bus<'a, Serial>, BusError> {
		Ok(Bus::with_show(self.open_serial_port(path)?, self.show))
	}

	/// Open the bus on the serial port at the specified path with the custom options.
	///
	/// The type of the underlying backend is erased via dynamic dispatch,
	/// which does have runtime overhead. [`OpenSerialOptions::open`] should
	/// generally be used instead, except when the type of the underlying
	/// backend may not be known at compile time.
	pub fn open_dyn<'a>(&self, path: &str) -> Result<Bus<'a, Box<dyn Backend>>, BusError> {
		Ok(Bus::with_show(
			Box::new(self.open_serial_port(path)?),
			self.show,
		))
	}
}

impl Default for OpenSerialOptions {
	fn default() -> Self {
		OpenSerialOptions::new()
	}
}
