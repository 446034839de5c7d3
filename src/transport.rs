//! The byte-level contract between a [`Bus`](crate::bus::Bus) and the line it drives.

use std::io;

use crate::backend::Backend;

/// Something that can move raw bytes to and from the devices on a bus.
///
/// Every [`Backend`] is a `Transport`. Implement this directly to drive a bus
/// over something that is not a serial port, such as a USB bridge with its own
/// framing.
pub trait Transport {
	/// Read a single byte.
	///
	/// Blocks for at most the transport's timeout. Returns `Ok(None)` if no byte
	/// arrived in that time.
	fn read_byte(&mut self) -> io::Result<Option<u8>>;

	/// Write a complete packet.
	///
	/// The packet must reach the line in one piece, without another packet's
	/// bytes interleaved.
	fn write_packet(&mut self, bytes: &[u8]) -> io::Result<()>;

	/// Get the "name" of the transport, used in log messages.
	fn name(&self) -> Option<String> {
		None
	}
}

impl<B: Backend + ?Sized> Transport for B {
	fn read_byte(&mut self) -> io::Result<Option<u8>> {
		let mut byte = [0u8];
		loop {
			return match self.read(&mut byte) {
				Ok(0) => Ok(None),
				Ok(_) => Ok(Some(byte[0])),
				Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
				Err(e)
					if matches!(
						e.kind(),
						io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
					) =>
				{
					Ok(None)
				}
				Err(e) => Err(e),
			};
		}
	}

	fn write_packet(&mut self, bytes: &[u8]) -> io::Result<()> {
		self.write_all(bytes)?;
		self.flush()
	}

	fn name(&self) -> Option<String> {
		Backend::name(self)
	}
}
