//! A byte-at-a-time parser for status packets.
//!
//! The [`Parser`] never touches the transport. Bytes are pushed into it one at
//! a time with [`Parser::process_byte`], which makes it straightforward to test
//! with literal byte sequences:
//!
//! ```
//! use bioloid::{parse::{Parser, ParseStatus}, status::ErrorCode};
//!
//! let mut parser = Parser::new();
//! let mut status = ParseStatus::NotDone;
//! for byte in [0xFF, 0xFF, 0x01, 0x02, 0x00, 0xFC] {
//!     status = parser.process_byte(byte);
//! }
//! assert_eq!(status, ParseStatus::Complete);
//! assert_eq!(parser.device_id(), 1);
//! assert_eq!(parser.error_code(), ErrorCode::None);
//! assert!(parser.payload().is_empty());
//! ```

use crate::{
	packet::MARKER,
	status::{ErrorCode, StatusFlags},
};

/// The position of the parser within a packet.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum State {
	/// Waiting for the first marker byte.
	Marker1,
	/// Waiting for the second marker byte.
	Marker2,
	/// Waiting for the device ID. Extra marker bytes are skipped.
	Id,
	/// Waiting for the length byte.
	Length,
	/// Waiting for the status byte.
	Status,
	/// Reading parameters. The value is the number still to read.
	Params(u8),
	/// Waiting for the checksum byte.
	Checksum,
	/// A packet was assembled and its checksum verified.
	Complete,
	/// The packet was rejected.
	Failed(ErrorCode),
}

/// The result of feeding one byte to a [`Parser`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ParseStatus {
	/// More bytes are needed.
	NotDone,
	/// A packet with a valid checksum was assembled.
	///
	/// The device may still have reported a fault; see [`Parser::error_code`].
	Complete,
	/// The packet was rejected with [`ErrorCode::Checksum`] or
	/// [`ErrorCode::Malformed`].
	Failed(ErrorCode),
}

/// Assembles a single status packet from individual bytes.
///
/// Bytes received before the two marker bytes are discarded, so the parser
/// resynchronizes on line noise. Once the device ID has been read every byte
/// is accepted as part of the packet until the declared number of parameters
/// and the checksum have been consumed.
///
/// Once the parser completes or fails it ignores further bytes and keeps
/// reporting the same result until [`reset`](Parser::reset).
#[derive(Debug, Clone)]
pub struct Parser {
	state: State,
	id: u8,
	length: u8,
	status: StatusFlags,
	params: Vec<u8>,
	/// Running sum of every byte from the ID onwards.
	sum: u8,
	/// The checksum byte, once received.
	received_checksum: u8,
}

impl Default for Parser {
	fn default() -> Self {
		Parser::new()
	}
}

impl Parser {
	/// Create a parser waiting for the start of a packet.
	pub fn new() -> Self {
		Parser {
			state: State::Marker1,
			id: 0,
			length: 0,
			status: StatusFlags::NONE,
			params: Vec::new(),
			sum: 0,
			received_checksum: 0,
		}
	}

	/// Discard any partial packet and wait for the start of a new one.
	pub fn reset(&mut self) {
		self.state = State::Marker1;
		self.id = 0;
		self.length = 0;
		self.status = StatusFlags::NONE;
		self.params.clear();
		self.sum = 0;
		self.received_checksum = 0;
	}

	/// Feed the next byte from the bus into the parser.
	pub fn process_byte(&mut self, byte: u8) -> ParseStatus {
		match self.state {
			State::Marker1 => {
				if byte == MARKER {
					self.state = State::Marker2;
				}
			}
			State::Marker2 => {
				self.state = if byte == MARKER {
					State::Id
				} else {
					State::Marker1
				};
			}
			State::Id => {
				// 0xFF is never a device ID, so it is treated as more preamble.
				if byte != MARKER {
					self.id = byte;
					self.sum = byte;
					self.state = State::Length;
				}
			}
			State::Length => {
				self.length = byte;
				self.sum = self.sum.wrapping_add(byte);
				self.state = if byte < 2 {
					State::Failed(ErrorCode::Malformed)
				} else {
					State::Status
				};
			}
			State::Status => {
				self.status = StatusFlags::from_bits(byte);
				self.sum = self.sum.wrapping_add(byte);
				let remaining = self.length - 2;
				self.params.reserve(usize::from(remaining));
				self.state = if remaining == 0 {
					State::Checksum
				} else {
					State::Params(remaining)
				};
			}
			State::Params(remaining) => {
				self.params.push(byte);
				self.sum = self.sum.wrapping_add(byte);
				self.state = if remaining == 1 {
					State::Checksum
				} else {
					State::Params(remaining - 1)
				};
			}
			State::Checksum => {
				self.received_checksum = byte;
				self.state = if byte == self.expected_checksum() {
					State::Complete
				} else {
					State::Failed(ErrorCode::Checksum)
				};
			}
			State::Complete | State::Failed(_) => {}
		}
		self.parse_status()
	}

	/// The current parse result.
	pub fn parse_status(&self) -> ParseStatus {
		match self.state {
			State::Complete => ParseStatus::Complete,
			State::Failed(code) => ParseStatus::Failed(code),
			_ => ParseStatus::NotDone,
		}
	}

	/// The ID of the device that sent the packet.
	///
	/// Only meaningful once the ID byte has been received.
	pub fn device_id(&self) -> u8 {
		self.id
	}

	/// The declared length of the packet.
	pub fn length(&self) -> u8 {
		self.length
	}

	/// The outcome of the parse.
	///
	/// Returns [`ErrorCode::NotDone`] while the packet is being assembled, the
	/// failure code if the packet was rejected, and otherwise the resolved
	/// device status (see [`StatusFlags::resolve`]).
	pub fn error_code(&self) -> ErrorCode {
		match self.state {
			State::Complete => self.status.resolve(),
			State::Failed(code) => code,
			_ => ErrorCode::NotDone,
		}
	}

	/// The raw status byte reported by the device.
	pub fn status(&self) -> StatusFlags {
		self.status
	}

	/// The packet's parameters.
	///
	/// For a READ this is the data read. It is empty for other commands.
	pub fn payload(&self) -> &[u8] {
		&self.params
	}

	/// The checksum byte that was received.
	pub fn received_checksum(&self) -> u8 {
		self.received_checksum
	}

	/// The checksum calculated from the bytes received so far.
	pub fn expected_checksum(&self) -> u8 {
		!self.sum
	}

	/// Consume the parser and return the assembled packet.
	///
	/// The packet's contents are only meaningful if the parser reported
	/// [`ParseStatus::Complete`].
	pub fn into_packet(self) -> StatusPacket {
		StatusPacket {
			id: self.id,
			status: self.status,
			params: self.params,
		}
	}
}

/// A status packet received from a device.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StatusPacket {
	id: u8,
	status: StatusFlags,
	params: Vec<u8>,
}

impl StatusPacket {
	/// The ID of the device that sent the packet.
	pub fn id(&self) -> u8 {
		self.id
	}

	/// The raw status byte.
	pub fn status(&self) -> StatusFlags {
		self.status
	}

	/// The highest priority fault reported, or [`ErrorCode::None`].
	pub fn error_code(&self) -> ErrorCode {
		self.status.resolve()
	}

	/// The packet's parameters.
	pub fn params(&self) -> &[u8] {
		&self.params
	}

	/// Consume the packet and return its parameters.
	pub fn into_params(self) -> Vec<u8> {
		self.params
	}
}

#[cfg(test)]
mod test {
	use super::*;

	/// Feed every byte to the parser and return the last status.
	fn feed(parser: &mut Parser, bytes: &[u8]) -> ParseStatus {
		let mut status = parser.parse_status();
		for byte in bytes {
			status = parser.process_byte(*byte);
		}
		status
	}

	#[test]
	fn empty_status_packet() {
		let mut parser = Parser::new();
		assert_eq!(parser.error_code(), ErrorCode::NotDone);
		assert_eq!(
			feed(&mut parser, &[0xFF, 0xFF, 0x01, 0x02, 0x00, 0xFC]),
			ParseStatus::Complete
		);
		assert_eq!(parser.device_id(), 1);
		assert_eq!(parser.error_code(), ErrorCode::None);
		assert!(parser.payload().is_empty());
	}

	#[test]
	fn not_done_until_checksum() {
		let mut parser = Parser::new();
		for byte in [0xFF, 0xFF, 0x01, 0x02, 0x00] {
			assert_eq!(parser.process_byte(byte), ParseStatus::NotDone);
		}
		assert_eq!(parser.process_byte(0xFC), ParseStatus::Complete);
	}

	#[test]
	fn corrupted_checksum() {
		let mut parser = Parser::new();
		assert_eq!(
			feed(&mut parser, &[0xFF, 0xFF, 0x01, 0x02, 0x00, 0xFD]),
			ParseStatus::Failed(ErrorCode::Checksum)
		);
		assert_eq!(parser.error_code(), ErrorCode::Checksum);
		assert_eq!(parser.received_checksum(), 0xFD);
		assert_eq!(parser.expected_checksum(), 0xFC);
	}

	#[test]
	fn read_response_params() {
		// Present position of 0x0200 from device 3.
		let mut parser = Parser::new();
		assert_eq!(
			feed(&mut parser, &[0xFF, 0xFF, 0x03, 0x04, 0x00, 0x00, 0x02, 0xF6]),
			ParseStatus::Complete
		);
		assert_eq!(parser.device_id(), 3);
		assert_eq!(parser.payload(), &[0x00, 0x02]);
		let packet = parser.into_packet();
		assert_eq!(packet.id(), 3);
		assert_eq!(packet.error_code(), ErrorCode::None);
		assert_eq!(packet.into_params(), vec![0x00, 0x02]);
	}

	#[test]
	fn device_fault() {
		// Overheating and overload from device 1.
		let mut parser = Parser::new();
		assert_eq!(
			feed(&mut parser, &[0xFF, 0xFF, 0x01, 0x02, 0x24, 0xD8]),
			ParseStatus::Complete
		);
		assert_eq!(parser.error_code(), ErrorCode::Overheating);
		assert_eq!(parser.status().bits(), 0x24);
	}

	#[test]
	fn resynchronizes_on_noise() {
		let mut parser = Parser::new();
		assert_eq!(
			feed(
				&mut parser,
				&[0x00, 0x12, 0xFF, 0x34, 0xFF, 0xFF, 0xFF, 0x01, 0x02, 0x00, 0xFC]
			),
			ParseStatus::Complete
		);
		assert_eq!(parser.device_id(), 1);
	}

	#[test]
	fn accepts_marker_bytes_inside_packet() {
		// A parameter of 0xFF must not restart the packet.
		let mut parser = Parser::new();
		assert_eq!(
			feed(&mut parser, &[0xFF, 0xFF, 0x01, 0x03, 0x00, 0xFF, 0xFC]),
			ParseStatus::Complete
		);
		assert_eq!(parser.payload(), &[0xFF]);
	}

	#[test]
	fn malformed_length() {
		let mut parser = Parser::new();
		assert_eq!(
			feed(&mut parser, &[0xFF, 0xFF, 0x01, 0x01]),
			ParseStatus::Failed(ErrorCode::Malformed)
		);
		assert_eq!(parser.length(), 1);
	}

	#[test]
	fn terminal_states_are_sticky() {
		let mut parser = Parser::new();
		feed(&mut parser, &[0xFF, 0xFF, 0x01, 0x02, 0x00, 0x00]);
		assert_eq!(
			feed(&mut parser, &[0xFF, 0xFF, 0x01, 0x02, 0x00, 0xFC]),
			ParseStatus::Failed(ErrorCode::Checksum)
		);

		parser.reset();
		assert_eq!(parser.parse_status(), ParseStatus::NotDone);
		assert_eq!(
			feed(&mut parser, &[0xFF, 0xFF, 0x01, 0x02, 0x00, 0xFC]),
			ParseStatus::Complete
		);
		assert_eq!(feed(&mut parser, &[0x00]), ParseStatus::Complete);
	}
}
