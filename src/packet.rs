//! Encoding of command and status packets.
//!
//! Every packet on the bus has the same layout:
//!
//! ```text
//! 0xFF 0xFF <id> <length> <instruction or status> <params...> <checksum>
//! ```
//!
//! where `length` counts the instruction/status byte, the parameters and the
//! checksum, and `checksum` is the bitwise inverse of the sum of every byte
//! from `id` through the last parameter.

use crate::{error::PayloadTooLongError, status::StatusFlags};

/// The marker byte that starts every packet (twice).
pub const MARKER: u8 = 0xFF;

/// The two marker bytes that start every packet.
pub const HEADER: [u8; 2] = [MARKER, MARKER];

/// The maximum number of parameter bytes in one packet.
///
/// The length byte also counts the instruction and checksum bytes.
pub const MAX_PARAMS_LEN: usize = u8::MAX as usize - 2;

/// Device IDs with special meaning.
pub mod id {
	/// The ID that addresses every device on the bus.
	///
	/// Devices never send a status packet in response to a broadcast command.
	pub const BROADCAST: u8 = 0xFE;
	/// The largest ID an individual device may have.
	pub const MAX: u8 = BROADCAST - 1;
}

/// The instructions a bus master can send.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Command {
	/// Request a status packet without side effects.
	Ping = 0x01,
	/// Read from a device's control table.
	Read = 0x02,
	/// Write to a device's control table.
	Write = 0x03,
	/// Stage a write that is applied on the next [`Action`](Command::Action).
	RegWrite = 0x04,
	/// Apply all staged writes.
	Action = 0x05,
	/// Restore the control table to factory defaults.
	Reset = 0x06,
	/// Write the same control table range on several devices at once.
	SyncWrite = 0x83,
}

impl Command {
	/// The instruction byte.
	pub const fn code(self) -> u8 {
		self as u8
	}

	/// The name of the instruction as it appears in the protocol documentation.
	pub const fn name(self) -> &'static str {
		match self {
			Command::Ping => "PING",
			Command::Read => "READ",
			Command::Write => "WRITE",
			Command::RegWrite => "REG_WRITE",
			Command::Action => "ACTION",
			Command::Reset => "RESET",
			Command::SyncWrite => "SYNC_WRITE",
		}
	}
}

impl TryFrom<u8> for Command {
	type Error = u8;

	/// Convert an instruction byte. The unrecognized byte is returned on failure.
	fn try_from(value: u8) -> Result<Self, Self::Error> {
		Ok(match value {
			0x01 => Command::Ping,
			0x02 => Command::Read,
			0x03 => Command::Write,
			0x04 => Command::RegWrite,
			0x05 => Command::Action,
			0x06 => Command::Reset,
			0x83 => Command::SyncWrite,
			other => return Err(other),
		})
	}
}

impl From<Command> for u8 {
	fn from(command: Command) -> u8 {
		command.code()
	}
}

impl std::fmt::Display for Command {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.name())
	}
}

/// Calculate the checksum of the bytes from the ID through the last parameter.
pub fn checksum(bytes: &[u8]) -> u8 {
	!bytes.iter().fold(0u8, |sum, byte| sum.wrapping_add(*byte))
}

/// Encode a command packet.
///
/// ## Example
///
/// ```
/// use bioloid::packet::{encode, Command};
/// let bytes = encode(1, Command::Write, &[0x18, 0x01, 0x00]).unwrap();
/// assert_eq!(bytes, [0xFF, 0xFF, 0x01, 0x05, 0x03, 0x18, 0x01, 0x00, 0xDD]);
/// ```
pub fn encode(id: u8, command: Command, params: &[u8]) -> Result<Vec<u8>, PayloadTooLongError> {
	let mut buffer = Vec::new();
	encode_into(&mut buffer, id, command.code(), params)?;
	Ok(buffer)
}

/// Encode a status packet, as a device would send it.
///
/// This is mostly useful for simulating devices.
pub fn encode_status(
	id: u8,
	status: StatusFlags,
	params: &[u8],
) -> Result<Vec<u8>, PayloadTooLongError> {
	let mut buffer = Vec::new();
	encode_into(&mut buffer, id, status.bits(), params)?;
	Ok(buffer)
}

/// Append a packet to `buffer`.
///
/// `buffer` is left untouched on failure.
pub(crate) fn encode_into(
	buffer: &mut Vec<u8>,
	id: u8,
	instruction: u8,
	params: &[u8],
) -> Result<(), PayloadTooLongError> {
	if params.len() > MAX_PARAMS_LEN {
		return Err(PayloadTooLongError::new(params.len()));
	}
	buffer.reserve(params.len() + 6);
	buffer.extend_from_slice(&HEADER);
	let start = buffer.len();
	// The length check above guarantees this fits.
	#[allow(clippy::cast_possible_truncation)]
	let length = (params.len() + 2) as u8;
	buffer.extend_from_slice(&[id, length, instruction]);
	buffer.extend_from_slice(params);
	let sum = checksum(&buffer[start..]);
	buffer.push(sum);
	Ok(())
}
