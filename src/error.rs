//! Error types.
//!
//! Each error is represented by a unique type that implements [`std::error::Error`].
//! Most [`Bus`](crate::bus::Bus) methods return more than one kind of error and
//! so return the higher level [`BusError`] enum. The concrete error types are
//! convertible to the enum, allowing them to be used with `?`, and the enum can
//! be converted back into a concrete type with [`TryFrom`]:
//!
//! ```
//! use bioloid::error::{BusError, DeviceFaultError};
//!
//! fn inspect(err: BusError) {
//!     match DeviceFaultError::try_from(err) {
//!         Ok(fault) => println!("device {} reported {}", fault.id(), fault.code()),
//!         Err(other) => println!("bus failure: {other}"),
//!     }
//! }
//! ```
//!
//! The errors fall into four groups:
//!
//! * transport failures: [`TimeoutError`] and [`std::io::Error`],
//! * protocol failures: [`ChecksumError`], [`MalformedPacketError`] and
//!   [`UnexpectedIdError`],
//! * device faults: [`DeviceFaultError`],
//! * validation failures, raised before anything is transmitted:
//!   [`SyncWriteDimensionsError`] and [`PayloadTooLongError`].

use crate::status::{ErrorCode, StatusFlags};

/// Implement Error and Display traits for the specified type.
///
/// After the type define the format string and any arguments it should
/// reference after `self =>` (to abide by macro hygiene rules).
macro_rules! impl_error_display {
	(
		$name:path,
		$self:ident =>
		$display:literal
		$(,
			$($arg:expr),+
		)?
	) => {
		impl std::error::Error for $name {}

		impl std::fmt::Display for $name {
			fn fmt(&$self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
				write!(
					f,
					$display
					$(,
						$($arg),+
					)?
				)
			}
		}
	};
}

/// Define error enums that contain concrete error types (not other error enums).
///
/// From and TryFrom traits will be implemented for the enum and it's underlying
/// errors. The enum's Display implementation will defer to the underlying errors'
/// Display implementations.
///
/// Simple implementations of From and TryFrom with other error enums can be
/// added by appending a succinct impl block, which assumes that:
///   * it is being implemented for this error enum,
///   * each variant has a single tuple value, and can be converted to the value
///     in this enum with its own From implementation.
macro_rules! error_enum {
	(
		$(#[$attr:meta])*
		pub enum $name:ident {
			$(
				$variant:ident($inner:path)
			),+
			$(,)?
		}
		// Additional information for From/TryFrom impl blocks.
		$(
			impl From<$from_t:ident>
			{
				$($from_variant:ident => $to_variant:ident),+
				$(,)?
			}
		)*
	) => {
		$(
			#[$attr]
		)*
		#[allow(missing_docs)]
		pub enum $name {
			$(
				$variant($inner)
			),+
		}

		impl std::error::Error for $name {}

		// Defer the display to the inner error type
		impl std::fmt::Display for $name {
			fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
				match self {
					$(
						$name::$variant(e) => e.fmt(f)
					),+
				}
			}
		}

		// Conversions with underlying errors
		$(
			impl From<$inner> for $name {
				fn from(other: $inner) -> Self {
					$name::$variant(other)
				}
			}

			impl TryFrom<$name> for $inner {
				type Error = $name;
				fn try_from(other: $name) -> Result<Self, Self::Error> {
					match other {
						$name::$variant(value) => Ok(value),
						value => Err(value)
					}
				}
			}
		)+

		// Conversions from other enum errors
		$(
			impl From<$from_t> for $name {
				fn from(other: $from_t) -> Self {
					match other {
						$($from_t::$from_variant(e) => $name::$to_variant(e)),+
					}
				}
			}

			impl TryFrom<$name> for $from_t {
				type Error = $name;
				fn try_from(other: $name) -> Result<Self, Self::Error> {
					match other {
						$(
							$name::$to_variant(e) => Ok($from_t::$from_variant(e))
						),+
						,
						_ => Err(other)
					}
				}
			}
		)*
	};
}

/// The specified device is either disconnected or already in use by another process.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct SerialDeviceInUseOrDisconnectedError(Box<str>);

impl_error_display! {
	SerialDeviceInUseOrDisconnectedError,
	self =>
	"the specified device is either disconnected or already in use by another process: {}", self.0
}

/// No byte arrived within the read timeout while a status packet was expected.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct TimeoutError {
	/// The addressed device, if known.
	id: Option<u8>,
	/// The number of bytes received before the line went quiet.
	received: usize,
}

impl TimeoutError {
	pub(crate) const fn new(id: Option<u8>, received: usize) -> Self {
		TimeoutError { id, received }
	}

	/// The device that failed to respond, if the request was addressed.
	pub const fn id(&self) -> Option<u8> {
		self.id
	}

	/// The number of bytes of a partial status packet received before timing out.
	pub const fn received(&self) -> usize {
		self.received
	}

	/// Always [`ErrorCode::Timeout`].
	pub const fn code(&self) -> ErrorCode {
		ErrorCode::Timeout
	}
}

impl_error_display! {
	TimeoutError,
	self => "timed out waiting for a status packet{} ({} bytes received)",
	self.id.map(|id| format!(" from ID {id}")).unwrap_or_default(),
	self.received
}

/// A status packet's checksum did not match its contents.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ChecksumError {
	id: u8,
	received: u8,
	expected: u8,
}

impl ChecksumError {
	pub(crate) const fn new(id: u8, received: u8, expected: u8) -> Self {
		ChecksumError {
			id,
			received,
			expected,
		}
	}

	/// The device ID found in the corrupted packet.
	///
	/// As the packet is corrupt, this may not be the device that sent it.
	pub const fn id(&self) -> u8 {
		self.id
	}

	/// The checksum byte that was received.
	pub const fn received(&self) -> u8 {
		self.received
	}

	/// The checksum calculated from the packet's contents.
	pub const fn expected(&self) -> u8 {
		self.expected
	}

	/// Always [`ErrorCode::Checksum`].
	pub const fn code(&self) -> ErrorCode {
		ErrorCode::Checksum
	}
}

impl_error_display! {
	ChecksumError,
	self => "status packet from ID {} has checksum 0x{:02X}, expected 0x{:02X}",
	self.id,
	self.received,
	self.expected
}

/// A status packet declared a length that cannot hold a status byte and checksum.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct MalformedPacketError {
	id: u8,
	length: u8,
}

impl MalformedPacketError {
	pub(crate) const fn new(id: u8, length: u8) -> Self {
		MalformedPacketError { id, length }
	}

	/// The device ID found in the malformed packet.
	pub const fn id(&self) -> u8 {
		self.id
	}

	/// The declared length.
	pub const fn length(&self) -> u8 {
		self.length
	}

	/// Always [`ErrorCode::Malformed`].
	pub const fn code(&self) -> ErrorCode {
		ErrorCode::Malformed
	}
}

impl_error_display! {
	MalformedPacketError,
	self => "status packet from ID {} declares an invalid length of {}",
	self.id,
	self.length
}

/// A device reported one or more faults in its status packet.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct DeviceFaultError {
	id: u8,
	status: StatusFlags,
}

impl DeviceFaultError {
	pub(crate) const fn new(id: u8, status: StatusFlags) -> Self {
		DeviceFaultError { id, status }
	}

	/// The device that reported the fault.
	pub const fn id(&self) -> u8 {
		self.id
	}

	/// All of the fault bits the device reported.
	pub const fn status(&self) -> StatusFlags {
		self.status
	}

	/// The highest priority fault the device reported.
	///
	/// See [`StatusFlags::resolve`] for the priority order.
	pub fn code(&self) -> ErrorCode {
		self.status.resolve()
	}
}

impl_error_display! {
	DeviceFaultError,
	self => "Rcvd Status: {} from ID: {} (status 0x{:02X}: {})",
	self.code(),
	self.id,
	self.status.bits(),
	self.status
}

/// A status packet came from a different device than the one addressed.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct UnexpectedIdError {
	expected: u8,
	received: u8,
}

impl UnexpectedIdError {
	pub(crate) const fn new(expected: u8, received: u8) -> Self {
		UnexpectedIdError { expected, received }
	}

	/// The addressed device.
	pub const fn expected(&self) -> u8 {
		self.expected
	}

	/// The device ID in the status packet.
	pub const fn received(&self) -> u8 {
		self.received
	}
}

impl_error_display! {
	UnexpectedIdError,
	self => "expected a status packet from ID {} but received one from ID {}",
	self.expected,
	self.received
}

/// The arguments to a synchronized write do not describe a rectangular table.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum SyncWriteDimensionsError {
	/// No device IDs were given.
	Empty,
	/// The number of IDs and the number of value rows differ.
	CountMismatch {
		/// The number of device IDs.
		ids: usize,
		/// The number of value rows.
		values: usize,
	},
	/// A value row has a different length than the first row.
	RaggedValues {
		/// The index of the offending row.
		index: usize,
		/// The length of the first row.
		expected: usize,
		/// The length of the offending row.
		actual: usize,
	},
}

impl std::error::Error for SyncWriteDimensionsError {}

impl std::fmt::Display for SyncWriteDimensionsError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			SyncWriteDimensionsError::Empty => write!(f, "sync write requires at least one device ID"),
			SyncWriteDimensionsError::CountMismatch { ids, values } => write!(
				f,
				"number of device IDs ({ids}) must match the number of values ({values})"
			),
			SyncWriteDimensionsError::RaggedValues {
				index,
				expected,
				actual,
			} => write!(
				f,
				"values[{index}] has {actual} bytes but every device must be written {expected} bytes"
			),
		}
	}
}

/// A packet's parameters do not fit in the packet's length field.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct PayloadTooLongError {
	len: usize,
}

impl PayloadTooLongError {
	pub(crate) const fn new(len: usize) -> Self {
		PayloadTooLongError { len }
	}

	/// The number of parameter bytes that was requested.
	pub const fn requested_len(&self) -> usize {
		self.len
	}
}

impl_error_display! {
	PayloadTooLongError,
	self => "{} parameter bytes exceeds the maximum of {}",
	self.len,
	crate::packet::MAX_PARAMS_LEN
}

error_enum! {
	/// Arguments that were rejected before any byte was transmitted.
	#[derive(Debug, Copy, Clone, PartialEq, Eq)]
	pub enum ValidationError {
		SyncWriteDimensions(SyncWriteDimensionsError),
		PayloadTooLong(PayloadTooLongError),
	}
}

error_enum! {
	/// Any error returned by a [`Bus`](crate::bus::Bus).
	#[derive(Debug)]
	#[non_exhaustive]
	pub enum BusError {
		SerialDeviceInUseOrDisconnected(SerialDeviceInUseOrDisconnectedError),
		Io(std::io::Error),
		Timeout(TimeoutError),
		Checksum(ChecksumError),
		Malformed(MalformedPacketError),
		DeviceFault(DeviceFaultError),
		UnexpectedId(UnexpectedIdError),
		SyncWriteDimensions(SyncWriteDimensionsError),
		PayloadTooLong(PayloadTooLongError),
	}

	impl From<ValidationError> {
		SyncWriteDimensions => SyncWriteDimensions,
		PayloadTooLong => PayloadTooLong,
	}
}

impl BusError {
	/// A convenience function for determining if the error is due to the
	/// transport timing out.
	pub fn is_timeout(&self) -> bool {
		match self {
			BusError::Timeout(_) => true,
			BusError::Io(e) => e.kind() == std::io::ErrorKind::TimedOut,
			_ => false,
		}
	}

	/// The status code carried by the error, if any.
	///
	/// Timeouts, checksum failures, malformed packets and device faults carry a
	/// code. Other errors return `None`.
	pub fn error_code(&self) -> Option<ErrorCode> {
		match self {
			BusError::Timeout(e) => Some(e.code()),
			BusError::Io(e) if e.kind() == std::io::ErrorKind::TimedOut => Some(ErrorCode::Timeout),
			BusError::Checksum(e) => Some(e.code()),
			BusError::Malformed(e) => Some(e.code()),
			BusError::DeviceFault(e) => Some(e.code()),
			_ => None,
		}
	}
}

impl From<serialport::Error> for BusError {
	fn from(other: serialport::Error) -> Self {
		use std::io;

		match other.kind() {
			serialport::ErrorKind::NoDevice => BusError::SerialDeviceInUseOrDisconnected(
				SerialDeviceInUseOrDisconnectedError(other.description.into_boxed_str()),
			),
			serialport::ErrorKind::InvalidInput => BusError::Io(io::Error::new(
				io::ErrorKind::InvalidInput,
				other.description,
			)),
			serialport::ErrorKind::Unknown => {
				BusError::Io(io::Error::new(io::ErrorKind::Other, other.description))
			}
			serialport::ErrorKind::Io(kind) => BusError::Io(io::Error::new(kind, other.description)),
		}
	}
}
