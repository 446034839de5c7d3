//! Status codes reported by devices and by the packet parser.
//!
//! A device answers every addressed command with a status packet whose status
//! byte is a set of fault bits. Several bits may be set at once, so
//! [`StatusFlags::resolve`] reduces them to the single [`ErrorCode`] with the
//! highest priority in [`PRIORITY`]. The remaining codes describe outcomes
//! observed by the host: a timeout, a checksum mismatch or a malformed packet.

/// Define the device fault bits and the conversions between them and [`ErrorCode`].
///
/// Each entry is `<bit value>: <space separated name words>`. The words are
/// concatenated into the name of the matching `ErrorCode` variant and into the
/// name of a constant in the generated `fault_bit` module.
macro_rules! define_fault_bits {
	(
		$(
			$bit:literal: $($name_word:ident)+
		),+
		$(,)?
	) => {
		paste::paste! {
			define_fault_bits!{@with_concatenated_name
				$(
					$bit: $($name_word)+, [< $($name_word:camel)+ >]
				),+
			}
		}
	};
	(@with_concatenated_name
		$(
			$bit:literal: $($name_word:ident)+, $name:ident
		),+
	) => {
		paste::paste! {
			pub mod fault_bit {
				//! The fault bits of a status byte.
				//!
				//! Use [`ErrorCode::from_fault_bit`](super::ErrorCode::from_fault_bit)
				//! to convert a bit to its code.

				$(
					#[doc = $(" " $name_word " ")+ "(bit `" $bit "`)." ]
					pub const [< $name:snake:upper >] : u8 = $bit;
				)+
			}

			impl ErrorCode {
				/// The status byte bit that reports this code, if it is a device fault.
				pub const fn fault_bit(self) -> Option<u8> {
					match self {
						$(
							ErrorCode::$name => Some(fault_bit::[< $name:snake:upper >]),
						)+
						_ => None,
					}
				}

				/// The code reported by a single status byte bit.
				///
				/// Returns `None` if `bit` is not exactly one fault bit.
				pub const fn from_fault_bit(bit: u8) -> Option<ErrorCode> {
					match bit {
						$(
							$bit => Some(ErrorCode::$name),
						)+
						_ => None,
					}
				}
			}
		}
	};
}

/// The outcome of an exchange with a device.
///
/// `None` is success. `NotDone` is only ever reported by a
/// [`Parser`](crate::parse::Parser) that has not finished assembling a packet.
/// `Timeout`, `Checksum` and `Malformed` are detected by the host. The rest are
/// faults reported by the device in the status byte (a device may also report
/// `Checksum` if the command it received was corrupt).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorCode {
	/// Success.
	None,
	/// The parser is still assembling a packet.
	NotDone,
	/// No byte arrived within the read timeout.
	Timeout,
	/// A checksum did not match.
	Checksum,
	/// A status packet declared an impossible length.
	Malformed,
	/// The supply voltage is outside the configured range.
	InputVoltage,
	/// A goal position is outside the configured angle limits.
	AngleLimit,
	/// The internal temperature exceeds the configured limit.
	Overheating,
	/// A command parameter is out of range.
	Range,
	/// The load exceeds the configured maximum torque.
	Overload,
	/// An undefined instruction, or `ACTION` without a preceding `REG_WRITE`.
	Instruction,
	/// The reserved status bit.
	Reserved,
}

define_fault_bits! {
	0x01: Input Voltage,
	0x02: Angle Limit,
	0x04: Overheating,
	0x08: Range,
	0x10: Checksum,
	0x20: Overload,
	0x40: Instruction,
	0x80: Reserved,
}

/// The order in which simultaneous device faults are reported, highest first.
pub const PRIORITY: [ErrorCode; 8] = [
	ErrorCode::Overheating,
	ErrorCode::Overload,
	ErrorCode::InputVoltage,
	ErrorCode::AngleLimit,
	ErrorCode::Range,
	ErrorCode::Checksum,
	ErrorCode::Instruction,
	ErrorCode::Reserved,
];

impl ErrorCode {
	/// Get a human readable name for the code.
	pub const fn name(self) -> &'static str {
		match self {
			ErrorCode::None => "None",
			ErrorCode::NotDone => "NotDone",
			ErrorCode::Timeout => "Timeout",
			ErrorCode::Checksum => "Checksum",
			ErrorCode::Malformed => "Malformed",
			ErrorCode::InputVoltage => "InputVoltage",
			ErrorCode::AngleLimit => "AngleLimit",
			ErrorCode::Overheating => "OverHeating",
			ErrorCode::Range => "Range",
			ErrorCode::Overload => "Overload",
			ErrorCode::Instruction => "Instruction",
			ErrorCode::Reserved => "Reserved",
		}
	}

	/// Whether this code is a fault a device can report in its status byte.
	pub const fn is_device_fault(self) -> bool {
		self.fault_bit().is_some()
	}
}

impl std::fmt::Display for ErrorCode {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.name())
	}
}

/// The raw status byte of a status packet.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct StatusFlags(u8);

impl StatusFlags {
	/// No faults.
	pub const NONE: StatusFlags = StatusFlags(0);

	/// Wrap a raw status byte.
	pub const fn from_bits(bits: u8) -> Self {
		StatusFlags(bits)
	}

	/// The raw status byte.
	pub const fn bits(self) -> u8 {
		self.0
	}

	/// Whether the device reported no faults.
	pub const fn is_empty(self) -> bool {
		self.0 == 0
	}

	/// Whether the device reported `code`.
	///
	/// Always `false` for codes that are not device faults.
	pub const fn contains(self, code: ErrorCode) -> bool {
		match code.fault_bit() {
			Some(bit) => self.0 & bit != 0,
			None => false,
		}
	}

	/// Iterate over the reported faults in priority order.
	pub fn iter(self) -> impl Iterator<Item = ErrorCode> {
		PRIORITY.into_iter().filter(move |code| self.contains(*code))
	}

	/// Reduce the status byte to a single code.
	///
	/// Returns [`ErrorCode::None`] if no bits are set, otherwise the first set
	/// fault in [`PRIORITY`].
	pub fn resolve(self) -> ErrorCode {
		self.iter().next().unwrap_or(ErrorCode::None)
	}
}

impl From<u8> for StatusFlags {
	fn from(bits: u8) -> Self {
		StatusFlags(bits)
	}
}

impl From<ErrorCode> for StatusFlags {
	/// The flags with only the code's fault bit set (empty for non-fault codes).
	fn from(code: ErrorCode) -> Self {
		StatusFlags(code.fault_bit().unwrap_or(0))
	}
}

impl std::ops::BitOr for StatusFlags {
	type Output = StatusFlags;
	fn bitor(self, rhs: StatusFlags) -> StatusFlags {
		StatusFlags(self.0 | rhs.0)
	}
}

impl std::fmt::Display for StatusFlags {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		if self.is_empty() {
			return f.write_str(ErrorCode::None.name());
		}
		let mut first = true;
		for code in self.iter() {
			if !first {
				f.write_str(", ")?;
			}
			f.write_str(code.name())?;
			first = false;
		}
		Ok(())
	}
}
