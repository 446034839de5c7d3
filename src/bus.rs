//! Driving the devices on a bus.
//!
//! A [`Bus`] owns a [`Transport`] and performs one request/response exchange
//! per method call. Devices are addressed by their ID on every call; the bus
//! keeps no per-device state.
//!
//! ```rust
//! # use bioloid::bus::Bus;
//! # fn wrapper() -> Result<(), Box<dyn std::error::Error>> {
//! let mut bus = Bus::open_serial("/dev/ttyUSB0")?;
//! if bus.ping(1)? {
//!     // Read the present position (2 bytes at 0x24).
//!     let position = bus.read(1, 0x24, 2)?;
//!     // Move to the center position.
//!     bus.write(1, 0x1E, &[0x00, 0x02])?;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Commands addressed to [`BROADCAST`](crate::packet::id::BROADCAST) are
//! applied by every device and never answered, so the bus does not wait for a
//! reply. Use [`Bus::write_deferred`] followed by [`Bus::action`], or
//! [`Bus::sync_write`], to move several devices at the same instant.
//!
//! ## Errors
//!
//! Failures of an exchange are reported as a [`BusError`]. A device that does
//! not answer produces a [`TimeoutError`], except for [`Bus::ping`] which
//! reports it as `false`. Nothing is retried.

mod handlers;
mod options;
mod scan;
#[cfg(test)]
mod test;

#[cfg(any(test, feature = "mock"))]
use crate::backend::Mock;
use crate::{
	backend::{Backend, Serial, UNKNOWN_BACKEND_NAME},
	error::{
		BusError, ChecksumError, DeviceFaultError, MalformedPacketError, PayloadTooLongError,
		SyncWriteDimensionsError, TimeoutError, UnexpectedIdError, ValidationError,
	},
	packet::{self, id, Command, MAX_PARAMS_LEN},
	parse::{ParseStatus, Parser, StatusPacket},
	status::ErrorCode,
	timeout_guard::TimeoutGuard,
	transport::Transport,
};
use std::{io, time::Duration};

pub use handlers::PacketHandler;
pub use options::OpenSerialOptions;
pub use scan::Scan;

/// The direction a packet was sent.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Direction {
	/// The packet was transmitted to the devices.
	Tx,
	/// The packet was received from a device.
	Recv,
}

/// What a [`Bus`] logs in addition to its `debug` level packet trace.
///
/// Flags can be combined with `|`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct Show(u8);

impl Show {
	/// Log nothing extra.
	pub const NONE: Show = Show(0);
	/// Log a description of each command at `info` level.
	pub const COMMANDS: Show = Show(0x01);
	/// Log the bytes of each packet at `info` level.
	pub const PACKETS: Show = Show(0x02);
	/// Log everything.
	pub const ALL: Show = Show(Show::COMMANDS.0 | Show::PACKETS.0);

	/// Whether every flag in `other` is also set in `self`.
	pub const fn contains(self, other: Show) -> bool {
		self.0 & other.0 == other.0
	}
}

impl std::ops::BitOr for Show {
	type Output = Show;
	fn bitor(self, rhs: Show) -> Show {
		Show(self.0 | rhs.0)
	}
}

impl std::ops::BitOrAssign for Show {
	fn bitor_assign(&mut self, rhs: Show) {
		self.0 |= rhs.0;
	}
}

/// A bus master for devices speaking the Bioloid/Dynamixel protocol.
///
/// See the [module](self) documentation for details on how to use a `Bus`.
#[derive(Debug)]
pub struct Bus<'a, T> {
	/// The transport packets are exchanged over
	transport: T,
	/// What to log
	show: Show,
	/// If populated, the error that has "poisoned" the bus. This error MUST be
	/// reported before the bus is used for communication again.
	///
	/// A [`TimeoutGuard`] that cannot restore the original timeout in its Drop
	/// implementation poisons the bus rather than panicking.
	poison: Option<io::Error>,
	/// Registered event handlers
	handlers: handlers::Handlers<'a>,
}

impl<'a> Bus<'a, Serial> {
	/// Open the serial port at the specified path using the default options.
	///
	/// Alternatively, use [`OpenSerialOptions`] to customize how the port is opened.
	///
	/// ## Example
	///
	/// ```rust
	/// # use bioloid::bus::Bus;
	/// # fn wrapper() -> Result<(), Box<dyn std::error::Error>> {
	/// let mut bus = Bus::open_serial("/dev/ttyUSB0")?;
	/// # Ok(())
	/// # }
	/// ```
	pub fn open_serial(path: &str) -> Result<Self, BusError> {
		OpenSerialOptions::new().open(path)
	}
}

#[cfg(any(test, feature = "mock"))]
#[cfg_attr(all(doc, feature = "doc_cfg"), doc(cfg(feature = "mock")))]
impl<'a> Bus<'a, Mock> {
	/// Open a bus on a [`Mock`] backend.
	pub fn open_mock() -> Self {
		Bus::new(Mock::new())
	}
}

impl<'a, B: Backend> Bus<'a, B> {
	/// Set the transport's read timeout and return a "scope guard" that will
	/// restore it when it goes out of scope.
	///
	/// If no timeout is specified, reads can block indefinitely.
	///
	/// While the guard is in scope, the bus can only be accessed through the
	/// guard. However, because the guard implements [`Deref`](std::ops::Deref)
	/// and [`DerefMut`](std::ops::DerefMut) callers can treat the guard as the
	/// bus.
	///
	/// ## Example
	/// ```rust
	/// # use bioloid::{bus::Bus, backend::Backend, error::BusError};
	/// # use std::time::Duration;
	/// # fn helper<B: Backend>(mut bus: Bus<B>) -> Result<(), BusError> {
	/// {
	///     // Devices answer within a few milliseconds, so scan quickly.
	///     let mut guard = bus.timeout_guard(Some(Duration::from_millis(10)))?;
	///     guard.scan(0, 32, |id| println!("found {id}"), |_| {})?;
	/// } // The guard is dropped and the timeout is restored.
	/// # Ok(())
	/// # }
	/// ```
	pub fn timeout_guard(
		&mut self,
		timeout: Option<Duration>,
	) -> Result<TimeoutGuard<'_, 'a, B>, io::Error> {
		self.check_poisoned()?;

		TimeoutGuard::new(self, timeout)
	}

	/// Set the read timeout and return the old timeout.
	///
	/// If timeout is `None`, reads will block indefinitely.
	pub fn set_read_timeout(
		&mut self,
		timeout: Option<Duration>,
	) -> Result<Option<Duration>, io::Error> {
		let old = self.transport.read_timeout()?;
		self.transport.set_read_timeout(timeout)?;
		Ok(old)
	}

	/// Get the read timeout.
	///
	/// If it is `None`, reads will block indefinitely.
	pub fn read_timeout(&self) -> Result<Option<Duration>, io::Error> {
		self.transport.read_timeout()
	}
}

impl<'a, T: Transport> Bus<'a, T> {
	/// Create a bus that logs nothing extra.
	pub fn new(transport: T) -> Self {
		Bus::with_show(transport, Show::NONE)
	}

	/// Create a bus with the specified logging.
	pub fn with_show(transport: T, show: Show) -> Self {
		Bus {
			transport,
			show,
			poison: None,
			handlers: handlers::Handlers::default(),
		}
	}

	/// Get what the bus logs.
	pub fn show(&self) -> Show {
		self.show
	}

	/// Set what the bus logs and return the previous value.
	pub fn set_show(&mut self, show: Show) -> Show {
		std::mem::replace(&mut self.show, show)
	}

	/// Get the "name" of the bus's transport.
	///
	/// This is often the path passed to [`Bus::open_serial`].
	pub fn name(&self) -> Option<String> {
		Transport::name(&self.transport)
	}

	/// Get a reference to the transport.
	pub fn transport(&self) -> &T {
		&self.transport
	}

	/// Get a mutable reference to the transport.
	pub fn transport_mut(&mut self) -> &mut T {
		&mut self.transport
	}

	/// Consume the bus and return the underlying transport.
	pub fn into_inner(self) -> T {
		self.transport
	}

	/// Set a callback that will be called immediately after a packet is sent
	/// or received.
	///
	/// Received packets are passed to the callback once they are complete,
	/// whether or not their checksum is valid. Bytes preceding the packet are
	/// not included. If a previous callback was set, it is returned.
	///
	/// ## Example
	///
	/// ```
	/// # use bioloid::bus::{Bus, Direction};
	/// # use std::cell::RefCell;
	/// #
	/// # fn wrapper() -> Result<(), Box<dyn std::error::Error>> {
	/// let sent = RefCell::new(0);
	/// let mut bus = Bus::open_serial("...")?;
	/// bus.set_packet_handler(|_, direction| {
	///     if direction == Direction::Tx {
	///         *sent.borrow_mut() += 1;
	///     }
	/// });
	///
	/// bus.action()?;
	/// assert_eq!(*sent.borrow(), 1);
	/// # Ok(())
	/// # }
	/// ```
	pub fn set_packet_handler<F>(&mut self, callback: F) -> Option<PacketHandler<'a>>
	where
		F: FnMut(&[u8], Direction) + 'a,
	{
		self.handlers.packet.replace(Box::new(callback))
	}

	/// Clear any callback registered via [`set_packet_handler`](Bus::set_packet_handler) and return it.
	pub fn clear_packet_handler(&mut self) -> Option<PacketHandler<'a>> {
		self.handlers.packet.take()
	}

	/// Check if the bus is poisoned and report the error if it exists.
	fn check_poisoned(&mut self) -> Result<(), io::Error> {
		if let Some(poison) = self.poison.take() {
			Err(poison)
		} else {
			Ok(())
		}
	}

	/// Poison the bus. The error is reported by the next exchange.
	pub(crate) fn poison(&mut self, e: io::Error) {
		self.poison = Some(e);
	}

	/// The transport name used in log messages.
	fn log_name(&self) -> String {
		self.name()
			.unwrap_or_else(|| UNKNOWN_BACKEND_NAME.to_string())
	}

	/// Whether commands should be described at `info` level.
	fn show_commands(&self) -> bool {
		self.show.contains(Show::COMMANDS)
	}

	/// Transmit a command packet without waiting for a reply.
	///
	/// This is the building block of the other commands and is only needed to
	/// send something they do not cover. Pair it with
	/// [`read_status_packet`](Bus::read_status_packet) for commands that are
	/// answered.
	///
	/// ## Example
	///
	/// ```rust
	/// # use bioloid::{bus::Bus, packet::Command, transport::Transport};
	/// # fn wrapper<T: Transport>(bus: &mut Bus<T>) -> Result<(), Box<dyn std::error::Error>> {
	/// bus.send_packet(1, Command::Ping, &[])?;
	/// let status = bus.read_status_packet()?;
	/// assert_eq!(status.id(), 1);
	/// # Ok(())
	/// # }
	/// ```
	pub fn send_packet(&mut self, id: u8, command: Command, params: &[u8]) -> Result<(), BusError> {
		self.check_poisoned()?;

		let packet = packet::encode(id, command, params)?;
		log::debug!("{} TX: {:02X?}", self.log_name(), packet);
		if self.show.contains(Show::PACKETS) {
			log::info!("TX: {:02X?}", packet);
		}
		self.transport.write_packet(&packet)?;
		self.handlers.on_packet(&packet, Direction::Tx);
		Ok(())
	}

	/// Receive a single status packet from any device.
	///
	/// Bytes are read until a complete packet is assembled. Anything received
	/// before the packet's marker bytes is skipped.
	///
	/// ## Errors
	///
	/// An error is returned if no byte arrives within the transport's timeout,
	/// the packet is corrupt, or the packet reports a device fault.
	pub fn read_status_packet(&mut self) -> Result<StatusPacket, BusError> {
		self.receive_status(None)
	}

	/// Receive a status packet, optionally checking that it came from `expected`.
	fn receive_status(&mut self, expected: Option<u8>) -> Result<StatusPacket, BusError> {
		self.check_poisoned()?;

		let mut parser = Parser::new();
		let mut raw = Vec::new();
		let status = loop {
			let Some(byte) = self.transport.read_byte()? else {
				log::debug!("{} RECV: timed out after {:02X?}", self.log_name(), raw);
				return Err(TimeoutError::new(expected, raw.len()).into());
			};
			raw.push(byte);
			match parser.process_byte(byte) {
				ParseStatus::NotDone => {}
				status => break status,
			}
		};

		// Skip any noise that preceded the packet. A malformed packet ends
		// after its length byte.
		let packet_len = match status {
			ParseStatus::Failed(ErrorCode::Malformed) => 4,
			_ => usize::from(parser.length()) + 4,
		};
		let packet = &raw[raw.len().saturating_sub(packet_len)..];
		log::debug!("{} RECV: {:02X?}", self.log_name(), packet);
		if self.show.contains(Show::PACKETS) {
			log::info!("RX: {:02X?}", packet);
		}
		self.handlers.on_packet(packet, Direction::Recv);

		match status {
			ParseStatus::Failed(ErrorCode::Malformed) => {
				return Err(MalformedPacketError::new(parser.device_id(), parser.length()).into());
			}
			ParseStatus::Failed(_) => {
				log::warn!(
					"Rcvd Status: Checksum from ID: {} (received 0x{:02x}, expected 0x{:02x})",
					parser.device_id(),
					parser.received_checksum(),
					parser.expected_checksum()
				);
				return Err(ChecksumError::new(
					parser.device_id(),
					parser.received_checksum(),
					parser.expected_checksum(),
				)
				.into());
			}
			ParseStatus::NotDone | ParseStatus::Complete => {}
		}

		let packet = parser.into_packet();
		log::debug!(
			"Rcvd Status: {} from ID: {}",
			packet.error_code(),
			packet.id()
		);
		if let Some(expected) = expected {
			check_unexpected_id(&packet, expected)?;
		}
		check_device_fault(&packet)?;
		Ok(packet)
	}

	/// Check whether a device with the given ID is on the bus.
	///
	/// Returns `false` if nothing answers. Other failures, such as a corrupt
	/// reply, are returned as errors.
	pub fn ping(&mut self, id: u8) -> Result<bool, BusError> {
		if self.show_commands() {
			log::info!("Sending PING to ID {id}");
		}
		self.send_packet(id, Command::Ping, &[])?;
		match self.receive_status(Some(id)) {
			Ok(_) => Ok(true),
			Err(e) if e.is_timeout() => Ok(false),
			Err(e) => Err(e),
		}
	}

	/// Read `count` bytes from a device's control table starting at `offset`.
	///
	/// ## Example
	///
	/// ```rust
	/// # use bioloid::{bus::Bus, transport::Transport};
	/// # fn wrapper<T: Transport>(bus: &mut Bus<T>) -> Result<(), Box<dyn std::error::Error>> {
	/// let data = bus.read(1, 0x24, 2)?;
	/// let position = u16::from_le_bytes(<[u8; 2]>::try_from(data.as_slice())?);
	/// # Ok(())
	/// # }
	/// ```
	pub fn read(&mut self, id: u8, offset: u8, count: u8) -> Result<Vec<u8>, BusError> {
		if self.show_commands() {
			log::info!("Sending READ to ID {id} offset 0x{offset:02x} len {count}");
		}
		self.send_packet(id, Command::Read, &[offset, count])?;
		Ok(self.receive_status(Some(id))?.into_params())
	}

	/// Write `data` to a device's control table starting at `offset`.
	///
	/// If `id` is [`BROADCAST`](id::BROADCAST) no reply is read and
	/// [`ErrorCode::None`] is returned immediately. Otherwise the device's
	/// status is read and any fault is returned as an error.
	pub fn write(&mut self, id: u8, offset: u8, data: &[u8]) -> Result<ErrorCode, BusError> {
		self.write_command(Command::Write, id, offset, data)
	}

	/// Stage a write that devices apply on the next [`action`](Bus::action).
	///
	/// Otherwise identical to [`write`](Bus::write).
	pub fn write_deferred(&mut self, id: u8, offset: u8, data: &[u8]) -> Result<ErrorCode, BusError> {
		self.write_command(Command::RegWrite, id, offset, data)
	}

	fn write_command(
		&mut self,
		command: Command,
		id: u8,
		offset: u8,
		data: &[u8],
	) -> Result<ErrorCode, BusError> {
		if self.show_commands() {
			if id == id::BROADCAST {
				log::info!("Broadcasting {command} offset 0x{offset:02x} len {}", data.len());
			} else {
				log::info!(
					"Sending {command} to ID {id} offset 0x{offset:02x} len {}",
					data.len()
				);
			}
		}
		let mut params = Vec::with_capacity(data.len() + 1);
		params.push(offset);
		params.extend_from_slice(data);
		self.send_packet(id, command, &params)?;
		self.receive_unless_broadcast(id)
	}

	/// Restore a device's control table to the factory defaults.
	///
	/// Note that this also resets the device's ID and baud rate. Broadcasting
	/// a reset behaves as [`write`](Bus::write) does.
	pub fn reset(&mut self, id: u8) -> Result<ErrorCode, BusError> {
		if self.show_commands() {
			if id == id::BROADCAST {
				log::info!("Broadcasting RESET");
			} else {
				log::info!("Sending RESET to ID {id}");
			}
		}
		self.send_packet(id, Command::Reset, &[])?;
		self.receive_unless_broadcast(id)
	}

	/// Read the status of a command sent to `id`, unless it was broadcast.
	fn receive_unless_broadcast(&mut self, id: u8) -> Result<ErrorCode, BusError> {
		if id != id::BROADCAST {
			self.receive_status(Some(id))?;
		}
		Ok(ErrorCode::None)
	}

	/// Tell every device to apply its staged [`write_deferred`](Bus::write_deferred).
	pub fn action(&mut self) -> Result<(), BusError> {
		if self.show_commands() {
			log::info!("Broadcasting ACTION");
		}
		self.send_packet(id::BROADCAST, Command::Action, &[])
	}

	/// Write a different value to the same control table range of several
	/// devices with a single broadcast packet.
	///
	/// `values[i]` is written to device `ids[i]` starting at `offset`. Every
	/// value must be the same length. The arguments are validated before
	/// anything is sent.
	///
	/// ## Example
	///
	/// ```rust
	/// # use bioloid::{bus::Bus, transport::Transport};
	/// # fn wrapper<T: Transport>(bus: &mut Bus<T>) -> Result<(), Box<dyn std::error::Error>> {
	/// // Move devices 1 and 2 to different goal positions.
	/// bus.sync_write(&[1, 2], 0x1E, &[[0x10_u8, 0x01], [0x20, 0x03]])?;
	/// # Ok(())
	/// # }
	/// ```
	pub fn sync_write<V: AsRef<[u8]>>(
		&mut self,
		ids: &[u8],
		offset: u8,
		values: &[V],
	) -> Result<(), BusError> {
		let params = sync_write_params(ids, offset, values)?;
		if self.show_commands() {
			let ids = ids
				.iter()
				.map(ToString::to_string)
				.collect::<Vec<_>>()
				.join(", ");
			log::info!(
				"Sending SYNC_WRITE to IDs {ids} offset 0x{offset:02x} len {}",
				params[1]
			);
		}
		self.send_packet(id::BROADCAST, Command::SyncWrite, &params)
	}

	/// Ping `count` IDs starting at `start`, one at a time.
	///
	/// The range stops short of [`BROADCAST`](id::BROADCAST). Each ID is
	/// pinged only when the iterator is advanced.
	///
	/// ## Example
	///
	/// ```rust
	/// # use bioloid::{bus::Bus, transport::Transport};
	/// # fn wrapper<T: Transport>(bus: &mut Bus<T>) -> Result<(), Box<dyn std::error::Error>> {
	/// let mut present = Vec::new();
	/// for result in bus.scan_iter(0, 32) {
	///     let (id, found) = result?;
	///     if found {
	///         present.push(id);
	///     }
	/// }
	/// # Ok(())
	/// # }
	/// ```
	pub fn scan_iter(&mut self, start: u8, count: usize) -> Scan<'_, 'a, T> {
		Scan::new(self, start, count)
	}

	/// Ping `count` IDs starting at `start` and report each result.
	///
	/// `on_found` is called with the ID of each device that answers and
	/// `on_missing` with each ID that does not. IDs are pinged in ascending
	/// order, stopping short of [`BROADCAST`](id::BROADCAST). Returns whether
	/// any device answered.
	pub fn scan<F, M>(
		&mut self,
		start: u8,
		count: usize,
		mut on_found: F,
		mut on_missing: M,
	) -> Result<bool, BusError>
	where
		F: FnMut(u8),
		M: FnMut(u8),
	{
		let mut any_found = false;
		for result in self.scan_iter(start, count) {
			let (id, found) = result?;
			if found {
				any_found = true;
				on_found(id);
			} else {
				on_missing(id);
			}
		}
		Ok(any_found)
	}
}

/// Check that the packet came from the expected device.
fn check_unexpected_id(packet: &StatusPacket, expected: u8) -> Result<(), UnexpectedIdError> {
	if packet.id() == expected {
		Ok(())
	} else {
		Err(UnexpectedIdError::new(expected, packet.id()))
	}
}

/// Check that the device did not report a fault.
fn check_device_fault(packet: &StatusPacket) -> Result<(), DeviceFaultError> {
	if packet.status().is_empty() {
		return Ok(());
	}
	let err = DeviceFaultError::new(packet.id(), packet.status());
	if err.code() == ErrorCode::Overheating {
		log::warn!("Rcvd Status: OverHeating from ID: {}", packet.id());
	}
	Err(err)
}

/// Build the parameters of a `SYNC_WRITE` packet.
///
/// The layout is `offset, bytes per device`, followed by each device's ID and
/// value.
fn sync_write_params<V: AsRef<[u8]>>(
	ids: &[u8],
	offset: u8,
	values: &[V],
) -> Result<Vec<u8>, ValidationError> {
	if ids.is_empty() {
		return Err(SyncWriteDimensionsError::Empty.into());
	}
	if ids.len() != values.len() {
		return Err(SyncWriteDimensionsError::CountMismatch {
			ids: ids.len(),
			values: values.len(),
		}
		.into());
	}
	let value_len = values.first().map_or(0, |value| value.as_ref().len());
	for (index, value) in values.iter().enumerate() {
		let actual = value.as_ref().len();
		if actual != value_len {
			return Err(SyncWriteDimensionsError::RaggedValues {
				index,
				expected: value_len,
				actual,
			}
			.into());
		}
	}
	let params_len = 2 + ids.len() * (value_len + 1);
	if params_len > MAX_PARAMS_LEN {
		return Err(PayloadTooLongError::new(params_len).into());
	}
	let bytes_per_device = u8::try_from(value_len).map_err(|_| PayloadTooLongError::new(params_len))?;

	let mut params = Vec::with_capacity(params_len);
	params.extend_from_slice(&[offset, bytes_per_device]);
	for (id, value) in ids.iter().zip(values) {
		params.push(*id);
		params.extend_from_slice(value.as_ref());
	}
	Ok(params)
}
