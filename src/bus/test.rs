use super::*;
use crate::{
	backend::Mock,
	packet::{encode, encode_status},
	status::StatusFlags,
};
use std::cell::RefCell;

/// An empty status packet from `id`.
fn ok_status(id: u8) -> Vec<u8> {
	encode_status(id, StatusFlags::NONE, &[]).unwrap()
}

/// A responder that answers every command addressed to one of `ids`.
fn devices(ids: &'static [u8]) -> impl FnMut(&[u8]) -> Option<Vec<u8>> + Send {
	move |packet| {
		let id = packet[2];
		ids.contains(&id).then(|| ok_status(id))
	}
}

#[test]
fn ping_present() {
	let mut bus = Bus::open_mock();
	bus.transport_mut().append_data(ok_status(1));
	assert!(bus.ping(1).unwrap());
	assert_eq!(
		bus.transport().written(),
		&[vec![0xFF, 0xFF, 0x01, 0x02, 0x01, 0xFB]]
	);
}

#[test]
fn ping_absent_is_false() {
	let mut bus = Bus::open_mock();
	assert!(!bus.ping(5).unwrap());
}

#[test]
fn ping_partial_reply_is_false() {
	// The line goes quiet part way through the reply.
	let mut bus = Bus::open_mock();
	bus.transport_mut().append_data([0xFF, 0xFF, 0x01]);
	assert!(!bus.ping(1).unwrap());
}

#[test]
fn ping_propagates_checksum_error() {
	let mut bus = Bus::open_mock();
	bus.transport_mut()
		.append_data([0xFF, 0xFF, 0x01, 0x02, 0x00, 0xFD]);
	let err = bus.ping(1).unwrap_err();
	assert_eq!(err.error_code(), Some(ErrorCode::Checksum));
	let err = ChecksumError::try_from(err).unwrap();
	assert_eq!(err.id(), 1);
	assert_eq!(err.received(), 0xFD);
	assert_eq!(err.expected(), 0xFC);
}

#[test]
fn ping_skips_noise() {
	let mut bus = Bus::open_mock();
	bus.transport_mut().append_data([0x00, 0x55, 0xFF]);
	bus.transport_mut().append_data(ok_status(1));
	assert!(bus.ping(1).unwrap());
}

#[test]
fn read_returns_params() {
	let mut bus = Bus::open_mock();
	bus.transport_mut()
		.append_data([0xFF, 0xFF, 0x03, 0x04, 0x00, 0x00, 0x02, 0xF6]);
	assert_eq!(bus.read(3, 0x24, 2).unwrap(), vec![0x00, 0x02]);
	assert_eq!(
		bus.transport().written(),
		&[encode(3, Command::Read, &[0x24, 0x02]).unwrap()]
	);
}

#[test]
fn read_timeout() {
	let mut bus = Bus::open_mock();
	let err = bus.read(3, 0x24, 2).unwrap_err();
	assert!(err.is_timeout());
	assert_eq!(err.error_code(), Some(ErrorCode::Timeout));
	let err = TimeoutError::try_from(err).unwrap();
	assert_eq!(err.id(), Some(3));
	assert_eq!(err.received(), 0);
}

#[test]
fn read_device_fault() {
	let mut bus = Bus::open_mock();
	// Overheating and overload
	bus.transport_mut()
		.append_data(encode_status(1, StatusFlags::from_bits(0x24), &[0x00, 0x02]).unwrap());
	let err = bus.read(1, 0x24, 2).unwrap_err();
	assert_eq!(err.error_code(), Some(ErrorCode::Overheating));
	let fault = DeviceFaultError::try_from(err).unwrap();
	assert_eq!(fault.id(), 1);
	assert!(fault.status().contains(ErrorCode::Overload));
}

#[test]
fn unexpected_id() {
	let mut bus = Bus::open_mock();
	bus.transport_mut().append_data(ok_status(2));
	let err = UnexpectedIdError::try_from(bus.ping(1).unwrap_err()).unwrap();
	assert_eq!(err.expected(), 1);
	assert_eq!(err.received(), 2);
}

#[test]
fn malformed_reply() {
	let mut bus = Bus::open_mock();
	bus.transport_mut().append_data([0xFF, 0xFF, 0x01, 0x01, 0x00, 0xFD]);
	let err = bus.ping(1).unwrap_err();
	assert_eq!(err.error_code(), Some(ErrorCode::Malformed));
}

#[test]
fn write() {
	let mut bus = Bus::open_mock();
	bus.transport_mut().append_data(ok_status(1));
	assert_eq!(bus.write(1, 0x18, &[0x01, 0x00]).unwrap(), ErrorCode::None);
	assert_eq!(
		bus.transport().written(),
		&[vec![0xFF, 0xFF, 0x01, 0x05, 0x03, 0x18, 0x01, 0x00, 0xDD]]
	);
	assert!(bus.transport().is_empty());
}

#[test]
fn write_empty_data() {
	let mut bus = Bus::open_mock();
	bus.transport_mut().append_data(ok_status(1));
	bus.write(1, 0x18, &[]).unwrap();
	assert_eq!(
		bus.transport().written(),
		&[encode(1, Command::Write, &[0x18]).unwrap()]
	);
}

#[test]
fn write_broadcast_does_not_read() {
	let mut bus = Bus::open_mock();
	// Anything the bus tried to read would be consumed.
	bus.transport_mut().append_data(ok_status(1));
	assert_eq!(
		bus.write(id::BROADCAST, 0x18, &[0x01]).unwrap(),
		ErrorCode::None
	);
	assert_eq!(bus.transport().reads(), 0);
	assert!(!bus.transport().is_empty());
}

#[test]
fn write_deferred_then_action() {
	let mut bus = Bus::open_mock();
	bus.transport_mut().set_responder(devices(&[1, 2]));
	bus.write_deferred(1, 0x1E, &[0x00, 0x02]).unwrap();
	bus.write_deferred(2, 0x1E, &[0x00, 0x01]).unwrap();
	let reads = bus.transport().reads();
	assert!(reads > 0);
	bus.action().unwrap();
	assert_eq!(bus.transport().reads(), reads);

	let written = bus.transport().written();
	assert_eq!(written.len(), 3);
	assert_eq!(written[0], encode(1, Command::RegWrite, &[0x1E, 0x00, 0x02]).unwrap());
	assert_eq!(written[1][4], Command::RegWrite.code());
	assert_eq!(written[2], vec![0xFF, 0xFF, 0xFE, 0x02, 0x05, 0xFA]);
	assert!(bus.transport().is_empty());
}

#[test]
fn action_does_not_read() {
	let mut bus = Bus::open_mock();
	// A reply to a broadcast would be ignored, so it must not be read.
	bus.transport_mut().set_responder(|_| Some(ok_status(1)));
	bus.action().unwrap();
	assert_eq!(bus.transport().reads(), 0);
	assert!(!bus.transport().is_empty());
}

#[test]
fn read_returns_short_payload_unchanged() {
	let mut bus = Bus::open_mock();
	bus.transport_mut()
		.append_data(encode_status(1, StatusFlags::NONE, &[0x7F]).unwrap());
	let data = bus.read(1, 0x24, 2).unwrap();
	assert_eq!(data, vec![0x7F]);
	assert!(<[u8; 2]>::try_from(data.as_slice()).is_err());
}

#[test]
fn reset() {
	let mut bus = Bus::open_mock();
	bus.transport_mut().append_data(ok_status(4));
	assert_eq!(bus.reset(4).unwrap(), ErrorCode::None);
	assert_eq!(
		bus.transport().written(),
		&[encode(4, Command::Reset, &[]).unwrap()]
	);
}

#[test]
fn reset_broadcast_does_not_read() {
	let mut bus = Bus::open_mock();
	assert_eq!(bus.reset(id::BROADCAST).unwrap(), ErrorCode::None);
	assert_eq!(bus.transport().reads(), 0);
	assert_eq!(bus.transport().written().len(), 1);
}

#[test]
fn reset_device_fault() {
	let mut bus = Bus::open_mock();
	bus.transport_mut()
		.append_data(encode_status(4, ErrorCode::Instruction.into(), &[]).unwrap());
	let err = bus.reset(4).unwrap_err();
	assert_eq!(err.error_code(), Some(ErrorCode::Instruction));
}

#[test]
fn sync_write() {
	let mut bus = Bus::open_mock();
	bus.sync_write(&[1, 2], 0x1E, &[[0x10_u8, 0x00], [0x20, 0x00]])
		.unwrap();
	assert_eq!(
		bus.transport().written(),
		&[encode(
			id::BROADCAST,
			Command::SyncWrite,
			&[0x1E, 0x02, 0x01, 0x10, 0x00, 0x02, 0x20, 0x00]
		)
		.unwrap()]
	);
	assert_eq!(bus.transport().written()[0][3], 0x0A);
	assert_eq!(bus.transport().reads(), 0);
}

#[test]
fn sync_write_validation() {
	let mut bus = Bus::open_mock();

	let err = bus.sync_write(&[1, 2], 0x1E, &[[0x10_u8]]).unwrap_err();
	assert!(matches!(
		err,
		BusError::SyncWriteDimensions(SyncWriteDimensionsError::CountMismatch { ids: 2, values: 1 })
	));

	let values: [&[u8]; 2] = [&[0x10, 0x00], &[0x20]];
	let err = bus.sync_write(&[1, 2], 0x1E, &values).unwrap_err();
	assert!(matches!(
		err,
		BusError::SyncWriteDimensions(SyncWriteDimensionsError::RaggedValues {
			index: 1,
			expected: 2,
			actual: 1
		})
	));

	let err = bus.sync_write::<[u8; 1]>(&[], 0x1E, &[]).unwrap_err();
	assert!(matches!(
		err,
		BusError::SyncWriteDimensions(SyncWriteDimensionsError::Empty)
	));

	// 2 + 100 * 3 bytes do not fit in one packet.
	let ids: Vec<u8> = (0..100).collect();
	let values = vec![[0u8; 2]; 100];
	let err = bus.sync_write(&ids, 0x1E, &values).unwrap_err();
	assert!(matches!(err, BusError::PayloadTooLong(e) if e.requested_len() == 302));

	assert!(bus.transport().written().is_empty());
}

#[test]
fn payload_too_long() {
	let mut bus = Bus::open_mock();
	let err = bus.write(1, 0x00, &[0u8; 253]).unwrap_err();
	assert!(matches!(err, BusError::PayloadTooLong(e) if e.requested_len() == 254));
	assert!(bus.transport().written().is_empty());
}

#[test]
fn scan_reports_each_id() {
	let mut bus = Bus::open_mock();
	bus.transport_mut().set_responder(devices(&[2]));
	let mut found = Vec::new();
	let mut missing = Vec::new();
	let any = bus
		.scan(0, 4, |id| found.push(id), |id| missing.push(id))
		.unwrap();
	assert!(any);
	assert_eq!(found, vec![2]);
	assert_eq!(missing, vec![0, 1, 3]);
	assert_eq!(bus.transport().written().len(), 4);
}

#[test]
fn scan_nothing_found() {
	let mut bus = Bus::open_mock();
	let mut missing = 0;
	assert!(!bus.scan(10, 3, |_| {}, |_| missing += 1).unwrap());
	assert_eq!(missing, 3);
}

#[test]
fn scan_stops_before_broadcast() {
	let mut bus = Bus::open_mock();
	let ids: Vec<u8> = bus
		.scan_iter(250, 10)
		.map(|result| result.unwrap().0)
		.collect();
	assert_eq!(ids, vec![250, 251, 252, 253]);

	assert_eq!(bus.scan_iter(id::BROADCAST, 5).count(), 0);
	assert_eq!(bus.scan_iter(3, 0).count(), 0);
}

#[test]
fn scan_stops_on_error() {
	let mut bus = Bus::open_mock();
	bus.transport_mut().set_responder(|packet| {
		// Device 1 answers with a corrupt checksum.
		(packet[2] == 1).then(|| vec![0xFF, 0xFF, 0x01, 0x02, 0x00, 0x00])
	});
	let mut scan = bus.scan_iter(0, 4);
	assert!(matches!(scan.next(), Some(Ok((0, false)))));
	assert!(matches!(scan.next(), Some(Err(BusError::Checksum(_)))));
	assert!(scan.next().is_none());
	drop(scan);
	assert_eq!(bus.transport().written().len(), 2);

	let err = bus.scan(0, 4, |_| {}, |_| {}).unwrap_err();
	assert_eq!(err.error_code(), Some(ErrorCode::Checksum));
}

#[test]
fn send_and_read_status_packet() {
	let mut bus = Bus::open_mock();
	bus.transport_mut()
		.append_data(encode_status(7, StatusFlags::NONE, &[0xAB]).unwrap());
	bus.send_packet(7, Command::Read, &[0x2B, 0x01]).unwrap();
	let packet = bus.read_status_packet().unwrap();
	assert_eq!(packet.id(), 7);
	assert_eq!(packet.error_code(), ErrorCode::None);
	assert_eq!(packet.params(), &[0xAB]);
}

#[test]
fn packet_handler() {
	let packets = RefCell::new(Vec::new());
	let mut bus = Bus::open_mock();
	bus.set_packet_handler(|packet, direction| {
		packets.borrow_mut().push((packet.to_vec(), direction));
	});
	bus.transport_mut().append_data([0x00, 0x12]);
	bus.transport_mut().append_data(ok_status(1));
	bus.ping(1).unwrap();
	bus.action().unwrap();
	assert!(bus.clear_packet_handler().is_some());
	bus.action().unwrap();
	drop(bus);

	assert_eq!(
		packets.into_inner(),
		vec![
			(vec![0xFF, 0xFF, 0x01, 0x02, 0x01, 0xFB], Direction::Tx),
			(ok_status(1), Direction::Recv),
			(vec![0xFF, 0xFF, 0xFE, 0x02, 0x05, 0xFA], Direction::Tx),
		]
	);
}

#[test]
fn show_does_not_change_behaviour() {
	let mut bus = Bus::with_show(Mock::new(), Show::ALL);
	assert_eq!(bus.show(), Show::ALL);
	bus.transport_mut().set_responder(devices(&[1]));
	assert!(bus.ping(1).unwrap());
	bus.sync_write(&[1, 2], 0x1E, &[[0x10_u8], [0x20]]).unwrap();
	assert_eq!(bus.set_show(Show::NONE), Show::ALL);
	assert_eq!(bus.transport().written().len(), 2);
}

#[test]
fn show_flags() {
	assert!(Show::ALL.contains(Show::COMMANDS));
	assert!(Show::ALL.contains(Show::PACKETS));
	assert!(!Show::COMMANDS.contains(Show::PACKETS));
	assert!(Show::COMMANDS.contains(Show::NONE));
	let mut show = Show::NONE;
	show |= Show::PACKETS;
	assert_eq!(show, Show::PACKETS);
}

#[test]
fn io_errors_propagate() {
	let mut bus = Bus::open_mock();
	bus.transport_mut()
		.write_error(Some(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged")));
	let err = bus.ping(1).unwrap_err();
	assert!(matches!(err, BusError::Io(ref e) if e.kind() == io::ErrorKind::BrokenPipe));
	assert!(!err.is_timeout());
}

#[test]
fn timeout_guard() {
	let mut bus = Bus::open_mock();
	bus.set_read_timeout(Some(Duration::from_millis(100))).unwrap();
	{
		let mut guard = bus.timeout_guard(Some(Duration::from_millis(5))).unwrap();
		assert_eq!(guard.read_timeout().unwrap(), Some(Duration::from_millis(5)));
		assert_eq!(guard.original_timeout(), Some(Duration::from_millis(100)));
		guard.transport_mut().append_data(ok_status(1));
		assert!(guard.ping(1).unwrap());
	}
	assert_eq!(bus.read_timeout().unwrap(), Some(Duration::from_millis(100)));
}

#[test]
fn timeout_guard_poisons_on_failure() {
	let mut bus = Bus::open_mock();
	{
		let mut guard = bus.timeout_guard(None).unwrap();
		guard
			.transport_mut()
			.set_read_timeout_error(Some(io::Error::new(io::ErrorKind::Other, "busy")));
	}
	let err = bus.ping(1).unwrap_err();
	assert!(matches!(err, BusError::Io(_)));

	// The poison is only reported once.
	bus.transport_mut().append_data(ok_status(1));
	assert!(bus.ping(1).unwrap());
}
