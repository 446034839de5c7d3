//! Moves several servos at once with a sync write.

use bioloid::bus::Bus;
use simple_logger::SimpleLogger;

/// The control table offset of the 2 byte goal position.
const GOAL_POSITION: u8 = 0x1E;
/// The control table offset of the 2 byte present position.
const PRESENT_POSITION: u8 = 0x24;

fn main() -> Result<(), Box<dyn std::error::Error>> {
	// Enable logging
	SimpleLogger::new().init().unwrap();

	let mut bus = Bus::open_serial("/dev/ttyUSB0")?;
	let devices = [1, 2];

	// Move both devices at the same instant with a single packet.
	let goals: [u16; 2] = [0x100, 0x300];
	let values = goals.map(u16::to_le_bytes);
	bus.sync_write(&devices, GOAL_POSITION, &values)?;

	// Stage a move on each device and start them together.
	for id in devices {
		bus.write_deferred(id, GOAL_POSITION, &0x200u16.to_le_bytes())?;
	}
	bus.action()?;

	for id in devices {
		let data = bus.read(id, PRESENT_POSITION, 2)?;
		let position = u16::from_le_bytes(<[u8; 2]>::try_from(data.as_slice())?);
		println!("device {id} is at {position}");
	}
	Ok(())
}
