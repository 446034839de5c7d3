//! Scans the bus for connected devices.

use bioloid::bus::{OpenSerialOptions, Show};
use simple_logger::SimpleLogger;
use std::time::Duration;

fn main() -> Result<(), Box<dyn std::error::Error>> {
	// Enable logging
	SimpleLogger::new().init().unwrap();

	let port_path = std::env::args()
		.nth(1)
		.unwrap_or_else(|| "/dev/ttyUSB0".to_string());

	let mut bus = OpenSerialOptions::new()
		.show(Show::COMMANDS)
		.open(&port_path)?;

	// Devices answer a ping within a few milliseconds, so don't wait the
	// default 100 ms for every missing ID.
	let mut guard = bus.timeout_guard(Some(Duration::from_millis(20)))?;
	let found = guard.scan(0, 32, |id| println!("found device {id}"), |_| {})?;
	if !found {
		println!("no devices found on {port_path}");
	}
	Ok(())
}
