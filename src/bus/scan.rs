//! Iterating over the devices on a bus.

use super::Bus;
use crate::{error::BusError, packet::id, transport::Transport};

/// An iterator that pings a range of device IDs in ascending order.
///
/// Each item is the ID and whether a device answered. Pings are sent lazily,
/// one per call to `next`. Iteration stops after the first error other than a
/// timeout.
///
/// Created with [`Bus::scan_iter`].
#[derive(Debug)]
pub struct Scan<'b, 'a, T> {
	bus: &'b mut Bus<'a, T>,
	/// The next ID to ping.
	next: u8,
	/// One past the last ID to ping.
	end: u8,
	/// Whether an error has been returned.
	failed: bool,
}

impl<'b, 'a, T: Transport> Scan<'b, 'a, T> {
	pub(super) fn new(bus: &'b mut Bus<'a, T>, start: u8, count: usize) -> Self {
		let end = usize::from(start)
			.saturating_add(count)
			.min(usize::from(id::BROADCAST));
		Scan {
			bus,
			next: start,
			// `end` is at most BROADCAST, so it fits.
			end: u8::try_from(end).unwrap_or(id::BROADCAST),
			failed: false,
		}
	}
}

impl<T: Transport> Iterator for Scan<'_, '_, T> {
	type Item = Result<(u8, bool), BusError>;

	fn next(&mut self) -> Option<Self::Item> {
		if self.failed || self.next >= self.end {
			return None;
		}
		let id = self.next;
		self.next += 1;
		match self.bus.ping(id) {
			Ok(found) => Some(Ok((id, found))),
			Err(e) => {
				self.failed = true;
				Some(Err(e))
			}
		}
	}

	fn size_hint(&self) -> (usize, Option<usize>) {
		if self.failed {
			return (0, Some(0));
		}
		let remaining = usize::from(self.end.saturating_sub(self.next));
		(0, Some(remaining))
	}
}

impl<T: Transport> std::iter::FusedIterator for Scan<'_, '_, T> {}
