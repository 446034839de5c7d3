//! Event handlers for buses.
#[cfg(doc)]
use super::Bus;
use super::Direction;

/// An event handler that is called after a packet is either transmitted or received.
///
/// See [`Bus::set_packet_handler`] for more details.
pub type PacketHandler<'a> = Box<dyn FnMut(&[u8], Direction) + 'a>;

/// The event handlers registered on a bus.
#[derive(Default)]
pub(super) struct Handlers<'a> {
	pub(super) packet: Option<PacketHandler<'a>>,
}

impl Handlers<'_> {
	/// Pass a packet to the packet handler, if one is registered.
	pub(super) fn on_packet(&mut self, packet: &[u8], direction: Direction) {
		if let Some(callback) = self.packet.as_mut() {
			(callback)(packet, direction);
		}
	}
}

impl std::fmt::Debug for Handlers<'_> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Handlers")
			.field("packet", &self.packet.is_some())
			.finish()
	}
}
