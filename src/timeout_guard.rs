//! A "scope guard" that will reset a bus's timeout when it goes out of scope.

use crate::{backend::Backend, bus::Bus};
use std::{io, time::Duration};

/// A "scope guard" that will update the bus's read timeout and then reset it
/// when it goes out of scope.
///
/// To create a guard, use [`Bus::timeout_guard`].
///
/// While the guard is in scope, the bus can only be accessed through the guard.
/// However, because the guard implements [`Deref`](std::ops::Deref) and
/// [`DerefMut`](std::ops::DerefMut) callers can treat the guard as the bus.
///
/// If the original timeout cannot be restored the bus is poisoned, and the
/// error is returned by the next attempt to communicate on it.
#[derive(Debug)]
pub struct TimeoutGuard<'g, 'a, B: Backend> {
	/// The underlying bus.
	bus: &'g mut Bus<'a, B>,
	/// The original timeout that will be restored when the guard is dropped.
	original_timeout: Option<Duration>,
}

impl<'g, 'a, B: Backend> TimeoutGuard<'g, 'a, B> {
	/// Update the bus's timeout and return a [`TimeoutGuard`] wrapping the bus.
	pub(crate) fn new(bus: &'g mut Bus<'a, B>, timeout: Option<Duration>) -> Result<Self, io::Error> {
		let original_timeout = bus.set_read_timeout(timeout)?;
		Ok(TimeoutGuard {
			bus,
			original_timeout,
		})
	}

	/// The timeout that will be restored when the guard is dropped.
	pub fn original_timeout(&self) -> Option<Duration> {
		self.original_timeout
	}
}

impl<'a, B: Backend> std::ops::Deref for TimeoutGuard<'_, 'a, B> {
	type Target = Bus<'a, B>;
	/// Get a shared reference to the underlying bus.
	fn deref(&self) -> &Self::Target {
		self.bus
	}
}

impl<B: Backend> std::ops::DerefMut for TimeoutGuard<'_, '_, B> {
	/// Get an exclusive reference to the underlying bus.
	fn deref_mut(&mut self) -> &mut Self::Target {
		self.bus
	}
}

impl<B: Backend> std::ops::Drop for TimeoutGuard<'_, '_, B> {
	fn drop(&mut self) {
		if let Err(err) = self
			.bus
			.transport_mut()
			.set_read_timeout(self.original_timeout)
		{
			self.bus.poison(io::Error::new(
				io::ErrorKind::Other,
				if let Some(timeout) = self.original_timeout {
					format!(
						"failed to reset timeout to {} milliseconds: {}",
						timeout.as_millis(),
						err
					)
				} else {
					format!("failed to reset to an infinite timeout: {err}")
				},
			));
		}
	}
}
