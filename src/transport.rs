use crate::card::CardDriver;
use crate::registry::Registry;

/// Data phase direction as seen from the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// READ: device to host.
    DeviceToHost,
    /// WRITE: host to device.
    HostToDevice,
}

/// Completion hook the transport calls after every data phase.
pub trait TransferObserver {
    fn on_transfer(&mut self, direction: Direction, num_bytes: u32);
}

/// Host-facing mass storage class driver.
///
/// The bulk-only protocol state machine lives behind this trait; the core only
/// hands it the unit set and drives it from the service loop.
pub trait Transport<'a, D: CardDriver, const N: usize> {
    /// Announce the number of units once, before servicing starts.
    fn attach(&mut self, num_units: usize);

    /// True once the host has configured the device.
    fn is_configured(&self) -> bool;

    /// Run one step of pending command and data servicing.
    fn service(&mut self, units: &mut Registry<'a, D, N>, observer: &mut dyn TransferObserver);
}
