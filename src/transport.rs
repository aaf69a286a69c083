use crate::error::Result;
use rusb::{DeviceHandle, UsbContext};
use std::time::Duration;

/// Raw endpoint access used by a [`Session`](crate::Session).
pub trait Transport {
    /// Writes `data` to an OUT endpoint and returns the number of bytes written.
    fn write(&mut self, endpoint: u8, data: &[u8], timeout: Duration) -> Result<usize>;

    /// Reads at most `buffer.len()` bytes from an IN endpoint and returns the number of bytes
    /// read.
    fn read(&mut self, endpoint: u8, buffer: &mut [u8], timeout: Duration) -> Result<usize>;
}

/// Bulk transfers over a claimed rusb device interface. The interface is released on drop.
pub struct UsbTransport<T: UsbContext> {
    // USB device handle for the raw communication.
    usb_device_handle: DeviceHandle<T>,

    /// Interface claimed when the transport was created.
    interface: u8,
}

impl<T: UsbContext> UsbTransport<T> {
    /// Claims `interface` on an opened device.
    pub fn claim(mut usb_device_handle: DeviceHandle<T>, interface: u8) -> Result<Self> {
        usb_device_handle.claim_interface(interface)?;
        log::debug!("Claimed interface {}", interface);
        Ok(Self {
            usb_device_handle,
            interface,
        })
    }
}

impl<T: UsbContext> Transport for UsbTransport<T> {
    fn write(&mut self, endpoint: u8, data: &[u8], timeout: Duration) -> Result<usize> {
        Ok(self.usb_device_handle.write_bulk(endpoint, data, timeout)?)
    }

    fn read(&mut self, endpoint: u8, buffer: &mut [u8], timeout: Duration) -> Result<usize> {
        Ok(self.usb_device_handle.read_bulk(endpoint, buffer, timeout)?)
    }
}

impl<T: UsbContext> Drop for UsbTransport<T> {
    fn drop(&mut self) {
        match self.usb_device_handle.release_interface(self.interface) {
            Ok(()) => log::debug!("Released interface {}", self.interface),
            // Nothing left to release once the probe is unplugged
            Err(rusb::Error::NoDevice) => {}
            Err(e) => log::warn!("Failed to release interface {}: {}", self.interface, e),
        }
    }
}
