use crate::config::SessionConfig;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::protocol::{USB_INTERFACE, USB_PRODUCT_ID, USB_VENDOR_ID};
use crate::session::Session;
use crate::transport::UsbTransport;
use rusb::UsbContext;
use std::fmt;

/// Contains necessary information to connect to a probe via USB.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct ProbeInfo {
    /// USB bus ID the probe is connected to.
    pub usb_bus_number: u8,

    /// USB device address of the probe.
    pub usb_bus_address: u8,
}

impl ProbeInfo {
    /// Opens the probe and claims its interface. Fails if the device at this location is no
    /// longer a WCH-LinkE (e.g. after a reenumeration).
    ///
    /// The returned session is disconnected; run its handshake before anything else. The
    /// interface is released when the session is dropped.
    pub fn open<T: UsbContext>(
        &self,
        context: &Context<T>,
        config: SessionConfig,
    ) -> Result<Session<UsbTransport<T>>> {
        for device in context.usb_context.devices()?.iter() {
            if device.bus_number() != self.usb_bus_number
                || device.address() != self.usb_bus_address
            {
                continue;
            }

            let descriptor = device.device_descriptor()?;
            if descriptor.vendor_id() != USB_VENDOR_ID
                || descriptor.product_id() != USB_PRODUCT_ID
            {
                return Err(Error::ProbeNotFound);
            }

            log::info!("Opening probe at {}", self);
            let handle = device.open()?;
            let transport = UsbTransport::claim(handle, USB_INTERFACE)?;
            return Ok(Session::new(transport, config));
        }
        Err(Error::ProbeNotFound)
    }
}

impl fmt::Display for ProbeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "bus {} address {}",
            self.usb_bus_number, self.usb_bus_address
        )
    }
}
