use crate::error::{Error, Result};
use crate::probe::ProbeInfo;
use crate::protocol::{USB_PRODUCT_ID, USB_VENDOR_ID};
use rusb::UsbContext;

/// Entry point for finding probes on the USB.
pub struct Context<T: UsbContext> {
    pub usb_context: T,
}

impl Context<rusb::Context> {
    pub fn new() -> Result<Self> {
        let usb_context = rusb::Context::new()?;
        Ok(Context { usb_context })
    }
}

impl<T: UsbContext> Context<T> {
    /// Wraps an existing rusb context.
    pub fn from_usb_context(usb_context: T) -> Self {
        Context { usb_context }
    }

    /// Lists all connected probes.
    pub fn find_probes(&self) -> Result<Vec<ProbeInfo>> {
        let mut probes = Vec::new();

        for device in self.usb_context.devices()?.iter() {
            let descriptor = match device.device_descriptor() {
                Ok(descriptor) => descriptor,
                Err(e) => {
                    log::debug!(
                        "Skipping device at bus {} address {}: {}",
                        device.bus_number(),
                        device.address(),
                        e
                    );
                    continue;
                }
            };
            if descriptor.vendor_id() == USB_VENDOR_ID && descriptor.product_id() == USB_PRODUCT_ID
            {
                probes.push(ProbeInfo {
                    usb_bus_number: device.bus_number(),
                    usb_bus_address: device.address(),
                });
            }
        }

        Ok(probes)
    }

    /// Selects a probe, either the one at the given bus number and address or the only one
    /// connected.
    pub fn pick_probe(&self, location: Option<(u8, u8)>) -> Result<ProbeInfo> {
        let probes = self.find_probes()?;
        if let Some((bus, address)) = location {
            probes
                .into_iter()
                .find(|p| p.usb_bus_number == bus && p.usb_bus_address == address)
                .ok_or(Error::ProbeNotFound)
        } else {
            let mut probes = probes.into_iter();
            match (probes.next(), probes.next()) {
                (None, _) => Err(Error::ProbeNotFound),
                (Some(probe), None) => Ok(probe),
                // More than one probe and no location given
                (Some(_), Some(_)) => Err(Error::TooManyMatches),
            }
        }
    }
}
