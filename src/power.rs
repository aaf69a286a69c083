//! Target supply rails and reset.

use crate::error::Result;
use crate::protocol::{
    Step, DISCONNECT, POWER_3V3_OFF, POWER_3V3_ON, POWER_5V_OFF, POWER_5V_ON, RESET_TARGET,
};
use crate::session::{HandshakeState, Session};
use crate::transport::Transport;
use std::fmt;

/// A supply rail the probe can switch.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Rail {
    V33,
    V5,
}

impl Rail {
    fn steps(self) -> (Step, Step) {
        match self {
            Rail::V33 => (POWER_3V3_OFF, POWER_3V3_ON),
            Rail::V5 => (POWER_5V_OFF, POWER_5V_ON),
        }
    }
}

impl fmt::Display for Rail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Rail::V33 => "3.3V",
            Rail::V5 => "5V",
        })
    }
}

impl<T: Transport> Session<T> {
    /// Switches a supply rail off and on again. Only needs the probe to be attached, so it can be
    /// used to revive a chip before detecting it.
    pub fn power_cycle(&mut self, rail: Rail) -> Result<()> {
        self.require(HandshakeState::ProgrammerSpeedSet)?;
        log::info!("Power cycling {} rail", rail);

        let (off, on) = rail.steps();
        self.exchange(&off)?;
        std::thread::sleep(self.config.power_cycle_delay);
        self.exchange(&on)
    }

    /// Resets the target and disconnects the probe from it, starting the flashed firmware.
    pub fn reset(&mut self) -> Result<()> {
        self.require(HandshakeState::Ready)?;
        log::info!("Resetting target");
        self.exchange(&RESET_TARGET)?;
        self.exchange(&DISCONNECT)
    }
}
