use bitfield::bitfield;
use embedded_hal::i2c::I2c;

use crate::pin::{Capabilities, Capability};
use crate::Pcf8574Error;

bitfield! {
    /// State of the eight port lines, one bit per pin.
    ///
    /// A bit set to 1 means the line is driven high (output) or released
    /// so an external device can pull it low (input).
    #[derive(Clone, Copy, PartialEq)]
    pub struct PortPins(u8);
    impl Debug;

    pub p0, set_p0: 0;
    pub p1, set_p1: 1;
    pub p2, set_p2: 2;
    pub p3, set_p3: 3;
    pub p4, set_p4: 4;
    pub p5, set_p5: 5;
    pub p6, set_p6: 6;
    pub p7, set_p7: 7;
}

impl PortPins {
    /// Power-on reset value of the chip, all lines released high.
    pub fn all_released() -> Self {
        PortPins(0xFF)
    }

    /// Create a new PortPins from a u8 value.
    pub fn from_u8(value: u8) -> Self {
        PortPins(value)
    }

    /// Get the raw u8 value.
    pub fn as_u8(&self) -> u8 {
        self.0
    }

    /// Get a specific pin.
    ///
    /// Panics if `pin` is not in 0..=7.
    pub fn get_pin(&self, pin: u8) -> bool {
        assert!(pin < 8, "pin index out of range: {pin}");
        (self.0 & (1 << pin)) != 0
    }

    /// Set a specific pin.
    ///
    /// Panics if `pin` is not in 0..=7.
    pub fn set_pin(&mut self, pin: u8, value: bool) {
        assert!(pin < 8, "pin index out of range: {pin}");
        if value {
            self.0 |= 1 << pin;
        } else {
            self.0 &= !(1 << pin);
        }
    }
}

/// Last-known register value plus the bus device it mirrors.
///
/// The cache always reflects the last byte written to the device, not
/// necessarily the level currently sensed on the lines. Every access goes
/// through one lock held by the owning driver, so a full read-merge-write
/// cycle is observed atomically by concurrent callers.
pub(crate) struct Port<I2C> {
    i2c: I2C,
    address: u8,
    state: PortPins,
    caps: [Capabilities; 8],
}

impl<I2C, E> Port<I2C>
where
    I2C: I2c<Error = E>,
{
    pub fn new(i2c: I2C, address: u8) -> Self {
        Port {
            i2c,
            address,
            state: PortPins::all_released(),
            caps: [Capabilities::none(); 8],
        }
    }

    /// Cached register value. No bus traffic.
    pub fn state(&self) -> u8 {
        self.state.as_u8()
    }

    pub fn capabilities(&self) -> [Capabilities; 8] {
        self.caps
    }

    /// Record the capability set of a claimed pin.
    ///
    /// Panics if `index` is not in 0..=7 or was claimed before.
    pub fn claim(&mut self, index: u8, caps: Capabilities) {
        assert!(index < 8, "pin index out of range: {index}");
        assert!(
            self.caps[usize::from(index)].is_none(),
            "pin {index} already claimed"
        );
        self.caps[usize::from(index)] = caps;
    }

    /// Write `value` to the device and, only on success, replace the cache.
    pub fn write_state(&mut self, value: u8) -> Result<(), Pcf8574Error<E>> {
        self.i2c
            .write(self.address, &[value])
            .map_err(Pcf8574Error::I2c)?;
        self.state = PortPins::from_u8(value);
        Ok(())
    }

    /// Sample the lines without disturbing the outputs.
    ///
    /// The chip has no direction register: an input is emulated by
    /// releasing the line high and sensing whether something external
    /// pulls it low. So every read is a three step bus cycle:
    ///
    /// 1. write the cache with every input-capable bit forced to 1,
    /// 2. read the raw instantaneous level of all eight lines,
    /// 3. merge (outputs from the pre-read cache, inputs from the raw
    ///    byte) and commit the merged value back through [`write_state`].
    ///
    /// Returns the RAW byte, not the merged one. Callers that need the
    /// true line levels, notably edge correlation, must use this return
    /// value instead of the cache.
    ///
    /// Any bus failure aborts the cycle; the cache only changes at the
    /// final commit, so a failed read leaves it at its pre-read value.
    ///
    /// [`write_state`]: Port::write_state
    pub fn read_state(&mut self) -> Result<u8, Pcf8574Error<E>> {
        let buffer = self.state;
        self.switch_inputs_high()?;
        let mut raw = [0u8; 1];
        self.i2c
            .read(self.address, &mut raw)
            .map_err(Pcf8574Error::I2c)?;
        let merged = self.apply_read_inputs(PortPins::from_u8(raw[0]), buffer);
        self.write_state(merged.as_u8())?;
        Ok(raw[0])
    }

    /// Release every input-capable line high so it can be sensed.
    ///
    /// Writes a working copy only; the cache keeps its pre-read value
    /// until the merged byte is committed.
    fn switch_inputs_high(&mut self) -> Result<(), Pcf8574Error<E>> {
        let mut released = self.state;
        for (index, caps) in self.caps.iter().enumerate() {
            if caps.has(Capability::Input) {
                released.set_pin(index as u8, true);
            }
        }
        self.i2c
            .write(self.address, &[released.as_u8()])
            .map_err(Pcf8574Error::I2c)
    }

    /// Overlay the sensed level of every input-capable pin onto `buffer`.
    /// Output bits and unclaimed bits stay untouched.
    fn apply_read_inputs(&self, raw: PortPins, mut buffer: PortPins) -> PortPins {
        for (index, caps) in self.caps.iter().enumerate() {
            if caps.has(Capability::Input) {
                buffer.set_pin(index as u8, raw.get_pin(index as u8));
            }
        }
        buffer
    }
}
