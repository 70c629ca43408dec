use std::fmt::Debug;
use std::sync::Arc;

use bitfield::bitfield;
use embedded_hal::digital::{self, InputPin, OutputPin, PinState};
use embedded_hal::i2c::I2c;

use crate::interrupt::{Edge, ListenerToken};
use crate::port::PortPins;
use crate::{Pcf8574Error, Shared};

/// Roles a pin can take on the port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Input,
    Output,
}

bitfield! {
    /// Capability set attached to a claimed pin, fixed at claim time.
    #[derive(Clone, Copy, PartialEq)]
    pub struct Capabilities(u8);
    impl Debug;

    pub input, set_input: 0;
    pub output, set_output: 1;
}

impl Capabilities {
    pub fn none() -> Self {
        Capabilities(0)
    }

    pub fn input_only() -> Self {
        let mut caps = Self::none();
        caps.set_input(true);
        caps
    }

    pub fn output_only() -> Self {
        let mut caps = Self::none();
        caps.set_output(true);
        caps
    }

    pub fn input_output() -> Self {
        let mut caps = Self::none();
        caps.set_input(true);
        caps.set_output(true);
        caps
    }

    pub fn has(&self, capability: Capability) -> bool {
        match capability {
            Capability::Input => self.input(),
            Capability::Output => self.output(),
        }
    }

    pub(crate) fn is_none(&self) -> bool {
        self.0 == 0
    }
}

/// One of the eight expander lines, addressed like a local GPIO pin.
///
/// Handles are claimed from [`Pcf8574::claim_pin`] and delegate all bit
/// access to the driver's shared register cache.
///
/// [`Pcf8574::claim_pin`]: crate::Pcf8574::claim_pin
pub struct Pin<I2C> {
    index: u8,
    caps: Capabilities,
    shared: Arc<Shared<I2C>>,
}

impl<I2C, E> Pin<I2C>
where
    I2C: I2c<Error = E>,
{
    pub(crate) fn new(shared: Arc<Shared<I2C>>, index: u8, caps: Capabilities) -> Self {
        Pin {
            index,
            caps,
            shared,
        }
    }

    pub fn index(&self) -> u8 {
        self.index
    }

    pub fn capabilities(&self) -> Capabilities {
        self.caps
    }

    pub fn has_capability(&self, capability: Capability) -> bool {
        self.caps.has(capability)
    }

    /// Sense the line level through a full reconciling read of the port.
    ///
    /// Panics if the pin was not claimed with input capability.
    pub fn read(&mut self) -> Result<PinState, Pcf8574Error<E>> {
        assert!(
            self.caps.has(Capability::Input),
            "pin {} has no input capability",
            self.index
        );
        let raw = self.shared.port.lock().unwrap().read_state()?;
        Ok(PinState::from(PortPins::from_u8(raw).get_pin(self.index)))
    }

    /// Drive the line high or low.
    ///
    /// Panics if the pin was not claimed with output capability.
    pub fn write(&mut self, level: PinState) -> Result<(), Pcf8574Error<E>> {
        assert!(
            self.caps.has(Capability::Output),
            "pin {} has no output capability",
            self.index
        );
        let mut port = self.shared.port.lock().unwrap();
        let mut next = PortPins::from_u8(port.state());
        next.set_pin(self.index, level == PinState::High);
        port.write_state(next.as_u8())
    }

    /// Register a callback invoked with every edge sensed on this pin
    /// during interrupt correlation. Returns a token for removal.
    ///
    /// The callback runs with the listener registry locked: it may use
    /// pins freely but must not register or remove listeners itself.
    ///
    /// Panics if the pin was not claimed with input capability.
    pub fn add_interrupt_listener<F>(&mut self, listener: F) -> ListenerToken
    where
        F: FnMut(Edge) + Send + 'static,
    {
        assert!(
            self.caps.has(Capability::Input),
            "pin {} has no input capability",
            self.index
        );
        self.shared
            .correlator
            .lock()
            .unwrap()
            .add_listener(self.index, Box::new(listener))
    }

    /// Deregister a callback. No further edges reach it afterwards.
    pub fn remove_interrupt_listener(&mut self, token: ListenerToken) {
        self.shared
            .correlator
            .lock()
            .unwrap()
            .remove_listener(token);
    }
}

impl<I2C, E> digital::ErrorType for Pin<I2C>
where
    I2C: I2c<Error = E>,
    E: Debug,
{
    type Error = Pcf8574Error<E>;
}

impl<I2C, E> InputPin for Pin<I2C>
where
    I2C: I2c<Error = E>,
    E: Debug,
{
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.read()? == PinState::High)
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(self.read()? == PinState::Low)
    }
}

impl<I2C, E> OutputPin for Pin<I2C>
where
    I2C: I2c<Error = E>,
    E: Debug,
{
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.write(PinState::Low)
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.write(PinState::High)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capabilities() {
        assert!(!Capabilities::none().has(Capability::Input));
        assert!(!Capabilities::none().has(Capability::Output));

        assert!(Capabilities::input_only().has(Capability::Input));
        assert!(!Capabilities::input_only().has(Capability::Output));

        assert!(!Capabilities::output_only().has(Capability::Input));
        assert!(Capabilities::output_only().has(Capability::Output));

        assert!(Capabilities::input_output().has(Capability::Input));
        assert!(Capabilities::input_output().has(Capability::Output));
    }

    #[test]
    fn test_capabilities_is_none() {
        assert!(Capabilities::none().is_none());
        assert!(!Capabilities::input_only().is_none());
        assert!(!Capabilities::output_only().is_none());
    }
}
