//! PCF8574(A) I2C port expander driver
//!
//! The PCF8574 exposes eight open-drain quasi-bidirectional lines behind
//! a single shared register byte. This driver lets the lines be used like
//! local GPIO pins: claim a [`Pin`] per line with a fixed capability set,
//! or read and write the whole register at once with the state methods.
//! Wiring the chip's INT output to a digital input of the host enables
//! per-pin edge notification through interrupt correlation.

pub mod interrupt;
pub mod pin;
pub mod port;

use std::fmt;
use std::sync::{Arc, Mutex};

use embedded_hal::digital;
use embedded_hal::i2c::I2c;

use crate::interrupt::{correlate, Correlator};
use crate::port::Port;

pub use crate::interrupt::{Edge, InterruptCallback, InterruptSource, ListenerToken};
pub use crate::pin::{Capabilities, Capability, Pin};
pub use crate::port::PortPins;

/// 7-bit I2C device address
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Address(u8);

impl From<u8> for Address {
    fn from(a: u8) -> Self {
        Address(a)
    }
}

impl Address {
    /// PCF8574 address from the A2/A1/A0 strapping pins (base 0x20).
    pub fn from_pins(a0: bool, a1: bool, a2: bool) -> Self {
        Address(0b010_0000 | ((a2 as u8) << 2) | ((a1 as u8) << 1) | (a0 as u8))
    }

    /// PCF8574A address from the A2/A1/A0 strapping pins (base 0x38).
    pub fn from_pins_a(a0: bool, a1: bool, a2: bool) -> Self {
        Address(0b011_1000 | ((a2 as u8) << 2) | ((a1 as u8) << 1) | (a0 as u8))
    }
}

#[derive(Debug)]
pub enum Pcf8574Error<E> {
    /// I2C communication error
    I2c(E),
}

impl<E: fmt::Debug> digital::Error for Pcf8574Error<E> {
    fn kind(&self) -> digital::ErrorKind {
        digital::ErrorKind::Other
    }
}

/// State shared between the driver, its pins and the correlation pass.
///
/// The port mutex is the single mutual-exclusion domain for everything
/// touching the register cache; the listener registry has its own lock so
/// edge callbacks run with the port released.
pub(crate) struct Shared<I2C> {
    pub(crate) port: Mutex<Port<I2C>>,
    pub(crate) correlator: Mutex<Correlator>,
}

/// PCF8574(A) I2C port expander driver
///
/// Owns the last-known register byte and mediates every bus access to it.
/// State methods mirror the chip's model: [`write_state`] drives the raw
/// byte, [`read_state`] runs the release-sense-merge cycle that samples
/// input lines without disturbing driven outputs, [`get_state`] returns
/// the cache without bus traffic.
///
/// [`write_state`]: Pcf8574::write_state
/// [`read_state`]: Pcf8574::read_state
/// [`get_state`]: Pcf8574::get_state
pub struct Pcf8574<I2C> {
    shared: Arc<Shared<I2C>>,
    interrupt: Option<Box<dyn InterruptSource + Send>>,
}

impl<I2C, E> Pcf8574<I2C>
where
    I2C: I2c<Error = E>,
    E: fmt::Debug,
{
    /// Create a new driver instance.
    ///
    /// The cache starts at the chip's power-on reset value 0xFF (all
    /// lines released high); no bus traffic happens until the first state
    /// access.
    pub fn new(i2c: I2C, address: Address) -> Self {
        Pcf8574 {
            shared: Arc::new(Shared {
                port: Mutex::new(Port::new(i2c, address.0)),
                correlator: Mutex::new(Correlator::new()),
            }),
            interrupt: None,
        }
    }

    /// Last value written to the device. No bus traffic, never fails.
    pub fn get_state(&self) -> u8 {
        self.shared.port.lock().unwrap().state()
    }

    /// Write the whole register byte. The cache is replaced only if the
    /// bus write succeeded.
    pub fn write_state(&self, state: u8) -> Result<(), Pcf8574Error<E>> {
        self.shared.port.lock().unwrap().write_state(state)
    }

    /// Sample all eight lines and reconcile the cache, preserving output
    /// bits. Returns the raw sensed byte, not the merged cache value; on
    /// any bus failure the cache keeps its pre-read value.
    pub fn read_state(&self) -> Result<u8, Pcf8574Error<E>> {
        self.shared.port.lock().unwrap().read_state()
    }

    /// Claim line `index` as a [`Pin`] with a fixed capability set.
    ///
    /// Claiming an input-capable pin makes `read_state` release its line
    /// high before sensing and makes it eligible for edge events.
    ///
    /// Panics if `index` is not in 0..=7 or the line was already claimed.
    pub fn claim_pin(&self, index: u8, caps: Capabilities) -> Pin<I2C> {
        self.shared.port.lock().unwrap().claim(index, caps);
        Pin::new(Arc::clone(&self.shared), index, caps)
    }

    /// Run one correlation pass, as if the bound interrupt line had
    /// signalled. Entry point for platforms that service the INT line
    /// themselves instead of going through [`set_interrupt`].
    ///
    /// [`set_interrupt`]: Pcf8574::set_interrupt
    pub fn handle_interrupt(&self) {
        correlate(&self.shared);
    }

    /// Bind the chip's INT line. Any previous binding is detached first;
    /// from then on every edge on `source` triggers a correlation pass.
    pub fn set_interrupt<S>(&mut self, mut source: S)
    where
        S: InterruptSource + Send + 'static,
        I2C: Send + 'static,
        E: 'static,
    {
        self.clear_interrupt();
        let shared = Arc::clone(&self.shared);
        source.add_interrupt_listener(Box::new(move || correlate(&shared)));
        self.interrupt = Some(Box::new(source));
    }

    /// Detach the current interrupt binding, if any. A detached source
    /// can never deliver another correlation pass.
    pub fn clear_interrupt(&mut self) {
        if let Some(mut source) = self.interrupt.take() {
            source.remove_interrupt_listener();
        }
    }
}
