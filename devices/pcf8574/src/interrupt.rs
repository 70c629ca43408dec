use std::array;
use std::fmt::Debug;

use embedded_hal::digital::PinState;
use embedded_hal::i2c::I2c;

use crate::pin::Capability;
use crate::port::PortPins;
use crate::Shared;

/// Level transition sensed on one pin during a correlation pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge {
    pub previous: PinState,
    pub current: PinState,
}

/// Callback handed to an [`InterruptSource`] on binding.
pub type InterruptCallback = Box<dyn FnMut() + Send>;

/// External digital input line wired to the chip's INT output.
///
/// The driver binds at most one source at a time; rebinding removes the
/// callback from the previous source first, so a detached line can never
/// trigger another correlation pass.
pub trait InterruptSource {
    /// Arrange for `callback` to run on every edge of the line.
    fn add_interrupt_listener(&mut self, callback: InterruptCallback);

    /// Remove the previously installed callback.
    fn remove_interrupt_listener(&mut self);
}

/// Token identifying a registered edge listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerToken {
    pin: u8,
    id: u32,
}

type EdgeListener = Box<dyn FnMut(Edge) + Send>;

/// Per-pin edge listener registry.
pub(crate) struct Correlator {
    listeners: [Vec<(u32, EdgeListener)>; 8],
    next_id: u32,
}

impl Correlator {
    pub fn new() -> Self {
        Correlator {
            listeners: array::from_fn(|_| Vec::new()),
            next_id: 0,
        }
    }

    pub fn add_listener(&mut self, pin: u8, listener: EdgeListener) -> ListenerToken {
        let id = self.next_id;
        self.next_id += 1;
        self.listeners[usize::from(pin)].push((id, listener));
        ListenerToken { pin, id }
    }

    pub fn remove_listener(&mut self, token: ListenerToken) {
        self.listeners[usize::from(token.pin)].retain(|(id, _)| *id != token.id);
    }

    fn dispatch(&mut self, pin: u8, edge: Edge) {
        for (_, listener) in self.listeners[usize::from(pin)].iter_mut() {
            listener(edge);
        }
    }
}

/// One correlation pass: capture the last-known state, perform a
/// reconciling read, and dispatch an edge event for every input-capable
/// pin whose sensed level changed.
///
/// The correlator is idle between passes. A pass holds the listener
/// registry for its whole duration, so overlapping interrupt signals
/// queue up and each runs its own pass once the previous one finished.
/// The before/after capture runs under the port lock, keeping it atomic
/// with respect to concurrent pin reads and writes.
///
/// If the reconciling read fails the pass is discarded: the error is
/// logged and no events are dispatched. Fabricating levels out of a bus
/// failure would be indistinguishable from "line is low" for listeners.
pub(crate) fn correlate<I2C, E>(shared: &Shared<I2C>)
where
    I2C: I2c<Error = E>,
    E: Debug,
{
    let mut correlator = shared.correlator.lock().unwrap();

    let (before, after, caps) = {
        let mut port = shared.port.lock().unwrap();
        let before = port.state();
        match port.read_state() {
            Ok(after) => (before, after, port.capabilities()),
            Err(err) => {
                log::error!("interrupt correlation aborted: {err:?}");
                return;
            }
        }
    };

    let before = PortPins::from_u8(before);
    let after = PortPins::from_u8(after);
    for index in 0..8u8 {
        if !caps[usize::from(index)].has(Capability::Input) {
            continue;
        }
        let previous = before.get_pin(index);
        let current = after.get_pin(index);
        if previous == current {
            continue;
        }
        correlator.dispatch(
            index,
            Edge {
                previous: PinState::from(previous),
                current: PinState::from(current),
            },
        );
    }
}
