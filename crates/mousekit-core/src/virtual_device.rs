//! In-process backends that need no display.
//!
//! [`VirtualMouse`] records every synthesized action instead of reaching an OS
//! facility, and [`VirtualHook`] delivers events pushed through a
//! [`VirtualInput`]. Both behave like native backends from the façade's
//! point of view, which makes them useful for tests and dry runs.

use crate::codes::ButtonCodeTable;
use crate::listener::{Dispatcher, HookBackend, PointerEvent};
use crate::{Button, ControlConfig, MouseControl, MouseError, MouseResult, Phase, Point, ScreenSize};
use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, warn};

/// Delivery reports kept for a [`VirtualInput`] by default.
pub const DEFAULT_DELIVERY_BUFFER: usize = 1024;

/// X core protocol button numbers; the same for press and release.
pub const VIRTUAL_BUTTON_CODES: ButtonCodeTable<u8> = ButtonCodeTable::same_for_both([1, 3, 2]);

/// A native call recorded by [`VirtualMouse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VirtualCall {
    Move {
        x: i32,
        y: i32,
    },
    Button {
        x: i32,
        y: i32,
        button: Button,
        phase: Phase,
        native: u8,
    },
}

#[derive(Debug, Default)]
struct VirtualState {
    position: Point,
    calls: Vec<VirtualCall>,
}

/// Recording control backend.
#[derive(Debug)]
pub struct VirtualMouse {
    state: Mutex<VirtualState>,
    screen: ScreenSize,
    config: ControlConfig,
}

impl VirtualMouse {
    /// A virtual 1920x1080 screen with the cursor at the origin.
    pub fn new() -> Self {
        Self::with_screen(ScreenSize::new(1920, 1080))
    }

    pub fn with_screen(screen: ScreenSize) -> Self {
        Self {
            state: Mutex::new(VirtualState::default()),
            screen,
            config: ControlConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ControlConfig) -> Self {
        self.config = config;
        self
    }

    /// Everything synthesized so far, oldest first.
    ///
    /// Calls are kept until [`VirtualMouse::take_calls`] drains them.
    pub fn calls(&self) -> Vec<VirtualCall> {
        self.lock().calls.clone()
    }

    /// Drain the recorded calls, oldest first.
    pub fn take_calls(&self) -> Vec<VirtualCall> {
        std::mem::take(&mut self.lock().calls)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VirtualState> {
        // Recorded state stays consistent even if a holder panicked.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn button(&self, x: i32, y: i32, button: Button, phase: Phase) -> MouseResult<()> {
        let native = VIRTUAL_BUTTON_CODES.code_for(phase, button);
        debug!(x, y, %button, ?phase, native, "virtual button");
        let mut state = self.lock();
        state.position = Point::new(x, y);
        state.calls.push(VirtualCall::Move { x, y });
        state.calls.push(VirtualCall::Button {
            x,
            y,
            button,
            phase,
            native,
        });
        Ok(())
    }
}

impl Default for VirtualMouse {
    fn default() -> Self {
        Self::new()
    }
}

impl MouseControl for VirtualMouse {
    fn move_to(&self, x: i32, y: i32) -> MouseResult<()> {
        debug!(x, y, "virtual move");
        let mut state = self.lock();
        state.position = Point::new(x, y);
        state.calls.push(VirtualCall::Move { x, y });
        Ok(())
    }

    fn press(&self, x: i32, y: i32, button: Button) -> MouseResult<()> {
        self.button(x, y, button, Phase::Press)
    }

    fn release(&self, x: i32, y: i32, button: Button) -> MouseResult<()> {
        self.button(x, y, button, Phase::Release)
    }

    fn position(&self) -> MouseResult<Point> {
        Ok(self.lock().position)
    }

    fn screen_size(&self) -> MouseResult<ScreenSize> {
        Ok(self.screen)
    }

    fn click_delay(&self) -> Option<Duration> {
        self.config.click_delay()
    }
}

/// Outcome of one event delivered through a [`VirtualHook`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    pub event: PointerEvent,
    /// `false` when the listener consumed the event.
    pub propagated: bool,
}

/// Channel-fed hook backend.
pub struct VirtualHook {
    events_rx: Receiver<PointerEvent>,
    delivered_tx: Sender<Delivery>,
    dispatcher: Option<Dispatcher>,
    refusal: Option<String>,
}

/// Feeding side of a [`VirtualHook`].
///
/// Dropping every `VirtualInput` closes the source and ends the listener.
/// Delivery reports are buffered up to the hook's capacity; reports beyond
/// it are discarded until [`VirtualInput::next_delivery`] drains some.
#[derive(Clone)]
pub struct VirtualInput {
    events_tx: Sender<PointerEvent>,
    delivered_rx: Receiver<Delivery>,
}

impl VirtualHook {
    pub fn new() -> (Self, VirtualInput) {
        Self::bounded(DEFAULT_DELIVERY_BUFFER)
    }

    /// Like [`VirtualHook::new`], keeping at most `capacity` delivery reports.
    pub fn bounded(capacity: usize) -> (Self, VirtualInput) {
        let (events_tx, events_rx) = unbounded();
        let (delivered_tx, delivered_rx) = bounded(capacity.max(1));
        let hook = Self {
            events_rx,
            delivered_tx,
            dispatcher: None,
            refusal: None,
        };
        let input = VirtualInput {
            events_tx,
            delivered_rx,
        };
        (hook, input)
    }

    /// Make `install` fail with `reason`, like a refused native registration.
    pub fn refuse_install(mut self, reason: impl Into<String>) -> Self {
        self.refusal = Some(reason.into());
        self
    }

    fn deliver(&mut self, event: PointerEvent) -> MouseResult<()> {
        let dispatcher = self
            .dispatcher
            .as_mut()
            .ok_or_else(|| MouseError::native("virtual hook", "hook not installed"))?;
        let propagated = dispatcher.dispatch(event);
        match self.delivered_tx.try_send(Delivery { event, propagated }) {
            Ok(()) | Err(TrySendError::Disconnected(_)) => {}
            Err(TrySendError::Full(_)) => warn!(?event, "Delivery report buffer full, report dropped"),
        }
        Ok(())
    }
}

impl HookBackend for VirtualHook {
    fn name(&self) -> &'static str {
        "virtual"
    }

    fn install(&mut self, dispatcher: Dispatcher) -> MouseResult<()> {
        if let Some(reason) = &self.refusal {
            return Err(MouseError::native("install virtual hook", reason));
        }
        self.dispatcher = Some(dispatcher);
        Ok(())
    }

    fn pump(&mut self, timeout: Duration) -> MouseResult<()> {
        match self.events_rx.recv_timeout(timeout) {
            Ok(event) => self.deliver(event)?,
            Err(RecvTimeoutError::Timeout) => return Ok(()),
            Err(RecvTimeoutError::Disconnected) => {
                return Err(MouseError::native("virtual hook", "event source closed"))
            }
        }
        while let Ok(event) = self.events_rx.try_recv() {
            self.deliver(event)?;
        }
        Ok(())
    }

    fn uninstall(&mut self) {
        self.dispatcher = None;
    }
}

impl VirtualInput {
    /// Push a native event. Fails once the hook is gone.
    pub fn send(&self, event: PointerEvent) -> MouseResult<()> {
        self.events_tx
            .send(event)
            .map_err(|_| MouseError::native("virtual input", "listener stopped"))
    }

    pub fn move_to(&self, x: i32, y: i32) -> MouseResult<()> {
        self.send(PointerEvent::Move { x, y })
    }

    pub fn press(&self, x: i32, y: i32, button: Button) -> MouseResult<()> {
        self.send(PointerEvent::press(x, y, button))
    }

    pub fn release(&self, x: i32, y: i32, button: Button) -> MouseResult<()> {
        self.send(PointerEvent::release(x, y, button))
    }

    /// Next delivery outcome, in delivery order.
    pub fn next_delivery(&self, timeout: Duration) -> Option<Delivery> {
        self.delivered_rx.recv_timeout(timeout).ok()
    }
}
