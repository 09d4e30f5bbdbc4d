//! Mouse event façade: a cancellable background listener.
//!
//! A [`Listener`] pairs a [`HookBackend`] (the native input hook) with a
//! [`MouseHandler`] (caller logic). [`Listener::start`] moves both onto a
//! dedicated thread, installs the hook there and returns a [`ListenerHandle`]
//! once installation succeeded. The thread then pumps the hook until the
//! running flag is cleared by [`ListenerHandle::stop`].
//!
//! Lifecycle: `Created → Running → Stopping → Terminated`. `start` consumes
//! the listener, so a stopped listener cannot be restarted; build a new one.

use crate::{Button, ListenerConfig, MouseError, MouseResult, Phase};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

/// A normalized pointer event, as reported by a hook backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PointerEvent {
    /// Pointer moved to (x, y).
    Move { x: i32, y: i32 },
    /// Button transition at (x, y).
    Button {
        x: i32,
        y: i32,
        button: Button,
        phase: Phase,
    },
}

impl PointerEvent {
    pub fn press(x: i32, y: i32, button: Button) -> Self {
        Self::Button {
            x,
            y,
            button,
            phase: Phase::Press,
        }
    }

    pub fn release(x: i32, y: i32, button: Button) -> Self {
        Self::Button {
            x,
            y,
            button,
            phase: Phase::Release,
        }
    }
}

/// Caller logic invoked by the listener thread.
///
/// Both methods return the "propagate" signal. It only matters while the
/// listener captures: then `true` lets that one event through and `false`
/// consumes it. Without capture every event is passed on regardless.
pub trait MouseHandler: Send + 'static {
    /// Called once per native button transition.
    fn on_click(&mut self, x: i32, y: i32, button: Button, is_press: bool) -> bool {
        let _ = (x, y, button, is_press);
        false
    }

    /// Called for every native pointer-motion sample.
    fn on_move(&mut self, x: i32, y: i32) -> bool {
        let _ = (x, y);
        false
    }
}

/// Handler that forwards every event into a channel.
pub struct ChannelHandler {
    tx: Sender<PointerEvent>,
    propagate: bool,
}

impl ChannelHandler {
    pub fn new(tx: Sender<PointerEvent>) -> Self {
        Self {
            tx,
            propagate: false,
        }
    }

    /// Create a handler together with the receiving end of its channel.
    pub fn bounded(capacity: usize) -> (Self, Receiver<PointerEvent>) {
        let (tx, rx) = bounded(capacity);
        (Self::new(tx), rx)
    }

    /// Value returned from both callbacks (see [`MouseHandler`]).
    pub fn propagate(mut self, propagate: bool) -> Self {
        self.propagate = propagate;
        self
    }

    fn forward(&self, event: PointerEvent) -> bool {
        if let Err(e) = self.tx.try_send(event) {
            warn!("Failed to forward pointer event: {}", e);
        }
        self.propagate
    }
}

impl MouseHandler for ChannelHandler {
    fn on_click(&mut self, x: i32, y: i32, button: Button, is_press: bool) -> bool {
        self.forward(PointerEvent::Button {
            x,
            y,
            button,
            phase: Phase::from_press(is_press),
        })
    }

    fn on_move(&mut self, x: i32, y: i32) -> bool {
        self.forward(PointerEvent::Move { x, y })
    }
}

/// A handler invocation that panicked.
#[derive(Debug, Clone)]
pub struct HandlerFault {
    pub event: PointerEvent,
    pub message: String,
}

/// Routes pointer events to the handler and decides propagation.
///
/// Owned by the hook backend for the lifetime of the installed hook.
pub struct Dispatcher {
    handler: Box<dyn MouseHandler>,
    capture: bool,
    fault_tx: Sender<HandlerFault>,
}

impl Dispatcher {
    pub fn new(
        handler: Box<dyn MouseHandler>,
        capture: bool,
        fault_tx: Sender<HandlerFault>,
    ) -> Self {
        Self {
            handler,
            capture,
            fault_tx,
        }
    }

    /// Whether native events should be consumed.
    pub fn capture(&self) -> bool {
        self.capture
    }

    /// Invoke the handler for `event`. Returns `true` when the native event
    /// must be passed on to the rest of the system.
    ///
    /// A panicking handler is reported as a [`HandlerFault`] and the event
    /// gets the handler-less decision: consumed under capture, passed on
    /// otherwise. The dispatcher stays usable.
    pub fn dispatch(&mut self, event: PointerEvent) -> bool {
        trace!(?event, "dispatching pointer event");
        let handler = &mut self.handler;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| match event {
            PointerEvent::Move { x, y } => handler.on_move(x, y),
            PointerEvent::Button {
                x,
                y,
                button,
                phase,
            } => handler.on_click(x, y, button, phase.is_press()),
        }));

        match outcome {
            Ok(wants_propagation) => !self.capture || wants_propagation,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(?event, %message, "Mouse handler panicked, listener continues");
                let fault = HandlerFault { event, message };
                if self.fault_tx.try_send(fault).is_err() {
                    warn!("Handler fault queue full, fault only logged");
                }
                !self.capture
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Seam between the listener loop and a platform input-hook facility.
///
/// All methods are called on the listener thread: `install` once, then
/// `pump` repeatedly while the listener runs, then `uninstall` once.
pub trait HookBackend: Send + 'static {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Register the native hook. The backend keeps `dispatcher` and feeds it
    /// every native event, in the order the OS reports them.
    fn install(&mut self, dispatcher: Dispatcher) -> MouseResult<()>;

    /// Deliver pending native events, waiting at most `timeout` for them.
    /// An error ends the listener.
    fn pump(&mut self, timeout: Duration) -> MouseResult<()>;

    /// Remove the native hook.
    fn uninstall(&mut self);
}

impl<B: HookBackend + ?Sized> HookBackend for Box<B> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn install(&mut self, dispatcher: Dispatcher) -> MouseResult<()> {
        (**self).install(dispatcher)
    }

    fn pump(&mut self, timeout: Duration) -> MouseResult<()> {
        (**self).pump(timeout)
    }

    fn uninstall(&mut self) {
        (**self).uninstall()
    }
}

/// Observable listener state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListenerState {
    /// Built, not started.
    Created,
    /// Hook installed, loop running.
    Running,
    /// Stop requested, loop has not exited yet.
    Stopping,
    /// Loop exited and hook removed.
    Terminated,
}

/// A listener that has not been started yet.
pub struct Listener<B: HookBackend> {
    backend: B,
    handler: Box<dyn MouseHandler>,
    config: ListenerConfig,
}

impl<B: HookBackend> Listener<B> {
    /// Create a listener with the default configuration.
    pub fn new(backend: B, handler: impl MouseHandler) -> Self {
        Self {
            backend,
            handler: Box::new(handler),
            config: ListenerConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ListenerConfig) -> Self {
        self.config = config;
        self
    }

    /// Consume native events instead of passing them through.
    pub fn capture(mut self, capture: bool) -> Self {
        self.config.capture = capture;
        self
    }

    pub fn config(&self) -> &ListenerConfig {
        &self.config
    }

    pub fn state(&self) -> ListenerState {
        ListenerState::Created
    }

    /// Spawn the listener thread and install the hook on it.
    ///
    /// Returns once the hook is installed, or with the installation error.
    pub fn start(self) -> MouseResult<ListenerHandle> {
        let Listener {
            backend,
            handler,
            config,
        } = self;
        let backend_name = backend.name();

        let (ready_tx, ready_rx) = bounded::<MouseResult<()>>(1);
        let (fault_tx, fault_rx) = bounded(config.fault_buffer.max(1));
        // Never sent on; disconnects when the thread exits.
        let (done_tx, done_rx) = bounded::<()>(0);
        let running = Arc::new(AtomicBool::new(true));

        let dispatcher = Dispatcher::new(handler, config.capture, fault_tx);
        let poll_interval = config.poll_interval();
        let running_clone = running.clone();

        let thread = thread::Builder::new()
            .name(format!("mousekit-{backend_name}"))
            .spawn(move || {
                let _done = done_tx;
                run_loop(backend, dispatcher, running_clone, poll_interval, ready_tx)
            })
            .map_err(|e| MouseError::native("spawn listener thread", e))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                debug!(backend = backend_name, "Mouse listener started");
                Ok(ListenerHandle {
                    running,
                    thread: Some(thread),
                    done_rx,
                    fault_rx,
                })
            }
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread.join();
                Err(MouseError::native(
                    "install hook",
                    "listener thread exited during installation",
                ))
            }
        }
    }
}

fn run_loop<B: HookBackend>(
    mut backend: B,
    dispatcher: Dispatcher,
    running: Arc<AtomicBool>,
    poll_interval: Duration,
    ready_tx: Sender<MouseResult<()>>,
) -> MouseResult<()> {
    info!(backend = backend.name(), "Mouse listener thread started");

    if let Err(e) = backend.install(dispatcher) {
        error!(error = %e, "Failed to install mouse hook");
        running.store(false, Ordering::SeqCst);
        // The error is reported to `start`; nothing left for `join`.
        let _ = ready_tx.send(Err(e));
        return Ok(());
    }
    let _ = ready_tx.send(Ok(()));

    let mut result = Ok(());
    while running.load(Ordering::SeqCst) {
        if let Err(e) = backend.pump(poll_interval) {
            error!(error = %e, "Mouse hook pump failed, stopping listener");
            result = Err(e);
            break;
        }
    }

    running.store(false, Ordering::SeqCst);
    backend.uninstall();
    info!(backend = backend.name(), "Mouse listener thread exiting");
    result
}

/// Handle to a started listener.
///
/// Dropping the handle requests a stop but does not wait for the thread.
pub struct ListenerHandle {
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<MouseResult<()>>>,
    done_rx: Receiver<()>,
    fault_rx: Receiver<HandlerFault>,
}

impl ListenerHandle {
    /// Request the loop to exit. Takes effect within one poll interval.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// The running flag: false once a stop was requested or the loop ended.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Whether the listener thread has exited.
    pub fn is_finished(&self) -> bool {
        matches!(self.done_rx.try_recv(), Err(TryRecvError::Disconnected))
    }

    pub fn state(&self) -> ListenerState {
        if self.is_finished() {
            ListenerState::Terminated
        } else if self.is_running() {
            ListenerState::Running
        } else {
            ListenerState::Stopping
        }
    }

    /// Block until the listener thread exits or `timeout` elapses.
    /// Returns `true` if the thread exited.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        matches!(
            self.done_rx.recv_timeout(timeout),
            Err(RecvTimeoutError::Disconnected)
        )
    }

    /// Block until the listener thread exits and return how the loop ended.
    /// Does not request a stop by itself.
    pub fn join(mut self) -> MouseResult<()> {
        match self.thread.take() {
            Some(thread) => thread
                .join()
                .map_err(|_| MouseError::native("join listener", "listener thread panicked"))?,
            None => Ok(()),
        }
    }

    /// Drain handler faults reported since the last call.
    pub fn faults(&self) -> Vec<HandlerFault> {
        self.fault_rx.try_iter().collect()
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::virtual_device::VirtualHook;

    const WAIT: Duration = Duration::from_secs(2);

    struct Silent;
    impl MouseHandler for Silent {}

    /// Panics on its first click, forwards everything else.
    struct PanicsOnce {
        inner: ChannelHandler,
        panicked: bool,
    }

    impl MouseHandler for PanicsOnce {
        fn on_click(&mut self, x: i32, y: i32, button: Button, is_press: bool) -> bool {
            if !self.panicked {
                self.panicked = true;
                panic!("handler bug at ({x}, {y})");
            }
            self.inner.on_click(x, y, button, is_press)
        }
    }

    fn fault_channel() -> (Sender<HandlerFault>, Receiver<HandlerFault>) {
        bounded(8)
    }

    #[test]
    fn test_default_handlers_do_not_propagate() {
        let mut handler = Silent;
        assert!(!handler.on_click(0, 0, Button::Left, true));
        assert!(!handler.on_move(0, 0));
    }

    #[test]
    fn test_dispatch_passes_through_without_capture() {
        let (fault_tx, _fault_rx) = fault_channel();
        let mut dispatcher = Dispatcher::new(Box::new(Silent), false, fault_tx);
        assert!(dispatcher.dispatch(PointerEvent::Move { x: 1, y: 1 }));
        assert!(dispatcher.dispatch(PointerEvent::press(1, 1, Button::Left)));
    }

    #[test]
    fn test_dispatch_consumes_under_capture_unless_handler_allows() {
        let (fault_tx, _fault_rx) = fault_channel();
        let mut blocking = Dispatcher::new(Box::new(Silent), true, fault_tx.clone());
        assert!(!blocking.dispatch(PointerEvent::press(1, 1, Button::Right)));

        let (handler, _rx) = ChannelHandler::bounded(4);
        let mut allowing = Dispatcher::new(Box::new(handler.propagate(true)), true, fault_tx);
        assert!(allowing.dispatch(PointerEvent::press(1, 1, Button::Right)));
    }

    #[test]
    fn test_dispatch_survives_handler_panic() {
        let (fault_tx, fault_rx) = fault_channel();
        let (inner, rx) = ChannelHandler::bounded(4);
        let handler = PanicsOnce {
            inner,
            panicked: false,
        };
        let mut dispatcher = Dispatcher::new(Box::new(handler), false, fault_tx);

        assert!(dispatcher.dispatch(PointerEvent::press(3, 4, Button::Left)));
        let fault = fault_rx.try_recv().unwrap();
        assert_eq!(fault.event, PointerEvent::press(3, 4, Button::Left));
        assert!(fault.message.contains("handler bug at (3, 4)"));

        dispatcher.dispatch(PointerEvent::release(3, 4, Button::Left));
        assert_eq!(rx.try_recv().unwrap(), PointerEvent::release(3, 4, Button::Left));
    }

    #[test]
    fn test_panicking_handler_under_capture_still_blocks() {
        let (fault_tx, fault_rx) = fault_channel();
        let (inner, _rx) = ChannelHandler::bounded(4);
        let handler = PanicsOnce {
            inner: inner.propagate(true),
            panicked: false,
        };
        let mut dispatcher = Dispatcher::new(Box::new(handler), true, fault_tx);

        assert!(!dispatcher.dispatch(PointerEvent::press(3, 4, Button::Left)));
        assert_eq!(fault_rx.try_iter().count(), 1);
        // The next event reaches the handler again, which lets it through.
        assert!(dispatcher.dispatch(PointerEvent::release(3, 4, Button::Left)));
    }

    #[test]
    fn test_listener_created_state() {
        let (hook, _input) = VirtualHook::new();
        let listener = Listener::new(hook, Silent);
        assert_eq!(listener.state(), ListenerState::Created);
        assert!(!listener.config().capture);
        assert!(listener.capture(true).config().capture);
    }

    #[test]
    fn test_start_then_stop_terminates_within_poll_interval() {
        let (hook, _input) = VirtualHook::new();
        let handle = Listener::new(hook, Silent).start().unwrap();
        assert!(handle.is_running());
        assert_eq!(handle.state(), ListenerState::Running);

        handle.stop();
        assert!(!handle.is_running());
        // One 10ms interval plus scheduling slack.
        assert!(handle.wait_timeout(Duration::from_millis(500)));
        assert_eq!(handle.state(), ListenerState::Terminated);
        handle.join().unwrap();
    }

    #[test]
    fn test_clicks_delivered_in_order() {
        let (hook, input) = VirtualHook::new();
        let (handler, rx) = ChannelHandler::bounded(64);
        let handle = Listener::new(hook, handler).start().unwrap();

        let mut sent = Vec::new();
        for i in 0..10 {
            let button = Button::ALL[i % 3];
            let event = if i % 2 == 0 {
                PointerEvent::press(i as i32, 0, button)
            } else {
                PointerEvent::release(i as i32, 0, button)
            };
            input.send(event).unwrap();
            sent.push(event);
        }

        let received: Vec<_> = (0..sent.len())
            .map(|_| rx.recv_timeout(WAIT).unwrap())
            .collect();
        assert_eq!(received, sent);
        assert!(rx.try_recv().is_err());

        handle.stop();
        handle.join().unwrap();
    }

    #[test]
    fn test_moves_and_clicks_interleave_in_order() {
        let (hook, input) = VirtualHook::new();
        let (handler, rx) = ChannelHandler::bounded(16);
        let handle = Listener::new(hook, handler).start().unwrap();

        input.move_to(10, 10).unwrap();
        input.press(10, 10, Button::Left).unwrap();
        input.move_to(20, 20).unwrap();
        input.release(20, 20, Button::Left).unwrap();

        let received: Vec<_> = (0..4).map(|_| rx.recv_timeout(WAIT).unwrap()).collect();
        assert_eq!(
            received,
            vec![
                PointerEvent::Move { x: 10, y: 10 },
                PointerEvent::press(10, 10, Button::Left),
                PointerEvent::Move { x: 20, y: 20 },
                PointerEvent::release(20, 20, Button::Left),
            ]
        );
        handle.stop();
    }

    #[test]
    fn test_capture_blocks_native_events() {
        let (hook, input) = VirtualHook::new();
        let handle = Listener::new(hook, Silent).capture(true).start().unwrap();

        input.press(1, 1, Button::Left).unwrap();
        let delivery = input.next_delivery(WAIT).unwrap();
        assert!(!delivery.propagated);
        handle.stop();
    }

    #[test]
    fn test_pass_through_ignores_handler_result() {
        let (hook, input) = VirtualHook::new();
        let handle = Listener::new(hook, Silent).start().unwrap();

        input.move_to(7, 8).unwrap();
        input.press(7, 8, Button::Middle).unwrap();
        assert!(input.next_delivery(WAIT).unwrap().propagated);
        assert!(input.next_delivery(WAIT).unwrap().propagated);
        handle.stop();
    }

    #[test]
    fn test_handler_panic_does_not_end_listener() {
        let (hook, input) = VirtualHook::new();
        let (inner, rx) = ChannelHandler::bounded(8);
        let handler = PanicsOnce {
            inner,
            panicked: false,
        };
        let handle = Listener::new(hook, handler).capture(true).start().unwrap();

        input.press(1, 2, Button::Left).unwrap();
        input.release(1, 2, Button::Left).unwrap();
        assert!(!input.next_delivery(WAIT).unwrap().propagated);

        assert_eq!(
            rx.recv_timeout(WAIT).unwrap(),
            PointerEvent::release(1, 2, Button::Left)
        );
        assert!(handle.is_running());
        let faults = handle.faults();
        assert_eq!(faults.len(), 1);
        assert_eq!(faults[0].event, PointerEvent::press(1, 2, Button::Left));
        assert!(handle.faults().is_empty());

        handle.stop();
        handle.join().unwrap();
    }

    #[test]
    fn test_install_failure_is_returned_from_start() {
        let (hook, _input) = VirtualHook::new();
        let hook = hook.refuse_install("access denied");
        let err = Listener::new(hook, Silent).start().err().unwrap();
        assert!(matches!(err, MouseError::NativeCall { .. }));
        assert!(err.to_string().contains("access denied"));
    }

    #[test]
    fn test_closed_source_ends_listener_with_error() {
        let (hook, input) = VirtualHook::new();
        let handle = Listener::new(hook, Silent).start().unwrap();
        drop(input);

        assert!(handle.wait_timeout(WAIT));
        assert!(!handle.is_running());
        assert!(matches!(handle.join(), Err(MouseError::NativeCall { .. })));
    }

    #[test]
    fn test_dropping_handle_stops_listener() {
        let (hook, input) = VirtualHook::new();
        let handle = Listener::new(Box::new(hook) as Box<dyn HookBackend>, Silent)
            .start()
            .unwrap();
        drop(handle);

        // The loop exits and drops the hook, which disconnects the input side.
        let deadline = std::time::Instant::now() + WAIT;
        while input.send(PointerEvent::Move { x: 0, y: 0 }).is_ok() {
            assert!(std::time::Instant::now() < deadline, "listener did not stop");
            thread::sleep(Duration::from_millis(5));
        }
    }
}
