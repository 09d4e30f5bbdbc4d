//! X11 event backend on top of rdev.
//!
//! `rdev::listen` blocks its thread forever and keeps one process-wide
//! callback, so it is started once and its events are broadcast to every
//! installed hook (singleton listener). Hooks receive the events over a
//! channel and dispatch them from `pump` on their own listener thread.
//!
//! rdev reports button transitions without coordinates; the last observed
//! motion sample is used instead (origin until the first move).
//!
//! XRecord only observes, so capture is refused at install time.

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use mousekit_core::{Button, Dispatcher, HookBackend, MouseError, MouseResult, Phase, PointerEvent};
use rdev::{listen, Event, EventType};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const SUBSCRIBER_BUFFER: usize = 1024;

/// How long the first install waits for `listen` to fail. XRecord refuses
/// registration right away; a listener still running after this is up.
const STARTUP_GRACE: Duration = Duration::from_millis(250);

static GLOBAL_LISTENER: OnceLock<Broadcaster> = OnceLock::new();

/// Callback handed to a listen function, called once per native event.
type Broadcast = Box<dyn FnMut(EventType) + Send>;

struct Subscriber {
    tx: Sender<EventType>,
    dropped: Arc<AtomicU64>,
}

/// Subscribers and the terminal failure, guarded together so a subscriber
/// is either registered before the failure (and disconnected by it) or
/// refused after it.
#[derive(Default)]
struct Registry {
    subscribers: Vec<Subscriber>,
    failure: Option<String>,
}

fn lock(registry: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    registry.lock().unwrap_or_else(|e| e.into_inner())
}

/// One listen thread fanned out to any number of subscriptions.
struct Broadcaster {
    registry: Arc<Mutex<Registry>>,
    capacity: usize,
}

impl Broadcaster {
    /// Run `listen` on its own thread and wait up to `grace` for it to fail.
    fn start<F>(listen: F, grace: Duration, capacity: usize) -> Self
    where
        F: FnOnce(Broadcast) -> Result<(), String> + Send + 'static,
    {
        let registry: Arc<Mutex<Registry>> = Arc::default();
        let (status_tx, status_rx) = bounded::<String>(1);

        let thread_registry = registry.clone();
        let spawned = thread::Builder::new()
            .name("mousekit-rdev".into())
            .spawn(move || {
                info!("Global rdev listener thread starting");
                let callback_registry = thread_registry.clone();
                let broadcast: Broadcast = Box::new(move |event: EventType| {
                    if !matches!(
                        event,
                        EventType::MouseMove { .. }
                            | EventType::ButtonPress(_)
                            | EventType::ButtonRelease(_)
                    ) {
                        return;
                    }
                    lock(&callback_registry)
                        .subscribers
                        .retain(|sub| match sub.tx.try_send(event) {
                            Ok(()) => true,
                            Err(TrySendError::Full(_)) => {
                                sub.dropped.fetch_add(1, Ordering::Relaxed);
                                true
                            }
                            Err(TrySendError::Disconnected(_)) => false,
                        });
                });

                let reason = match listen(broadcast) {
                    Ok(()) => "listener returned".to_string(),
                    Err(reason) => reason,
                };
                error!(%reason, "rdev listen ended");
                {
                    // Disconnect every subscriber so their pumps report the failure.
                    let mut registry = lock(&thread_registry);
                    registry.failure = Some(reason.clone());
                    registry.subscribers.clear();
                }
                let _ = status_tx.send(reason);
                info!("Global rdev listener thread exiting");
            });

        match spawned {
            Ok(_) => {
                if let Ok(reason) = status_rx.recv_timeout(grace) {
                    warn!(%reason, "rdev listener failed during startup");
                }
            }
            Err(e) => {
                lock(&registry).failure = Some(format!("failed to spawn listener thread: {e}"));
            }
        }

        Self { registry, capacity }
    }

    fn subscribe(&self) -> MouseResult<Subscription> {
        let mut registry = lock(&self.registry);
        if let Some(reason) = &registry.failure {
            return Err(MouseError::native("rdev listen", reason));
        }
        let (tx, events) = bounded(self.capacity.max(1));
        let dropped = Arc::new(AtomicU64::new(0));
        registry.subscribers.push(Subscriber {
            tx,
            dropped: dropped.clone(),
        });
        Ok(Subscription {
            events,
            dropped,
            registry: self.registry.clone(),
        })
    }
}

/// Receiving side of one broadcaster subscriber.
struct Subscription {
    events: Receiver<EventType>,
    dropped: Arc<AtomicU64>,
    registry: Arc<Mutex<Registry>>,
}

impl Subscription {
    /// Events discarded on a full queue since the last call.
    fn take_dropped(&self) -> u64 {
        self.dropped.swap(0, Ordering::Relaxed)
    }

    fn closed_error(&self) -> MouseError {
        let reason = lock(&self.registry)
            .failure
            .clone()
            .unwrap_or_else(|| "listener thread exited".to_string());
        MouseError::native("rdev listen", reason)
    }
}

fn global_listener() -> &'static Broadcaster {
    GLOBAL_LISTENER.get_or_init(|| {
        Broadcaster::start(
            |mut broadcast| {
                listen(move |event: Event| broadcast(event.event_type))
                    .map_err(|e| format!("{e:?}"))
            },
            STARTUP_GRACE,
            SUBSCRIBER_BUFFER,
        )
    })
}

fn decode_button(button: rdev::Button) -> Option<Button> {
    match button {
        rdev::Button::Left => Some(Button::Left),
        rdev::Button::Right => Some(Button::Right),
        rdev::Button::Middle => Some(Button::Middle),
        rdev::Button::Unknown(_) => None,
    }
}

/// Event backend for the X Record extension.
#[derive(Default)]
pub struct RdevHook {
    subscription: Option<Subscription>,
    dispatcher: Option<Dispatcher>,
    last_position: (i32, i32),
}

impl RdevHook {
    pub fn new() -> Self {
        Self::default()
    }

    fn attach(&mut self, broadcaster: &Broadcaster, dispatcher: Dispatcher) -> MouseResult<()> {
        self.subscription = Some(broadcaster.subscribe()?);
        self.dispatcher = Some(dispatcher);
        debug!("Subscribed to global rdev listener");
        Ok(())
    }

    /// Translate one rdev event, tracking the pointer position.
    fn translate(&mut self, event: EventType) -> Option<PointerEvent> {
        let (x, y) = self.last_position;
        match event {
            EventType::MouseMove { x, y } => {
                self.last_position = (x as i32, y as i32);
                Some(PointerEvent::Move {
                    x: x as i32,
                    y: y as i32,
                })
            }
            EventType::ButtonPress(button) => {
                decode_button(button).map(|button| PointerEvent::press(x, y, button))
            }
            EventType::ButtonRelease(button) => {
                decode_button(button).map(|button| PointerEvent::release(x, y, button))
            }
            _ => None,
        }
    }

    fn deliver(&mut self, event: EventType) {
        let Some(event) = self.translate(event) else {
            return;
        };
        if let Some(dispatcher) = self.dispatcher.as_mut() {
            // XRecord cannot withhold events; the decision is informational.
            dispatcher.dispatch(event);
        }
    }

    fn drain(&mut self, subscription: &Subscription, timeout: Duration) -> MouseResult<()> {
        let dropped = subscription.take_dropped();
        if dropped > 0 {
            warn!(dropped, "Mouse hook queue was full, events lost");
        }

        match subscription.events.recv_timeout(timeout) {
            Ok(event) => self.deliver(event),
            Err(RecvTimeoutError::Timeout) => return Ok(()),
            Err(RecvTimeoutError::Disconnected) => return Err(subscription.closed_error()),
        }
        while let Ok(event) = subscription.events.try_recv() {
            self.deliver(event);
        }
        Ok(())
    }
}

impl HookBackend for RdevHook {
    fn name(&self) -> &'static str {
        "rdev-xrecord"
    }

    fn install(&mut self, dispatcher: Dispatcher) -> MouseResult<()> {
        if dispatcher.capture() {
            return Err(MouseError::native(
                "install rdev hook",
                "capture is not supported by the X Record backend",
            ));
        }
        if std::env::var_os("DISPLAY").is_none() {
            return Err(MouseError::native(
                "install rdev hook",
                "no X display (DISPLAY is not set)",
            ));
        }
        self.attach(global_listener(), dispatcher)
    }

    fn pump(&mut self, timeout: Duration) -> MouseResult<()> {
        let Some(subscription) = self.subscription.take() else {
            return Err(MouseError::native("pump rdev hook", "hook not installed"));
        };
        let result = self.drain(&subscription, timeout);
        self.subscription = Some(subscription);
        result
    }

    fn uninstall(&mut self) {
        // Dropping the receiver unsubscribes on the next broadcast.
        self.subscription = None;
        self.dispatcher = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;
    use mousekit_core::{ChannelHandler, HandlerFault, MouseHandler};
    use std::time::Instant;

    const WAIT: Duration = Duration::from_secs(2);

    struct Silent;
    impl MouseHandler for Silent {}

    fn dispatcher(handler: impl MouseHandler) -> Dispatcher {
        let (fault_tx, _fault_rx) = bounded::<HandlerFault>(1);
        Dispatcher::new(Box::new(handler), false, fault_tx)
    }

    /// A broadcaster fed from a channel; listening fails with `reason` once
    /// the feeding side is dropped.
    fn fed_broadcaster(capacity: usize, reason: &'static str) -> (Broadcaster, Sender<EventType>) {
        let (feed_tx, feed_rx) = unbounded::<EventType>();
        let broadcaster = Broadcaster::start(
            move |mut broadcast| {
                for event in feed_rx {
                    broadcast(event);
                }
                Err(reason.to_string())
            },
            Duration::from_millis(20),
            capacity,
        );
        (broadcaster, feed_tx)
    }

    #[test]
    fn test_decode_button() {
        assert_eq!(decode_button(rdev::Button::Left), Some(Button::Left));
        assert_eq!(decode_button(rdev::Button::Right), Some(Button::Right));
        assert_eq!(decode_button(rdev::Button::Middle), Some(Button::Middle));
        assert_eq!(decode_button(rdev::Button::Unknown(8)), None);
    }

    #[test]
    fn test_buttons_use_last_motion_sample() {
        let mut hook = RdevHook::new();
        assert_eq!(
            hook.translate(EventType::ButtonPress(rdev::Button::Left)),
            Some(PointerEvent::press(0, 0, Button::Left))
        );
        assert_eq!(
            hook.translate(EventType::MouseMove { x: 12.4, y: 30.0 }),
            Some(PointerEvent::Move { x: 12, y: 30 })
        );
        assert_eq!(
            hook.translate(EventType::ButtonRelease(rdev::Button::Left)),
            Some(PointerEvent::release(12, 30, Button::Left))
        );
        assert_eq!(hook.translate(EventType::Wheel { delta_x: 0, delta_y: 1 }), None);
    }

    #[test]
    fn test_refused_registration_fails_install() {
        let broadcaster = Broadcaster::start(
            |_| Err("XRecord extension missing".to_string()),
            WAIT,
            SUBSCRIBER_BUFFER,
        );

        let mut hook = RdevHook::new();
        let err = hook.attach(&broadcaster, dispatcher(Silent)).unwrap_err();
        assert!(matches!(err, MouseError::NativeCall { .. }));
        assert!(err.to_string().contains("XRecord extension missing"));

        // Every later subscriber is refused the same way.
        assert!(broadcaster.subscribe().is_err());
    }

    #[test]
    fn test_events_flow_until_listen_fails() {
        let (broadcaster, feed) = fed_broadcaster(SUBSCRIBER_BUFFER, "display closed");
        let (handler, rx) = ChannelHandler::bounded(8);
        let mut hook = RdevHook::new();
        hook.attach(&broadcaster, dispatcher(handler)).unwrap();

        feed.send(EventType::MouseMove { x: 5.0, y: 6.0 }).unwrap();
        feed.send(EventType::KeyPress(rdev::Key::KeyA)).unwrap();
        feed.send(EventType::ButtonPress(rdev::Button::Right)).unwrap();

        let mut received = Vec::new();
        let deadline = Instant::now() + WAIT;
        while received.len() < 2 && Instant::now() < deadline {
            hook.pump(Duration::from_millis(10)).unwrap();
            received.extend(rx.try_iter());
        }
        assert_eq!(
            received,
            vec![
                PointerEvent::Move { x: 5, y: 6 },
                PointerEvent::press(5, 6, Button::Right),
            ]
        );

        drop(feed);
        let deadline = Instant::now() + WAIT;
        let err = loop {
            match hook.pump(Duration::from_millis(10)) {
                Ok(()) => assert!(Instant::now() < deadline, "pump never saw the failure"),
                Err(e) => break e,
            }
        };
        assert!(err.to_string().contains("display closed"));
        assert!(broadcaster.subscribe().is_err());
    }

    #[test]
    fn test_full_queue_counts_dropped_events() {
        let (broadcaster, feed) = fed_broadcaster(2, "done");
        let subscription = broadcaster.subscribe().unwrap();

        for x in 0..5 {
            feed.send(EventType::MouseMove { x: x as f64, y: 0.0 }).unwrap();
        }

        let deadline = Instant::now() + WAIT;
        let mut dropped = 0;
        while dropped < 3 {
            assert!(Instant::now() < deadline, "drops not counted");
            dropped += subscription.take_dropped();
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(dropped, 3);
        assert_eq!(subscription.events.try_iter().count(), 2);
        assert_eq!(subscription.take_dropped(), 0);
    }
}
