//! ---
//! tsf_section: "01-core-functionality"
//! tsf_subsection: "module"
//! tsf_type: "source"
//! tsf_scope: "code"
//! tsf_description: "Adapter lifecycle, filtering and composite collections."
//! tsf_version: "v0.0.0-prealpha"
//! tsf_owner: "tbd"
//! ---
//! Notifications raised by adapters and re-published by collections.
//!
//! Handlers run on the emitting thread. A handler that returns an error or
//! panics does not unwind the emitter: the failure is re-published as a
//! [`AdapterEvent::ProcessException`] naming the event being handled.
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::error;

use crate::adapter::Adapter;
use crate::error::AdapterError;
use crate::measurement::Measurement;

/// Severity attached to status messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageLevel {
    /// Diagnostic detail.
    Debug,
    /// Routine information.
    Info,
    /// Something needs attention.
    Warning,
    /// Operator-visible alarm raised by policy (e.g. evasive queue dumps).
    Alarm,
    /// A failure that was handled.
    Error,
    /// A failure or condition about to cause data loss.
    Critical,
}

impl MessageLevel {
    /// Text prefix applied to adapter status messages of this level.
    pub fn prefix(&self) -> &'static str {
        match self {
            MessageLevel::Debug => "DEBUG: ",
            MessageLevel::Info | MessageLevel::Alarm => "",
            MessageLevel::Warning => "WARNING: ",
            MessageLevel::Error => "ERROR: ",
            MessageLevel::Critical => "CRITICAL: ",
        }
    }

    /// Stable lowercase label.
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageLevel::Debug => "debug",
            MessageLevel::Info => "info",
            MessageLevel::Warning => "warning",
            MessageLevel::Alarm => "alarm",
            MessageLevel::Error => "error",
            MessageLevel::Critical => "critical",
        }
    }
}

impl fmt::Display for MessageLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Something an adapter, collection or session reports to its observers.
#[derive(Debug, Clone)]
pub enum AdapterEvent {
    /// Status text with severity.
    StatusMessage {
        /// Severity.
        level: MessageLevel,
        /// Message text, prefixed according to `level` when raised by an adapter.
        message: String,
    },
    /// A handled failure.
    ProcessException(Arc<AdapterError>),
    /// The input filter changed.
    InputMeasurementKeysUpdated,
    /// The output definitions changed.
    OutputMeasurementsUpdated,
    /// A batch of produced measurements.
    NewMeasurements(Arc<[Measurement]>),
    /// Seconds of data waiting in an action adapter.
    UnpublishedSamples(u32),
    /// Measurements waiting in an output adapter queue.
    UnprocessedMeasurements(usize),
    /// An input adapter finished its data.
    ProcessingComplete,
    /// The source was disposed.
    Disposed,
}

impl AdapterEvent {
    /// Event name used in diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            AdapterEvent::StatusMessage { .. } => "StatusMessage",
            AdapterEvent::ProcessException(_) => "ProcessException",
            AdapterEvent::InputMeasurementKeysUpdated => "InputMeasurementKeysUpdated",
            AdapterEvent::OutputMeasurementsUpdated => "OutputMeasurementsUpdated",
            AdapterEvent::NewMeasurements(_) => "NewMeasurements",
            AdapterEvent::UnpublishedSamples(_) => "UnpublishedSamples",
            AdapterEvent::UnprocessedMeasurements(_) => "UnprocessedMeasurements",
            AdapterEvent::ProcessingComplete => "ProcessingComplete",
            AdapterEvent::Disposed => "Disposed",
        }
    }
}

/// Who raised a notification.
#[derive(Clone)]
pub enum EventSource {
    /// An adapter or collection.
    Adapter(Arc<dyn Adapter>),
    /// A free-form label.
    Text(String),
    /// A non-adapter component, identified by its type name.
    Component(&'static str),
}

impl EventSource {
    /// Wrap an adapter.
    pub fn adapter(adapter: Arc<dyn Adapter>) -> Self {
        EventSource::Adapter(adapter)
    }

    /// The adapter, when the source is one.
    pub fn as_adapter(&self) -> Option<&Arc<dyn Adapter>> {
        match self {
            EventSource::Adapter(adapter) => Some(adapter),
            _ => None,
        }
    }
}

impl fmt::Debug for EventSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventSource::Adapter(adapter) => f
                .debug_tuple("Adapter")
                .field(&adapter.name())
                .finish(),
            EventSource::Text(text) => f.debug_tuple("Text").field(text).finish(),
            EventSource::Component(name) => f.debug_tuple("Component").field(name).finish(),
        }
    }
}

/// A notification together with its origin.
///
/// `source` is `None` while a notification is still with the object that
/// raised it; the first collection that forwards it fills in the member.
#[derive(Debug, Clone)]
pub struct Notification {
    /// Origin of the event.
    pub source: Option<EventSource>,
    /// Payload.
    pub event: AdapterEvent,
}

impl Notification {
    /// Notification raised by the publisher itself.
    pub fn local(event: AdapterEvent) -> Self {
        Self {
            source: None,
            event,
        }
    }
}

/// Render a count with thousands separators (`1234567` as `1,234,567`).
pub fn format_count(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Observer callback.
pub type Handler = Arc<dyn Fn(&Notification) -> anyhow::Result<()> + Send + Sync>;

/// Token returned by [`Notifier::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Observer list with explicit unsubscription.
#[derive(Default)]
pub struct Notifier {
    next_id: AtomicU64,
    handlers: RwLock<Vec<(SubscriptionId, Handler)>>,
}

impl Notifier {
    /// Empty observer list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a closure.
    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&Notification) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.subscribe_handler(Arc::new(handler))
    }

    /// Register a shared handler.
    pub fn subscribe_handler(&self, handler: Handler) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.handlers.write().push((id, handler));
        id
    }

    /// Remove a handler; `false` when it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.write();
        let before = handlers.len();
        handlers.retain(|(candidate, _)| *candidate != id);
        handlers.len() != before
    }

    /// Drop every handler.
    pub fn clear(&self) {
        self.handlers.write().clear();
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.read().len()
    }

    /// Whether nobody is listening.
    pub fn is_empty(&self) -> bool {
        self.handlers.read().is_empty()
    }

    /// Deliver to every handler registered at the time of the call.
    pub fn publish(&self, notification: Notification) {
        let handlers: Vec<Handler> = self
            .handlers
            .read()
            .iter()
            .map(|(_, handler)| handler.clone())
            .collect();

        for handler in handlers {
            let message = match panic::catch_unwind(AssertUnwindSafe(|| handler(&notification))) {
                Ok(Ok(())) => continue,
                Ok(Err(err)) => err.to_string(),
                Err(payload) => panic_message(payload.as_ref()),
            };
            let event = notification.event.name();
            if matches!(notification.event, AdapterEvent::ProcessException(_)) {
                error!(event, error = %message, "consumer handler failed while handling a process exception");
                continue;
            }
            let wrapped = AdapterError::ConsumerHandler { event, message };
            self.publish(Notification {
                source: notification.source.clone(),
                event: AdapterEvent::ProcessException(Arc::new(wrapped)),
            });
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "handler panicked".to_owned()
    }
}

impl fmt::Debug for Notifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier")
            .field("handlers", &self.len())
            .finish()
    }
}
