//! Typed notifications from the controller

use parking_lot::Mutex;

use crate::error::CustomizerError;
use crate::pricing::PriceQuote;

/// Something that happened inside a controller
#[derive(Debug, Clone, PartialEq)]
pub enum CustomizerEvent {
    MaterialSelected { material_id: String },

    /// Emitted synchronously on every selection, before assets arrive
    PriceChanged(PriceQuote),

    AssetsLoaded { material_id: String, from_cache: bool },

    AssetsFailed {
        material_id: String,
        error: CustomizerError,
    },

    CartSubmitted { total_cents: u64 },

    CartFailed(CustomizerError),
}

/// Receives controller events; called on the thread that caused them
pub trait CustomizerObserver: Send + Sync {
    fn on_event(&self, event: &CustomizerEvent);
}

impl<F> CustomizerObserver for F
where
    F: Fn(&CustomizerEvent) + Send + Sync,
{
    fn on_event(&self, event: &CustomizerEvent) {
        self(event)
    }
}

/// Observer that keeps every event, for tests and diagnostics
#[derive(Debug, Default)]
pub struct EventLog {
    events: Mutex<Vec<CustomizerEvent>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<CustomizerEvent> {
        self.events.lock().clone()
    }

    /// Every price quote received, in order
    pub fn prices(&self) -> Vec<PriceQuote> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                CustomizerEvent::PriceChanged(quote) => Some(quote.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl CustomizerObserver for EventLog {
    fn on_event(&self, event: &CustomizerEvent) {
        self.events.lock().push(event.clone());
    }
}
