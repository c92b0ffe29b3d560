//! Engine lifecycle events for collaborators such as autosave or sync.

use std::sync::Arc;

use crate::types::{Stroke, StrokeId};

/// Events emitted by [`crate::engine::StrokeEngine`].
///
/// Listeners receive each event synchronously, on the thread that drove the
/// engine call, after the engine state has been updated.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// Pen down: a new stroke is being drawn.
    StrokeStarted { id: StrokeId, timestamp_ms: i64 },
    /// A stroke was finalized and added to the page.
    StrokeCommitted { stroke: Arc<Stroke> },
    /// Pen up on a stroke too short to keep (a tap).
    StrokeDiscarded { id: StrokeId },
    /// The in-progress stroke was aborted.
    StrokeCancelled { id: StrokeId },
    /// Undo removed or restored this stroke.
    Undone { stroke: Arc<Stroke> },
    /// Redo re-applied an edit to this stroke.
    Redone { stroke: Arc<Stroke> },
    StrokesErased { ids: Vec<StrokeId> },
    /// A page was loaded and replaced the committed set.
    PageLoaded { page_id: String, stroke_count: usize },
}

type Listener = Box<dyn Fn(EngineEvent) + Send + Sync>;

/// Registered event listeners
#[derive(Default)]
pub struct EventListeners {
    listeners: Vec<Listener>,
}

impl std::fmt::Debug for EventListeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventListeners")
            .field("listener_count", &self.listeners.len())
            .finish()
    }
}

impl EventListeners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<F>(&mut self, listener: F)
    where
        F: Fn(EngineEvent) + Send + Sync + 'static,
    {
        self.listeners.push(Box::new(listener));
    }

    /// Deliver a clone of `event` to every listener
    pub fn emit(&self, event: EngineEvent) {
        for listener in &self.listeners {
            listener(event.clone());
        }
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_emit_reaches_every_listener() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut listeners = EventListeners::new();
        for tag in ["a", "b"] {
            let seen = Arc::clone(&seen);
            listeners.add(move |event| {
                if let EngineEvent::StrokeDiscarded { id } = event {
                    seen.lock().unwrap().push(format!("{tag}:{id}"));
                }
            });
        }

        listeners.emit(EngineEvent::StrokeDiscarded {
            id: StrokeId::new("tap"),
        });
        assert_eq!(*seen.lock().unwrap(), ["a:tap", "b:tap"]);
        assert_eq!(listeners.len(), 2);
    }
}
