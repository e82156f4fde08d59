use std::sync::{Mutex, PoisonError};

/// Server-side warnings waiting to be shown to the assistant.
///
/// They ride on the next tool result and are then dropped.
#[derive(Debug, Default)]
pub struct ServerWarnings {
    queue: Mutex<Vec<String>>,
}

impl ServerWarnings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `message` unless an identical warning is already waiting.
    pub fn push(&self, message: impl Into<String>) {
        let message = message.into();
        let mut queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        if !queue.contains(&message) {
            tracing::warn!(warning = %message, "server warning queued");
            queue.push(message);
        }
    }

    /// Take every queued warning as one `_warnings:` text block.
    pub fn drain_block(&self) -> Option<String> {
        let drained: Vec<String> = self
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        (!drained.is_empty()).then(|| format!("_warnings: {}", drained.join("; ")))
    }

    pub fn len(&self) -> usize {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Text block for one ignored argument.
pub fn unknown_param_block(name: &str) -> String {
    format!("_warnings: unknown parameter '{name}' (ignored)")
}
