use tokio::sync::mpsc;

/// Change notifications emitted by a transcript session.
///
/// Indices refer to the session's message list at the time the event was
/// sent; a later `Reset` invalidates all of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    MessageAppended { index: usize },
    MessageUpdated { index: usize },
    ReactionsChanged { index: usize },
    BusyChanged(bool),
    DraftChanged,
    RecordingChanged(bool),
    Reset,
}

#[derive(Default)]
pub struct Subscribers {
    senders: Vec<mpsc::UnboundedSender<SessionEvent>>,
}

impl Subscribers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<SessionEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.senders.push(tx);
        rx
    }

    /// Sends `event` to every live subscriber, forgetting closed ones.
    pub fn notify(&mut self, event: SessionEvent) {
        self.senders.retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn len(&self) -> usize {
        self.senders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_receivers_are_pruned() {
        let mut subscribers = Subscribers::new();
        let mut kept = subscribers.subscribe();
        let dropped = subscribers.subscribe();
        drop(dropped);

        subscribers.notify(SessionEvent::Reset);

        assert_eq!(subscribers.len(), 1);
        assert_eq!(kept.try_recv(), Ok(SessionEvent::Reset));
    }
}
