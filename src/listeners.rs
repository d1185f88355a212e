use futures::channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use std::cell::RefCell;

/// Fan-out of events to any number of subscribed receivers.
///
/// Emission is synchronous: every live subscriber has the event queued before
/// `emit` returns, in emission order. Subscribers whose receiver was dropped
/// are pruned on the next emission.
pub(crate) struct Listeners<E> {
    senders: RefCell<Vec<UnboundedSender<E>>>,
}

impl<E: Clone> Listeners<E> {
    pub fn subscribe(&self) -> UnboundedReceiver<E> {
        let (tx, rx) = mpsc::unbounded();
        self.senders.borrow_mut().push(tx);

        rx
    }

    pub fn emit(&self, event: E) {
        self.senders
            .borrow_mut()
            .retain(|tx| tx.unbounded_send(event.clone()).is_ok());
    }
}

impl<E> Default for Listeners<E> {
    fn default() -> Self {
        Self {
            senders: RefCell::new(Vec::new()),
        }
    }
}
