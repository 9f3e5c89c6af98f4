use std::sync::{Arc, Mutex};

/// Receives snapshots published after every successful mutation.
pub trait ChangeSink<E>: Send + Sync {
    fn publish(&self, event: E);
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoopChangeSink;

impl<E> ChangeSink<E> for NoopChangeSink {
    fn publish(&self, _event: E) {}
}

#[derive(Clone, Debug)]
pub struct InMemoryChangeSink<E> {
    events: Arc<Mutex<Vec<E>>>,
}

impl<E> Default for InMemoryChangeSink<E> {
    fn default() -> Self {
        Self { events: Arc::new(Mutex::new(Vec::new())) }
    }
}

impl<E: Clone> InMemoryChangeSink<E> {
    pub fn events(&self) -> Vec<E> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn last(&self) -> Option<E> {
        self.events().pop()
    }
}

impl<E: Send> ChangeSink<E> for InMemoryChangeSink<E> {
    fn publish(&self, event: E) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}

impl<E, S> ChangeSink<E> for Arc<S>
where
    S: ChangeSink<E> + ?Sized,
{
    fn publish(&self, event: E) {
        (**self).publish(event);
    }
}
