
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex, MutexGuard};

use portable_atomic::AtomicUsize;

use crate::error::Result;

/// Event is implemented by every notification type an Observer carries.
pub trait Event {
    /// name is the lowercase notification name used in logs.
    fn name(&self) -> &'static str;
}

pub type ListenerFn<E> = Box<dyn Fn(&E) -> Result<()> + Send + Sync>;

/// ListenerId identifies a subscription so it can be removed later.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ListenerId(usize);

/// Observer fans one notification out to every subscribed listener.
///
/// Emission never fails: a listener returning an error or panicking is
/// logged and the remaining listeners still run. Internal wiring relies on
/// this, since the emitting call is often in the middle of a state change.
pub struct Observer<E> {
    next_id: AtomicUsize,
    listeners: Mutex<Vec<(ListenerId, Arc<ListenerFn<E>>)>>,
}

impl<E> Default for Observer<E> {
    fn default() -> Self {
        Observer {
            next_id: AtomicUsize::new(0),
            listeners: Mutex::new(vec![]),
        }
    }
}

impl<E: Event> Observer<E> {
    pub fn new() -> Self {
        Self::default()
    }

    fn listeners(&self) -> MutexGuard<'_, Vec<(ListenerId, Arc<ListenerFn<E>>)>> {
        // A panicking listener runs outside the lock, so poisoning only
        // happens if a panic unwinds through subscribe/unsubscribe itself.
        self.listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// subscribe registers `f` for every future notification.
    pub fn subscribe<F>(&self, f: F) -> ListenerId
    where
        F: Fn(&E) -> Result<()> + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.listeners().push((id, Arc::new(Box::new(f))));
        id
    }

    /// unsubscribe removes a listener. Unknown ids are ignored.
    pub fn unsubscribe(&self, id: ListenerId) {
        self.listeners().retain(|(listener_id, _)| *listener_id != id);
    }

    pub fn listener_count(&self) -> usize {
        self.listeners().len()
    }

    /// safe_emit delivers `event` to every listener, catching and logging
    /// listener failures.
    pub fn safe_emit(&self, event: E) {
        let listeners: Vec<Arc<ListenerFn<E>>> =
            self.listeners().iter().map(|(_, f)| Arc::clone(f)).collect();

        for listener in listeners {
            match catch_unwind(AssertUnwindSafe(|| listener(&event))) {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    log::error!(
                        "safe_emit() | event listener threw an error [event:{}]: {}",
                        event.name(),
                        err
                    );
                }
                Err(_) => {
                    log::error!(
                        "safe_emit() | event listener panicked [event:{}]",
                        event.name()
                    );
                }
            }
        }
    }
}
