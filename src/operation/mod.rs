
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use portable_atomic::AtomicBool;
use tokio::sync::{mpsc, oneshot};
use waitgroup::WaitGroup;

use crate::error::{Error, Result};

/// Operation is a function
pub struct Operation(
    pub Box<dyn (FnMut() -> Pin<Box<dyn Future<Output = ()> + Send + 'static>>) + Send>,
    pub &'static str,
);

impl Operation {
    pub(crate) fn new(
        op: impl FnMut() -> Pin<Box<dyn Future<Output = ()> + Send + 'static>> + Send + 'static,
        description: &'static str,
    ) -> Self {
        Self(Box::new(op), description)
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Operation")
            .field(&"_")
            .field(&self.1)
            .finish()
    }
}

/// Operations is a serial task executor. Every enqueued operation runs to
/// completion before the next one starts. Once closed, operations that have
/// not started yet are dropped and their callers observe
/// `ErrInvalidState("closed")`.
#[derive(Default)]
pub(crate) struct Operations {
    closed: Arc<AtomicBool>,
    ops_tx: Option<Arc<mpsc::UnboundedSender<Operation>>>,
    close_tx: Option<mpsc::Sender<()>>,
}

impl Operations {
    pub(crate) fn new() -> Self {
        let closed = Arc::new(AtomicBool::new(false));
        let (ops_tx, ops_rx) = mpsc::unbounded_channel();
        let (close_tx, close_rx) = mpsc::channel(1);
        let c = Arc::clone(&closed);
        tokio::spawn(async move {
            Operations::start(c, ops_rx, close_rx).await;
        });

        Operations {
            closed,
            ops_tx: Some(Arc::new(ops_tx)),
            close_tx: Some(close_tx),
        }
    }

    /// enqueue adds a new action to be executed after every action already
    /// in the queue.
    pub(crate) fn enqueue(&self, op: Operation) -> Result<()> {
        if self.is_closed() {
            return Err(Error::closed());
        }
        if let Some(ops_tx) = &self.ops_tx {
            ops_tx.send(op)?;
        }

        Ok(())
    }

    /// push enqueues `task` and returns a receiver resolving to its output.
    /// The receiver fails if the queue is closed before the task starts.
    pub(crate) fn push_deferred<T, F, Fut>(
        &self,
        description: &'static str,
        task: F,
    ) -> Result<oneshot::Receiver<Result<T>>>
    where
        T: Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let (result_tx, result_rx) = oneshot::channel();
        let mut slot = Some((task, result_tx));
        self.enqueue(Operation::new(
            move || {
                let pending = slot.take();
                Box::pin(async move {
                    if let Some((task, result_tx)) = pending {
                        let _ = result_tx.send(task().await);
                    }
                })
            },
            description,
        ))?;

        Ok(result_rx)
    }

    /// push enqueues `task` and waits for its result.
    pub(crate) async fn push<T, F, Fut>(&self, description: &'static str, task: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let result_rx = self.push_deferred(description, task)?;
        match result_rx.await {
            Ok(result) => result,
            Err(_) => Err(Error::closed()),
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Done blocks until all currently enqueued operations are finished executing.
    pub(crate) async fn done(&self) {
        let wg = WaitGroup::new();
        let mut w = Some(wg.worker());
        let _ = self.enqueue(Operation::new(
            move || {
                let _d = w.take();
                Box::pin(async {})
            },
            "Operation::done",
        ));
        wg.wait().await;
    }

    pub(crate) async fn start(
        closed: Arc<AtomicBool>,
        mut ops_rx: mpsc::UnboundedReceiver<Operation>,
        mut close_rx: mpsc::Receiver<()>,
    ) {
        loop {
            tokio::select! {
                biased;
                _ = close_rx.recv() => {
                    break;
                }
                result = ops_rx.recv() => {
                    let Some(mut f) = result else {
                        break;
                    };
                    if closed.load(Ordering::SeqCst) {
                        log::debug!("dropping queued operation {} after close", f.1);
                        continue;
                    }
                    f.0().await;
                }
            }
        }

        // Dropping the remaining operations drops their result senders, so
        // every waiting caller is rejected instead of hanging.
        ops_rx.close();
        while let Ok(f) = ops_rx.try_recv() {
            log::debug!("dropping queued operation {} after close", f.1);
        }
    }

    /// close stops the executor. An operation already running is allowed to
    /// finish; everything behind it is rejected.
    pub(crate) fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(close_tx) = &self.close_tx {
            let _ = close_tx.try_send(());
        }
    }
}
