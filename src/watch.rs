//! Per-resource watchers combining an initial fetch with live pushes.
//!
//! A [`ResourceWatcher`] fetches one snapshot through the REST client, then
//! keeps it current from bus deliveries and (optionally) periodic polls.
//! Every delivery replaces `data` and `last_updated_ms` together under one
//! lock section; when a poll response and a push race, whichever resolves
//! last wins. Dropping the watcher releases the bus registration and aborts
//! the poll and fetch tasks on every exit path.

use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use futures_util::future::BoxFuture;
use tokio::task::JoinHandle;

use crate::api::ApiError;
use crate::bus::{EventBus, Subscription};
use crate::events::{ClientEvent, Topic};
use crate::status::now_ms;

/// Async closure producing one fresh value for the watched resource.
pub type FetchFn<T> = Arc<dyn Fn() -> BoxFuture<'static, Result<T, ApiError>> + Send + Sync>;

/// Latest known value of one resource plus delivery metadata.
#[derive(Clone, Debug)]
pub struct Snapshot<T> {
    /// Most recent value; retained across failed refreshes.
    pub data: Option<T>,
    /// True while a fetch is outstanding.
    pub loading: bool,
    /// Message of the last failed fetch, cleared by the next delivery.
    pub error: Option<String>,
    /// Arrival time of the last delivery, unix millis.
    pub last_updated_ms: Option<u64>,
}

impl<T> Default for Snapshot<T> {
    fn default() -> Self {
        Self {
            data: None,
            loading: true,
            error: None,
            last_updated_ms: None,
        }
    }
}

/// Watcher construction options.
#[derive(Clone, Copy, Debug, Default)]
pub struct WatchOptions {
    /// Refetch period running concurrently with pushes. Disabled when unset.
    pub poll_interval: Option<Duration>,
}

/// Live view over one named resource.
pub struct ResourceWatcher<T> {
    snapshot: Arc<RwLock<Snapshot<T>>>,
    fetch: FetchFn<T>,
    fetch_tasks: Mutex<Vec<JoinHandle<()>>>,
    poll_task: Option<JoinHandle<()>>,
    _subscription: Option<Subscription<ClientEvent>>,
}

impl<T: Clone + Send + Sync + 'static> ResourceWatcher<T> {
    /// Activates a watcher: spawns the initial fetch, registers the bus
    /// listener, and starts the poll timer when configured.
    ///
    /// `apply` inspects a bus delivery and returns the full replacement
    /// value for matching events, or `None` to ignore the delivery.
    pub fn new(
        bus: &Arc<EventBus<ClientEvent>>,
        topic: Option<Topic>,
        apply: impl Fn(&ClientEvent, Option<&T>) -> Option<T> + Send + Sync + 'static,
        fetch: FetchFn<T>,
        options: WatchOptions,
    ) -> Self {
        let snapshot: Arc<RwLock<Snapshot<T>>> = Arc::new(RwLock::new(Snapshot::default()));

        let subscription = topic.map(|topic| {
            let snapshot = Arc::clone(&snapshot);
            bus.subscribe(topic, move |event| {
                if let Ok(mut guard) = snapshot.write() {
                    if let Some(next) = apply(event, guard.data.as_ref()) {
                        guard.data = Some(next);
                        guard.last_updated_ms = Some(now_ms());
                        guard.error = None;
                    }
                }
            })
        });

        let initial = tokio::spawn(run_fetch(Arc::clone(&snapshot), Arc::clone(&fetch)));

        let poll_task = options.poll_interval.map(|interval| {
            let snapshot = Arc::clone(&snapshot);
            let fetch = Arc::clone(&fetch);
            tokio::spawn(async move {
                loop {
                    tokio::time::sleep(interval).await;
                    run_fetch(Arc::clone(&snapshot), Arc::clone(&fetch)).await;
                }
            })
        });

        Self {
            snapshot,
            fetch,
            fetch_tasks: Mutex::new(vec![initial]),
            poll_task,
            _subscription: subscription,
        }
    }

    /// Copy of the current snapshot.
    pub fn snapshot(&self) -> Snapshot<T> {
        self.snapshot
            .read()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    /// Latest known value, if any delivery has landed.
    pub fn data(&self) -> Option<T> {
        self.snapshot().data
    }

    /// True while a fetch is outstanding.
    pub fn loading(&self) -> bool {
        self.snapshot().loading
    }

    /// Schedules another fetch; the result replaces the snapshot when it
    /// resolves, racing any concurrent push under last-write-wins.
    pub fn refetch(&self) {
        let task = tokio::spawn(run_fetch(
            Arc::clone(&self.snapshot),
            Arc::clone(&self.fetch),
        ));
        if let Ok(mut tasks) = self.fetch_tasks.lock() {
            tasks.retain(|task| !task.is_finished());
            tasks.push(task);
        }
    }
}

impl<T> Drop for ResourceWatcher<T> {
    fn drop(&mut self) {
        if let Some(poll) = self.poll_task.take() {
            poll.abort();
        }
        if let Ok(mut tasks) = self.fetch_tasks.lock() {
            for task in tasks.drain(..) {
                task.abort();
            }
        }
        // The bus registration is released by the subscription guard.
    }
}

async fn run_fetch<T>(snapshot: Arc<RwLock<Snapshot<T>>>, fetch: FetchFn<T>) {
    if let Ok(mut guard) = snapshot.write() {
        guard.loading = true;
    }

    let outcome = fetch().await;

    if let Ok(mut guard) = snapshot.write() {
        match outcome {
            Ok(value) => {
                guard.data = Some(value);
                guard.last_updated_ms = Some(now_ms());
                guard.error = None;
            }
            Err(error) => {
                // A stale value beats no value; keep it alongside the error.
                guard.error = Some(error.to_string());
            }
        }
        guard.loading = false;
    }
}
