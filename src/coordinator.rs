use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::client::TechClient;
use crate::error::RefreshError;
use crate::protocol::DEFAULT_MENU_TYPE;
use crate::types::{MenuData, ZoneElement, Zones};

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub update_interval: Duration,
    /// Upper bound for one whole refresh (zones + menu).
    pub refresh_timeout: Duration,
    pub menu_type: String,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            update_interval: Duration::from_secs(30),
            refresh_timeout: Duration::from_secs(10),
            menu_type: DEFAULT_MENU_TYPE.to_string(),
        }
    }
}

/// Consistent view of one module, replaced wholesale on every successful refresh.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub zones: Zones,
    /// `None` when the menu could not be fetched during the last refresh.
    pub menu: Option<MenuData>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    /// No refresh has completed yet.
    Pending,
    Ready,
    /// The last refresh failed; the previous snapshot is still served.
    Failed,
    /// Credentials were rejected and automatic polling stopped.
    AuthRequired,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Arc<dyn Fn(&Snapshot) + Send + Sync>;
type Outcome = Result<Arc<Snapshot>, RefreshError>;

/// Polls one module and fans snapshots out to subscribers.
///
/// Cheap to clone; clones share the same poll loop and snapshot.
#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<Inner>,
}

struct Inner {
    client: Arc<TechClient>,
    udid: String,
    config: CoordinatorConfig,
    snapshot: watch::Sender<Arc<Snapshot>>,
    state: watch::Sender<CoordinatorState>,
    listeners: Mutex<Vec<(ListenerId, Listener)>>,
    next_listener: AtomicU64,
    /// Serializes refreshes and holds the last finished one with its ticket.
    refresh_lock: tokio::sync::Mutex<Option<(u64, Outcome)>>,
    /// Tickets handed out to refreshes as they begin fetching.
    started: AtomicU64,
    cancel: CancellationToken,
    poll: Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
}

impl Coordinator {
    pub fn new(client: Arc<TechClient>, udid: impl Into<String>) -> Self {
        Self::with_config(client, udid, CoordinatorConfig::default())
    }

    pub fn with_config(
        client: Arc<TechClient>,
        udid: impl Into<String>,
        config: CoordinatorConfig,
    ) -> Self {
        let (snapshot, _) = watch::channel(Arc::new(Snapshot::default()));
        let (state, _) = watch::channel(CoordinatorState::Pending);

        Self {
            inner: Arc::new(Inner {
                client,
                udid: udid.into(),
                config,
                snapshot,
                state,
                listeners: Mutex::new(Vec::new()),
                next_listener: AtomicU64::new(0),
                refresh_lock: tokio::sync::Mutex::new(None),
                started: AtomicU64::new(0),
                cancel: CancellationToken::new(),
                poll: Mutex::new(None),
            }),
        }
    }

    pub fn udid(&self) -> &str {
        &self.inner.udid
    }

    pub fn client(&self) -> &Arc<TechClient> {
        &self.inner.client
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.inner.config
    }

    // -- Snapshot access --

    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.inner.snapshot.borrow())
    }

    pub fn zones(&self) -> Zones {
        self.inner.snapshot.borrow().zones.clone()
    }

    pub fn zone(&self, zone_id: u32) -> Option<ZoneElement> {
        self.inner.snapshot.borrow().zones.get(&zone_id).cloned()
    }

    pub fn menu(&self) -> Option<MenuData> {
        self.inner.snapshot.borrow().menu.clone()
    }

    pub fn state(&self) -> CoordinatorState {
        *self.inner.state.borrow()
    }

    pub fn last_update_success(&self) -> bool {
        self.state() == CoordinatorState::Ready
    }

    pub fn watch_snapshot(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.inner.snapshot.subscribe()
    }

    pub fn watch_state(&self) -> watch::Receiver<CoordinatorState> {
        self.inner.state.subscribe()
    }

    // -- Subscribers --

    /// Call `f` once after every successful refresh.
    pub fn subscribe(&self, f: impl Fn(&Snapshot) + Send + Sync + 'static) -> ListenerId {
        let id = ListenerId(self.inner.next_listener.fetch_add(1, Ordering::Relaxed));
        self.inner
            .listeners
            .lock()
            .expect("listener lock poisoned")
            .push((id, Arc::new(f)));
        id
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.inner.listeners.lock().expect("listener lock poisoned");
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }

    // -- Lifecycle --

    /// Refresh once and, on success, start the poll loop.
    pub async fn first_refresh(&self) -> Result<Arc<Snapshot>, RefreshError> {
        let snapshot = self.refresh().await?;
        self.start();
        Ok(snapshot)
    }

    /// Start polling every `update_interval`. No-op while a loop is running.
    ///
    /// After an auth failure stops polling, call this again once the
    /// client holds fresh credentials.
    pub fn start(&self) {
        if self.inner.cancel.is_cancelled() {
            return;
        }
        let mut poll = self.inner.poll.lock().expect("poll lock poisoned");
        if let Some((token, handle)) = poll.as_ref()
            && !token.is_cancelled()
            && !handle.is_finished()
        {
            return;
        }

        let token = self.inner.cancel.child_token();
        let handle = tokio::spawn(poll_task(
            Arc::downgrade(&self.inner),
            self.inner.udid.clone(),
            self.inner.config.update_interval,
            token.clone(),
        ));
        *poll = Some((token, handle));
        debug!(udid = %self.inner.udid, interval = ?self.inner.config.update_interval, "polling started");
    }

    /// Stop polling and abandon any in-flight refresh. Does not wait.
    pub fn shutdown(&self) {
        self.inner.cancel.cancel();
        if let Some((_, handle)) = self.inner.poll.lock().expect("poll lock poisoned").take() {
            handle.abort();
        }
        self.inner.state.send_replace(CoordinatorState::Stopped);
        debug!(udid = %self.inner.udid, "coordinator stopped");
    }

    /// Fetch zones and menu and publish a new snapshot.
    ///
    /// Also the on-demand path after a write, so the result always comes
    /// from a fetch that began after the call. A call made while another
    /// refresh is running waits for it, then runs one follow-up refresh
    /// shared by every caller that queued up in the meantime.
    pub async fn refresh(&self) -> Result<Arc<Snapshot>, RefreshError> {
        let inner = &self.inner;
        if inner.cancel.is_cancelled() {
            return Err(RefreshError::Stopped);
        }

        let seen = inner.started.load(Ordering::Acquire);
        let mut last = inner.refresh_lock.lock().await;
        if let Some((ticket, outcome)) = last.as_ref()
            && *ticket > seen
        {
            debug!(udid = %inner.udid, ticket, "joined follow-up refresh");
            return outcome.clone();
        }
        let ticket = inner.started.fetch_add(1, Ordering::AcqRel) + 1;

        let timeout = inner.config.refresh_timeout;
        let outcome = tokio::select! {
            biased;
            () = inner.cancel.cancelled() => Err(RefreshError::Stopped),
            result = tokio::time::timeout(timeout, self.fetch_snapshot()) => match result {
                Ok(fetched) => fetched.map_err(RefreshError::from),
                Err(_) => Err(RefreshError::Timeout(timeout)),
            },
        };

        let outcome = self.apply(outcome);
        *last = Some((ticket, outcome.clone()));
        outcome
    }

    async fn fetch_snapshot(&self) -> crate::Result<Snapshot> {
        let client = &self.inner.client;
        let udid = self.inner.udid.as_str();

        let zones = client.get_module_zones(udid).await?;
        let menu = match client.get_module_menu(udid, &self.inner.config.menu_type).await {
            Ok(menu) if menu.is_success() => menu.data,
            Ok(menu) => {
                warn!(udid, status = %menu.status, "failed to get menu config");
                None
            }
            Err(e) if e.is_auth_failure() => return Err(e),
            Err(e) => {
                warn!(udid, error = %e, "failed to get menu config");
                None
            }
        };

        Ok(Snapshot { zones, menu })
    }

    fn apply(
        &self,
        outcome: Result<Snapshot, RefreshError>,
    ) -> Result<Arc<Snapshot>, RefreshError> {
        let inner = &self.inner;
        let udid = inner.udid.as_str();

        if inner.cancel.is_cancelled() {
            inner.state.send_replace(CoordinatorState::Stopped);
            return Err(RefreshError::Stopped);
        }

        match outcome {
            Ok(snapshot) => {
                let snapshot = Arc::new(snapshot);
                debug!(
                    udid,
                    zones = snapshot.zones.len(),
                    menu = snapshot.menu.is_some(),
                    "snapshot updated"
                );
                inner.snapshot.send_replace(Arc::clone(&snapshot));
                inner.state.send_replace(CoordinatorState::Ready);
                self.notify(&snapshot);
                Ok(snapshot)
            }
            Err(err) if err.is_auth_failure() => {
                warn!(udid, error = %err, "authentication failed, polling stopped");
                inner.state.send_replace(CoordinatorState::AuthRequired);
                self.stop_polling();
                Err(err)
            }
            Err(err) => {
                warn!(udid, error = %err, "refresh failed");
                inner.state.send_replace(CoordinatorState::Failed);
                Err(err)
            }
        }
    }

    fn notify(&self, snapshot: &Snapshot) {
        let listeners: Vec<Listener> = self
            .inner
            .listeners
            .lock()
            .expect("listener lock poisoned")
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in listeners {
            listener(snapshot);
        }
    }

    fn stop_polling(&self) {
        if let Some((token, _)) = self.inner.poll.lock().expect("poll lock poisoned").take() {
            token.cancel();
        }
    }
}

async fn poll_task(
    inner: Weak<Inner>,
    udid: String,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                // Every handle is gone; nobody is left to read the snapshot.
                let Some(inner) = inner.upgrade() else { break };
                let coordinator = Coordinator { inner };
                match coordinator.refresh().await {
                    Err(RefreshError::AuthFailed(_) | RefreshError::Stopped) => break,
                    // Other failures are logged in `apply`; retry next tick.
                    Ok(_) | Err(_) => {}
                }
            }
        }
    }
    debug!(udid, "poll loop exited");
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
