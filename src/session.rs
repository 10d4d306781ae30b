//! Configurator Session
//!
//! Single consumer that serializes every input onto one event queue: identifier
//! changes, fetch completions, user clicks, swap timers and submit requests.
//! No two handlers ever run concurrently, so the engine and scheduler are
//! plain owned state with no locking.
//!
//! After each event the session syncs the transition scheduler with the view's
//! image and publishes a `SessionSnapshot` on a watch channel.

use std::future::pending;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use crate::config::ConfiguratorConfig;
use crate::error::{ConfiguratorError, ConfiguratorResult};
use crate::fetch::{CatalogSource, FetchCallback, FetchOutcome, FetchSubscription, FetchTicket};
use crate::identifier::IdentifierSource;
use crate::lead::{LeadCapture, LeadSubmission};
use crate::reconcile::{ConfiguratorView, ReconciliationEngine};
use crate::transition::{
    ImageState, SwapEffect, TimerToken, TokioSwapTimers, TransitionScheduler,
};
use crate::types::{ColorId, EntityId, VariantId};

/// Everything the session reacts to
#[derive(Debug)]
pub enum SessionEvent {
    Identifier(EntityId),
    Fetched {
        ticket: FetchTicket,
        outcome: FetchOutcome,
    },
    VariantClicked(VariantId),
    ColorClicked(ColorId),
    SwapTimer(TimerToken),
    /// Re-invoke the fetchers for the current identifier
    Refresh,
    Submit(oneshot::Sender<ConfiguratorResult<LeadSubmission>>),
    Shutdown,
}

/// What the page renders: the view model plus the image transition state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionSnapshot {
    pub view: Arc<ConfiguratorView>,
    pub image: ImageState,
}

/// Cloneable front door to a running session
#[derive(Clone)]
pub struct ConfiguratorHandle {
    events: mpsc::UnboundedSender<SessionEvent>,
    snapshots: watch::Receiver<SessionSnapshot>,
}

impl ConfiguratorHandle {
    fn send(&self, event: SessionEvent) -> ConfiguratorResult<()> {
        self.events
            .send(event)
            .map_err(|_| ConfiguratorError::SessionClosed)
    }

    pub fn set_identifier(&self, id: impl Into<EntityId>) -> ConfiguratorResult<()> {
        self.send(SessionEvent::Identifier(id.into()))
    }

    pub fn variant_clicked(&self, id: impl Into<VariantId>) -> ConfiguratorResult<()> {
        self.send(SessionEvent::VariantClicked(id.into()))
    }

    pub fn color_clicked(&self, id: impl Into<ColorId>) -> ConfiguratorResult<()> {
        self.send(SessionEvent::ColorClicked(id.into()))
    }

    pub fn refresh(&self) -> ConfiguratorResult<()> {
        self.send(SessionEvent::Refresh)
    }

    pub fn shutdown(&self) -> ConfiguratorResult<()> {
        self.send(SessionEvent::Shutdown)
    }

    /// Submit the current configuration to lead capture
    pub async fn submit(&self) -> ConfiguratorResult<LeadSubmission> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionEvent::Submit(reply))?;
        rx.await.map_err(|_| ConfiguratorError::SessionClosed)?
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.clone()
    }

    /// Wait until a published snapshot satisfies `predicate`
    pub async fn wait_for<F>(&self, predicate: F) -> ConfiguratorResult<SessionSnapshot>
    where
        F: FnMut(&SessionSnapshot) -> bool,
    {
        let mut rx = self.snapshots.clone();
        let snapshot = rx
            .wait_for(predicate)
            .await
            .map_err(|_| ConfiguratorError::SessionClosed)?;
        Ok(snapshot.clone())
    }
}

enum Wake {
    Event(Option<SessionEvent>),
    Identifier(Option<Option<EntityId>>),
}

pub struct ConfiguratorSession {
    engine: ReconciliationEngine,
    scheduler: TransitionScheduler,
    timers: TokioSwapTimers,
    source: Arc<dyn CatalogSource>,
    lead: Arc<dyn LeadCapture>,
    subscription: Option<FetchSubscription>,
    identifier: Option<IdentifierSource>,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    events: mpsc::UnboundedReceiver<SessionEvent>,
    snapshots: watch::Sender<SessionSnapshot>,
}

impl ConfiguratorSession {
    pub fn new(
        config: &ConfiguratorConfig,
        source: Arc<dyn CatalogSource>,
        lead: Arc<dyn LeadCapture>,
    ) -> (Self, ConfiguratorHandle) {
        let (events_tx, events) = mpsc::unbounded_channel();
        let (snapshots, snapshots_rx) = watch::channel(SessionSnapshot::default());

        let timer_tx = events_tx.clone();
        let timers = TokioSwapTimers::new(Arc::new(move |token| {
            let _ = timer_tx.send(SessionEvent::SwapTimer(token));
        }));

        let session = Self {
            engine: ReconciliationEngine::new(config),
            scheduler: TransitionScheduler::new(config.swap_delay()),
            timers,
            source,
            lead,
            subscription: None,
            identifier: None,
            events_tx: events_tx.clone(),
            events,
            snapshots,
        };
        let handle = ConfiguratorHandle {
            events: events_tx,
            snapshots: snapshots_rx,
        };
        (session, handle)
    }

    /// Follow an identifier source in addition to explicit `set_identifier` calls
    pub fn with_identifier_source(mut self, source: IdentifierSource) -> Self {
        self.identifier = Some(source);
        self
    }

    /// Spawn the event loop on the current runtime
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Process events until `Shutdown`
    pub async fn run(mut self) {
        info!("Configurator session started");

        if let Some(id) = self.identifier.as_ref().and_then(IdentifierSource::current) {
            self.handle(SessionEvent::Identifier(id));
        }

        loop {
            let wake = tokio::select! {
                event = self.events.recv() => Wake::Event(event),
                changed = next_identifier(self.identifier.as_mut()) => Wake::Identifier(changed),
            };

            let event = match wake {
                Wake::Event(Some(event)) => event,
                Wake::Event(None) => break,
                Wake::Identifier(Some(Some(id))) => SessionEvent::Identifier(id),
                Wake::Identifier(Some(None)) => continue,
                Wake::Identifier(None) => {
                    debug!("Identifier source closed");
                    self.identifier = None;
                    continue;
                }
            };

            if !self.handle(event) {
                break;
            }
        }

        self.subscription = None;
        self.scheduler.cancel();
        info!("Configurator session stopped");
    }

    /// Handle one event. Returns false on shutdown.
    fn handle(&mut self, event: SessionEvent) -> bool {
        match event {
            SessionEvent::Identifier(id) => {
                if let Some(ticket) = self.engine.on_identifier_changed(id) {
                    // A fade-out still running targets the previous identifier's image
                    self.scheduler.cancel();
                    // Replacing the subscription aborts the previous identifier's fetches
                    self.subscription = Some(self.subscribe(ticket));
                }
            }

            SessionEvent::Fetched { ticket, outcome } => {
                // Failures and stale results are reported by the engine
                let _ = self.engine.on_fetch(&ticket, outcome);
            }

            SessionEvent::VariantClicked(id) => {
                let _ = self.engine.on_variant_clicked(id);
            }

            SessionEvent::ColorClicked(id) => {
                let _ = self.engine.on_color_clicked(id);
            }

            SessionEvent::SwapTimer(token) => {
                if let Some(SwapEffect::Committed(url)) = self.scheduler.on_timer(token, &self.timers)
                {
                    debug!(%url, "Image swap committed");
                }
            }

            SessionEvent::Refresh => match self.engine.current_ticket().cloned() {
                Some(ticket) => self.subscription = Some(self.subscribe(ticket)),
                None => debug!("Refresh requested with no identifier set"),
            },

            SessionEvent::Submit(reply) => self.submit(reply),

            SessionEvent::Shutdown => return false,
        }

        self.sync_image();
        self.publish();
        true
    }

    fn subscribe(&self, ticket: FetchTicket) -> FetchSubscription {
        let tx = self.events_tx.clone();
        let callback: FetchCallback = Arc::new(move |ticket, outcome| {
            let _ = tx.send(SessionEvent::Fetched { ticket, outcome });
        });
        FetchSubscription::start(self.source.clone(), ticket, callback)
    }

    fn submit(&self, reply: oneshot::Sender<ConfiguratorResult<LeadSubmission>>) {
        let Some(submission) = self.engine.view().submission() else {
            warn!("Submit requested with no identifier set");
            let _ = reply.send(Err(ConfiguratorError::NoIdentifier));
            return;
        };

        // Lead capture may be slow; the event queue keeps moving meanwhile
        let lead = self.lead.clone();
        tokio::spawn(async move {
            let result = match lead.submit(submission.clone()).await {
                Ok(()) => Ok(submission),
                Err(e) => {
                    warn!(error = %e, "Lead capture rejected submission");
                    Err(ConfiguratorError::from(e))
                }
            };
            let _ = reply.send(result);
        });
    }

    /// Start a swap whenever the view's image differs from what is shown or targeted
    fn sync_image(&mut self) {
        let view = self.engine.view();
        self.scheduler
            .schedule_swap(&view.derived.image_url, &self.timers);
    }

    fn publish(&self) {
        let snapshot = SessionSnapshot {
            view: self.engine.view(),
            image: self.scheduler.state(),
        };
        self.snapshots.send_if_modified(|current| {
            if Arc::ptr_eq(&current.view, &snapshot.view) && current.image == snapshot.image {
                false
            } else {
                *current = snapshot;
                true
            }
        });
    }
}

async fn next_identifier(source: Option<&mut IdentifierSource>) -> Option<Option<EntityId>> {
    match source {
        Some(source) => source.changed().await,
        None => pending().await,
    }
}
