//! The accumulation engine. [TallyEngine] is the single owner of [state::RunningState];
//! [TallyModule] wraps it in an event loop so keypress notifications and midnight ticks mutate
//! the state from exactly one task.

use anyhow::Result;
use chrono::NaiveDate;
use tokio::sync::mpsc::Receiver;
use tracing::{debug, info, warn};

use crate::{
    daemon::store::{entities::TallyStateEntity, state_store::StateStore},
    utils::clock::Clock,
};

use state::RunningState;

pub mod state;
pub mod stats;

/// Events funneled into the engine mailbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TallyEvent {
    /// One system-wide key-down notification.
    KeyDown,
    /// A local calendar day ended.
    MidnightTick,
}

/// Single source of truth for the counter state. Every mutation is written through to the store
/// before the next event is taken, so a crash loses at most the most recent increment.
pub struct TallyEngine<S> {
    store: S,
    state: RunningState,
    autostart_hinted: bool,
}

impl<S: StateStore> TallyEngine<S> {
    /// Loads persisted state and absorbs midnights missed while the process was down: a stale
    /// date marker finalizes the loaded count under the day it was accumulated on. The result is
    /// written back immediately so the marker on disk always matches `today`.
    pub async fn initialize(store: S, today: NaiveDate) -> TallyEngine<S> {
        let entity = match store.load().await {
            Ok(v) => v,
            Err(e) => {
                warn!("Failed to read persisted state, counting starts from zero {e:?}");
                TallyStateEntity::default()
            }
        };

        let autostart_hinted = entity.autostart_hinted;
        let state = RunningState::restore(entity, today);
        let engine = Self {
            store,
            state,
            autostart_hinted,
        };
        engine.persist().await;
        engine
    }

    pub async fn record_key_down(&mut self) {
        self.state.record_key_down();
        self.persist().await;
    }

    pub async fn roll_over(&mut self, new_today: NaiveDate) {
        let prior = self.state.today();
        self.state.roll_over(new_today);
        info!("Rolled {prior} over into history, counting continues on {new_today}");
        self.persist().await;
    }

    /// Write-through save. A failed write must not take the daemon down: the in-memory state
    /// stays authoritative and the next successful write converges the store again.
    async fn persist(&self) {
        let mut entity = self.state.to_entity();
        entity.autostart_hinted = self.autostart_hinted;
        if let Err(e) = self.store.save(&entity).await {
            warn!("Failed to persist counter state {e:?}");
        }
    }

    pub fn state(&self) -> &RunningState {
        &self.state
    }
}

/// Represents the consumer of counter events. All three mutation paths (catch-up on start,
/// keypresses, rollovers) run on the task executing [TallyModule::run], which is what serializes
/// them relative to each other. The loop ends once every producer dropped its sender, so
/// shutdown consists of stopping the key tap and the midnight scheduler.
pub struct TallyModule<S> {
    receiver: Receiver<TallyEvent>,
    engine: TallyEngine<S>,
    clock: Box<dyn Clock>,
}

impl<S: StateStore> TallyModule<S> {
    pub fn new(receiver: Receiver<TallyEvent>, engine: TallyEngine<S>, clock: Box<dyn Clock>) -> Self {
        Self {
            receiver,
            engine,
            clock,
        }
    }

    async fn handle(&mut self, event: TallyEvent) {
        debug!("Processing event {:?}", event);
        match event {
            TallyEvent::KeyDown => self.engine.record_key_down().await,
            TallyEvent::MidnightTick => {
                let today = self.clock.local_time().date_naive();
                self.engine.roll_over(today).await;
            }
        }
    }

    pub async fn run(mut self) -> Result<()> {
        while let Some(event) = self.receiver.recv().await {
            self.handle(event).await;
        }

        self.receiver.close();
        Ok(())
    }
}
