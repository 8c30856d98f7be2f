use std::{path::PathBuf, sync::Arc};

use anyhow::Result;
use engine::{TallyEngine, TallyEvent, TallyModule};
use midnight::MidnightScheduler;
use store::state_store::StateStoreImpl;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use crate::{
    key_source::{GenericKeySource, KeyDownCallback, KeyEventSource, KeySourceError},
    utils::clock::{Clock, DefaultClock},
};

pub mod args;
pub mod engine;
pub mod midnight;
pub mod shutdown;
pub mod store;

/// Generous against bursts. At human typing rates the mailbox drains far faster than it fills.
const EVENT_QUEUE_CAPACITY: usize = 256;

/// Represents the starting point for the daemon
pub async fn start_daemon(dir: PathBuf) -> Result<()> {
    std::env::set_current_dir("/")?;

    let (sender, receiver) = mpsc::channel::<TallyEvent>(EVENT_QUEUE_CAPACITY);

    let shutdown_token = CancellationToken::new();

    let module = create_module(dir.join("state"), receiver, DefaultClock).await?;
    let scheduler = MidnightScheduler::new(
        sender.clone(),
        shutdown_token.clone(),
        Box::new(DefaultClock),
    );

    let mut source = GenericKeySource::new()?;
    let tap_running = start_key_tap(&mut source, sender)?;

    let (_, scheduler_result, module_result) = tokio::join!(
        async {
            shutdown::detect_shutdown(shutdown_token.clone()).await;
            if tap_running {
                // Stopping the tap drops its sender. Together with the scheduler exiting this
                // closes the mailbox, which lets the module drain and finish cleanly.
                if tokio::task::spawn_blocking(move || source.stop()).await.is_err() {
                    error!("Key tap did not shut down cleanly");
                }
            }
        },
        scheduler.run(),
        module.run(),
    );

    if let Err(scheduler_result) = scheduler_result {
        error!("Midnight scheduler got an error {:?}", scheduler_result);
    }

    if let Err(module_result) = module_result {
        error!("Tally module got an error {:?}", module_result);
    }

    Ok(())
}

async fn create_module(
    state_dir: PathBuf,
    receiver: mpsc::Receiver<TallyEvent>,
    clock: impl Clock,
) -> Result<TallyModule<StateStoreImpl>> {
    let store = StateStoreImpl::new(state_dir)?;
    let today = clock.local_time().date_naive();
    let engine = TallyEngine::initialize(store, today).await;
    Ok(TallyModule::new(receiver, engine, Box::new(clock)))
}

/// Registers the counting callback with the tap. A missing OS permission is not fatal: the
/// daemon keeps serving the loaded state with the count frozen, and monitoring starts on a later
/// launch once the user granted access. Returns whether events are actually flowing.
fn start_key_tap(
    source: &mut (impl KeyEventSource + ?Sized),
    sender: mpsc::Sender<TallyEvent>,
) -> Result<bool> {
    let callback: KeyDownCallback = Arc::new(move || {
        // Runs on the platform's delivery thread and must never block.
        if let Err(e) = sender.try_send(TallyEvent::KeyDown) {
            warn!("Dropped a key event {e:?}");
        }
    });

    match source.start(callback) {
        Ok(()) => Ok(true),
        Err(KeySourceError::PermissionDenied) => {
            warn!("No permission to observe key events, counting is paused until it's granted");
            Ok(false)
        }
        Err(KeySourceError::Backend(e)) => Err(e),
    }
}

#[cfg(test)]
mod daemon_tests {
    use std::time::Duration;

    use anyhow::Result;
    use async_trait::async_trait;
    use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
    use tempfile::tempdir;
    use tokio::{sync::mpsc, time::Instant};
    use tokio_util::sync::CancellationToken;

    use crate::{
        daemon::{
            create_module, midnight::MidnightScheduler, start_key_tap, store::state_store::StateStore,
            store::state_store::StateStoreImpl, EVENT_QUEUE_CAPACITY,
        },
        key_source::{KeyEventSource, KeySourceError, MockKeyEventSource},
        utils::{clock::Clock, logging::TEST_LOGGING},
    };

    const TEST_START_DATE: NaiveDateTime = NaiveDateTime::new(
        NaiveDate::from_ymd_opt(2018, 7, 4).unwrap(),
        NaiveTime::from_hms_opt(23, 59, 55).unwrap(),
    );

    #[derive(Clone)]
    struct TestClock {
        start_time: DateTime<Local>,
        reference: Instant,
    }

    #[async_trait]
    impl Clock for TestClock {
        fn local_time(&self) -> DateTime<Local> {
            self.start_time + self.reference.elapsed()
        }

        async fn sleep(&self, duration: Duration) {
            tokio::time::sleep(duration).await;
        }
    }

    /// Very simple smoke test to check if the application is working properly. Keys arrive just
    /// before a midnight, the rollover fires, and the store ends up with both facts.
    #[tokio::test(start_paused = true)]
    async fn smoke_test_daemon() -> Result<()> {
        *TEST_LOGGING;

        let dir = tempdir()?;
        let (sender, receiver) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        let test_clock = TestClock {
            start_time: Local.from_local_datetime(&TEST_START_DATE).unwrap(),
            reference: Instant::now(),
        };

        let module = create_module(dir.path().to_path_buf(), receiver, test_clock.clone()).await?;

        let shutdown_token = CancellationToken::new();
        let scheduler = MidnightScheduler::new(
            sender.clone(),
            shutdown_token.clone(),
            Box::new(test_clock.clone()),
        );

        let mut source = MockKeyEventSource::new();
        source.expect_start().returning(|callback| {
            for _ in 0..4 {
                callback();
            }
            Ok(())
        });
        source.expect_stop().returning(|| ());

        assert!(start_key_tap(&mut source, sender)?);

        let (_, scheduler_result, module_result) = tokio::join!(
            async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                shutdown_token.cancel();
                source.stop();
            },
            scheduler.run(),
            module.run(),
        );

        scheduler_result?;
        module_result?;

        let saved = StateStoreImpl::new(dir.path().to_path_buf())?.load().await?;

        assert_eq!(saved.history[&TEST_START_DATE.date()], 4);
        assert_eq!(saved.today_count, 0);
        assert_eq!(
            saved.last_date,
            TEST_START_DATE.date().succ_opt(),
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_denied_permission_is_not_fatal() -> Result<()> {
        let (sender, _receiver) = mpsc::channel(EVENT_QUEUE_CAPACITY);

        let mut source = MockKeyEventSource::new();
        source
            .expect_start()
            .returning(|_| Err(KeySourceError::PermissionDenied));

        assert!(!start_key_tap(&mut source, sender)?);
        Ok(())
    }
}
