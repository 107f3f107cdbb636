//! Integration tests for the generation scheduler
//!
//! These tests drive `Scheduler` and `Project` through the public API with a
//! mock speech backend. Time is paused, so backend delays cost nothing.
//!
//! ## Running Tests
//!
//! ### Mock tests (no API key needed):
//! ```bash
//! cargo test --test scheduler_integration mock_
//! ```
//!
//! ### Integration tests (requires API key):
//! ```bash
//! export GEMINI_API_KEY=your-key
//! cargo test --test scheduler_integration integration_
//! ```

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::future::BoxFuture;

use narrator_lib::queue::NewItem;
use narrator_lib::{
    GenerationError, NarratorSettings, Pace, Project, QueueStore, RunOutcome, Scheduler,
    SchedulerConfig, SpeechBackend, SpeechRequest, StatusKind, Voice,
};

const DELAY: Duration = Duration::from_millis(1000);

/// Backend that sleeps, records what it was asked for, and tracks how many
/// requests overlap.
///
/// Texts containing "fail" fail while `failing` is set. Texts starting with
/// "slow" take three times as long.
struct MockBackend {
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    failing: AtomicBool,
    requests: Mutex<Vec<SpeechRequest>>,
}

impl MockBackend {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            failing: AtomicBool::new(true),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn requested_texts(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.text.clone())
            .collect()
    }

    fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

/// Two bytes per character, each sample holding the text's first byte.
fn pcm_for(text: &str) -> Vec<u8> {
    let first = text.bytes().next().unwrap_or(0);
    text.chars().flat_map(|_| [first, 0]).collect()
}

impl SpeechBackend for MockBackend {
    fn generate<'a>(
        &'a self,
        request: &'a SpeechRequest,
    ) -> BoxFuture<'a, Result<Vec<u8>, GenerationError>> {
        Box::pin(async move {
            self.requests.lock().unwrap().push(request.clone());
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            let delay = if request.text.starts_with("slow") {
                DELAY * 3
            } else {
                DELAY
            };
            tokio::time::sleep(delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.failing.load(Ordering::SeqCst) && request.text.contains("fail") {
                return Err(GenerationError::ApiError {
                    status: 500,
                    message: "backend unavailable".to_string(),
                });
            }
            Ok(pcm_for(&request.text))
        })
    }
}

fn item(text: &str) -> NewItem {
    NewItem {
        text: text.to_string(),
        voice: "Zephyr".to_string(),
        pace: Pace::NORMAL,
        instructions: String::new(),
    }
}

fn setup(texts: &[&str], concurrency: usize) -> (QueueStore, Arc<Scheduler>, Arc<MockBackend>) {
    let store = QueueStore::new();
    store.add_all(texts.iter().map(|t| item(t)));
    let backend = MockBackend::new();
    let config = SchedulerConfig {
        concurrency,
        ..SchedulerConfig::default()
    };
    let scheduler = Arc::new(Scheduler::new(store.clone(), backend.clone(), config));
    (store, scheduler, backend)
}

fn spawn_run(scheduler: &Arc<Scheduler>) -> tokio::task::JoinHandle<RunOutcome> {
    let scheduler = Arc::clone(scheduler);
    tokio::spawn(async move { scheduler.run().await })
}

fn kinds(store: &QueueStore) -> Vec<StatusKind> {
    store.snapshot().iter().map(|i| i.status().kind()).collect()
}

// ============================================================================
// Mock Tests - No API key required
// ============================================================================

mod mock_tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn mock_concurrency_is_bounded_by_config() {
        let texts: Vec<String> = (0..10).map(|n| format!("segment {}", n)).collect();
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let (store, scheduler, backend) = setup(&refs, 3);

        let outcome = scheduler.run().await;

        assert_eq!(
            outcome,
            RunOutcome::Finished {
                completed: 10,
                failed: 0
            }
        );
        assert_eq!(backend.max_in_flight(), 3);
        assert_eq!(store.counts().completed, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn mock_concurrency_is_bounded_by_item_count() {
        let (_store, scheduler, backend) = setup(&["a", "b"], 4);
        scheduler.run().await;
        assert_eq!(backend.max_in_flight(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn mock_every_item_ends_completed_or_error() {
        let (store, scheduler, _backend) =
            setup(&["one", "please fail", "three", "fail again", "five"], 2);

        let outcome = scheduler.run().await;

        assert_eq!(
            outcome,
            RunOutcome::Finished {
                completed: 3,
                failed: 2
            }
        );
        assert_eq!(
            kinds(&store),
            vec![
                StatusKind::Completed,
                StatusKind::Error,
                StatusKind::Completed,
                StatusKind::Error,
                StatusKind::Completed,
            ]
        );
        let failed = &store.snapshot()[1];
        assert_eq!(
            failed.error_message(),
            Some("Gemini API error (500): backend unavailable")
        );
        assert!(failed.clip().is_none());
        assert!(!scheduler.is_processing());
    }

    #[tokio::test(start_paused = true)]
    async fn mock_retry_reselects_only_failed_items() {
        let (store, scheduler, backend) = setup(&["ok", "fail me", "also ok"], 4);
        scheduler.run().await;
        assert_eq!(store.counts().error, 1);

        backend.failing.store(false, Ordering::SeqCst);
        let outcome = scheduler.run().await;

        assert_eq!(
            outcome,
            RunOutcome::Finished {
                completed: 1,
                failed: 0
            }
        );
        let texts = backend.requested_texts();
        assert_eq!(texts.len(), 4);
        assert_eq!(texts[3], "fail me");
        assert_eq!(store.counts().completed, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn mock_dispatch_follows_queue_order() {
        let (_store, scheduler, backend) = setup(&["first", "second", "third", "fourth"], 1);
        scheduler.run().await;
        assert_eq!(
            backend.requested_texts(),
            vec!["first", "second", "third", "fourth"]
        );
        assert_eq!(backend.max_in_flight(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn mock_all_selected_items_generate_before_dispatch() {
        let (store, scheduler, _backend) = setup(&["a", "b", "c", "d", "e"], 2);
        let run = spawn_run(&scheduler);
        tokio::time::sleep(Duration::from_millis(10)).await;

        // two in flight, three waiting, all shown as generating
        assert_eq!(store.counts().generating, 5);
        assert!(scheduler.is_processing());
        run.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn mock_run_while_processing_is_rejected() {
        let (_store, scheduler, backend) = setup(&["a", "b"], 2);
        let run = spawn_run(&scheduler);
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(scheduler.run().await, RunOutcome::AlreadyRunning);

        run.await.unwrap();
        assert_eq!(backend.requested_texts().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn mock_stop_reverts_and_discards_late_results() {
        let (store, scheduler, backend) = setup(&["a", "b", "c", "d", "e", "f"], 2);
        let run = spawn_run(&scheduler);
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(store.counts().generating, 6);

        let reverted = scheduler.stop().await;
        assert_eq!(reverted, Some(6));
        assert!(!scheduler.is_processing());
        assert!(kinds(&store).iter().all(|k| *k == StatusKind::Idle));

        // in-flight requests return after the stop; nothing may commit
        let outcome = run.await.unwrap();
        assert_eq!(
            outcome,
            RunOutcome::Cancelled {
                completed: 0,
                failed: 0,
                abandoned: 6
            }
        );
        assert_eq!(backend.requested_texts().len(), 2);
        assert!(kinds(&store).iter().all(|k| *k == StatusKind::Idle));
        assert!(!scheduler.is_processing());
    }

    #[tokio::test(start_paused = true)]
    async fn mock_stop_keeps_completed_items() {
        let (store, scheduler, _backend) = setup(&["quick", "slow one", "slow two"], 3);
        let run = spawn_run(&scheduler);
        // "quick" is done after one delay, the slow ones need three
        tokio::time::sleep(DELAY + Duration::from_millis(100)).await;

        assert_eq!(scheduler.stop().await, Some(2));
        run.await.unwrap();

        assert_eq!(
            kinds(&store),
            vec![StatusKind::Completed, StatusKind::Idle, StatusKind::Idle]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn mock_late_failure_after_stop_is_discarded() {
        let (store, scheduler, _backend) = setup(&["fail in flight", "b"], 2);
        let run = spawn_run(&scheduler);
        tokio::time::sleep(Duration::from_millis(500)).await;

        assert_eq!(scheduler.stop().await, Some(2));

        // the failing request returns after the stop
        let outcome = run.await.unwrap();
        assert_eq!(
            outcome,
            RunOutcome::Cancelled {
                completed: 0,
                failed: 0,
                abandoned: 2
            }
        );
        let failed = &store.snapshot()[0];
        assert_eq!(failed.status().kind(), StatusKind::Idle);
        assert_eq!(failed.error_message(), None);
        assert_eq!(store.counts().error, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn mock_overlapping_stops_keep_one_active_run() {
        let (store, scheduler, _backend) = setup(&["a", "b"], 2);
        let first_run = spawn_run(&scheduler);

        tokio::time::sleep(Duration::from_millis(10)).await;
        let first_stop = {
            let scheduler = Arc::clone(&scheduler);
            tokio::spawn(async move { scheduler.stop().await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;
        let second_stop = {
            let scheduler = Arc::clone(&scheduler);
            tokio::spawn(async move { scheduler.stop().await })
        };

        // the first stop has settled, the second has not
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(scheduler.is_processing());
        assert_eq!(scheduler.run().await, RunOutcome::AlreadyRunning);

        assert_eq!(first_stop.await.unwrap(), Some(2));
        assert_eq!(second_stop.await.unwrap(), Some(0));
        assert!(!scheduler.is_processing());

        let second_run = spawn_run(&scheduler);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(scheduler.is_processing());
        assert_eq!(scheduler.run().await, RunOutcome::AlreadyRunning);

        assert!(matches!(
            first_run.await.unwrap(),
            RunOutcome::Cancelled { .. }
        ));
        assert_eq!(
            second_run.await.unwrap(),
            RunOutcome::Finished {
                completed: 2,
                failed: 0
            }
        );
        assert_eq!(store.counts().completed, 2);
        assert_eq!(store.counts().generating, 0);
        assert!(!scheduler.is_processing());
    }

    #[tokio::test(start_paused = true)]
    async fn mock_new_run_rejected_while_stop_settles() {
        let (_store, scheduler, _backend) = setup(&["a", "b"], 2);
        let run = spawn_run(&scheduler);
        tokio::time::sleep(Duration::from_millis(10)).await;

        let stopper = {
            let scheduler = Arc::clone(&scheduler);
            tokio::spawn(async move { scheduler.stop().await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(scheduler.is_processing());
        assert_eq!(scheduler.run().await, RunOutcome::AlreadyRunning);

        assert_eq!(stopper.await.unwrap(), Some(2));
        assert!(!scheduler.is_processing());
        run.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn mock_rerun_after_stop_generates_everything() {
        let (store, scheduler, _backend) = setup(&["a", "b", "c"], 1);
        let run = spawn_run(&scheduler);
        tokio::time::sleep(Duration::from_millis(10)).await;
        scheduler.stop().await;
        run.await.unwrap();

        let outcome = scheduler.run().await;
        assert_eq!(
            outcome,
            RunOutcome::Finished {
                completed: 3,
                failed: 0
            }
        );
        assert_eq!(store.counts().completed, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn mock_removed_items_are_abandoned() {
        let (store, scheduler, backend) = setup(&["first", "second", "third"], 1);
        let ids: Vec<_> = store.snapshot().iter().map(|i| i.id()).collect();
        let run = spawn_run(&scheduler);
        tokio::time::sleep(Duration::from_millis(10)).await;

        // "first" is in flight, "third" has not been dispatched yet
        assert!(store.remove(ids[0]));
        assert!(store.remove(ids[2]));

        let outcome = run.await.unwrap();
        assert_eq!(
            outcome,
            RunOutcome::Finished {
                completed: 1,
                failed: 0
            }
        );
        assert_eq!(backend.requested_texts(), vec!["first", "second"]);
        assert_eq!(store.len(), 1);
        assert_eq!(kinds(&store), vec![StatusKind::Completed]);
    }

    #[tokio::test(start_paused = true)]
    async fn mock_instructions_and_pace_reach_backend() {
        let store = QueueStore::new();
        store.add(NewItem {
            text: "গল্প".to_string(),
            voice: "Kore".to_string(),
            pace: "0.8".parse().unwrap(),
            instructions: "Speak warmly".to_string(),
        });
        let backend = MockBackend::new();
        let scheduler = Scheduler::new(store, backend.clone(), SchedulerConfig::default());
        scheduler.run().await;

        let requests = backend.requests.lock().unwrap();
        assert_eq!(requests[0].voice, "Kore");
        assert_eq!(requests[0].instructions, "Speak warmly. Speak slowly");
    }

    #[tokio::test(start_paused = true)]
    async fn mock_merged_export_follows_queue_order() {
        let backend = MockBackend::new();
        let settings = NarratorSettings {
            segment_char_limit: 10,
            ..NarratorSettings::default()
        };
        let project = Project::new("Merged Story", backend.clone(), settings);
        // "slow" finishes last but sits first in the queue
        project.submit("slowly.\nfail here\nquick", Voice::Zephyr, Pace::NORMAL, "");
        assert_eq!(project.counts().idle, 3);

        let outcome = project.generate_all().await;
        assert_eq!(
            outcome,
            RunOutcome::Finished {
                completed: 2,
                failed: 1
            }
        );

        let dir = tempfile::tempdir().unwrap();
        let path = project.export_merged(dir.path()).unwrap().unwrap();
        assert_eq!(path.file_name().unwrap(), "Merged Story.wav");

        let mut reader = hound::WavReader::open(&path).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, 24000);
        assert_eq!(spec.bits_per_sample, 16);

        let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        let mut expected = vec![i16::from(b's'); "slowly.".len()];
        expected.extend(vec![i16::from(b'q'); "quick".len()]);
        assert_eq!(samples, expected);
    }

    #[tokio::test(start_paused = true)]
    async fn mock_merge_with_nothing_completed_is_noop() {
        let backend = MockBackend::new();
        let project = Project::new("", backend, NarratorSettings::default());
        project.submit("fail", Voice::Puck, Pace::NORMAL, "");
        project.generate_all().await;

        let dir = tempfile::tempdir().unwrap();
        assert!(project.merged_wav().unwrap().is_none());
        assert!(project.export_merged(dir.path()).unwrap().is_none());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}

// ============================================================================
// Integration Tests - Require GEMINI_API_KEY
// ============================================================================

mod integration_tests {
    use super::*;
    use narrator_lib::synthesis::is_api_key_configured;
    use narrator_lib::GeminiBackend;

    #[tokio::test]
    async fn integration_gemini_synthesizes_preview() {
        if !is_api_key_configured() {
            eprintln!("Skipping: GEMINI_API_KEY not set");
            return;
        }

        let project = Project::new(
            "integration",
            Arc::new(GeminiBackend::default()),
            NarratorSettings::default(),
        );
        let clip = project
            .preview_voice(Voice::Zephyr)
            .await
            .expect("preview should succeed with a valid key");

        assert!(clip.duration_secs() > 0.2);
        assert_eq!(clip.pcm().len() % 2, 0);
    }
}
