//! Progress reporting and cancellation behavior of the pipeline.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use burstgif::{
    BurstError, BurstPipeline, CancellationToken, CaptureTimeProvider, OperationType,
    PipelineOptions, ProgressCallback, ProgressInfo,
};
use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use image::{DynamicImage, RgbImage};

struct BasenameTimes(HashMap<String, NaiveDateTime>);

impl CaptureTimeProvider for BasenameTimes {
    fn capture_time(&self, path: &Path) -> Result<NaiveDateTime, BurstError> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        self.0
            .get(name)
            .copied()
            .ok_or_else(|| BurstError::MetadataUnavailable {
                path: path.to_path_buf(),
                reason: "no scripted timestamp".into(),
            })
    }
}

/// Records every progress snapshot it receives.
#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<ProgressInfo>>,
}

impl ProgressCallback for Recorder {
    fn on_progress(&self, info: &ProgressInfo) {
        self.events.lock().unwrap().push(info.clone());
    }
}

/// Twelve PNG frames one second apart, enough for a trailing sequence.
fn small_burst(raws: &Path) -> Arc<BasenameTimes> {
    let base = NaiveDate::from_ymd_opt(2023, 4, 1)
        .unwrap()
        .and_hms_opt(9, 0, 0)
        .unwrap();
    let mut times = HashMap::new();
    for i in 0..12 {
        let name = format!("img_{i:03}.png");
        DynamicImage::ImageRgb8(RgbImage::from_pixel(16, 16, image::Rgb([90, 20, 20])))
            .save(raws.join(&name))
            .unwrap();
        times.insert(name, base + TimeDelta::seconds(i));
        std::thread::sleep(std::time::Duration::from_millis(5));
    }
    Arc::new(BasenameTimes(times))
}

#[test]
fn progress_covers_every_pipeline_stage() {
    let dir = tempfile::tempdir().unwrap();
    let raws = dir.path().join("RAWs");
    fs::create_dir(&raws).unwrap();
    let provider = small_burst(&raws);

    let recorder = Arc::new(Recorder::default());
    let report = BurstPipeline::new(&raws, dir.path())
        .with_options(
            PipelineOptions::new()
                .with_extensions(&["png"])
                .with_max_dimension(16)
                .with_worker_threads(2)
                .with_provider(provider)
                .with_progress(recorder.clone()),
        )
        .run()
        .unwrap();
    assert_eq!(report.sequences_completed, 1);

    let events = recorder.events.lock().unwrap();
    let seen = |op: OperationType| events.iter().any(|e| e.operation == op);
    assert!(seen(OperationType::Segmentation));
    assert!(seen(OperationType::Materialization));
    assert!(seen(OperationType::Downsampling));

    // Sequence-scoped stages report which sequence they belong to, and at
    // least some snapshots name the file in flight.
    assert!(
        events
            .iter()
            .filter(|e| e.operation == OperationType::Materialization)
            .all(|e| e.sequence == Some(1))
    );
    assert!(
        events
            .iter()
            .any(|e| e.operation == OperationType::Materialization && e.current_file.is_some())
    );

    // Totals and counters are consistent within each operation.
    for event in events.iter() {
        if let Some(total) = event.total {
            assert!(event.current <= total, "{event:?}");
        }
    }
}

#[test]
fn pre_cancelled_token_stops_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let raws = dir.path().join("RAWs");
    fs::create_dir(&raws).unwrap();
    let provider = small_burst(&raws);

    let token = CancellationToken::new();
    token.cancel();

    let err = BurstPipeline::new(&raws, dir.path())
        .with_options(
            PipelineOptions::new()
                .with_extensions(&["png"])
                .with_provider(provider)
                .with_cancellation(token),
        )
        .run()
        .unwrap_err();

    assert!(matches!(err, BurstError::Cancelled));
    // No sequence output was produced.
    assert!(
        fs::read_dir(dir.path().join("GIFs").join("FINISHED_GIFs"))
            .map(|mut d| d.next().is_none())
            .unwrap_or(true)
    );
}

#[test]
fn cancelling_mid_segmentation_stops_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let raws = dir.path().join("RAWs");
    fs::create_dir(&raws).unwrap();
    let provider = small_burst(&raws);

    // Cancel as soon as the first segmentation snapshot arrives.
    struct CancelOnFirst(CancellationToken);
    impl ProgressCallback for CancelOnFirst {
        fn on_progress(&self, info: &ProgressInfo) {
            if info.operation == OperationType::Segmentation {
                self.0.cancel();
            }
        }
    }

    let token = CancellationToken::new();
    let err = BurstPipeline::new(&raws, dir.path())
        .with_options(
            PipelineOptions::new()
                .with_extensions(&["png"])
                .with_provider(provider)
                .with_progress(Arc::new(CancelOnFirst(token.clone())))
                .with_cancellation(token),
        )
        .run()
        .unwrap_err();

    assert!(matches!(err, BurstError::Cancelled));
}

#[test]
fn cloned_tokens_share_cancellation_state() {
    let token = CancellationToken::new();
    let clone = token.clone();
    assert!(!clone.is_cancelled());

    let handle = std::thread::spawn(move || clone.cancel());
    handle.join().unwrap();

    assert!(token.is_cancelled());
}
