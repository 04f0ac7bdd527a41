// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// OCR collaborator seam.
//
// The pipeline only ever talks to a `TextRecognizer`. Engines plug in behind it;
// `DeadlineRecognizer` bounds every call so a hung engine costs one candidate,
// not the scan, and never more than one worker thread.
//
// # Feature Gate
//
// The `ocrs`-backed engine is only available with the `ocr` feature:
//
// ```toml
// cardscan-detect = { path = "crates/cardscan-detect", features = ["ocr"] }
// ```

#[cfg(feature = "ocr")]
pub mod ocrs_engine;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, mpsc};
use std::time::{Duration, Instant};

use cardscan_core::{OcrError, RecognitionStrategy};
use image::GrayImage;
use tracing::{debug, warn};

/// Recognizes text in a binarized region under one strategy.
///
/// Implementations must be shareable across concurrent scans. An engine that
/// cannot run concurrently serializes internally.
pub trait TextRecognizer: Send + Sync {
    fn recognize(
        &self,
        region: &GrayImage,
        strategy: &RecognitionStrategy,
    ) -> Result<String, OcrError>;
}

impl<T: TextRecognizer + ?Sized> TextRecognizer for Arc<T> {
    fn recognize(
        &self,
        region: &GrayImage,
        strategy: &RecognitionStrategy,
    ) -> Result<String, OcrError> {
        (**self).recognize(region, strategy)
    }
}

/// Stand-in used when no engine is configured. Every call fails, so scans
/// degrade to the geometric fallback.
#[derive(Debug, Clone, Default)]
pub struct UnavailableRecognizer {
    reason: String,
}

impl UnavailableRecognizer {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl TextRecognizer for UnavailableRecognizer {
    fn recognize(&self, _: &GrayImage, _: &RecognitionStrategy) -> Result<String, OcrError> {
        let reason = if self.reason.is_empty() {
            "no OCR engine configured"
        } else {
            &self.reason
        };
        Err(OcrError::Unavailable(reason.to_string()))
    }
}

/// One queued OCR call.
struct Job {
    region: GrayImage,
    strategy: RecognitionStrategy,
    deadline: Instant,
    reply: mpsc::SyncSender<Result<String, OcrError>>,
}

/// Runs calls on one long-lived worker thread and gives up on each after
/// `timeout`.
///
/// A call that overruns keeps the worker busy. Until that call returns, every
/// new call fails fast with [`OcrError::Unavailable`] instead of queueing
/// behind a hung engine, so at most one engine call is ever in flight.
pub struct DeadlineRecognizer {
    jobs: Option<mpsc::Sender<Job>>,
    /// Set by the worker while the engine is running.
    active: Arc<AtomicBool>,
    /// Set when a caller gave up on a call that may still be running.
    abandoned: AtomicBool,
    timeout: Duration,
}

impl DeadlineRecognizer {
    pub fn new(inner: Arc<dyn TextRecognizer>, timeout: Duration) -> Self {
        let (tx, rx) = mpsc::channel::<Job>();
        let active = Arc::new(AtomicBool::new(false));
        let worker_active = Arc::clone(&active);

        let spawned = std::thread::Builder::new()
            .name("cardscan-ocr".into())
            .spawn(move || {
                for job in rx {
                    // Callers behind a hung call have already given up.
                    if Instant::now() >= job.deadline {
                        continue;
                    }
                    worker_active.store(true, Ordering::SeqCst);
                    let result = inner.recognize(&job.region, &job.strategy);
                    worker_active.store(false, Ordering::SeqCst);
                    let _ = job.reply.send(result);
                }
            });

        let jobs = match spawned {
            Ok(_) => Some(tx),
            Err(err) => {
                warn!(error = %err, "Could not start OCR worker; recognition disabled");
                None
            }
        };

        Self {
            jobs,
            active,
            abandoned: AtomicBool::new(false),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// True while an abandoned call is still occupying the engine.
    fn engine_stalled(&self) -> bool {
        if !self.abandoned.load(Ordering::SeqCst) {
            return false;
        }
        if self.active.load(Ordering::SeqCst) {
            return true;
        }
        self.abandoned.store(false, Ordering::SeqCst);
        false
    }
}

impl TextRecognizer for DeadlineRecognizer {
    fn recognize(
        &self,
        region: &GrayImage,
        strategy: &RecognitionStrategy,
    ) -> Result<String, OcrError> {
        let Some(jobs) = &self.jobs else {
            return Err(OcrError::Unavailable("OCR worker is not running".into()));
        };
        if self.engine_stalled() {
            debug!(strategy = strategy.name(), "OCR engine still busy with an abandoned call");
            return Err(OcrError::Unavailable(
                "OCR engine is still busy with a timed-out call".into(),
            ));
        }

        let (reply, rx) = mpsc::sync_channel(1);
        let job = Job {
            region: region.clone(),
            strategy: strategy.clone(),
            deadline: Instant::now() + self.timeout,
            reply,
        };
        jobs.send(job)
            .map_err(|_| OcrError::Unavailable("OCR worker has stopped".into()))?;

        match rx.recv_timeout(self.timeout) {
            Ok(result) => {
                debug!(strategy = strategy.name(), ok = result.is_ok(), "OCR call finished");
                result
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                self.abandoned.store(true, Ordering::SeqCst);
                warn!(
                    strategy = strategy.name(),
                    timeout_ms = self.timeout.as_millis() as u64,
                    "OCR call exceeded deadline"
                );
                Err(OcrError::Timeout(self.timeout))
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(OcrError::Engine(
                "OCR worker exited without a result".into(),
            )),
        }
    }
}
