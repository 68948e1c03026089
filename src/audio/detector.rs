//! Voice activity detector engines.
//!
//! Two interchangeable implementations behind one interface: a dedicated
//! worker thread fed over a bounded channel (preferred, keeps analysis off
//! the capture thread) and an in-thread callback variant. A factory attempts
//! the worker and silently falls back to the callback variant when
//! construction fails; both expose identical feed/update/stop semantics and
//! identical event timing (milliseconds since detector start).

use crate::audio::vad::{Vad, VadParams, VadTransition};
use crate::error::{KaigiError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

/// Transition callbacks, invoked on whichever thread runs the analysis.
#[derive(Default)]
pub struct VadHandlers {
    on_speech_start: Option<Box<dyn Fn(u64) + Send + Sync>>,
    on_speech_end: Option<Box<dyn Fn(u64) + Send + Sync>>,
}

impl VadHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_speech_start(mut self, f: impl Fn(u64) + Send + Sync + 'static) -> Self {
        self.on_speech_start = Some(Box::new(f));
        self
    }

    pub fn on_speech_end(mut self, f: impl Fn(u64) + Send + Sync + 'static) -> Self {
        self.on_speech_end = Some(Box::new(f));
        self
    }

    fn dispatch(&self, transition: VadTransition) {
        match transition {
            VadTransition::SpeechStart { at_ms } => {
                if let Some(f) = &self.on_speech_start {
                    f(at_ms);
                }
            }
            VadTransition::SpeechEnd { at_ms } => {
                if let Some(f) = &self.on_speech_end {
                    f(at_ms);
                }
            }
        }
    }
}

/// Common interface over the detector variants.
pub trait VadEngine: Send + Sync {
    /// Feeds a batch of mono samples.
    fn feed(&self, samples: &[f32]);

    /// Updates parameters live, without resetting detector state.
    fn update(&self, params: VadParams);

    /// Tears the engine down. Never fails; repeated calls are no-ops.
    fn stop(&self);
}

/// Synchronous variant: analysis runs on whatever thread calls `feed`.
pub struct CallbackVad {
    inner: Mutex<Vad>,
    handlers: Arc<VadHandlers>,
    stopped: AtomicBool,
}

impl CallbackVad {
    pub fn new(params: VadParams, frame_size: usize, handlers: Arc<VadHandlers>) -> Self {
        Self {
            inner: Mutex::new(Vad::new(params, frame_size)),
            handlers,
            stopped: AtomicBool::new(false),
        }
    }
}

impl VadEngine for CallbackVad {
    fn feed(&self, samples: &[f32]) {
        if self.stopped.load(Ordering::SeqCst) {
            return;
        }
        let transitions = match self.inner.lock() {
            Ok(mut vad) => vad.push(samples),
            Err(_) => return,
        };
        for t in transitions {
            self.handlers.dispatch(t);
        }
    }

    fn update(&self, params: VadParams) {
        if let Ok(mut vad) = self.inner.lock() {
            vad.set_params(params);
        }
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

enum WorkerMsg {
    Samples(Vec<f32>),
    Update(VadParams),
    Stop,
}

/// Worker variant: frames cross a bounded channel to a dedicated thread.
///
/// `feed` never blocks; when the worker falls behind, frames are dropped
/// rather than stalling the capture loop.
pub struct WorkerVad {
    tx: crossbeam_channel::Sender<WorkerMsg>,
    thread: Mutex<Option<JoinHandle<()>>>,
    stopped: AtomicBool,
}

impl WorkerVad {
    pub fn spawn(
        params: VadParams,
        frame_size: usize,
        handlers: Arc<VadHandlers>,
    ) -> Result<Self> {
        let (tx, rx) = crossbeam_channel::bounded::<WorkerMsg>(64);

        let thread = std::thread::Builder::new()
            .name("kaigi-vad".to_string())
            .spawn(move || {
                let mut vad = Vad::new(params, frame_size);
                while let Ok(msg) = rx.recv() {
                    match msg {
                        WorkerMsg::Samples(samples) => {
                            for t in vad.push(&samples) {
                                handlers.dispatch(t);
                            }
                        }
                        WorkerMsg::Update(p) => vad.set_params(p),
                        WorkerMsg::Stop => break,
                    }
                }
            })
            .map_err(|e| KaigiError::AudioCapture {
                message: format!("Failed to spawn VAD worker: {}", e),
            })?;

        Ok(Self {
            tx,
            thread: Mutex::new(Some(thread)),
            stopped: AtomicBool::new(false),
        })
    }
}

impl VadEngine for WorkerVad {
    fn feed(&self, samples: &[f32]) {
        if self.stopped.load(Ordering::SeqCst) {
            return;
        }
        if self
            .tx
            .try_send(WorkerMsg::Samples(samples.to_vec()))
            .is_err()
        {
            tracing::trace!("VAD worker behind, dropping frame batch");
        }
    }

    fn update(&self, params: VadParams) {
        let _ = self.tx.try_send(WorkerMsg::Update(params));
    }

    fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.tx.send(WorkerMsg::Stop);
        if let Ok(mut guard) = self.thread.lock() {
            if let Some(handle) = guard.take() {
                let _ = handle.join();
            }
        }
    }
}

/// Builds a detector, preferring the worker variant when requested.
///
/// Worker construction failure is logged and falls back to the callback
/// variant; the caller sees one working engine either way.
pub fn build_detector(
    prefer_worker: bool,
    params: VadParams,
    frame_size: usize,
    handlers: VadHandlers,
) -> Arc<dyn VadEngine> {
    let handlers = Arc::new(handlers);
    if prefer_worker {
        match WorkerVad::spawn(params, frame_size, handlers.clone()) {
            Ok(worker) => return Arc::new(worker),
            Err(e) => {
                tracing::warn!(error = %e, "VAD worker unavailable, using in-thread detector");
            }
        }
    }
    Arc::new(CallbackVad::new(params, frame_size, handlers))
}
