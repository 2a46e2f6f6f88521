//! The two things a compute worker does.
//!
//! `PanelTask` fills a panel: workers claim one column at a time from a
//! shared range, iterate and shade every row of it, and loop until the
//! range is exhausted or the job is aborted.  `ReshadeTask` recolors
//! the viewport from cached samples; each worker takes a fixed block
//! of rows.

use std::ops::Range;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::buffer::{FractalCache, PixelBuffer};
use crate::escape::FractalValue;
use crate::gate::Gate;
use crate::job::PlotSettings;
use crate::pool::Task;
use crate::shader::Shader;

/// State shared between the coordinator and every worker of a job.
#[derive(Debug, Default)]
pub struct JobControl {
    /// Set to make workers stop at the next row.
    pub abort: AtomicBool,
    /// Closed while the user has paused the job.
    pub gate: Gate,
    /// Columns finished across all panels of the job.
    pub columns_completed: AtomicUsize,
}

impl JobControl {
    /// Fresh control state.
    pub fn new() -> JobControl {
        JobControl::default()
    }

    /// Prepares for a new job: clears the abort flag and the column
    /// count.  A closed gate stays closed.
    pub fn reset(&self) {
        self.abort.store(false, Ordering::SeqCst);
        self.columns_completed.store(0, Ordering::SeqCst);
    }

    /// Tells workers to stop, waking any that are paused.
    pub fn request_abort(&self) {
        self.abort.store(true, Ordering::SeqCst);
        self.gate.release();
    }

    /// True once an abort has been requested.
    pub fn aborted(&self) -> bool {
        self.abort.load(Ordering::SeqCst)
    }

    /// Columns finished so far.
    pub fn completed(&self) -> usize {
        self.columns_completed.load(Ordering::SeqCst)
    }
}

/// Fills the current panel of a job.
pub struct PanelTask {
    settings: PlotSettings,
    imag: Vec<f64>,
    offsets: Vec<(f64, f64)>,
    columns: Mutex<Range<usize>>,
    shader: Arc<Shader>,
    target: Arc<PixelBuffer>,
    cache: Option<Arc<FractalCache>>,
    control: Arc<JobControl>,
}

impl PanelTask {
    /// A task for the panel `settings` currently describes.  Pass a
    /// cache when the target is the viewport.
    pub fn new(
        settings: PlotSettings,
        shader: Arc<Shader>,
        target: Arc<PixelBuffer>,
        cache: Option<Arc<FractalCache>>,
        control: Arc<JobControl>,
    ) -> PanelTask {
        PanelTask {
            imag: settings.imaginary_rows(),
            offsets: settings.oversample.offsets(settings.pixel_size),
            columns: Mutex::new(0..settings.cols_this_panel),
            settings,
            shader,
            target,
            cache,
            control,
        }
    }

    /// Hands out the next unclaimed column, if any are left.
    pub fn claim(&self) -> Option<usize> {
        self.columns.lock().unwrap_or_else(|e| e.into_inner()).next()
    }

    fn sample(&self, real: f64, imag: f64) -> FractalValue {
        let s = &self.settings;
        let mut value = FractalValue::default();
        for (slot, (dr, di)) in value.samples.iter_mut().zip(self.offsets.iter()) {
            *slot = s.fractal.iterate(real + dr, imag + di, s.dwell);
        }
        value.count = self.offsets.len() as u8;
        value
    }

    // Returns false if the column was abandoned because of an abort.
    fn plot_column(&self, col: usize, values: &mut Vec<FractalValue>) -> bool {
        let stride = self.settings.cols_this_panel;
        let real = self.settings.column_real(col);
        values.clear();
        for (row, &imag) in self.imag.iter().enumerate() {
            if self.control.aborted() {
                return false;
            }
            let value = self.sample(real, imag);
            self.target.set(row * stride + col, self.shader.color(&value));
            if self.cache.is_some() {
                values.push(value);
            }
        }
        if let Some(cache) = &self.cache {
            cache.store_column(col, stride, values);
        }
        true
    }
}

impl Task for PanelTask {
    fn run(&self, worker: usize, _workers: usize) {
        let mut values = Vec::with_capacity(self.settings.rows);
        loop {
            if self.control.aborted() {
                break;
            }
            if let Some(reason) = self.control.gate.wait(&self.control.abort) {
                debug!("Worker {} resumed (reason {})", worker, reason);
            }
            if self.control.aborted() {
                break;
            }
            let col = match self.claim() {
                Some(col) => col,
                None => break,
            };
            if !self.plot_column(col, &mut values) {
                break;
            }
            self.control.columns_completed.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Recolors the viewport from its cached samples.
pub struct ReshadeTask {
    rows: usize,
    columns: usize,
    shader: Arc<Shader>,
    cache: Arc<FractalCache>,
    target: Arc<PixelBuffer>,
}

impl ReshadeTask {
    /// A task recoloring a `rows` x `columns` viewport.
    pub fn new(
        rows: usize,
        columns: usize,
        shader: Arc<Shader>,
        cache: Arc<FractalCache>,
        target: Arc<PixelBuffer>,
    ) -> ReshadeTask {
        ReshadeTask {
            rows,
            columns,
            shader,
            cache,
            target,
        }
    }
}

/// The block of rows worker `worker` of `workers` owns.  The last
/// worker also takes the remainder.
pub fn row_slice(rows: usize, worker: usize, workers: usize) -> Range<usize> {
    let per = rows / workers;
    let start = worker * per;
    if worker + 1 == workers {
        start..rows
    } else {
        start..start + per
    }
}

impl Task for ReshadeTask {
    fn run(&self, worker: usize, workers: usize) {
        let rows = row_slice(self.rows, worker, workers);
        let values = self.cache.read();
        let span = rows.start * self.columns..rows.end * self.columns;
        for index in span {
            self.target.set(index, self.shader.color(&values[index]));
        }
    }
}
