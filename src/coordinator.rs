//! Drives render jobs through the worker pool.
//!
//! A `Coordinator` runs one job at a time to completion: it tiles the
//! image into panels, hands each panel to every worker, waits for all
//! of them to acknowledge, writes the panel to disk when the image is
//! bigger than the viewport, and finally stitches the panels together.
//! A `Session` puts a coordinator on its own thread so the caller can
//! submit, pause and abort jobs while listening for events.

use std::cell::Cell;
use std::fs;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};

use crate::bitmap::write_file_with;
use crate::buffer::{FractalCache, PixelBuffer};
use crate::color::Pixel;
use crate::config::Config;
use crate::error::{RenderError, Result};
use crate::job::{megapixels, PlotSettings, RenderKind, RenderRequest};
use crate::pool::WorkerPool;
use crate::shader::{Shader, ShaderSettings};
use crate::stitch::Stitcher;
use crate::worker::{JobControl, PanelTask, ReshadeTask};

/// Pixels given back on each failed attempt to reserve a panel buffer.
pub const SHRINK_STEP: usize = 1_000_000;

/// Attempts made to reserve a panel buffer before giving up.
pub const SHRINK_ATTEMPTS: usize = 499;

/// Where the coordinator is in a job.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum State {
    /// No job.
    Idle,
    /// Working out panel sizes.
    Tiling,
    /// Handing a panel to the workers.
    Plotting,
    /// Waiting for every worker to finish the panel.
    Waiting,
    /// A panel is complete.
    PanelDone,
    /// Joining panel files.
    Stitching,
    /// Workers are winding down after an abort.
    Aborting,
    /// The job was abandoned.
    Aborted,
}

/// Progress reports.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Progress {
    /// Share of columns done, 0 to 100.
    Percent(u32),
    /// All panels are done and being joined.
    Stitching,
    /// An abort was requested.
    Aborting,
    /// The job stopped early and its panels are gone.
    Aborted,
    /// The job is complete.
    Finished,
}

/// How much a log message matters.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Severity {
    /// Routine.
    Info,
    /// Something went wrong but the job goes on.
    Warning,
    /// The job failed.
    Error,
}

/// How a job ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The image is complete.
    Finished,
    /// The user aborted the job.
    Aborted,
    /// The viewport was recolored.
    Reshaded,
    /// The job failed; the message says why.
    Failed(String),
}

/// Everything the core tells the user interface.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// The job moved along.
    Progress(Progress),
    /// The job is over.  Sent exactly once per accepted request.
    Completion(Outcome),
    /// A message for the user.
    Log(Severity, String),
}

/// Runs jobs on a pool of workers, one at a time.
pub struct Coordinator {
    config: Config,
    pool: WorkerPool,
    control: Arc<JobControl>,
    shader: Arc<Shader>,
    viewport: Arc<PixelBuffer>,
    cache: Option<Arc<FractalCache>>,
    panel: Option<Arc<PixelBuffer>>,
    events: Sender<Event>,
    percent: Cell<Option<u32>>,
    state: State,
}

impl Coordinator {
    /// Starts the worker pool and allocates the viewport.  Events are
    /// sent to `events`; nobody has to be listening.  The viewport's
    /// raw samples are reserved by the first viewport render.
    pub fn new(config: Config, shader: ShaderSettings, events: Sender<Event>) -> Result<Coordinator> {
        config.validate()?;
        let pool = WorkerPool::new(config.threads)?;
        let pixels = config.viewport_size * config.viewport_size;
        let viewport = PixelBuffer::try_new(pixels).ok_or(RenderError::OutOfMemory { pixels })?;
        Ok(Coordinator {
            pool,
            control: Arc::new(JobControl::new()),
            shader: Arc::new(Shader::new(shader)),
            viewport: Arc::new(viewport),
            cache: None,
            panel: None,
            events,
            percent: Cell::new(None),
            state: State::Idle,
            config,
        })
    }

    /// The abort flag, pause gate and progress counter of the current job.
    pub fn control(&self) -> Arc<JobControl> {
        self.control.clone()
    }

    /// Where the coordinator is in the current job.
    pub fn state(&self) -> State {
        self.state
    }

    /// The settings in force.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The shader used for the next job.
    pub fn shader(&self) -> &Shader {
        &self.shader
    }

    /// Changes the shader for later jobs without touching the viewport.
    pub fn set_shader(&mut self, settings: ShaderSettings) {
        self.shader = Arc::new(self.shader.reconfigured(settings));
    }

    /// The viewport buffer, shared with the workers.
    pub fn viewport(&self) -> Arc<PixelBuffer> {
        self.viewport.clone()
    }

    /// A copy of the viewport, top row first.
    pub fn viewport_pixels(&self) -> Vec<Pixel> {
        let size = self.config.viewport_size;
        self.viewport.snapshot(size * size)
    }

    /// Runs `request` to the end.  An abort is an `Ok` outcome;
    /// failures come back as errors after the panels are cleaned up.
    pub fn render(&mut self, request: &RenderRequest) -> Result<Outcome> {
        self.control.reset();
        self.execute(request)
    }

    // Runs a job without resetting the control state, so an abort
    // issued between submission and start is honored.
    fn execute(&mut self, request: &RenderRequest) -> Result<Outcome> {
        self.percent.set(None);
        let result = match request.kind {
            RenderKind::Viewport => self.plot_viewport(request),
            RenderKind::Full { width } => self.plot_full(request, width),
        };
        let outcome = match result {
            Ok(()) => {
                self.report_percent(100);
                self.emit(Progress::Finished);
                Ok(Outcome::Finished)
            }
            Err(RenderError::Aborted) => {
                self.state = State::Aborted;
                info!("Render aborted");
                self.emit(Progress::Aborted);
                Ok(Outcome::Aborted)
            }
            Err(e) => {
                error!("Render failed: {}", e);
                self.log(Severity::Error, e.to_string());
                Err(e)
            }
        };
        self.state = State::Idle;
        outcome
    }

    /// Recolors the viewport with new shader settings, reusing the
    /// samples of the last viewport render.  Before any viewport render
    /// only the shader changes.
    pub fn reshade(&mut self, settings: ShaderSettings) -> Result<Outcome> {
        self.set_shader(settings);
        let cache = match &self.cache {
            Some(cache) => cache.clone(),
            None => {
                debug!("No viewport samples to recolor yet");
                return Ok(Outcome::Reshaded);
            }
        };
        let size = self.config.viewport_size;
        let task = ReshadeTask::new(size, size, self.shader.clone(), cache, self.viewport.clone());
        let failures = self.pool.run(Arc::new(task), self.config.viewport_poll, || ());
        if failures > 0 {
            return Err(RenderError::WorkerFailed { failures });
        }
        debug!("Reshaded the viewport with {:?}", settings.scheme);
        Ok(Outcome::Reshaded)
    }

    fn plot_viewport(&mut self, request: &RenderRequest) -> Result<()> {
        self.state = State::Tiling;
        let mut settings = PlotSettings::viewport(request, self.config.viewport_size);
        let target = self.viewport.clone();
        let cache = Some(self.viewport_cache()?);
        let poll = self.config.viewport_poll;
        self.plot_panels(&mut settings, &target, cache, poll, None)
    }

    fn plot_full(&mut self, request: &RenderRequest, width: usize) -> Result<()> {
        self.state = State::Tiling;
        let mut settings = PlotSettings::full(request, width, self.config.panel_capacity)?;
        let wanted = settings
            .rows
            .saturating_mul((settings.columns + 3) & !3)
            .min(self.config.panel_capacity);
        let target = self.reserve_panel(wanted, settings.rows)?;
        if target.capacity() < wanted {
            settings = PlotSettings::full(request, width, target.capacity())?;
        }

        fs::create_dir_all(&self.config.output_dir)?;
        let message = format!(
            "Rendering {}x{} ({}) in {} panel(s)",
            settings.columns,
            settings.rows,
            megapixels(settings.rows, settings.columns),
            settings.panel_count()
        );
        info!("{}", message);
        self.log(Severity::Info, message);

        let mut stitcher = Stitcher::new();
        let poll = self.config.render_poll;
        self.plot_panels(&mut settings, &target, None, poll, Some(&mut stitcher))?;

        self.state = State::Stitching;
        self.emit(Progress::Stitching);
        let output = self.config.render_path();
        stitcher.stitch(&output)?;
        info!("Wrote {}", output.display());
        Ok(())
    }

    fn plot_panels(
        &mut self,
        settings: &mut PlotSettings,
        target: &Arc<PixelBuffer>,
        cache: Option<Arc<FractalCache>>,
        poll: Duration,
        mut panels: Option<&mut Stitcher>,
    ) -> Result<()> {
        let count = settings.panel_count();
        for n in 0..count {
            settings.start_panel(n);
            debug!(
                "Panel {} of {}: {} columns from column {}",
                n + 1,
                count,
                settings.cols_this_panel,
                settings.first_column()
            );

            self.state = State::Plotting;
            let task = PanelTask::new(
                settings.clone(),
                self.shader.clone(),
                target.clone(),
                cache.clone(),
                self.control.clone(),
            );
            self.pool.broadcast(Arc::new(task));

            self.state = State::Waiting;
            let failures = self.wait_for_workers(settings.columns, poll);
            self.state = State::PanelDone;

            if self.control.aborted() {
                self.state = State::Aborting;
                return Err(RenderError::Aborted);
            }
            if failures > 0 {
                return Err(RenderError::WorkerFailed { failures });
            }

            if let Some(stitcher) = panels.as_deref_mut() {
                let path = self.config.panel_path(n + 1);
                stitcher.add_file(&path);
                let cols = settings.cols_this_panel;
                write_file_with(&path, cols, settings.rows, |x, y| target.get(y * cols + x))?;
                debug!("Wrote {}", path.display());
            }
        }
        Ok(())
    }

    fn wait_for_workers(&self, total: usize, poll: Duration) -> usize {
        let control = &self.control;
        self.pool.wait(poll, || {
            self.report_percent((control.completed() * 100 / total.max(1)) as u32)
        })
    }

    // Only changes are reported.
    fn report_percent(&self, percent: u32) {
        if self.percent.replace(Some(percent)) != Some(percent) {
            self.emit(Progress::Percent(percent));
        }
    }

    fn viewport_cache(&mut self) -> Result<Arc<FractalCache>> {
        if let Some(cache) = &self.cache {
            return Ok(cache.clone());
        }
        let pixels = self.config.viewport_size * self.config.viewport_size;
        let cache = FractalCache::try_new(pixels).ok_or(RenderError::OutOfMemory { pixels })?;
        let cache = Arc::new(cache);
        self.cache = Some(cache.clone());
        Ok(cache)
    }

    // Keeps the panel buffer between jobs; only a bigger request
    // replaces it.  Allocation failures shrink the request.
    fn reserve_panel(&mut self, wanted: usize, rows: usize) -> Result<Arc<PixelBuffer>> {
        if let Some(panel) = &self.panel {
            if panel.capacity() >= wanted {
                return Ok(panel.clone());
            }
        }
        self.panel = None;

        let mut capacity = wanted;
        for attempt in 0..SHRINK_ATTEMPTS {
            if let Some(buffer) = PixelBuffer::try_new(capacity) {
                if attempt > 0 {
                    let message = format!("Panel buffer reduced to {} pixels", capacity);
                    warn!("{}", message);
                    self.log(Severity::Warning, message);
                }
                let buffer = Arc::new(buffer);
                self.panel = Some(buffer.clone());
                return Ok(buffer);
            }
            if capacity <= SHRINK_STEP {
                break;
            }
            capacity -= SHRINK_STEP;
        }
        Err(RenderError::TooLarge { rows, capacity: 0 })
    }

    fn emit(&self, progress: Progress) {
        let _ = self.events.send(Event::Progress(progress));
    }

    fn log(&self, severity: Severity, message: String) {
        let _ = self.events.send(Event::Log(severity, message));
    }
}

enum Request {
    Render(RenderRequest),
    Reshade(ShaderSettings),
    Exit,
}

/// A coordinator on its own thread.  Requests return at once; the
/// outcome arrives later as an `Event::Completion`.
pub struct Session {
    config: Config,
    requests: Sender<Request>,
    events: Receiver<Event>,
    notify: Sender<Event>,
    control: Arc<JobControl>,
    viewport: Arc<PixelBuffer>,
    busy: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Session {
    /// Starts the workers and the coordinator thread.
    pub fn new(config: Config, shader: ShaderSettings) -> Result<Session> {
        let (notify, events) = channel::unbounded();
        let coordinator = Coordinator::new(config.clone(), shader, notify.clone())?;
        let control = coordinator.control();
        let viewport = coordinator.viewport();
        let busy = Arc::new(AtomicBool::new(false));
        let running = Arc::new(AtomicBool::new(true));
        let (requests, inbox) = channel::unbounded();

        let handle = {
            let notify = notify.clone();
            let running = Running {
                busy: busy.clone(),
                running: running.clone(),
            };
            thread::Builder::new()
                .name("fracgen-coordinator".to_string())
                .spawn(move || session_loop(coordinator, inbox, notify, running))?
        };

        Ok(Session {
            config,
            requests,
            events,
            notify,
            control,
            viewport,
            busy,
            running,
            handle: Some(handle),
        })
    }

    /// The settings the session was started with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Submits a render.  Size problems are reported here, before any
    /// work starts; `Busy` means another job is still running.
    pub fn start_render(&self, request: RenderRequest) -> Result<()> {
        if let RenderKind::Full { width } = request.kind {
            PlotSettings::full(&request, width, self.config.panel_capacity)?;
        }
        self.claim()?;
        self.control.reset();
        self.submit(Request::Render(request))
    }

    /// Recolors the viewport from its cached samples.
    pub fn reshade(&self, settings: ShaderSettings) -> Result<()> {
        self.claim()?;
        self.submit(Request::Reshade(settings))
    }

    /// Asks the running job to stop.  Does nothing when idle.
    pub fn request_abort(&self) {
        if !self.is_busy() {
            return;
        }
        self.control.request_abort();
        // A paused session must not hold the next job.
        self.control.gate.resume(None);
        let _ = self.notify.send(Event::Progress(Progress::Aborting));
    }

    /// Holds workers before they claim their next column.
    pub fn pause(&self) {
        self.control.gate.pause();
    }

    /// Lets paused workers go on; `reason` is handed to them.
    pub fn resume(&self, reason: Option<u32>) {
        self.control.gate.resume(reason);
    }

    /// True while workers are held.
    pub fn is_paused(&self) -> bool {
        self.control.gate.is_paused()
    }

    /// True from submission until the completion event is sent.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// The event stream.
    pub fn events(&self) -> &Receiver<Event> {
        &self.events
    }

    /// Blocks until the next completion, passing every other event to
    /// `observe`.  Only call this after a request was accepted.  If the
    /// coordinator thread is gone the outcome is `Failed`.
    pub fn wait_with<F: FnMut(&Event)>(&self, mut observe: F) -> Outcome {
        loop {
            match self.events.recv_timeout(self.config.viewport_poll) {
                Ok(Event::Completion(outcome)) => return outcome,
                Ok(other) => observe(&other),
                Err(RecvTimeoutError::Timeout) => {
                    if !self.running.load(Ordering::SeqCst) && self.events.is_empty() {
                        break;
                    }
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        Outcome::Failed("The coordinator has stopped".to_string())
    }

    /// Blocks until the next completion, discarding other events.
    pub fn wait(&self) -> Outcome {
        self.wait_with(|_| ())
    }

    /// A copy of the viewport, top row first.
    pub fn viewport(&self) -> Vec<Pixel> {
        let size = self.config.viewport_size;
        self.viewport.snapshot(size * size)
    }

    fn claim(&self) -> Result<()> {
        self.busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| ())
            .map_err(|_| RenderError::Busy)
    }

    fn submit(&self, request: Request) -> Result<()> {
        self.requests.send(request).map_err(|_| {
            self.busy.store(false, Ordering::SeqCst);
            RenderError::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "The coordinator has stopped",
            ))
        })
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.control.request_abort();
        let _ = self.requests.send(Request::Exit);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

// Marks the session idle and stopped when the coordinator thread ends,
// however it ends.
struct Running {
    busy: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
}

impl Drop for Running {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        self.busy.store(false, Ordering::SeqCst);
    }
}

fn session_loop(
    mut coordinator: Coordinator,
    inbox: Receiver<Request>,
    notify: Sender<Event>,
    running: Running,
) {
    while let Ok(request) = inbox.recv() {
        let outcome = match request {
            Request::Render(request) => guarded(&notify, || coordinator.execute(&request)),
            Request::Reshade(settings) => guarded(&notify, || coordinator.reshade(settings)),
            Request::Exit => break,
        };
        coordinator.state = State::Idle;
        running.busy.store(false, Ordering::SeqCst);
        let _ = notify.send(Event::Completion(outcome));
    }
}

// Runs one job, turning errors and panics into a failed outcome so the
// session always gets its completion.
fn guarded<F: FnOnce() -> Result<Outcome>>(notify: &Sender<Event>, job: F) -> Outcome {
    match panic::catch_unwind(AssertUnwindSafe(job)) {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(e)) => Outcome::Failed(e.to_string()),
        Err(_) => {
            let message = "The coordinator panicked while running a job".to_string();
            error!("{}", message);
            let _ = notify.send(Event::Log(Severity::Error, message.clone()));
            Outcome::Failed(message)
        }
    }
}
