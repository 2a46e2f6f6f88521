#![deny(missing_docs)]
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Fracgen: a panel-tiled escape-time fractal renderer
//!
//! The Mandelbrot set (and its Julia cousins) are drawn by taking a
//! point on the complex plane, repeatedly squaring it and adding a
//! constant, and counting how many steps it takes for the result to
//! run away to infinity.  That count, together with how far past the
//! escape radius the point landed, is turned into a color.
//!
//! Every pixel is independent, so the work is spread over a fixed pool
//! of worker threads that claim one column at a time.  Images larger
//! than memory are cut into vertical panels sized to a bounded working
//! buffer; each panel is written out as a 24-bit bitmap and the panels
//! are finally stitched side by side into one file, a row at a time.
//!
//! The pieces, from the leaves up:
//!
//! * `escape`: the iterators themselves.
//! * `spline`, `color` and `shader`: turning samples into colors.
//! * `bitmap` and `stitch`: the file format and panel joining.
//! * `job`, `buffer`, `gate`, `pool` and `worker`: describing a job
//!   and running it on many threads.
//! * `coordinator`: the state machine that drives a job from tiling to
//!   stitching, and the `Session` that runs it in the background.

#[macro_use]
extern crate log;
extern crate crossbeam;
extern crate failure;
extern crate itertools;
extern crate num;
extern crate num_cpus;

pub mod bitmap;
pub mod buffer;
pub mod color;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod escape;
pub mod gate;
pub mod job;
pub mod planes;
pub mod pool;
pub mod shader;
pub mod spline;
pub mod stitch;
pub mod worker;

pub use crate::color::Pixel;
pub use crate::config::Config;
pub use crate::coordinator::{Coordinator, Event, Outcome, Progress, Session, Severity, State};
pub use crate::error::{RenderError, Result};
pub use crate::escape::{EscapeSample, Fractal, FractalValue};
pub use crate::job::{Oversample, PlotSettings, RenderKind, RenderRequest};
pub use crate::planes::{CoordStack, Coordinate};
pub use crate::shader::{Scheme, Shader, ShaderSettings};
pub use crate::stitch::Stitcher;
