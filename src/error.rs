//! The error taxonomy for the renderer.  Every failure is resolved at
//! the coordinator boundary; compute workers never produce one.

use failure::Fail;
use std::io;

/// Everything that can stop a render job from producing an image.
#[derive(Debug, Fail)]
pub enum RenderError {
    /// A single column of the requested image does not fit in the
    /// working buffer, so no panel width can be found.
    #[fail(
        display = "Image is too large to render: {} rows exceed a panel capacity of {} pixels",
        rows, capacity
    )]
    TooLarge {
        /// Rows in the requested image.
        rows: usize,
        /// Capacity of the working buffer, in pixels.
        capacity: usize,
    },

    /// A buffer could not be reserved.
    #[fail(display = "Out of memory: could not reserve {} pixels", pixels)]
    OutOfMemory {
        /// Size of the refused buffer, in pixels.
        pixels: usize,
    },

    /// The job parameters describe an image that cannot exist.
    #[fail(display = "Invalid render dimensions: {}", _0)]
    BadDimensions(String),

    /// Reading or writing a panel or the final image failed.
    #[fail(display = "I/O error: {}", _0)]
    Io(#[cause] io::Error),

    /// A file handed to the decoder or the stitcher is not a 24-bit
    /// bottom-up bitmap.
    #[fail(display = "Malformed bitmap: {}", _0)]
    BadBitmap(String),

    /// A render was requested while another one is running.
    #[fail(display = "A render is already in progress")]
    Busy,

    /// The job stopped because the user asked it to.
    #[fail(display = "Render aborted")]
    Aborted,

    /// One or more workers panicked while running a command, so the
    /// panel they were filling is incomplete.
    #[fail(display = "{} worker(s) failed while rendering", failures)]
    WorkerFailed {
        /// Number of workers that did not finish cleanly.
        failures: usize,
    },
}

impl From<io::Error> for RenderError {
    fn from(err: io::Error) -> Self {
        RenderError::Io(err)
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, RenderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn too_large_names_both_sizes() {
        let err = RenderError::TooLarge {
            rows: 9000,
            capacity: 4000,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("9000"));
        assert!(msg.contains("4000"));
    }

    #[test]
    fn io_errors_convert_with_question_mark() {
        fn fails() -> Result<()> {
            Err(io::Error::new(io::ErrorKind::NotFound, "gone"))?;
            Ok(())
        }
        match fails() {
            Err(RenderError::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::NotFound),
            other => panic!("unexpected {:?}", other),
        }
    }
}
