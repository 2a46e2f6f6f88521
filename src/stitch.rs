//! Joins panel files side by side into the final image.
//!
//! Panels share a height, so row `n` of every panel is row `n` of the
//! output.  The stitcher reads one row from each panel in turn, drops
//! each panel's padding, pads the joined row once and writes it out;
//! only a single output row is ever held in memory.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::bitmap::{padded_row_length, BitmapHeader};
use crate::error::{RenderError, Result};

/// The panel files of one job, in left-to-right order.  Files still
/// registered when the stitcher is dropped are deleted.
#[derive(Debug, Default)]
pub struct Stitcher {
    files: Vec<PathBuf>,
}

impl Stitcher {
    /// An empty stitcher.
    pub fn new() -> Stitcher {
        Stitcher::default()
    }

    /// Registers the next panel to the right.
    pub fn add_file<P: AsRef<Path>>(&mut self, path: P) {
        self.files.push(path.as_ref().to_path_buf());
    }

    /// The registered panels.
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Writes the joined image to `output` and deletes the panels.  On
    /// failure the panels and any partial output are deleted too.
    pub fn stitch<P: AsRef<Path>>(&mut self, output: P) -> Result<()> {
        let output = output.as_ref();
        let result = match self.files.len() {
            0 => Err(RenderError::BadDimensions(
                "There are no panels to stitch".to_string(),
            )),
            1 => self.rename(output),
            _ => self.join(output),
        };
        if result.is_err() && self.files.len() > 1 && output.exists() {
            if let Err(e) = fs::remove_file(output) {
                warn!("Could not remove {}: {}", output.display(), e);
            }
        }
        self.cleanup();
        result
    }

    /// Deletes every registered panel file.
    pub fn cleanup(&mut self) {
        for path in self.files.drain(..) {
            if path.exists() {
                if let Err(e) = fs::remove_file(&path) {
                    warn!("Could not remove {}: {}", path.display(), e);
                }
            }
        }
    }

    fn rename(&mut self, output: &Path) -> Result<()> {
        let panel = self.files[0].clone();
        if output.exists() {
            fs::remove_file(output)?;
        }
        if fs::rename(&panel, output).is_err() {
            fs::copy(&panel, output)?;
            fs::remove_file(&panel)?;
        }
        self.files.clear();
        debug!("Moved {} to {}", panel.display(), output.display());
        Ok(())
    }

    fn join(&self, output: &Path) -> Result<()> {
        let mut panels = Vec::with_capacity(self.files.len());
        for path in &self.files {
            let mut input = BufReader::new(File::open(path)?);
            let header = BitmapHeader::read_from(&mut input)?;
            panels.push((input, header));
        }

        let height = panels[0].1.height;
        if let Some((_, odd)) = panels.iter().find(|(_, h)| h.height != height) {
            return Err(RenderError::BadBitmap(format!(
                "Panels differ in height ({} and {})",
                height, odd.height
            )));
        }
        let width: usize = panels.iter().map(|(_, h)| h.width).sum();
        info!(
            "Stitching {} panels into a {}x{} image",
            panels.len(),
            width,
            height
        );

        let mut out = BufWriter::new(File::create(output)?);
        BitmapHeader::new(width, height).write_to(&mut out)?;

        let mut row = Vec::with_capacity(padded_row_length(width));
        let mut scratch = Vec::new();
        for _ in 0..height {
            row.clear();
            for (input, header) in panels.iter_mut() {
                scratch.resize(padded_row_length(header.width), 0);
                input.read_exact(&mut scratch)?;
                row.extend_from_slice(&scratch[..3 * header.width]);
            }
            row.resize(padded_row_length(width), 0);
            out.write_all(&row)?;
        }
        out.flush()?;
        Ok(())
    }
}

impl Drop for Stitcher {
    fn drop(&mut self) {
        self.cleanup();
    }
}
