//! The 24-bit bitmap format used for panels and the final image.
//!
//! A file is a 54 byte header (14 byte file header, 40 byte info
//! header) followed by the rows of the image, bottom row first.  Each
//! row is `width` blue/green/red triples padded with zeros to a
//! multiple of four bytes.  Pixel buffers in memory are top row first.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::color::Pixel;
use crate::error::{RenderError, Result};

/// Size of the file and info headers together.
pub const HEADER_SIZE: usize = 54;

/// Size of the info header alone.
pub const INFO_HEADER_SIZE: u32 = 40;

/// Zero bytes needed after `width` pixels to reach a four byte boundary.
pub fn row_padding(width: usize) -> usize {
    (4 - (3 * width) % 4) % 4
}

/// Bytes one row of `width` pixels occupies in a file.
pub fn padded_row_length(width: usize) -> usize {
    3 * width + row_padding(width)
}

/// The parts of the header that vary between files.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BitmapHeader {
    /// Pixels per row.
    pub width: usize,
    /// Number of rows.
    pub height: usize,
    /// Offset of the first pixel row from the start of the file.
    pub pixel_offset: usize,
}

impl BitmapHeader {
    /// A header for an image of the given size.
    pub fn new(width: usize, height: usize) -> BitmapHeader {
        BitmapHeader {
            width,
            height,
            pixel_offset: HEADER_SIZE,
        }
    }

    /// Size of the whole file this header describes.
    pub fn file_size(&self) -> usize {
        self.pixel_offset + padded_row_length(self.width) * self.height
    }

    /// Serializes the header.
    pub fn to_bytes(&self) -> Result<[u8; HEADER_SIZE]> {
        let narrow = |v: usize, what: &str| {
            if v > i32::max_value() as usize {
                Err(RenderError::BadDimensions(format!(
                    "{} of {} does not fit in a bitmap header",
                    what, v
                )))
            } else {
                Ok(v as u32)
            }
        };
        let total = narrow(self.file_size(), "file size")?;
        let width = narrow(self.width, "width")?;
        let height = narrow(self.height, "height")?;

        let mut hdr = [0u8; HEADER_SIZE];
        hdr[0] = b'B';
        hdr[1] = b'M';
        hdr[2..6].copy_from_slice(&total.to_le_bytes());
        // 6..10 reserved
        hdr[10..14].copy_from_slice(&(self.pixel_offset as u32).to_le_bytes());
        hdr[14..18].copy_from_slice(&INFO_HEADER_SIZE.to_le_bytes());
        hdr[18..22].copy_from_slice(&width.to_le_bytes());
        hdr[22..26].copy_from_slice(&height.to_le_bytes());
        hdr[26..28].copy_from_slice(&1u16.to_le_bytes());
        hdr[28..30].copy_from_slice(&24u16.to_le_bytes());
        // 30..54: no compression, default resolution and palette
        Ok(hdr)
    }

    /// Writes the header.
    pub fn write_to<W: Write>(&self, out: &mut W) -> Result<()> {
        out.write_all(&self.to_bytes()?)?;
        Ok(())
    }

    /// Reads and validates a header, leaving the reader at the first
    /// pixel row.
    pub fn read_from<R: Read>(input: &mut R) -> Result<BitmapHeader> {
        let mut hdr = [0u8; HEADER_SIZE];
        input.read_exact(&mut hdr)?;

        let u16_at = |i: usize| u16::from_le_bytes([hdr[i], hdr[i + 1]]);
        let u32_at = |i: usize| u32::from_le_bytes([hdr[i], hdr[i + 1], hdr[i + 2], hdr[i + 3]]);

        if &hdr[0..2] != b"BM" {
            return Err(RenderError::BadBitmap("missing BM signature".to_string()));
        }
        if u32_at(14) < INFO_HEADER_SIZE {
            return Err(RenderError::BadBitmap(format!(
                "info header of {} bytes is too small",
                u32_at(14)
            )));
        }
        if u16_at(26) != 1 || u16_at(28) != 24 {
            return Err(RenderError::BadBitmap(format!(
                "{} planes at {} bits per pixel; only 1 plane at 24 bits is supported",
                u16_at(26),
                u16_at(28)
            )));
        }
        let height = u32_at(22) as i32;
        if height < 0 {
            return Err(RenderError::BadBitmap(
                "top-down bitmaps are not supported".to_string(),
            ));
        }
        let pixel_offset = u32_at(10) as usize;
        if pixel_offset < HEADER_SIZE {
            return Err(RenderError::BadBitmap(format!(
                "pixel data offset {} overlaps the header",
                pixel_offset
            )));
        }

        // Skip anything between the header and the pixels.
        let gap = (pixel_offset - HEADER_SIZE) as u64;
        if gap > 0 {
            let skipped = io::copy(&mut input.by_ref().take(gap), &mut io::sink())?;
            if skipped != gap {
                return Err(RenderError::BadBitmap("truncated header".to_string()));
            }
        }

        Ok(BitmapHeader {
            width: u32_at(18) as usize,
            height: height as usize,
            pixel_offset,
        })
    }
}

/// A decoded image, top row first.
#[derive(Clone, Debug, PartialEq)]
pub struct Bitmap {
    /// Pixels per row.
    pub width: usize,
    /// Number of rows.
    pub height: usize,
    /// `width * height` pixels, row by row from the top.
    pub pixels: Vec<Pixel>,
}

impl Bitmap {
    /// The pixel at column `x` of row `y`, counting rows from the top.
    pub fn get(&self, x: usize, y: usize) -> Pixel {
        self.pixels[y * self.width + x]
    }
}

/// Writes `pixels` (top row first, `width` per row) as a bitmap.
pub fn encode<W: Write>(out: &mut W, pixels: &[Pixel], width: usize, height: usize) -> Result<()> {
    if pixels.len() < width * height {
        return Err(RenderError::BadDimensions(format!(
            "{} pixels cannot fill a {}x{} image",
            pixels.len(),
            width,
            height
        )));
    }
    encode_with(out, width, height, |x, y| pixels[y * width + x])
}

/// Writes a bitmap whose pixel at column `x` of row `y` (from the top)
/// is `pixel_at(x, y)`.  Only one row is buffered at a time.
pub fn encode_with<W, F>(out: &mut W, width: usize, height: usize, pixel_at: F) -> Result<()>
where
    W: Write,
    F: Fn(usize, usize) -> Pixel,
{
    BitmapHeader::new(width, height).write_to(out)?;

    let mut row = Vec::with_capacity(padded_row_length(width));
    for scanline in (0..height).rev() {
        row.clear();
        for x in 0..width {
            let p = pixel_at(x, scanline);
            row.extend_from_slice(&[p.b, p.g, p.r]);
        }
        row.resize(padded_row_length(width), 0);
        out.write_all(&row)?;
    }
    Ok(())
}

/// Reads a bitmap written by `encode` (or any bottom-up 24-bit one).
pub fn decode<R: Read>(input: &mut R) -> Result<Bitmap> {
    let header = BitmapHeader::read_from(input)?;
    let (width, height) = (header.width, header.height);

    let mut pixels = vec![Pixel::BLACK; width * height];
    let mut row = vec![0u8; padded_row_length(width)];
    for scanline in (0..height).rev() {
        input.read_exact(&mut row)?;
        let dest = &mut pixels[scanline * width..(scanline + 1) * width];
        for (p, bgr) in dest.iter_mut().zip(row.chunks(3)) {
            *p = Pixel::rgb(bgr[2], bgr[1], bgr[0]);
        }
    }
    Ok(Bitmap {
        width,
        height,
        pixels,
    })
}

/// Encodes straight to a file.
pub fn write_file<P: AsRef<Path>>(
    path: P,
    pixels: &[Pixel],
    width: usize,
    height: usize,
) -> Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    encode(&mut out, pixels, width, height)?;
    out.flush()?;
    Ok(())
}

/// Encodes straight to a file from a pixel function.
pub fn write_file_with<P, F>(path: P, width: usize, height: usize, pixel_at: F) -> Result<()>
where
    P: AsRef<Path>,
    F: Fn(usize, usize) -> Pixel,
{
    let mut out = BufWriter::new(File::create(path)?);
    encode_with(&mut out, width, height, pixel_at)?;
    out.flush()?;
    Ok(())
}

/// Decodes straight from a file.
pub fn read_file<P: AsRef<Path>>(path: P) -> Result<Bitmap> {
    let mut input = BufReader::new(File::open(path)?);
    decode(&mut input)
}
