//! Target buffers the workers write into.
//!
//! Workers claim disjoint columns, so no two of them ever store to the
//! same index.  The pixel buffer keeps each pixel in an atomic word and
//! stores with relaxed ordering; the acknowledgment every worker sends
//! when it finishes a command orders those stores before the
//! coordinator reads the buffer back.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::color::Pixel;
use crate::escape::FractalValue;

/// A fixed-capacity pixel buffer that many workers can fill at once.
#[derive(Debug)]
pub struct PixelBuffer {
    pixels: Box<[AtomicU32]>,
}

impl PixelBuffer {
    /// A buffer of `capacity` black pixels.
    pub fn new(capacity: usize) -> PixelBuffer {
        let black = Pixel::BLACK.to_word();
        PixelBuffer {
            pixels: (0..capacity).map(|_| AtomicU32::new(black)).collect(),
        }
    }

    /// Like `new`, but reports an allocation failure instead of
    /// aborting the process.
    pub fn try_new(capacity: usize) -> Option<PixelBuffer> {
        let mut pixels: Vec<AtomicU32> = Vec::new();
        pixels.try_reserve_exact(capacity).ok()?;
        let black = Pixel::BLACK.to_word();
        pixels.extend((0..capacity).map(|_| AtomicU32::new(black)));
        Some(PixelBuffer {
            pixels: pixels.into_boxed_slice(),
        })
    }

    /// Number of pixels the buffer holds.
    pub fn capacity(&self) -> usize {
        self.pixels.len()
    }

    /// Stores one pixel.
    #[inline]
    pub fn set(&self, index: usize, pixel: Pixel) {
        self.pixels[index].store(pixel.to_word(), Ordering::Relaxed);
    }

    /// Loads one pixel.
    #[inline]
    pub fn get(&self, index: usize) -> Pixel {
        Pixel::from_word(self.pixels[index].load(Ordering::Relaxed))
    }

    /// Copies out the first `len` pixels.
    pub fn snapshot(&self, len: usize) -> Vec<Pixel> {
        self.pixels[..len.min(self.pixels.len())]
            .iter()
            .map(|p| Pixel::from_word(p.load(Ordering::Relaxed)))
            .collect()
    }
}

/// The raw samples behind the viewport, kept so a palette change can
/// be redrawn without iterating again.  Writers hold the lock only
/// long enough to drop in one finished column.
#[derive(Debug)]
pub struct FractalCache {
    values: RwLock<Vec<FractalValue>>,
}

impl FractalCache {
    /// A cache for `len` pixels.
    pub fn new(len: usize) -> FractalCache {
        FractalCache {
            values: RwLock::new(vec![FractalValue::default(); len]),
        }
    }

    /// Like `new`, but reports an allocation failure instead of
    /// aborting the process.
    pub fn try_new(len: usize) -> Option<FractalCache> {
        let mut values = Vec::new();
        values.try_reserve_exact(len).ok()?;
        values.resize(len, FractalValue::default());
        Some(FractalCache {
            values: RwLock::new(values),
        })
    }

    /// Shared access for reshading.
    pub fn read(&self) -> RwLockReadGuard<Vec<FractalValue>> {
        self.values.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Exclusive access for storing a column.
    pub fn write(&self) -> RwLockWriteGuard<Vec<FractalValue>> {
        self.values.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Stores a column of values; `column[row]` lands at
    /// `row * stride + col`.
    pub fn store_column(&self, col: usize, stride: usize, column: &[FractalValue]) {
        let mut values = self.write();
        for (row, value) in column.iter().enumerate() {
            values[row * stride + col] = *value;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::escape::EscapeSample;

    #[test]
    fn buffers_start_black() {
        let b = PixelBuffer::new(10);
        assert_eq!(b.capacity(), 10);
        assert!(b.snapshot(10).iter().all(|p| *p == Pixel::BLACK));
    }

    #[test]
    fn concurrent_disjoint_writes_all_land() {
        let b = PixelBuffer::new(4 * 1000);
        crossbeam::scope(|s| {
            for t in 0..4 {
                let b = &b;
                s.spawn(move |_| {
                    for i in 0..1000 {
                        b.set(i * 4 + t, Pixel::rgb(t as u8, 0, 0));
                    }
                });
            }
        })
        .unwrap();
        for (i, p) in b.snapshot(4000).iter().enumerate() {
            assert_eq!(p.r as usize, i % 4);
        }
    }

    #[test]
    fn try_new_allocates_small_buffers() {
        assert_eq!(PixelBuffer::try_new(16).unwrap().capacity(), 16);
    }

    #[test]
    fn caches_too_big_to_reserve_are_refused() {
        assert!(FractalCache::try_new(usize::max_value()).is_none());
        assert_eq!(FractalCache::try_new(12).unwrap().read().len(), 12);
    }

    #[test]
    fn cache_stores_columns_strided() {
        let cache = FractalCache::new(6);
        let v = FractalValue::single(EscapeSample {
            iterations: 5,
            modulus_sq: 9.0,
        });
        cache.store_column(1, 3, &[v, v]);
        let values = cache.read();
        assert_eq!(values[1], v);
        assert_eq!(values[4], v);
        assert_eq!(values[0], FractalValue::default());
    }
}
