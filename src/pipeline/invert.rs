//! Colour inversion: every channel `v` becomes `255 - v`.
//!
//! Pure and position-independent, so the sample buffer is split into
//! fixed-size chunks and inverted on the rayon pool.

use crate::model::Bitmap;
use rayon::prelude::*;

/// Bytes handled per rayon task.
const CHUNK: usize = 64 * 1024;

/// Invert `bitmap` in place.
pub fn invert_in_place(bitmap: &mut Bitmap) {
    bitmap
        .samples_mut()
        .par_chunks_mut(CHUNK)
        .for_each(|chunk| {
            for v in chunk {
                *v = 255 - *v;
            }
        });
}

/// Inverted copy of `bitmap`, same dimensions.
pub fn invert(bitmap: &Bitmap) -> Bitmap {
    let mut out = bitmap.clone();
    invert_in_place(&mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn white_becomes_black() {
        let white = Bitmap::filled(4, 2, [255, 255, 255]);
        let black = invert(&white);
        assert_eq!((black.width(), black.height()), (4, 2));
        assert!(black.is_uniform([0, 0, 0]));
    }

    #[test]
    fn each_channel_is_complemented() {
        let bmp = Bitmap::filled(1, 1, [0, 100, 255]);
        assert_eq!(invert(&bmp).pixel(0, 0), [255, 155, 0]);
    }

    #[test]
    fn double_inversion_is_identity() {
        // 256 × 300 × 3 bytes spans several chunks.
        let mut bmp = Bitmap::filled(256, 300, [0, 0, 0]);
        for (i, v) in bmp.samples_mut().iter_mut().enumerate() {
            *v = (i % 256) as u8;
        }
        let original = bmp.clone();

        invert_in_place(&mut bmp);
        assert_ne!(bmp, original);
        invert_in_place(&mut bmp);
        assert_eq!(bmp, original);
    }
}
