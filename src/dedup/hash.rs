//! Fixed-size perceptual hashes over grayscale thumbnails.
//!
//! Every family produces a 64-bit descriptor (8x8 bits, row-major, most
//! significant bit first). Two pages are duplicates only when their hashes are
//! bit-identical.

use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage};

use crate::comic::ImageHash;
use crate::types::HashAlgorithm;

const HASH_SIDE: usize = 8;

/// Computes the perceptual hash of a decoded image.
pub fn hash_image(img: &DynamicImage, algorithm: HashAlgorithm) -> ImageHash {
    let gray = img.to_luma8();
    match algorithm {
        HashAlgorithm::AHash => average_hash(&gray),
        HashAlgorithm::DHash => difference_hash(&gray),
        HashAlgorithm::PHash => dct_hash(&gray),
        HashAlgorithm::WHash => wavelet_hash(&gray),
    }
}

fn thumbnail(gray: &GrayImage, width: u32, height: u32) -> Vec<f64> {
    imageops::resize(gray, width, height, FilterType::Lanczos3)
        .into_raw()
        .into_iter()
        .map(f64::from)
        .collect()
}

fn pack_bits(bits: impl Iterator<Item = bool>) -> ImageHash {
    ImageHash(bits.fold(0u64, |acc, bit| (acc << 1) | u64::from(bit)))
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Each bit: pixel brighter than the thumbnail mean.
fn average_hash(gray: &GrayImage) -> ImageHash {
    let pixels = thumbnail(gray, HASH_SIDE as u32, HASH_SIDE as u32);
    let mean = pixels.iter().sum::<f64>() / pixels.len() as f64;
    pack_bits(pixels.iter().map(|&p| p > mean))
}

/// Each bit: right neighbour brighter than the pixel, on a 9x8 thumbnail.
fn difference_hash(gray: &GrayImage) -> ImageHash {
    let width = HASH_SIDE + 1;
    let pixels = thumbnail(gray, width as u32, HASH_SIDE as u32);
    pack_bits((0..HASH_SIDE).flat_map(|y| {
        let row = &pixels[y * width..(y + 1) * width];
        (0..HASH_SIDE).map(move |x| row[x + 1] > row[x])
    }))
}

/// Unnormalized DCT-II of `input`, first `keep` coefficients only.
fn dct_1d(input: &[f64], keep: usize) -> Vec<f64> {
    let n = input.len() as f64;
    (0..keep)
        .map(|k| {
            input
                .iter()
                .enumerate()
                .map(|(i, &x)| {
                    x * (std::f64::consts::PI * k as f64 * (2.0 * i as f64 + 1.0) / (2.0 * n)).cos()
                })
                .sum()
        })
        .collect()
}

/// Low-frequency 8x8 block of the 32x32 DCT, thresholded at its median.
fn dct_hash(gray: &GrayImage) -> ImageHash {
    const SIDE: usize = HASH_SIDE * 4;
    let pixels = thumbnail(gray, SIDE as u32, SIDE as u32);

    // Rows first, keeping only the low frequencies, then columns.
    let rows: Vec<Vec<f64>> = pixels.chunks(SIDE).map(|row| dct_1d(row, HASH_SIDE)).collect();
    let mut low = vec![0.0; HASH_SIDE * HASH_SIDE];
    for u in 0..HASH_SIDE {
        let column: Vec<f64> = rows.iter().map(|r| r[u]).collect();
        for (v, coeff) in dct_1d(&column, HASH_SIDE).into_iter().enumerate() {
            low[v * HASH_SIDE + u] = coeff;
        }
    }

    let threshold = median(&low);
    pack_bits(low.iter().map(|&c| c > threshold))
}

/// Approximation band of a 3-level Haar transform on a 64x64 thumbnail.
fn wavelet_hash(gray: &GrayImage) -> ImageHash {
    let mut side = HASH_SIDE * 8;
    let mut band: Vec<f64> = thumbnail(gray, side as u32, side as u32)
        .into_iter()
        .map(|p| p / 255.0)
        .collect();

    while side > HASH_SIDE {
        let half = side / 2;
        let mut next = vec![0.0; half * half];
        for y in 0..half {
            for x in 0..half {
                let at = |dy: usize, dx: usize| band[(2 * y + dy) * side + 2 * x + dx];
                next[y * half + x] = (at(0, 0) + at(0, 1) + at(1, 0) + at(1, 1)) / 2.0;
            }
        }
        band = next;
        side = half;
    }

    let threshold = median(&band);
    pack_bits(band.iter().map(|&c| c > threshold))
}
