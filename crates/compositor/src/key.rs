use image::{GrayImage, Luma, Rgb, RgbImage, Rgba, RgbaImage};

/// Largest blur radius `soften_mask` honours; larger requests are clamped.
pub const MAX_BLUR_RADIUS: u32 = 8;

/// Chroma-key parameters applied to every frame of a clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeySettings {
    /// Per-channel half-width of the background band.
    pub tolerance: u8,
    /// Solid backdrop colour the clip was shot against.
    pub background: [u8; 3],
    /// Radius of the binomial kernel used to soften the mask; 0 disables it.
    pub blur_radius: u32,
}

impl Default for KeySettings {
    fn default() -> Self {
        Self {
            tolerance: 20,
            background: [140, 140, 140],
            blur_radius: 2,
        }
    }
}

impl KeySettings {
    /// Inclusive per-channel bounds of the background band, clamped to 0..=255.
    pub fn band(&self) -> ([u8; 3], [u8; 3]) {
        let lower = self.background.map(|c| c.saturating_sub(self.tolerance));
        let upper = self.background.map(|c| c.saturating_add(self.tolerance));
        (lower, upper)
    }

    pub fn is_background(&self, pixel: &Rgb<u8>) -> bool {
        let (lower, upper) = self.band();
        pixel
            .0
            .iter()
            .zip(lower.iter().zip(upper.iter()))
            .all(|(value, (lo, hi))| (*lo..=*hi).contains(value))
    }
}

/// Keys one decoded frame: background pixels become transparent, foreground
/// pixels stay opaque, and the boundary between them is feathered.
///
/// Colour channels are blended toward white by the same mask weight that
/// drives alpha, so residual near-background pixels whiten instead of
/// keeping a coloured fringe.
pub fn key_frame(frame: &RgbImage, settings: &KeySettings) -> RgbaImage {
    let mask = foreground_mask(frame, settings);
    let mask = soften_mask(&mask, settings.blur_radius);
    compose(frame, &mask)
}

/// Binary mask: 255 where the pixel is outside the background band, 0 inside.
pub fn foreground_mask(frame: &RgbImage, settings: &KeySettings) -> GrayImage {
    let (width, height) = frame.dimensions();
    let mut mask = GrayImage::new(width, height);
    for (x, y, pixel) in frame.enumerate_pixels() {
        let value = if settings.is_background(pixel) { 0 } else { 255 };
        mask.put_pixel(x, y, Luma([value]));
    }
    mask
}

/// Separable binomial blur with reflect-101 borders.
///
/// Radius 2 uses the `[1, 4, 6, 4, 1] / 16` kernel, which is what a 5x5
/// Gaussian resolves to when sigma is derived from the kernel size. Radii
/// above [`MAX_BLUR_RADIUS`] are clamped to it.
pub fn soften_mask(mask: &GrayImage, radius: u32) -> GrayImage {
    let radius = radius.min(MAX_BLUR_RADIUS);
    if radius == 0 || mask.width() == 0 || mask.height() == 0 {
        return mask.clone();
    }

    let kernel = binomial_row(radius);
    let radius = radius as isize;
    let (width, height) = (mask.width() as usize, mask.height() as usize);
    let source = mask.as_raw();

    let mut horizontal = vec![0u64; width * height];
    for y in 0..height {
        let row = &source[y * width..(y + 1) * width];
        for x in 0..width {
            let mut sum = 0u64;
            for (k, weight) in kernel.iter().enumerate() {
                let sx = reflect_101(x as isize + k as isize - radius, width);
                sum += weight * u64::from(row[sx]);
            }
            horizontal[y * width + x] = sum;
        }
    }

    let shift = 4 * radius as u32;
    let half = 1u64 << (shift - 1);
    let mut out = GrayImage::new(mask.width(), mask.height());
    for y in 0..height {
        for x in 0..width {
            let mut sum = 0u64;
            for (k, weight) in kernel.iter().enumerate() {
                let sy = reflect_101(y as isize + k as isize - radius, height);
                sum += weight * horizontal[sy * width + x];
            }
            let value = ((sum + half) >> shift).min(255) as u8;
            out.put_pixel(x as u32, y as u32, Luma([value]));
        }
    }
    out
}

/// Row `2 * radius` of Pascal's triangle; sums to `4^radius`.
fn binomial_row(radius: u32) -> Vec<u64> {
    let n = 2 * radius as u64;
    let mut row = Vec::with_capacity(n as usize + 1);
    let mut value = 1u64;
    row.push(value);
    for k in 1..=n {
        value = value * (n - k + 1) / k;
        row.push(value);
    }
    row
}

/// Maps an out-of-range index back into `0..len` mirroring around the edge
/// pixels without repeating them (`dcb|abcd|cba`).
fn reflect_101(index: isize, len: usize) -> usize {
    if len == 1 {
        return 0;
    }
    let period = 2 * (len as isize - 1);
    let mut i = index.rem_euclid(period);
    if i >= len as isize {
        i = period - i;
    }
    i as usize
}

/// Weight `m = mask / 255`; alpha is `m * 255` and each colour channel is
/// `c * m + 255 * (1 - m)`, evaluated exactly and truncated.
///
/// The integer form `(c * w + 255 * (255 - w)) / 255` is the exact quotient.
/// Computing `m` in floating point first and truncating lands one lower in
/// 124 of the 65536 `(c, w)` pairs, where rounding error leaves the product
/// just under an integer (`c = 0, w = 43` gives 212 here, 211 in `f64`).
fn compose(frame: &RgbImage, mask: &GrayImage) -> RgbaImage {
    let (width, height) = frame.dimensions();
    let mut out = RgbaImage::new(width, height);
    for (x, y, pixel) in frame.enumerate_pixels() {
        let weight = u32::from(mask.get_pixel(x, y).0[0]);
        let blend = |channel: u8| -> u8 {
            ((u32::from(channel) * weight + 255 * (255 - weight)) / 255) as u8
        };
        let [r, g, b] = pixel.0;
        out.put_pixel(x, y, Rgba([blend(r), blend(g), blend(b), weight as u8]));
    }
    out
}
