//! Bucket (tile) partition of the image for parallel batches.
//!
//! Each frame's batch is traced bucket by bucket on the rayon pool. Buckets
//! are ordered from the image center outward so the middle of the frame
//! settles first.

/// A rectangular region of the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bucket {
    /// X coordinate of bucket's top-left corner
    pub x: u32,
    /// Y coordinate of bucket's top-left corner
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Bucket {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    pub fn pixel_count(&self) -> u32 {
        self.width * self.height
    }

    /// Pixel coordinates inside the bucket, row-major.
    pub fn pixels(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        (self.y..self.y + self.height)
            .flat_map(move |y| (self.x..self.x + self.width).map(move |x| (x, y)))
    }
}

/// Default bucket size in pixels.
pub const DEFAULT_BUCKET_SIZE: u32 = 32;

/// Split a `width` x `height` image into buckets of at most `bucket_size`
/// pixels per side, sorted by distance from the image center.
pub fn generate_buckets(width: u32, height: u32, bucket_size: u32) -> Vec<Bucket> {
    let size = bucket_size.max(1);
    let mut buckets = Vec::new();

    for y in (0..height).step_by(size as usize) {
        for x in (0..width).step_by(size as usize) {
            buckets.push(Bucket::new(x, y, size.min(width - x), size.min(height - y)));
        }
    }

    let center_x = width as f32 / 2.0;
    let center_y = height as f32 / 2.0;
    let distance = |b: &Bucket| {
        let dx = b.x as f32 + b.width as f32 / 2.0 - center_x;
        let dy = b.y as f32 + b.height as f32 / 2.0 - center_y;
        dx * dx + dy * dy
    };
    buckets.sort_by(|a, b| distance(a).total_cmp(&distance(b)));

    buckets
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buckets_cover_image_once() {
        let buckets = generate_buckets(100, 70, 32);
        let mut covered = vec![0u8; 100 * 70];
        for bucket in &buckets {
            for (x, y) in bucket.pixels() {
                covered[(y * 100 + x) as usize] += 1;
            }
        }
        assert!(covered.iter().all(|&c| c == 1));
        assert_eq!(buckets.len(), 4 * 3);
    }

    #[test]
    fn test_center_bucket_comes_first() {
        let buckets = generate_buckets(96, 96, 32);
        assert_eq!(buckets[0], Bucket::new(32, 32, 32, 32));
    }

    #[test]
    fn test_exact_and_partial_fit() {
        let exact = generate_buckets(64, 64, 32);
        assert_eq!(exact.len(), 4);
        assert!(exact.iter().all(|b| b.pixel_count() == 32 * 32));

        let partial = generate_buckets(40, 10, 32);
        let total: u32 = partial.iter().map(Bucket::pixel_count).sum();
        assert_eq!(total, 400);
    }

    #[test]
    fn test_last_column_at_u32_limit() {
        let width = u32::MAX;
        let buckets = generate_buckets(width, 1, u32::MAX - 10);
        assert_eq!(buckets.len(), 2);
        let widths: u64 = buckets.iter().map(|b| b.width as u64).sum();
        assert_eq!(widths, width as u64);
        assert!(buckets.iter().any(|b| b.x == u32::MAX - 10 && b.width == 10));
    }
}
