//! Buffers of projected points handed to the renderer.

use crate::fre;
use bytemuck::{Pod, Zeroable};
use nalgebra::Point2;

/// A camera-relative, scaled point in single precision.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, PartialEq, Zeroable, Pod)]
pub struct RenderPoint(pub Point2<fre>);

/// A buffer of render points that is refilled every frame.
///
/// The buffer is grown on demand, but never shrunk. A counter keeps track
/// of the number of valid points, and is reset when the buffer is cleared.
/// This allows the buffer to be filled and emptied repeatedly without
/// allocating once it has reached its working size.
#[derive(Clone, Debug, Default)]
pub struct RenderPointBuffer {
    raw_buffer: Vec<RenderPoint>,
    n_valid_points: usize,
}

/// A pair of render point buffers, allowing one buffer to be read while the
/// other is being filled.
#[derive(Clone, Debug, Default)]
pub struct DoubleBufferedRenderPoints {
    buffers: [RenderPointBuffer; 2],
    front_idx: usize,
}

impl RenderPoint {
    /// The point every invalid projection is replaced with, which is the
    /// center of the view.
    pub fn sentinel() -> Self {
        Self::zeroed()
    }

    pub fn new(x: fre, y: fre) -> Self {
        Self(Point2::new(x, y))
    }

    pub fn x(&self) -> fre {
        self.0.x
    }

    pub fn y(&self) -> fre {
        self.0.y
    }

    pub fn is_finite(&self) -> bool {
        self.0.x.is_finite() && self.0.y.is_finite()
    }
}

impl RenderPointBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a buffer with room for the given number of points.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            raw_buffer: vec![RenderPoint::zeroed(); capacity],
            n_valid_points: 0,
        }
    }

    /// Returns the current number of valid points in the buffer.
    pub fn len(&self) -> usize {
        self.n_valid_points
    }

    pub fn is_empty(&self) -> bool {
        self.n_valid_points == 0
    }

    /// Returns the number of points the buffer can hold without growing.
    pub fn capacity(&self) -> usize {
        self.raw_buffer.len()
    }

    /// Returns a slice with the valid points in the buffer.
    pub fn points(&self) -> &[RenderPoint] {
        &self.raw_buffer[..self.n_valid_points]
    }

    /// Returns the valid points as raw bytes, ready for upload.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(self.points())
    }

    /// Appends the given point, growing the buffer if it is full.
    pub fn push(&mut self, point: RenderPoint) {
        if self.n_valid_points == self.raw_buffer.len() {
            self.grow_buffer(self.n_valid_points + 1);
        }
        self.raw_buffer[self.n_valid_points] = point;
        self.n_valid_points += 1;
    }

    /// Makes room for at least the given number of additional points.
    pub fn reserve(&mut self, additional: usize) {
        let required = self.n_valid_points + additional;
        if required > self.raw_buffer.len() {
            self.grow_buffer(required);
        }
    }

    /// Empties the buffer of points.
    ///
    /// Does not actually drop anything, just resets the count of valid
    /// points to zero.
    pub fn clear(&mut self) {
        self.n_valid_points = 0;
    }

    fn grow_buffer(&mut self, min_length: usize) {
        // Add one before doubling to avoid getting stuck at zero
        let doubled_length = (self.raw_buffer.len() + 1).saturating_mul(2);
        let new_length = doubled_length.max(min_length);

        apsis_log::trace!(
            "Growing render point buffer from {} to {} points",
            self.raw_buffer.len(),
            new_length
        );

        self.raw_buffer.resize(new_length, RenderPoint::zeroed());
    }
}

impl DoubleBufferedRenderPoints {
    pub fn new() -> Self {
        Self::default()
    }

    /// The buffer holding the most recently completed frame.
    pub fn front(&self) -> &RenderPointBuffer {
        &self.buffers[self.front_idx]
    }

    /// The buffer being filled for the next frame.
    pub fn back_mut(&mut self) -> &mut RenderPointBuffer {
        &mut self.buffers[1 - self.front_idx]
    }

    /// Borrows the front buffer for reading and the back buffer for writing
    /// at the same time.
    pub fn split(&mut self) -> (&RenderPointBuffer, &mut RenderPointBuffer) {
        let [first, second] = &mut self.buffers;
        if self.front_idx == 0 {
            (&*first, second)
        } else {
            (&*second, first)
        }
    }

    /// Publishes the back buffer as the new front buffer. The old front
    /// buffer becomes the back buffer and is cleared.
    pub fn swap(&mut self) {
        self.front_idx = 1 - self.front_idx;
        self.back_mut().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn buffer_grows_but_never_shrinks() {
        let mut buffer = RenderPointBuffer::new();
        for i in 0..100 {
            buffer.push(RenderPoint::new(i as fre, 0.0));
        }
        assert_eq!(buffer.len(), 100);
        let capacity = buffer.capacity();
        assert!(capacity >= 100);

        buffer.clear();
        assert!(buffer.is_empty());
        assert_eq!(buffer.capacity(), capacity);

        buffer.push(RenderPoint::new(1.0, 2.0));
        assert_eq!(buffer.points(), &[RenderPoint::new(1.0, 2.0)]);
        assert_eq!(buffer.capacity(), capacity);
    }

    #[test]
    fn reserving_avoids_growth_while_pushing() {
        let mut buffer = RenderPointBuffer::with_capacity(4);
        buffer.reserve(1000);
        let capacity = buffer.capacity();
        for _ in 0..1000 {
            buffer.push(RenderPoint::sentinel());
        }
        assert_eq!(buffer.capacity(), capacity);
    }

    #[test]
    fn bytes_cover_only_valid_points() {
        let mut buffer = RenderPointBuffer::with_capacity(16);
        buffer.push(RenderPoint::new(1.0, -1.0));
        buffer.push(RenderPoint::new(2.0, -2.0));
        assert_eq!(buffer.as_bytes().len(), 2 * 2 * size_of::<fre>());
    }

    #[test]
    fn swapping_publishes_back_buffer() {
        let mut buffers = DoubleBufferedRenderPoints::new();
        buffers.back_mut().push(RenderPoint::new(3.0, 4.0));
        assert!(buffers.front().is_empty());

        buffers.swap();
        assert_eq!(buffers.front().points(), &[RenderPoint::new(3.0, 4.0)]);
        assert!(buffers.back_mut().is_empty());
    }

    #[test]
    fn front_can_be_read_while_back_is_filled() {
        let mut buffers = DoubleBufferedRenderPoints::new();
        buffers.back_mut().push(RenderPoint::new(1.0, 1.0));
        buffers.swap();

        let (front, back) = buffers.split();
        thread::scope(|scope| {
            let reader = scope.spawn(move || front.points().to_vec());
            back.push(RenderPoint::new(2.0, 2.0));
            assert_eq!(reader.join().unwrap(), vec![RenderPoint::new(1.0, 1.0)]);
        });

        buffers.swap();
        assert_eq!(buffers.front().points(), &[RenderPoint::new(2.0, 2.0)]);
    }
}
