// Mirror (double-written) circular buffer for zero-copy sliding windows.
//
// Storage holds 2 * window_size elements and every push lands at two
// offsets: `write_index` and `write_index + window_size`. The last
// `window_size` values are therefore always one contiguous slice starting
// at `write_index`, oldest first, and can be handed to a transform without
// wrap-around handling.

use crate::error::{MonitorError, Result};

/// Sliding window over the last `window_size` pushed values.
///
/// Not internally synchronized: the owner (one spectral channel) is the only
/// writer and reader.
#[derive(Debug, Clone)]
pub struct MirrorBuffer<T> {
    storage: Vec<T>,
    window_size: usize,
    write_index: usize,
}

impl<T: Copy + Default> MirrorBuffer<T> {
    /// Allocate a zero-filled buffer of `2 * window_size` elements.
    ///
    /// Allocation failure is reported instead of aborting so the caller can
    /// escalate it.
    pub fn new(window_size: usize) -> Result<Self> {
        if window_size == 0 {
            return Err(MonitorError::InvalidConfig(
                "window_size must be non-zero".to_string(),
            ));
        }

        let capacity = window_size.checked_mul(2).ok_or_else(|| {
            MonitorError::AllocationFailed(format!("window of {} elements overflows", window_size))
        })?;

        let mut storage = Vec::new();
        storage.try_reserve_exact(capacity).map_err(|e| {
            MonitorError::AllocationFailed(format!(
                "{} bytes for sliding window: {}",
                capacity.saturating_mul(std::mem::size_of::<T>()),
                e
            ))
        })?;
        storage.resize(capacity, T::default());

        Ok(Self {
            storage,
            window_size,
            write_index: 0,
        })
    }

    /// Append one value, evicting the oldest once the window is full. O(1).
    pub fn push(&mut self, value: T) {
        self.storage[self.write_index] = value;
        self.storage[self.write_index + self.window_size] = value;
        self.write_index = (self.write_index + 1) % self.window_size;
    }

    /// The last `window_size` values, oldest to newest. No copy is made; the
    /// slice borrows the buffer until the next push.
    pub fn current_window(&self) -> &[T] {
        &self.storage[self.write_index..self.write_index + self.window_size]
    }

    /// Window starting `offset` positions before the current one.
    ///
    /// Only `offset == 0` is meaningful: the storage keeps a single
    /// generation, so any other offset yields a rotated mix of the same
    /// samples rather than older data.
    pub fn window_at_offset(&self, offset: usize) -> &[T] {
        let read_index =
            (self.write_index + self.window_size - offset % self.window_size) % self.window_size;
        &self.storage[read_index..read_index + self.window_size]
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn element_size(&self) -> usize {
        std::mem::size_of::<T>()
    }

    pub fn write_index(&self) -> usize {
        self.write_index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_zero_filled() {
        let buffer = MirrorBuffer::<f32>::new(4).unwrap();
        assert_eq!(buffer.current_window(), &[0.0, 0.0, 0.0, 0.0]);
        assert_eq!(buffer.element_size(), 4);
    }

    #[test]
    fn test_partial_fill_keeps_zero_padding_first() {
        let mut buffer = MirrorBuffer::<f32>::new(5).unwrap();
        buffer.push(1.0);
        buffer.push(2.0);

        // k < W pushes: zero fill for the W - k oldest slots, then pushes in order
        assert_eq!(buffer.current_window(), &[0.0, 0.0, 0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_window_holds_last_values_in_push_order() {
        let mut buffer = MirrorBuffer::<i32>::new(4).unwrap();
        for value in 1..=11 {
            buffer.push(value);
            let expected: Vec<i32> = (value - 3..=value).map(|v| v.max(0)).collect();
            assert_eq!(buffer.current_window(), expected.as_slice());
        }
    }

    #[test]
    fn test_exactly_full_window() {
        let mut buffer = MirrorBuffer::<u8>::new(3).unwrap();
        for value in [7, 8, 9] {
            buffer.push(value);
        }
        assert_eq!(buffer.write_index(), 0);
        assert_eq!(buffer.current_window(), &[7, 8, 9]);
    }

    #[test]
    fn test_offset_zero_matches_current_window() {
        let mut buffer = MirrorBuffer::<i32>::new(4).unwrap();
        for value in 0..6 {
            buffer.push(value);
        }
        assert_eq!(buffer.window_at_offset(0), buffer.current_window());
        assert_eq!(buffer.window_at_offset(4), buffer.current_window());
        assert_eq!(buffer.window_at_offset(1).len(), 4);
    }

    #[test]
    fn test_zero_window_is_rejected() {
        assert!(MirrorBuffer::<f32>::new(0).is_err());
    }

    #[test]
    fn test_huge_window_fails_instead_of_aborting() {
        let result = MirrorBuffer::<f64>::new(usize::MAX / 4);
        assert!(matches!(result, Err(MonitorError::AllocationFailed(_))));
    }
}
