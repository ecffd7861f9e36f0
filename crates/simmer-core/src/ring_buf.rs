/// Fixed-capacity ring. Slots are written in order and, once full, each push
/// overwrites the oldest slot in place. `as_slice` exposes the slots in
/// storage order.
#[derive(Debug, Clone)]
pub(crate) struct RingBuf<T: Copy + Default> {
    buf: Vec<T>,
    head: usize,
    len: usize,
}

impl<T: Copy + Default> RingBuf<T> {
    pub(crate) fn with_capacity(cap: usize) -> Self {
        assert!(cap > 0, "ring capacity must be positive");
        Self {
            buf: vec![T::default(); cap],
            head: 0,
            len: 0,
        }
    }

    /// Writes `value` into the next slot, evicting the oldest entry when full.
    #[inline]
    pub(crate) fn push(&mut self, value: T) {
        let cap = self.buf.len();
        self.buf[self.head] = value;
        self.head = (self.head + 1) % cap;
        if self.len < cap {
            self.len += 1;
        }
    }

    /// Occupied slots in storage order (not necessarily oldest first).
    #[inline]
    pub(crate) fn as_slice(&self) -> &[T] {
        &self.buf[..self.len]
    }
}
