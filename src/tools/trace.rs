/*!
trace.rs - fixed-capacity PC trace ring buffer.

Grounded on `examples/original_source/bare68k/machine_src/glue/tools.c`'s
`pc_trace_t` (head offset + fill count over a fixed array). `snapshot` builds
a fresh chronologically ordered `Vec` rather than handing back a raw
slice-plus-offset pair, since callers (tests, host inspection) want PCs in
visit order without reimplementing the ring math themselves.
*/

/// Ring buffer of the last `capacity` program counters seen.
pub struct PcTrace {
    buf: Vec<u32>,
    capacity: usize,
    head: usize,
    fill: usize,
}

impl PcTrace {
    pub fn new(capacity: usize) -> PcTrace {
        PcTrace {
            buf: vec![0; capacity.max(1)],
            capacity: capacity.max(1),
            head: 0,
            fill: 0,
        }
    }

    /// Append `pc`, evicting the oldest entry once the ring is full.
    pub fn update(&mut self, pc: u32) {
        self.buf[self.head] = pc;
        self.head = (self.head + 1) % self.capacity;
        self.fill = (self.fill + 1).min(self.capacity);
    }

    pub fn len(&self) -> usize {
        self.fill
    }

    pub fn is_empty(&self) -> bool {
        self.fill == 0
    }

    /// Oldest-to-newest snapshot of the current fill.
    pub fn snapshot(&self) -> Vec<u32> {
        let start = (self.head + self.capacity - self.fill) % self.capacity;
        (0..self.fill).map(|i| self.buf[(start + i) % self.capacity]).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_below_capacity_keeps_insertion_order() {
        let mut trace = PcTrace::new(4);
        trace.update(1);
        trace.update(2);
        trace.update(3);
        assert_eq!(trace.snapshot(), vec![1, 2, 3]);
    }

    #[test]
    fn overflow_evicts_oldest() {
        let mut trace = PcTrace::new(3);
        for pc in 1..=5u32 {
            trace.update(pc);
        }
        assert_eq!(trace.len(), 3);
        assert_eq!(trace.snapshot(), vec![3, 4, 5]);
    }
}
