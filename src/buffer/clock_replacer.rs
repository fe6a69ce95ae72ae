use super::PoolPos;

/// ClockReplacer implements the clock page replacement policy for a buffer pool.
/// Whether a frame may be evicted at all is decided by the caller when looking for a victim.
pub(in crate::buffer) struct ClockReplacer {
    pool_size: usize,
    clock_hand: PoolPos,
    ref_bits: Vec<bool>,
}

impl ClockReplacer {
    /// Construct a new ClockReplacer for a BufferPool with a given pool_size
    pub fn new(pool_size: usize) -> Self {
        Self {
            pool_size,
            clock_hand: 0,
            ref_bits: vec![false; pool_size],
        }
    }

    /// The frame at the given position in the pool was used
    pub fn touch(&mut self, frame: PoolPos) {
        self.ref_bits[frame] = true;
    }

    /// Returns None if all frames are pinned, else finds a frame which has not been used recently.
    /// A frame counts as pinned while `is_pinned` returns true for it.
    pub fn find_victim(&mut self, is_pinned: impl Fn(PoolPos) -> bool) -> Option<PoolPos> {
        // two full turns: the first one may only clear reference bits
        for _ in 0..2 * self.pool_size {
            let frame = self.clock_hand;
            self.clock_hand = (self.clock_hand + 1) % self.pool_size;
            if is_pinned(frame) {
                continue;
            }
            if !self.ref_bits[frame] {
                return Some(frame);
            } else {
                self.ref_bits[frame] = false;
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {

    use super::ClockReplacer;

    #[test]
    fn basic_test() {
        let mut clock_replacer = ClockReplacer::new(3);
        clock_replacer.touch(0);
        clock_replacer.touch(1);
        clock_replacer.touch(2);

        let victim = clock_replacer.find_victim(|_| true);
        assert!(
            victim.is_none(),
            "There shouldn't be any victim if all frames are pinned"
        );

        // Once nothing is pinned, frames are handed out in clock order
        assert_eq!(clock_replacer.find_victim(|_| false), Some(0));
        assert_eq!(clock_replacer.find_victim(|_| false), Some(1));
        assert_eq!(clock_replacer.find_victim(|_| false), Some(2));

        // Only frame 2 is unpinned
        clock_replacer.touch(0);
        clock_replacer.touch(1);
        clock_replacer.touch(2);
        assert_eq!(clock_replacer.find_victim(|frame| frame != 2), Some(2));
    }

    #[test]
    fn correct_victim_order() {
        let mut clock_replacer = ClockReplacer::new(3);
        clock_replacer.touch(0);
        clock_replacer.touch(1);
        clock_replacer.touch(2);

        assert_eq!(clock_replacer.find_victim(|frame| frame == 1), Some(0));
        clock_replacer.touch(0);

        // Frame 0 was just used and frame 1 was referenced while it was pinned,
        // so frame 2 should be the first victim
        assert_eq!(clock_replacer.find_victim(|_| false), Some(2));
        clock_replacer.touch(2);
        assert_eq!(clock_replacer.find_victim(|_| false), Some(1));
        clock_replacer.touch(1);
        assert_eq!(clock_replacer.find_victim(|_| false), Some(0));
    }
}
