/*!
points.rs - shared slot-allocation protocol for breakpoints, watchpoints, and timers.

Grounded on `examples/original_source/bare68k/machine_src/glue/tools.c`'s
`array_t`/`node_t`: three copy-pasted C specializations (breakpoints,
watchpoints, timers) over the same fixed-capacity, caller-chosen-id slot
array. Here that's one generic `Points<T>`; `check` (linear scan, first
enabled exact-address match, ties broken by lowest id) is only implemented
for `PointData`, the payload shape breakpoints and watchpoints share. Timers
reuse `Points<TimerData>` for allocation but implement their own `tick` in
`timers.rs`.
*/

/// Payload shared by breakpoints and watchpoints.
#[derive(Debug, Clone, Copy)]
pub struct PointData {
    pub addr: u32,
    pub flags: u32,
}

/// Fixed-capacity, caller-chosen-id slot array.
pub struct Points<T> {
    slots: Vec<Option<T>>,
    enabled: Vec<bool>,
}

impl<T> Points<T> {
    pub fn new(max: usize) -> Points<T> {
        Points {
            slots: (0..max).map(|_| None).collect(),
            enabled: vec![false; max],
        }
    }

    pub fn max(&self) -> usize {
        self.slots.len()
    }

    /// Install `data` at `id`. Fails if `id` is out of range or already set up.
    pub fn create(&mut self, id: usize, data: T) -> bool {
        match self.slots.get(id) {
            Some(None) => {
                self.slots[id] = Some(data);
                self.enabled[id] = true;
                true
            }
            _ => false,
        }
    }

    pub fn free(&mut self, id: usize) -> Option<T> {
        if id >= self.slots.len() {
            return None;
        }
        self.enabled[id] = false;
        self.slots[id].take()
    }

    pub fn enable(&mut self, id: usize) {
        if id < self.slots.len() && self.slots[id].is_some() {
            self.enabled[id] = true;
        }
    }

    pub fn disable(&mut self, id: usize) {
        if id < self.slots.len() {
            self.enabled[id] = false;
        }
    }

    pub fn is_enabled(&self, id: usize) -> bool {
        self.enabled.get(id).copied().unwrap_or(false)
    }

    pub fn get(&self, id: usize) -> Option<&T> {
        self.slots.get(id)?.as_ref()
    }

    pub fn get_mut(&mut self, id: usize) -> Option<&mut T> {
        self.slots.get_mut(id)?.as_mut()
    }

    /// Lowest unset id, or `None` if every slot is occupied.
    pub fn next_free(&self) -> Option<usize> {
        self.slots.iter().position(|slot| slot.is_none())
    }

    pub fn iter_enabled(&self) -> impl Iterator<Item = (usize, &T)> {
        self.slots.iter().enumerate().filter_map(move |(id, slot)| {
            if self.enabled[id] {
                slot.as_ref().map(|data| (id, data))
            } else {
                None
            }
        })
    }
}

impl Points<PointData> {
    /// First enabled slot whose `addr` matches exactly and whose `flags`
    /// intersect the probe's. Tie-break by lowest id (ascending scan order).
    pub fn check(&self, addr: u32, flags: u32) -> Option<usize> {
        self.iter_enabled()
            .find(|(_, data)| data.addr == addr && data.flags & flags != 0)
            .map(|(id, _)| id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_rejects_duplicate_id() {
        let mut points: Points<PointData> = Points::new(4);
        assert!(points.create(0, PointData { addr: 0x400, flags: 1 }));
        assert!(!points.create(0, PointData { addr: 0x500, flags: 1 }));
    }

    #[test]
    fn check_ties_break_by_lowest_id() {
        let mut points: Points<PointData> = Points::new(4);
        points.create(1, PointData { addr: 0x400, flags: 1 });
        points.create(0, PointData { addr: 0x400, flags: 1 });
        assert_eq!(points.check(0x400, 1), Some(0));
    }

    #[test]
    fn disabled_slot_is_skipped() {
        let mut points: Points<PointData> = Points::new(2);
        points.create(0, PointData { addr: 0x400, flags: 1 });
        points.disable(0);
        assert_eq!(points.check(0x400, 1), None);
    }

    #[test]
    fn next_free_reports_lowest_unset_id() {
        let mut points: Points<PointData> = Points::new(3);
        points.create(0, PointData { addr: 0, flags: 0 });
        assert_eq!(points.next_free(), Some(1));
    }
}
