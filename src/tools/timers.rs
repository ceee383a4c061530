/*!
timers.rs - cycle-driven timers with multi-fire-per-tick semantics.

Grounded on `examples/original_source/bare68k/machine_src/glue/tools.c`'s
timer specialization of `array_t`, and on `arness`'s `src/bus/clock.rs`
"advance N units, fire while remaining" accumulator pattern: `tick` adds the
elapsed cycles to every enabled timer's `elapsed`, then drains as many
`interval`-sized firings as fit, preserving firing order (by id, then by fire
index within that id) the way `clock.rs` drains pending PPU/APU ticks in a
`while remaining >= step` loop instead of a single modulo.
*/

use crate::event::{EventBus, EventKind};

use super::points::Points;

#[derive(Debug, Clone, Copy)]
pub struct TimerData {
    pub interval: u32,
    pub elapsed: u32,
    pub data: u32,
}

pub struct Timers {
    points: Points<TimerData>,
}

impl Timers {
    pub fn new(max: usize) -> Timers {
        Timers { points: Points::new(max) }
    }

    pub fn max(&self) -> usize {
        self.points.max()
    }

    pub fn create(&mut self, id: usize, interval: u32, data: u32) -> bool {
        self.points.create(
            id,
            TimerData {
                interval,
                elapsed: 0,
                data,
            },
        )
    }

    pub fn free(&mut self, id: usize) -> Option<TimerData> {
        self.points.free(id)
    }

    pub fn enable(&mut self, id: usize) {
        self.points.enable(id);
    }

    pub fn disable(&mut self, id: usize) {
        self.points.disable(id);
    }

    pub fn is_enabled(&self, id: usize) -> bool {
        self.points.is_enabled(id)
    }

    pub fn next_free(&self) -> Option<usize> {
        self.points.next_free()
    }

    /// Advance every enabled timer by `elapsed_cycles`, enqueueing a `TIMER`
    /// event per firing. A timer whose `interval` is exceeded several times
    /// in one tick fires that many times, in ascending id order.
    pub fn tick(&mut self, pc: u32, elapsed_cycles: u32, bus: &mut EventBus) {
        for id in 0..self.points.max() {
            if !self.points.is_enabled(id) {
                continue;
            }
            let Some(timer) = self.points.get_mut(id) else {
                continue;
            };
            if timer.interval == 0 {
                continue;
            }
            timer.elapsed += elapsed_cycles;
            while timer.elapsed >= timer.interval {
                timer.elapsed -= timer.interval;
                let remainder = timer.elapsed;
                let data = timer.data;
                bus.add(EventKind::Timer, pc, id as u32, remainder, Some(Box::new(data)));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_firing_leaves_remainder() {
        let mut timers = Timers::new(2);
        timers.create(0, 100, 0);
        let mut bus = EventBus::new();
        timers.tick(0, 250, &mut bus);
        assert_eq!(bus.num_events(), 2);
        let last = &bus.events()[1];
        assert_eq!(last.value, 0);
        assert_eq!(last.flags, 50);
    }

    #[test]
    fn disabled_timer_does_not_fire() {
        let mut timers = Timers::new(1);
        timers.create(0, 10, 0);
        timers.disable(0);
        let mut bus = EventBus::new();
        timers.tick(0, 1000, &mut bus);
        assert_eq!(bus.num_events(), 0);
    }

    #[test]
    fn multiple_timers_fire_in_id_order() {
        let mut timers = Timers::new(2);
        timers.create(0, 10, 0);
        timers.create(1, 10, 0);
        let mut bus = EventBus::new();
        timers.tick(0, 10, &mut bus);
        assert_eq!(bus.events()[0].value, 0);
        assert_eq!(bus.events()[1].value, 1);
    }
}
