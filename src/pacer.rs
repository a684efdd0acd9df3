use std::time::{Duration, Instant};

/// 帧率控制: 以 (base_instant, base_tick) 为基准计算下一帧开始时刻,
/// 落后超过半帧时重新设定基准, 避免之后连续不睡眠地追赶
pub struct Pacer {
    period: Duration,
    base_instant: Instant,
    base_tick: u64,
}

impl Pacer {
    pub fn new(period: Duration, start: Instant) -> Self {
        Pacer {
            period,
            base_instant: start,
            base_tick: 0,
        }
    }

    /// Time left before the next tick should start, given `completed` ticks
    /// so far. `None` when already due.
    pub fn residual(&mut self, completed: u64, now: Instant) -> Option<Duration> {
        let since_base = now.saturating_duration_since(self.base_instant);
        let ticks = u32::try_from(completed - self.base_tick).unwrap_or(u32::MAX);
        let next_from_base = self.period * ticks;
        if next_from_base > since_base {
            Some(next_from_base - since_base)
        } else {
            if since_base - next_from_base > self.period / 2 {
                log::debug!("Tick {} overran by {:?}, rebasing", completed, since_base - next_from_base);
                self.base_tick = completed;
                self.base_instant = now;
            }
            None
        }
    }

    pub fn wait(&mut self, completed: u64) {
        if let Some(residual) = self.residual(completed, Instant::now()) {
            std::thread::sleep(residual);
        }
    }
}
