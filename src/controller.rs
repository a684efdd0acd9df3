//! Fixed-rate loop with pacing and exactly-once cleanup.
//!
//! Each tick: poll input, stop before the tick if signalled, run the tick,
//! check the duration limit, then sleep what is left of the period. The
//! acquired resource is moved into the loop, lent to every tick and handed
//! to the exit cleanup once the loop ends, whatever ended it.

use std::time::{Duration, Instant};

use crate::error::{BoxError, LoopError};
use crate::input::{InputSource, Keys};
use crate::pacer::Pacer;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopConfig {
    pub target_rate_hz: f64,
    /// `None` runs until stopped
    pub max_duration: Option<Duration>,
}

impl LoopConfig {
    pub fn new(target_rate_hz: f64) -> Self {
        LoopConfig {
            target_rate_hz,
            max_duration: None,
        }
    }

    pub fn with_max_duration(mut self, max_duration: Duration) -> Self {
        self.max_duration = Some(max_duration);
        self
    }

    /// Validates the config and returns the tick period
    pub fn period(&self) -> Result<Duration, LoopError> {
        let rate = self.target_rate_hz;
        if !rate.is_finite() || rate <= 0.0 {
            return Err(LoopError::InvalidConfiguration(format!(
                "target rate must be a positive number of Hz, got {}",
                rate
            )));
        }
        if self.max_duration == Some(Duration::ZERO) {
            return Err(LoopError::InvalidConfiguration(
                "max duration must be positive".to_string(),
            ));
        }
        Duration::try_from_secs_f64(1.0 / rate).map_err(|_| {
            LoopError::InvalidConfiguration(format!("target rate {} Hz is too low", rate))
        })
    }
}

/// `running` only ever goes from true to false
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LoopState {
    elapsed: Duration,
    iteration_count: u64,
    running: bool,
}

impl LoopState {
    fn new() -> Self {
        LoopState {
            elapsed: Duration::ZERO,
            iteration_count: 0,
            running: true,
        }
    }

    fn elapsed(&self) -> Duration {
        self.elapsed
    }

    fn iteration_count(&self) -> u64 {
        self.iteration_count
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn complete_tick(&mut self, elapsed: Duration) {
        self.iteration_count += 1;
        self.elapsed = elapsed;
    }

    fn halt(&mut self) {
        self.running = false;
    }
}

/// What a tick sees of the loop
#[derive(Debug)]
pub struct Tick {
    index: u64,
    elapsed: Duration,
    keys: Keys,
    stop_requested: bool,
}

impl Tick {
    /// 0 for the first tick
    pub fn index(&self) -> u64 {
        self.index
    }

    /// Time since the loop started, taken at the start of this tick
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn keys(&self) -> Keys {
        self.keys
    }

    /// Ends the loop once this tick returns
    pub fn request_stop(&mut self) {
        self.stop_requested = true;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The input source signalled stop
    Signal,
    /// A tick called `request_stop`
    Requested,
    /// `max_duration` elapsed
    Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopSummary {
    pub iterations: u64,
    pub elapsed: Duration,
    pub reason: StopReason,
}

/// Owns the resource until the loop hands it to the cleanup. If the loop
/// unwinds from a panicking tick, the cleanup runs from `drop`.
struct ExitGuard<R, C>
where
    C: FnOnce(R) -> Result<(), BoxError>,
{
    slot: Option<(R, C)>,
}

impl<R, C> ExitGuard<R, C>
where
    C: FnOnce(R) -> Result<(), BoxError>,
{
    fn new(resource: R, on_exit: C) -> Self {
        ExitGuard { slot: Some((resource, on_exit)) }
    }

    fn resource(&mut self) -> &mut R {
        match self.slot.as_mut() {
            Some((resource, _)) => resource,
            None => unreachable!("resource released while the loop is running"),
        }
    }

    fn release(mut self) -> Result<(), BoxError> {
        match self.slot.take() {
            Some((resource, on_exit)) => on_exit(resource),
            None => Ok(()),
        }
    }
}

impl<R, C> Drop for ExitGuard<R, C>
where
    C: FnOnce(R) -> Result<(), BoxError>,
{
    fn drop(&mut self) {
        if let Some((resource, on_exit)) = self.slot.take() {
            log::warn!("Loop unwinding, running exit cleanup");
            if let Err(err) = on_exit(resource) {
                log::error!("Exit cleanup failed while unwinding: {}", err);
            }
        }
    }
}

pub struct RealTimeLoop {
    config: LoopConfig,
}

impl RealTimeLoop {
    pub fn new(config: LoopConfig) -> Self {
        RealTimeLoop { config }
    }

    /// Runs ticks until `input` signals stop, a tick requests stop, the
    /// duration limit passes, or a tick fails.
    ///
    /// `on_exit` receives `resource` exactly once on every path out of the
    /// loop. An invalid config returns before either callback is invoked
    /// and simply drops `resource`. A failed tick is returned as
    /// [`LoopError::Tick`] after the cleanup has run.
    pub fn run<I, R, T, C, E, F>(
        &self,
        input: &mut I,
        resource: R,
        mut on_tick: T,
        on_exit: C,
    ) -> Result<LoopSummary, LoopError>
    where
        I: InputSource + ?Sized,
        T: FnMut(&mut Tick, &mut R) -> Result<(), E>,
        C: FnOnce(R) -> Result<(), F>,
        E: Into<BoxError>,
        F: Into<BoxError>,
    {
        let period = self.config.period()?;
        let mut guard = ExitGuard::new(resource, move |resource| on_exit(resource).map_err(Into::into));

        log::info!("Loop starting at {} Hz", self.config.target_rate_hz);
        let start = Instant::now();
        let mut pacer = Pacer::new(period, start);
        let mut state = LoopState::new();
        let mut reason = StopReason::Signal;
        let mut failure = None;

        while state.is_running() {
            let polled = input.poll();
            if polled.stop {
                log::debug!("Stop signal before tick {}", state.iteration_count());
                state.halt();
                break;
            }

            let mut tick = Tick {
                index: state.iteration_count(),
                elapsed: start.elapsed(),
                keys: polled.keys,
                stop_requested: false,
            };
            log::trace!("Tick {} start", tick.index);
            if let Err(err) = on_tick(&mut tick, guard.resource()) {
                let source: BoxError = err.into();
                log::error!("Tick {} failed: {}", tick.index, source);
                state.halt();
                failure = Some(LoopError::Tick { iteration: tick.index, source });
                break;
            }
            state.complete_tick(start.elapsed());

            if tick.stop_requested {
                log::debug!("Tick {} requested stop", tick.index);
                state.halt();
                reason = StopReason::Requested;
            } else if let Some(max) = self.config.max_duration {
                if state.elapsed() >= max {
                    log::debug!("Duration of {:?} reached", max);
                    state.halt();
                    reason = StopReason::Duration;
                }
            }

            if state.is_running() {
                pacer.wait(state.iteration_count());
            }
        }

        let elapsed = start.elapsed();
        let cleanup = guard.release();
        match (failure, cleanup) {
            (Some(err), Err(cleanup_err)) => {
                log::error!("Exit cleanup after failed tick also failed: {}", cleanup_err);
                Err(err)
            }
            (Some(err), Ok(())) => Err(err),
            (None, Err(cleanup_err)) => Err(LoopError::Cleanup(cleanup_err)),
            (None, Ok(())) => {
                log::info!(
                    "Loop stopped ({:?}) after {} ticks in {:?}",
                    reason,
                    state.iteration_count(),
                    elapsed
                );
                Ok(LoopSummary {
                    iterations: state.iteration_count(),
                    elapsed,
                    reason,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::tests::Scripted;
    use crate::input::{Input, NoInput};
    use std::cell::{Cell, RefCell};
    use std::panic::{self, AssertUnwindSafe};

    fn fast() -> RealTimeLoop {
        RealTimeLoop::new(LoopConfig::new(1000.0))
    }

    fn stop_after(polls: u32) -> impl FnMut() -> bool {
        let mut count = 0;
        move || {
            count += 1;
            count > polls
        }
    }

    #[test]
    fn test_config_period() {
        assert_eq!(LoopConfig::new(50.0).period().unwrap(), Duration::from_millis(20));
    }

    #[test]
    fn test_rejects_bad_config_without_invoking_callbacks() {
        let configs = [
            LoopConfig::new(0.0),
            LoopConfig::new(-60.0),
            LoopConfig::new(f64::NAN),
            LoopConfig::new(f64::INFINITY),
            LoopConfig::new(60.0).with_max_duration(Duration::ZERO),
        ];
        for config in configs {
            let ticks = Cell::new(0);
            let cleanups = Cell::new(0);
            let result = RealTimeLoop::new(config).run(
                &mut NoInput,
                (),
                |_, _| {
                    ticks.set(ticks.get() + 1);
                    Ok::<(), String>(())
                },
                |_| {
                    cleanups.set(cleanups.get() + 1);
                    Ok::<(), String>(())
                },
            );
            assert!(matches!(result, Err(LoopError::InvalidConfiguration(_))), "{:?}", config);
            assert_eq!(ticks.get(), 0);
            assert_eq!(cleanups.get(), 0);
        }
    }

    #[test]
    fn test_iteration_count_follows_rate() {
        let config = LoopConfig::new(50.0).with_max_duration(Duration::from_millis(400));
        let summary = RealTimeLoop::new(config)
            .run(&mut NoInput, (), |_, _| Ok::<(), String>(()), |_| Ok::<(), String>(()))
            .unwrap();
        assert_eq!(summary.reason, StopReason::Duration);
        // Ticks start at 0, 20, ..., 400ms: 21 on schedule. Each tick lost
        // needs a wake-up more than 10ms late, so allow at most two.
        assert!((19..=21).contains(&summary.iterations), "{} ticks", summary.iterations);
        assert!(summary.elapsed >= Duration::from_millis(400));
    }

    #[test]
    fn test_cleanup_once_on_signal() {
        let ticks = Cell::new(0);
        let cleanups = Cell::new(0);
        let summary = fast()
            .run(
                &mut stop_after(3),
                (),
                |_, _| {
                    ticks.set(ticks.get() + 1);
                    Ok::<(), String>(())
                },
                |_| {
                    cleanups.set(cleanups.get() + 1);
                    Ok::<(), String>(())
                },
            )
            .unwrap();
        assert_eq!(summary.reason, StopReason::Signal);
        assert_eq!(summary.iterations, 3);
        assert_eq!(ticks.get(), 3);
        assert_eq!(cleanups.get(), 1);
    }

    #[test]
    fn test_cleanup_once_on_duration() {
        let cleanups = Cell::new(0);
        let config = LoopConfig::new(1000.0).with_max_duration(Duration::from_millis(20));
        let summary = RealTimeLoop::new(config)
            .run(&mut NoInput, (), |_, _| Ok::<(), String>(()), |_| {
                cleanups.set(cleanups.get() + 1);
                Ok::<(), String>(())
            })
            .unwrap();
        assert_eq!(summary.reason, StopReason::Duration);
        assert_eq!(cleanups.get(), 1);
    }

    #[test]
    fn test_cleanup_once_on_tick_failure() {
        let ticks = Cell::new(0);
        let cleanups = Cell::new(0);
        let result = fast().run(
            &mut NoInput,
            (),
            |tick, _| {
                ticks.set(ticks.get() + 1);
                if tick.index() == 2 {
                    return Err("boom".to_string());
                }
                Ok(())
            },
            |_| {
                cleanups.set(cleanups.get() + 1);
                Ok::<(), String>(())
            },
        );
        match result {
            Err(LoopError::Tick { iteration, source }) => {
                assert_eq!(iteration, 2);
                assert_eq!(source.to_string(), "boom");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(ticks.get(), 3);
        assert_eq!(cleanups.get(), 1);
    }

    #[test]
    fn test_cleanup_once_on_panic() {
        let cleanups = Cell::new(0);
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            fast().run(
                &mut NoInput,
                (),
                |tick, _| {
                    if tick.index() == 1 {
                        panic!("tick panicked");
                    }
                    Ok::<(), String>(())
                },
                |_| {
                    cleanups.set(cleanups.get() + 1);
                    Ok::<(), String>(())
                },
            )
        }));
        assert!(result.is_err());
        assert_eq!(cleanups.get(), 1);
    }

    #[test]
    fn test_signal_checked_before_first_tick() {
        let ticks = Cell::new(0);
        let cleanups = Cell::new(0);
        let summary = fast()
            .run(
                &mut Scripted::new(vec![]),
                (),
                |_, _| {
                    ticks.set(ticks.get() + 1);
                    Ok::<(), String>(())
                },
                |_| {
                    cleanups.set(cleanups.get() + 1);
                    Ok::<(), String>(())
                },
            )
            .unwrap();
        assert_eq!(summary.iterations, 0);
        assert_eq!(ticks.get(), 0);
        assert_eq!(cleanups.get(), 1);
    }

    #[test]
    fn test_tick_requests_stop() {
        let summary = fast()
            .run(
                &mut NoInput,
                (),
                |tick, _| {
                    if tick.index() == 4 {
                        tick.request_stop();
                    }
                    Ok::<(), String>(())
                },
                |_| Ok::<(), String>(()),
            )
            .unwrap();
        assert_eq!(summary.reason, StopReason::Requested);
        assert_eq!(summary.iterations, 5);
    }

    #[test]
    fn test_resource_flows_through_ticks_into_cleanup() {
        let released = RefCell::new(Vec::new());
        let inputs = vec![
            Input::keys(Keys::LEFT),
            Input::default(),
            Input::keys(Keys::RIGHT),
        ];
        fast()
            .run(
                &mut Scripted::new(inputs),
                Vec::new(),
                |tick, seen: &mut Vec<(u64, Keys)>| {
                    seen.push((tick.index(), tick.keys()));
                    Ok::<(), String>(())
                },
                |seen| {
                    *released.borrow_mut() = seen;
                    Ok::<(), String>(())
                },
            )
            .unwrap();
        assert_eq!(
            released.into_inner(),
            vec![(0, Keys::LEFT), (1, Keys::empty()), (2, Keys::RIGHT)]
        );
    }

    #[test]
    fn test_elapsed_is_monotonic() {
        let last = Cell::new(Duration::ZERO);
        fast()
            .run(
                &mut stop_after(10),
                (),
                |tick, _| {
                    assert!(tick.elapsed() >= last.get());
                    last.set(tick.elapsed());
                    Ok::<(), String>(())
                },
                |_| Ok::<(), String>(()),
            )
            .unwrap();
        assert!(last.get() > Duration::ZERO);
    }

    #[test]
    fn test_cleanup_failure_on_clean_exit() {
        let result = fast().run(
            &mut stop_after(1),
            (),
            |_, _| Ok::<(), String>(()),
            |_| Err("close failed".to_string()),
        );
        assert!(matches!(result, Err(LoopError::Cleanup(_))));
    }

    #[test]
    fn test_tick_failure_wins_over_cleanup_failure() {
        let result = fast().run(
            &mut NoInput,
            (),
            |_, _| Err("boom".to_string()),
            |_| Err("close failed".to_string()),
        );
        assert!(matches!(result, Err(LoopError::Tick { iteration: 0, .. })));
    }

    #[test]
    fn test_state_transitions() {
        let mut state = LoopState::new();
        assert!(state.is_running());
        state.complete_tick(Duration::from_millis(5));
        state.complete_tick(Duration::from_millis(10));
        assert_eq!(state.iteration_count(), 2);
        assert_eq!(state.elapsed(), Duration::from_millis(10));
        state.halt();
        state.halt();
        assert!(!state.is_running());
    }
}
