use bitflags::bitflags;

bitflags! {
    /// Discrete inputs held down during a tick
    #[derive(Default)]
    pub struct Keys: u8 {
        const LEFT = 0b0000_0001;
        const RIGHT = 0b0000_0010;
    }
}

/// One poll of the input source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Input {
    pub stop: bool,
    pub keys: Keys,
}

impl Input {
    pub fn stop() -> Self {
        Input { stop: true, keys: Keys::empty() }
    }

    pub fn keys(keys: Keys) -> Self {
        Input { stop: false, keys }
    }
}

/// Polled once at the top of every tick.
/// - `stop` ends the loop before the tick runs
/// - `keys` are handed to the tick
pub trait InputSource {
    fn poll(&mut self) -> Input;
}

/// Never signals stop, for loops bounded by duration alone
pub struct NoInput;

impl InputSource for NoInput {
    fn poll(&mut self) -> Input {
        Input::default()
    }
}

impl<F> InputSource for F
where
    F: FnMut() -> bool,
{
    fn poll(&mut self) -> Input {
        Input { stop: self(), keys: Keys::empty() }
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Replays a fixed sequence, then signals stop
    pub struct Scripted {
        inputs: VecDeque<Input>,
    }

    impl Scripted {
        pub fn new(inputs: Vec<Input>) -> Self {
            Scripted { inputs: inputs.into() }
        }
    }

    impl InputSource for Scripted {
        fn poll(&mut self) -> Input {
            self.inputs.pop_front().unwrap_or_else(Input::stop)
        }
    }

    #[test]
    fn test_closure_source() {
        let mut polls = 0;
        let mut source = || {
            polls += 1;
            polls > 2
        };
        assert!(!source.poll().stop);
        assert!(!source.poll().stop);
        assert!(source.poll().stop);
    }

    #[test]
    fn test_scripted_runs_out() {
        let mut source = Scripted::new(vec![Input::keys(Keys::LEFT | Keys::RIGHT)]);
        let first = source.poll();
        assert!(first.keys.contains(Keys::LEFT));
        assert!(first.keys.contains(Keys::RIGHT));
        assert!(source.poll().stop);
    }

    #[test]
    fn test_no_input_never_stops() {
        let mut source = NoInput;
        for _ in 0..10 {
            assert_eq!(source.poll(), Input::default());
        }
    }
}
