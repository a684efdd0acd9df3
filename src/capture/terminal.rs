use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};

use crate::input::{Input, InputSource};

/// Stop keys read from the controlling terminal without blocking.
///
/// Raw mode is needed so `q` arrives without Enter; it also swallows
/// Ctrl-C, which is therefore treated as a stop key too. Raw mode is left
/// on `release` or drop.
pub struct TerminalKeys {
    raw: bool,
}

impl TerminalKeys {
    pub fn open() -> std::io::Result<Self> {
        enable_raw_mode()?;
        Ok(TerminalKeys { raw: true })
    }

    pub fn release(&mut self) {
        if self.raw {
            self.raw = false;
            if let Err(err) = disable_raw_mode() {
                log::warn!("Failed to leave raw mode: {}", err);
            }
        }
    }

    fn drain(&mut self) -> std::io::Result<bool> {
        let mut stop = false;
        while event::poll(Duration::ZERO)? {
            if let Event::Key(key) = event::read()? {
                stop |= is_stop_key(&key);
            }
        }
        Ok(stop)
    }
}

impl InputSource for TerminalKeys {
    fn poll(&mut self) -> Input {
        match self.drain() {
            Ok(stop) => Input { stop, ..Input::default() },
            Err(err) => {
                // 无法读取终端时无法手动停止, 直接结束
                log::warn!("Failed to read terminal input, stopping: {}", err);
                Input::stop()
            }
        }
    }
}

impl Drop for TerminalKeys {
    fn drop(&mut self) {
        self.release();
    }
}

fn is_stop_key(key: &KeyEvent) -> bool {
    if key.kind != KeyEventKind::Press {
        return false;
    }
    match key.code {
        KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => true,
        KeyCode::Char('c') => key.modifiers.contains(KeyModifiers::CONTROL),
        _ => false,
    }
}
