use sdl2::event::Event;
use sdl2::keyboard::{Keycode, Scancode};
use sdl2::pixels::Color;
use sdl2::render::Canvas;
use sdl2::video::Window;
use sdl2::EventPump;

use crate::common::{Rect, Rgb, Surface};
use crate::controller::{LoopConfig, LoopSummary, RealTimeLoop};
use crate::dodger::{self, Player, FPS, SCREEN_HEIGHT, SCREEN_WIDTH, TITLE};
use crate::error::LoopError;
use crate::input::{Input, InputSource, Keys};

/// 窗口事件: 关闭窗口或 Escape 结束, 方向键为当前按下的状态
pub struct SdlInput {
    event_pump: EventPump,
}

impl SdlInput {
    pub fn new(event_pump: EventPump) -> Self {
        SdlInput { event_pump }
    }
}

impl InputSource for SdlInput {
    fn poll(&mut self) -> Input {
        let mut stop = false;
        for event in self.event_pump.poll_iter() {
            match event {
                Event::Quit { .. } | Event::KeyDown { keycode: Some(Keycode::Escape), .. } => {
                    stop = true;
                }
                _ => {}
            }
        }

        let state = self.event_pump.keyboard_state();
        let mut keys = Keys::empty();
        keys.set(Keys::LEFT, state.is_scancode_pressed(Scancode::Left));
        keys.set(Keys::RIGHT, state.is_scancode_pressed(Scancode::Right));
        Input { stop, keys }
    }
}

fn color(rgb: Rgb) -> Color {
    Color::RGB(rgb.0, rgb.1, rgb.2)
}

impl Surface for Canvas<Window> {
    fn clear(&mut self, rgb: Rgb) -> Result<(), String> {
        self.set_draw_color(color(rgb));
        Canvas::clear(self);
        Ok(())
    }

    fn fill_rect(&mut self, rect: Rect, rgb: Rgb) -> Result<(), String> {
        self.set_draw_color(color(rgb));
        Canvas::fill_rect(self, sdl2::rect::Rect::new(rect.x, rect.y, rect.width, rect.height))
    }

    fn present(&mut self) {
        Canvas::present(self);
    }
}

pub fn run() -> Result<LoopSummary, LoopError> {
    let sdl_ctx = sdl2::init().map_err(|e| LoopError::acquire("SDL", e))?;
    let video_sys = sdl_ctx.video().map_err(|e| LoopError::acquire("video subsystem", e))?;

    // open a window
    let win = video_sys
        .window(TITLE, SCREEN_WIDTH, SCREEN_HEIGHT)
        .position_centered()
        .build()
        .map_err(|e| LoopError::acquire("window", e))?;
    let canvas = win
        .into_canvas()
        .build()
        .map_err(|e| LoopError::acquire("canvas", e))?;
    let event_pump = sdl_ctx.event_pump().map_err(|e| LoopError::acquire("event pump", e))?;
    let mut input = SdlInput::new(event_pump);

    let mut player = Player::spawn(SCREEN_WIDTH, SCREEN_HEIGHT);
    RealTimeLoop::new(LoopConfig::new(FPS)).run(
        &mut input,
        canvas,
        |tick, canvas| {
            player.steer(tick.keys(), SCREEN_WIDTH);
            dodger::draw(canvas, &player)
        },
        |canvas| {
            drop(canvas);
            log::info!("Window closed");
            Ok::<(), String>(())
        },
    )
}
