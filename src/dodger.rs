use crate::common::{Rect, Surface, BLACK, RED};
use crate::input::Keys;

pub const TITLE: &str = "Asteroid Dodger";
pub const SCREEN_WIDTH: u32 = 800;
pub const SCREEN_HEIGHT: u32 = 600;
pub const FPS: f64 = 60.0;

pub const PLAYER_WIDTH: u32 = 50;
pub const PLAYER_HEIGHT: u32 = 50;
/// 每帧移动的像素数
pub const PLAYER_SPEED: i32 = 5;
/// 与屏幕底边的距离
const PLAYER_BOTTOM_MARGIN: i32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Player {
    pub x: i32,
    pub y: i32,
}

impl Player {
    /// 屏幕底部居中
    pub fn spawn(screen_width: u32, screen_height: u32) -> Self {
        Player {
            x: (screen_width as i32 - PLAYER_WIDTH as i32) / 2,
            y: screen_height as i32 - PLAYER_HEIGHT as i32 - PLAYER_BOTTOM_MARGIN,
        }
    }

    /// Moves by `PLAYER_SPEED` for each held arrow, then keeps the player
    /// inside `0..=screen_width - PLAYER_WIDTH`
    pub fn steer(&mut self, keys: Keys, screen_width: u32) {
        if keys.contains(Keys::LEFT) {
            self.x -= PLAYER_SPEED;
        }
        if keys.contains(Keys::RIGHT) {
            self.x += PLAYER_SPEED;
        }
        let max_x = screen_width.saturating_sub(PLAYER_WIDTH) as i32;
        self.x = self.x.clamp(0, max_x);
    }

    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, PLAYER_WIDTH, PLAYER_HEIGHT)
    }
}

pub fn draw<S: Surface + ?Sized>(surface: &mut S, player: &Player) -> Result<(), String> {
    surface.clear(BLACK)?;
    surface.fill_rect(player.rect(), RED)?;
    surface.present();
    Ok(())
}
