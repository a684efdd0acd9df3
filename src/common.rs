/// RGB 颜色
pub type Rgb = (u8, u8, u8);

pub const BLACK: Rgb = (0, 0, 0);
pub const RED: Rgb = (255, 0, 0);

/// 轴对齐矩形, 左上角为 (x, y)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Rect { x, y, width, height }
    }
}

/// 可绘制的表面, 每帧 clear -> fill_rect* -> present
pub trait Surface {
    fn clear(&mut self, color: Rgb) -> Result<(), String>;
    fn fill_rect(&mut self, rect: Rect, color: Rgb) -> Result<(), String>;

    /// 将本帧内容刷新到显示器
    fn present(&mut self);
}
