use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgb as Pixel, RgbImage, RgbaImage};

use crate::common::Rgb;
use crate::error::CaptureError;

/// RGB 表示的一帧画面
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    image: RgbImage,
}

impl Frame {
    pub fn new(width: u32, height: u32) -> Self {
        Frame {
            image: RgbImage::new(width, height),
        }
    }

    /// 从 RGBA 图像中截取 (left, top) 起 width x height 的区域, 丢弃 alpha 通道
    pub fn from_rgba(rgba: &RgbaImage, left: u32, top: u32, width: u32, height: u32) -> Result<Self, CaptureError> {
        let fits = |start: u32, len: u32, limit: u32| start.checked_add(len).map_or(false, |end| end <= limit);
        if !fits(left, width, rgba.width()) || !fits(top, height, rgba.height()) {
            return Err(CaptureError::Screen(format!(
                "{}x{} at ({}, {}) is outside the {}x{} image",
                width,
                height,
                left,
                top,
                rgba.width(),
                rgba.height()
            )));
        }
        let cropped = imageops::crop_imm(rgba, left, top, width, height).to_image();
        Ok(Frame {
            image: DynamicImage::ImageRgba8(cropped).into_rgb8(),
        })
    }

    /// Nearest-neighbour resize
    pub fn resized(&self, width: u32, height: u32) -> Frame {
        Frame {
            image: imageops::resize(&self.image, width, height, FilterType::Nearest),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn data(&self) -> &[u8] {
        self.image.as_raw()
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, rgb: Rgb) {
        if x >= self.width() || y >= self.height() {
            log::warn!("Attempt to set pixel at ({}, {}) which is out of frame", x, y);
            return;
        }
        self.image.put_pixel(x, y, Pixel([rgb.0, rgb.1, rgb.2]));
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgb> {
        self.image.get_pixel_checked(x, y).map(|p| (p[0], p[1], p[2]))
    }
}
