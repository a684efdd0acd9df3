//! MJPEG in an AVI (RIFF) container.
//!
//! Layout:
//! ```text
//! RIFF 'AVI '
//!   LIST 'hdrl'
//!     'avih'                      main header
//!     LIST 'strl'
//!       'strh'                    video stream header, handler MJPG
//!       'strf'                    BITMAPINFOHEADER
//!   LIST 'movi'
//!     '00dc' ...                  one JPEG per frame, padded to even length
//!   'idx1'                        keyframe index, offsets from 'movi'
//! ```
//! Frame counts and sizes are unknown until the end, so `finish` seeks back
//! and patches them.

use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;

use super::frame::Frame;
use super::FrameSink;
use crate::error::CaptureError;

const AVIF_HASINDEX: u32 = 0x10;
const AVIIF_KEYFRAME: u32 = 0x10;
const FRAME_CHUNK_ID: &[u8; 4] = b"00dc";

// 需要在 finish 时回填的字段在文件中的偏移
const RIFF_SIZE: u64 = 4;
const AVIH_MAX_BYTES_PER_SEC: u64 = 36;
const AVIH_TOTAL_FRAMES: u64 = 48;
const AVIH_SUGGESTED_BUFFER: u64 = 60;
const STRH_LENGTH: u64 = 140;
const STRH_SUGGESTED_BUFFER: u64 = 144;
const MOVI_SIZE: u64 = 216;
/// Position of the 'movi' fourcc, the base of index offsets
const MOVI_START: u64 = 220;
const HEADER_LEN: u64 = 224;

struct IndexEntry {
    offset: u32,
    size: u32,
}

pub struct MjpegWriter<W: Write + Seek> {
    inner: W,
    width: u32,
    height: u32,
    fps: f64,
    quality: u8,
    index: Vec<IndexEntry>,
    movi_end: u64,
    max_chunk: u32,
    finished: bool,
}

impl MjpegWriter<BufWriter<File>> {
    pub fn create<P: AsRef<Path>>(
        path: P,
        width: u32,
        height: u32,
        fps: f64,
        quality: u8,
    ) -> Result<Self, CaptureError> {
        let file = File::create(path.as_ref())?;
        MjpegWriter::new(BufWriter::new(file), width, height, fps, quality)
    }
}

impl<W: Write + Seek> MjpegWriter<W> {
    pub fn new(mut inner: W, width: u32, height: u32, fps: f64, quality: u8) -> Result<Self, CaptureError> {
        inner.write_all(&header(width, height, fps))?;
        Ok(MjpegWriter {
            inner,
            width,
            height,
            fps,
            quality: quality.clamp(1, 100),
            index: Vec::new(),
            movi_end: HEADER_LEN,
            max_chunk: 0,
            finished: false,
        })
    }

    pub fn frames(&self) -> usize {
        self.index.len()
    }

    #[cfg(test)]
    fn get_ref(&self) -> &W {
        &self.inner
    }

    /// RIFF sizes and index offsets are u32: refuse a chunk that would push
    /// the finished file (including its index) past what they can address
    fn write_jpeg(&mut self, jpeg: &[u8]) -> Result<(), CaptureError> {
        let size = u32::try_from(jpeg.len()).map_err(|_| self.full())?;
        let chunk_len = 8 + size as u64 + (size % 2) as u64;
        let index_len = 8 + 16 * (self.index.len() as u64 + 1);
        if self.movi_end + chunk_len + index_len - 8 > u32::MAX as u64 {
            return Err(self.full());
        }
        let offset = u32::try_from(self.movi_end - MOVI_START).map_err(|_| self.full())?;

        self.inner.write_all(FRAME_CHUNK_ID)?;
        self.inner.write_all(&size.to_le_bytes())?;
        self.inner.write_all(jpeg)?;
        if size % 2 == 1 {
            self.inner.write_all(&[0])?;
        }
        self.index.push(IndexEntry { offset, size });
        self.movi_end += chunk_len;
        self.max_chunk = self.max_chunk.max(size);
        Ok(())
    }

    fn full(&self) -> CaptureError {
        CaptureError::TooLarge { frames: self.index.len() }
    }

    fn patch(&mut self, offset: u64, value: u32) -> Result<(), CaptureError> {
        self.inner.seek(SeekFrom::Start(offset))?;
        self.inner.write_all(&value.to_le_bytes())?;
        Ok(())
    }
}

impl<W: Write + Seek> FrameSink for MjpegWriter<W> {
    fn write_frame(&mut self, frame: &Frame) -> Result<(), CaptureError> {
        if self.finished {
            return Err(CaptureError::Finished);
        }
        if frame.width() != self.width || frame.height() != self.height {
            return Err(CaptureError::FrameSize {
                width: self.width,
                height: self.height,
                actual_width: frame.width(),
                actual_height: frame.height(),
            });
        }
        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, self.quality).encode(
            frame.data(),
            frame.width(),
            frame.height(),
            ExtendedColorType::Rgb8,
        )?;
        self.write_jpeg(&jpeg)
    }

    /// Writes the index and patches the headers. Later calls do nothing.
    fn finish(&mut self) -> Result<(), CaptureError> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;

        let frames = u32::try_from(self.index.len()).map_err(|_| self.full())?;
        let index_size = frames.checked_mul(16).ok_or_else(|| self.full())?;
        let file_len = self.movi_end + 8 + index_size as u64;
        let riff_size = u32::try_from(file_len - 8).map_err(|_| self.full())?;
        let movi_size = u32::try_from(self.movi_end - MOVI_START).map_err(|_| self.full())?;

        self.inner.seek(SeekFrom::Start(self.movi_end))?;
        self.inner.write_all(b"idx1")?;
        self.inner.write_all(&index_size.to_le_bytes())?;
        for entry in &self.index {
            self.inner.write_all(FRAME_CHUNK_ID)?;
            self.inner.write_all(&AVIIF_KEYFRAME.to_le_bytes())?;
            self.inner.write_all(&entry.offset.to_le_bytes())?;
            self.inner.write_all(&entry.size.to_le_bytes())?;
        }

        let bytes_per_sec = (self.max_chunk as f64 * self.fps).min(u32::MAX as f64) as u32;
        self.patch(RIFF_SIZE, riff_size)?;
        self.patch(AVIH_MAX_BYTES_PER_SEC, bytes_per_sec)?;
        self.patch(AVIH_TOTAL_FRAMES, frames)?;
        self.patch(AVIH_SUGGESTED_BUFFER, self.max_chunk)?;
        self.patch(STRH_LENGTH, frames)?;
        self.patch(STRH_SUGGESTED_BUFFER, self.max_chunk)?;
        self.patch(MOVI_SIZE, movi_size)?;
        self.inner.seek(SeekFrom::Start(file_len))?;
        self.inner.flush()?;
        log::debug!("AVI finalized: {} frames, {} bytes", frames, file_len);
        Ok(())
    }
}

/// fps 以 rate / scale 表示, scale 取 1000 以保留小数帧率
fn header(width: u32, height: u32, fps: f64) -> Vec<u8> {
    let scale: u32 = 1000;
    let rate = (fps * scale as f64).round() as u32;
    let micros_per_frame = (1_000_000.0 / fps).round() as u32;

    let mut h = Vec::with_capacity(HEADER_LEN as usize);
    let mut put = |bytes: &[u8]| h.extend_from_slice(bytes);

    put(b"RIFF");
    put(&0u32.to_le_bytes()); // patched
    put(b"AVI ");

    put(b"LIST");
    put(&192u32.to_le_bytes());
    put(b"hdrl");

    put(b"avih");
    put(&56u32.to_le_bytes());
    put(&micros_per_frame.to_le_bytes());
    put(&0u32.to_le_bytes()); // max bytes per sec, patched
    put(&0u32.to_le_bytes()); // padding granularity
    put(&AVIF_HASINDEX.to_le_bytes());
    put(&0u32.to_le_bytes()); // total frames, patched
    put(&0u32.to_le_bytes()); // initial frames
    put(&1u32.to_le_bytes()); // streams
    put(&0u32.to_le_bytes()); // suggested buffer, patched
    put(&width.to_le_bytes());
    put(&height.to_le_bytes());
    put(&[0u8; 16]);

    put(b"LIST");
    put(&116u32.to_le_bytes());
    put(b"strl");

    put(b"strh");
    put(&56u32.to_le_bytes());
    put(b"vids");
    put(b"MJPG");
    put(&0u32.to_le_bytes()); // flags
    put(&0u16.to_le_bytes()); // priority
    put(&0u16.to_le_bytes()); // language
    put(&0u32.to_le_bytes()); // initial frames
    put(&scale.to_le_bytes());
    put(&rate.to_le_bytes());
    put(&0u32.to_le_bytes()); // start
    put(&0u32.to_le_bytes()); // length, patched
    put(&0u32.to_le_bytes()); // suggested buffer, patched
    put(&u32::MAX.to_le_bytes()); // quality, default
    put(&0u32.to_le_bytes()); // sample size
    put(&0u16.to_le_bytes());
    put(&0u16.to_le_bytes());
    put(&(width as u16).to_le_bytes());
    put(&(height as u16).to_le_bytes());

    put(b"strf");
    put(&40u32.to_le_bytes());
    put(&40u32.to_le_bytes());
    put(&(width as i32).to_le_bytes());
    put(&(height as i32).to_le_bytes());
    put(&1u16.to_le_bytes()); // planes
    put(&24u16.to_le_bytes()); // bit count
    put(b"MJPG");
    put(&(width * height * 3).to_le_bytes());
    put(&[0u8; 16]);

    put(b"LIST");
    put(&0u32.to_le_bytes()); // patched
    put(b"movi");
    h
}
