use thiserror::Error;

/// Error type capabilities hand back to the loop
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum LoopError {
    /// Rejected before the loop starts (rate, duration, region)
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A surface or sink could not be opened, the loop never started
    #[error("failed to acquire {resource}: {source}")]
    ResourceAcquisition {
        resource: String,
        #[source]
        source: BoxError,
    },

    /// The per-tick action failed; cleanup already ran
    #[error("tick {iteration} failed: {source}")]
    Tick {
        iteration: u64,
        #[source]
        source: BoxError,
    },

    #[error("cleanup failed: {0}")]
    Cleanup(#[source] BoxError),
}

impl LoopError {
    pub fn acquire(resource: &str, source: impl Into<BoxError>) -> Self {
        LoopError::ResourceAcquisition {
            resource: resource.to_string(),
            source: source.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("encode error: {0}")]
    Encode(#[from] image::ImageError),

    #[error("frame is {actual_width}x{actual_height}, sink expects {width}x{height}")]
    FrameSize {
        width: u32,
        height: u32,
        actual_width: u32,
        actual_height: u32,
    },

    #[error("sink already finished")]
    Finished,

    /// The container cannot address more data; frames written so far are kept
    #[error("output is full after {frames} frames")]
    TooLarge { frames: usize },

    #[error("screen error: {0}")]
    Screen(String),
}
