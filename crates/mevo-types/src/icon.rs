//! Decoded icon bitmaps and the loader seam used by the reconciler.

use std::future::Future;
use std::sync::Arc;

/// Errors constructing an [`Icon`] from raw pixel data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IconDataError {
    /// The pixel buffer does not match `width * height * 4`.
    #[error("expected {expected} RGBA bytes for {width}x{height}, got {actual}")]
    SizeMismatch {
        /// Bitmap width in pixels.
        width: u32,
        /// Bitmap height in pixels.
        height: u32,
        /// Expected byte count.
        expected: usize,
        /// Actual byte count.
        actual: usize,
    },

    /// The dimensions overflow the addressable buffer size.
    #[error("icon dimensions {width}x{height} are too large")]
    TooLarge {
        /// Bitmap width in pixels.
        width: u32,
        /// Bitmap height in pixels.
        height: u32,
    },
}

/// A decoded RGBA8 bitmap.
///
/// Pixel data is shared so commands carrying an icon can be cloned cheaply.
#[derive(Clone, PartialEq, Eq)]
pub struct Icon {
    width: u32,
    height: u32,
    rgba: Arc<[u8]>,
}

impl Icon {
    /// Wrap an RGBA8 pixel buffer.
    pub fn new(width: u32, height: u32, rgba: Vec<u8>) -> Result<Self, IconDataError> {
        let expected = usize::try_from(width)
            .ok()
            .zip(usize::try_from(height).ok())
            .and_then(|(w, h)| w.checked_mul(h))
            .and_then(|pixels| pixels.checked_mul(4))
            .ok_or(IconDataError::TooLarge { width, height })?;
        if rgba.len() != expected {
            return Err(IconDataError::SizeMismatch {
                width,
                height,
                expected,
                actual: rgba.len(),
            });
        }
        Ok(Self {
            width,
            height,
            rgba: rgba.into(),
        })
    }

    /// Width in pixels.
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Raw RGBA8 pixels, row-major.
    pub fn rgba(&self) -> &[u8] {
        &self.rgba
    }
}

impl core::fmt::Debug for Icon {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Icon")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.rgba.len())
            .finish()
    }
}

/// Something that can turn an icon URL into a bitmap.
///
/// Failure is signalled by `None`; implementations log their own errors and
/// never propagate them. The reconciler spawns one load per entity, so the
/// returned future must be `Send`.
pub trait IconLoader: Send + Sync + 'static {
    /// Fetch and decode the icon at `url`.
    fn load(&self, url: &str) -> impl Future<Output = Option<Icon>> + Send;
}
