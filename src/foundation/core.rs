use crate::foundation::error::{GenError, GenResult};

/// Fixed output size every layer is normalized to before stacking.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> GenResult<Self> {
        let canvas = Self { width, height };
        canvas.validate()?;
        Ok(canvas)
    }

    pub fn validate(self) -> GenResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(GenError::validation("canvas width/height must be > 0"));
        }
        Ok(())
    }

    /// Length of a tightly packed RGBA8 buffer for this canvas.
    pub fn rgba_len(self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}

impl Default for Canvas {
    fn default() -> Self {
        Self {
            width: 1198,
            height: 1498,
        }
    }
}
