use tessera_common::{Error, Result};

/// Tightly packed RGBA8 image, row-major from the top-left texel.
#[derive(Debug, Clone)]
pub struct Image {
    width: u32,
    height: u32,
    texels: Vec<[u8; 4]>,
    changed: bool,
}

impl Image {
    pub fn new(width: u32, height: u32, texels: Vec<[u8; 4]>) -> Result<Self> {
        let expected = width as usize * height as usize;
        if texels.len() != expected {
            return Err(Error::config(format!(
                "{width}x{height} image needs {expected} texels, got {}",
                texels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            texels,
            changed: true,
        })
    }

    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        Self {
            width,
            height,
            texels: vec![rgba; width as usize * height as usize],
            changed: true,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn texel_count(&self) -> usize {
        self.texels.len()
    }

    pub fn texel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        self.index(x, y).map(|i| self.texels[i])
    }

    pub fn set_texel(&mut self, x: u32, y: u32, rgba: [u8; 4]) -> Result<()> {
        let i = self.index(x, y).ok_or_else(|| {
            Error::config(format!(
                "texel ({x}, {y}) outside {}x{} image",
                self.width, self.height
            ))
        })?;
        self.texels[i] = rgba;
        self.changed = true;
        Ok(())
    }

    /// The texels as raw bytes, four per texel.
    pub fn bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.texels)
    }

    pub fn is_changed(&self) -> bool {
        self.changed
    }

    pub fn mark_applied(&mut self) {
        self.changed = false;
    }

    fn index(&self, x: u32, y: u32) -> Option<usize> {
        (x < self.width && y < self.height).then(|| (y * self.width + x) as usize)
    }
}
