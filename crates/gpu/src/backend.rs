use tessera_common::Result;

/// Driver-side name of a created object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RawHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MapAccess {
    Read,
    Write,
    ReadWrite,
}

impl MapAccess {
    pub fn writes(self) -> bool {
        matches!(self, MapAccess::Write | MapAccess::ReadWrite)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferUsage {
    Vertex,
    Index,
    Uniform,
}

/// Width and height of a texture or render target, in texels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Extent {
    pub width: u32,
    pub height: u32,
}

impl Extent {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn texels(self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// What a storage object is allocated as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageShape {
    Buffer { usage: BufferUsage, size: usize },
    /// RGBA8 texture.
    Texture { extent: Extent },
}

impl StorageShape {
    pub fn byte_size(self) -> usize {
        match self {
            StorageShape::Buffer { size, .. } => size,
            StorageShape::Texture { extent } => extent.texels() * 4,
        }
    }
}

/// Driver operations on one buffer or texture.
///
/// Calls arrive already validated: `create` once with a nonzero shape,
/// maps never nest, writes never exceed the created size.
pub trait StorageBackend {
    fn create(&mut self, shape: StorageShape) -> Result<RawHandle>;
    fn destroy(&mut self, handle: RawHandle);
    fn write(&mut self, handle: RawHandle, data: &[u8]) -> Result<()>;
    fn start_map(&mut self, handle: RawHandle, access: MapAccess, size: usize) -> Result<&mut [u8]>;
    fn stop_map(&mut self, handle: RawHandle) -> Result<()>;
}

/// One vertex stream of a draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamBinding {
    pub location: u32,
    pub dim: u32,
    pub buffer: RawHandle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexFormat {
    U16,
    U32,
}

impl IndexFormat {
    pub fn size(self) -> usize {
        match self {
            IndexFormat::U16 => 2,
            IndexFormat::U32 => 4,
        }
    }
}

/// Everything a backend needs to issue one draw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawCall {
    pub streams: Vec<StreamBinding>,
    pub index: Option<(RawHandle, IndexFormat)>,
    pub vertex_count: u32,
    pub index_count: u32,
}

/// Driver operations on one shader program.
pub trait ShaderBackend {
    fn compile(&mut self, vertex: &str, fragment: &str) -> Result<RawHandle>;
    fn destroy(&mut self, handle: RawHandle);
    fn bind(&mut self, handle: RawHandle) -> Result<()>;
    fn set_block(&mut self, handle: RawHandle, name: &str, buffer: RawHandle) -> Result<()>;
    fn set_texture(&mut self, handle: RawHandle, name: &str, unit: u32, texture: RawHandle) -> Result<()>;
    fn draw(&mut self, handle: RawHandle, call: &DrawCall) -> Result<()>;
}

/// Driver operations on one render target.
pub trait TargetBackend {
    fn create(&mut self, extent: Extent) -> Result<RawHandle>;
    fn destroy(&mut self, handle: RawHandle);
    fn bind(&mut self, handle: RawHandle, clear_color: [f32; 4]) -> Result<()>;
}

/// Factory for backend objects. Nothing is allocated on the driver until the
/// wrapping asset is first used.
pub trait Device {
    fn name(&self) -> &str;
    fn storage(&mut self, label: &str) -> Box<dyn StorageBackend>;
    fn shader(&mut self, label: &str) -> Box<dyn ShaderBackend>;
    fn target(&mut self, label: &str) -> Box<dyn TargetBackend>;
}
