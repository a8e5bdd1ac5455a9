use crate::backend::{BufferUsage, Device, Extent, MapAccess, RawHandle, StorageBackend, StorageShape};
use tessera_common::{Error, Result};

/// Something a transfer can write into: a buffer or a texture.
pub trait Destination {
    fn label(&self) -> &str;
    /// Size in bytes, zero until set.
    fn size(&self) -> usize;
    fn write(&mut self, data: &[u8]) -> Result<()>;
    fn start_map(&mut self, access: MapAccess, size: usize) -> Result<&mut [u8]>;
    fn stop_map(&mut self) -> Result<()>;
}

/// Maps `size` bytes of `dst`, runs `f` on them and unmaps, also when `f`
/// fails. The first error wins.
pub fn map_scoped<D, R>(
    dst: &mut D,
    access: MapAccess,
    size: usize,
    f: impl FnOnce(&mut [u8]) -> Result<R>,
) -> Result<R>
where
    D: Destination + ?Sized,
{
    let bytes = dst.start_map(access, size)?;
    let result = f(bytes);
    let closed = dst.stop_map();
    let value = result?;
    closed?;
    Ok(value)
}

/// Shared lifecycle of buffers and textures: lazy creation, fixed size,
/// non-nesting maps, destruction on drop.
struct Storage {
    label: String,
    backend: Box<dyn StorageBackend>,
    shape: Option<StorageShape>,
    handle: Option<RawHandle>,
    mapped: bool,
}

impl Storage {
    fn new(device: &mut dyn Device, label: String) -> Self {
        let backend = device.storage(&label);
        Self {
            label,
            backend,
            shape: None,
            handle: None,
            mapped: false,
        }
    }

    fn size(&self) -> usize {
        self.shape.map_or(0, StorageShape::byte_size)
    }

    fn set_shape(&mut self, shape: StorageShape) -> Result<()> {
        if shape.byte_size() == 0 {
            return Err(Error::config(format!("`{}` cannot have zero size", self.label)));
        }
        match self.shape {
            None => {
                self.shape = Some(shape);
                Ok(())
            }
            Some(current) if current == shape => Ok(()),
            Some(current) => Err(Error::config(format!(
                "`{}` is {} bytes and cannot be resized to {}",
                self.label,
                current.byte_size(),
                shape.byte_size()
            ))),
        }
    }

    fn create(&mut self) -> Result<RawHandle> {
        if let Some(handle) = self.handle {
            return Ok(handle);
        }
        let shape = self
            .shape
            .ok_or_else(|| Error::config(format!("`{}` has no size yet", self.label)))?;
        let handle = self.backend.create(shape)?;
        tracing::debug!(label = %self.label, bytes = shape.byte_size(), "created storage");
        self.handle = Some(handle);
        Ok(handle)
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        if self.mapped {
            return Err(Error::config(format!("`{}` is mapped", self.label)));
        }
        if data.len() > self.size() {
            return Err(Error::config(format!(
                "{} bytes do not fit in `{}` ({} bytes)",
                data.len(),
                self.label,
                self.size()
            )));
        }
        let handle = self.create()?;
        self.backend.write(handle, data)
    }

    fn start_map(&mut self, access: MapAccess, size: usize) -> Result<&mut [u8]> {
        if self.mapped {
            return Err(Error::config(format!("`{}` is already mapped", self.label)));
        }
        if size > self.size() {
            return Err(Error::config(format!(
                "cannot map {size} bytes of `{}` ({} bytes)",
                self.label,
                self.size()
            )));
        }
        let handle = self.create()?;
        let bytes = self.backend.start_map(handle, access, size)?;
        self.mapped = true;
        Ok(bytes)
    }

    fn stop_map(&mut self) -> Result<()> {
        let handle = match (self.mapped, self.handle) {
            (true, Some(handle)) => handle,
            _ => return Err(Error::config(format!("`{}` is not mapped", self.label))),
        };
        self.mapped = false;
        self.backend.stop_map(handle)
    }

    fn destroy(&mut self) {
        if let Some(handle) = self.handle.take() {
            if self.mapped {
                self.mapped = false;
                if let Err(err) = self.backend.stop_map(handle) {
                    tracing::warn!(label = %self.label, %err, "unmap during destroy failed");
                }
            }
            self.backend.destroy(handle);
            tracing::debug!(label = %self.label, "destroyed storage");
        }
    }
}

impl Drop for Storage {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage")
            .field("label", &self.label)
            .field("shape", &self.shape)
            .field("handle", &self.handle)
            .field("mapped", &self.mapped)
            .finish()
    }
}

/// A GPU buffer. Its size is fixed the first time it is set.
#[derive(Debug)]
pub struct GpuBuffer {
    storage: Storage,
    usage: BufferUsage,
}

impl GpuBuffer {
    pub fn new(device: &mut dyn Device, label: impl Into<String>, usage: BufferUsage) -> Self {
        Self {
            storage: Storage::new(device, label.into()),
            usage,
        }
    }

    pub fn usage(&self) -> BufferUsage {
        self.usage
    }

    /// Fixes the size. Setting the same size again is a no-op; zero or a
    /// different size is a configuration error.
    pub fn set_size(&mut self, size: usize) -> Result<()> {
        self.storage.set_shape(StorageShape::Buffer {
            usage: self.usage,
            size,
        })
    }

    pub fn is_created(&self) -> bool {
        self.storage.handle.is_some()
    }

    pub fn raw(&self) -> Option<RawHandle> {
        self.storage.handle
    }

    /// Allocates on the driver if not done yet.
    pub fn create(&mut self) -> Result<RawHandle> {
        self.storage.create()
    }

    pub fn destroy(&mut self) {
        self.storage.destroy();
    }
}

impl Destination for GpuBuffer {
    fn label(&self) -> &str {
        &self.storage.label
    }

    fn size(&self) -> usize {
        self.storage.size()
    }

    /// Writes from offset zero, sizing an unsized buffer to `data`.
    fn write(&mut self, data: &[u8]) -> Result<()> {
        if self.storage.shape.is_none() {
            self.set_size(data.len())?;
        }
        self.storage.write(data)
    }

    fn start_map(&mut self, access: MapAccess, size: usize) -> Result<&mut [u8]> {
        if self.storage.shape.is_none() {
            self.set_size(size)?;
        }
        self.storage.start_map(access, size)
    }

    fn stop_map(&mut self) -> Result<()> {
        self.storage.stop_map()
    }
}

/// An RGBA8 texture. Its extent is fixed the first time it is set.
#[derive(Debug)]
pub struct GpuTexture {
    storage: Storage,
}

impl GpuTexture {
    pub fn new(device: &mut dyn Device, label: impl Into<String>) -> Self {
        Self {
            storage: Storage::new(device, label.into()),
        }
    }

    pub fn set_extent(&mut self, extent: Extent) -> Result<()> {
        self.storage.set_shape(StorageShape::Texture { extent })
    }

    pub fn extent(&self) -> Option<Extent> {
        match self.storage.shape {
            Some(StorageShape::Texture { extent }) => Some(extent),
            _ => None,
        }
    }

    pub fn is_created(&self) -> bool {
        self.storage.handle.is_some()
    }

    pub fn raw(&self) -> Option<RawHandle> {
        self.storage.handle
    }

    pub fn create(&mut self) -> Result<RawHandle> {
        self.storage.create()
    }

    pub fn destroy(&mut self) {
        self.storage.destroy();
    }
}

impl Destination for GpuTexture {
    fn label(&self) -> &str {
        &self.storage.label
    }

    fn size(&self) -> usize {
        self.storage.size()
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        self.storage.write(data)
    }

    fn start_map(&mut self, access: MapAccess, size: usize) -> Result<&mut [u8]> {
        self.storage.start_map(access, size)
    }

    fn stop_map(&mut self) -> Result<()> {
        self.storage.stop_map()
    }
}
