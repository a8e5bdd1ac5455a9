use crate::backend::{
    Device, DrawCall, Extent, IndexFormat, RawHandle, ShaderBackend, StreamBinding, TargetBackend,
};
use crate::storage::{Destination, GpuBuffer, GpuTexture};
use tessera_common::{Error, Result};

/// One vertex buffer bound at a shader attribute location.
#[derive(Debug)]
pub struct VertexStream {
    pub location: u32,
    pub dim: u32,
    pub buffer: GpuBuffer,
}

/// The GPU side of an attribute set: one buffer per present channel and an
/// optional index buffer.
#[derive(Debug)]
pub struct AttributeBuffers {
    label: String,
    streams: Vec<VertexStream>,
    index: Option<(GpuBuffer, IndexFormat)>,
    vertex_count: u32,
    index_count: u32,
}

impl AttributeBuffers {
    pub fn new(label: impl Into<String>, vertex_count: u32) -> Self {
        Self {
            label: label.into(),
            streams: Vec::new(),
            index: None,
            vertex_count,
            index_count: 0,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn add_stream(&mut self, location: u32, dim: u32, buffer: GpuBuffer) {
        self.streams.push(VertexStream {
            location,
            dim,
            buffer,
        });
    }

    pub fn set_index(&mut self, buffer: GpuBuffer, format: IndexFormat, count: u32) {
        self.index = Some((buffer, format));
        self.index_count = count;
    }

    pub fn streams(&self) -> &[VertexStream] {
        &self.streams
    }

    pub fn stream_mut(&mut self, location: u32) -> Option<&mut GpuBuffer> {
        self.streams
            .iter_mut()
            .find(|s| s.location == location)
            .map(|s| &mut s.buffer)
    }

    pub fn index(&self) -> Option<(&GpuBuffer, IndexFormat)> {
        self.index.as_ref().map(|(buffer, format)| (buffer, *format))
    }

    pub fn index_mut(&mut self) -> Option<&mut GpuBuffer> {
        self.index.as_mut().map(|(buffer, _)| buffer)
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    /// Creates any buffer not yet on the driver and describes the draw.
    pub fn draw_call(&mut self) -> Result<DrawCall> {
        let mut streams = Vec::with_capacity(self.streams.len());
        for stream in &mut self.streams {
            streams.push(StreamBinding {
                location: stream.location,
                dim: stream.dim,
                buffer: stream.buffer.create()?,
            });
        }
        let index = match &mut self.index {
            Some((buffer, format)) => Some((buffer.create()?, *format)),
            None => None,
        };
        Ok(DrawCall {
            streams,
            index,
            vertex_count: self.vertex_count,
            index_count: self.index_count,
        })
    }
}

/// A shader program, compiled on first use and recompiled after its
/// sources change.
pub struct GpuShader {
    label: String,
    backend: Box<dyn ShaderBackend>,
    handle: Option<RawHandle>,
    vertex: String,
    fragment: String,
}

impl GpuShader {
    pub fn new(
        device: &mut dyn Device,
        label: impl Into<String>,
        vertex: impl Into<String>,
        fragment: impl Into<String>,
    ) -> Self {
        let label = label.into();
        let backend = device.shader(&label);
        Self {
            label,
            backend,
            handle: None,
            vertex: vertex.into(),
            fragment: fragment.into(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_compiled(&self) -> bool {
        self.handle.is_some()
    }

    /// Drops the compiled program; the next use compiles the new sources.
    pub fn set_sources(&mut self, vertex: impl Into<String>, fragment: impl Into<String>) {
        self.vertex = vertex.into();
        self.fragment = fragment.into();
        self.destroy();
    }

    pub fn compile(&mut self) -> Result<RawHandle> {
        if let Some(handle) = self.handle {
            return Ok(handle);
        }
        if self.vertex.trim().is_empty() || self.fragment.trim().is_empty() {
            return Err(Error::config(format!("shader `{}` has an empty stage", self.label)));
        }
        let handle = self.backend.compile(&self.vertex, &self.fragment)?;
        tracing::debug!(label = %self.label, "compiled shader");
        self.handle = Some(handle);
        Ok(handle)
    }

    pub fn bind(&mut self) -> Result<()> {
        let handle = self.compile()?;
        self.backend.bind(handle)
    }

    pub fn set_block(&mut self, name: &str, buffer: &mut GpuBuffer) -> Result<()> {
        let handle = self.compile()?;
        let raw = buffer.create()?;
        self.backend.set_block(handle, name, raw)
    }

    pub fn set_texture(&mut self, name: &str, unit: u32, texture: &mut GpuTexture) -> Result<()> {
        let handle = self.compile()?;
        let raw = texture.create()?;
        self.backend.set_texture(handle, name, unit, raw)
    }

    pub fn draw(&mut self, attributes: &mut AttributeBuffers) -> Result<()> {
        let handle = self.compile()?;
        let call = attributes.draw_call()?;
        if call.vertex_count == 0 {
            return Err(Error::config(format!(
                "`{}` has no vertices to draw",
                attributes.label()
            )));
        }
        self.backend.draw(handle, &call)
    }

    pub fn destroy(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.backend.destroy(handle);
        }
    }
}

impl Drop for GpuShader {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl std::fmt::Debug for GpuShader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuShader")
            .field("label", &self.label)
            .field("handle", &self.handle)
            .finish()
    }
}

/// An offscreen render target with a fixed extent.
pub struct GpuTarget {
    label: String,
    backend: Box<dyn TargetBackend>,
    handle: Option<RawHandle>,
    extent: Extent,
    clear_color: [f32; 4],
}

impl GpuTarget {
    pub fn new(device: &mut dyn Device, label: impl Into<String>, extent: Extent) -> Result<Self> {
        let label = label.into();
        if extent.is_empty() {
            return Err(Error::config(format!("target `{label}` has an empty extent")));
        }
        let backend = device.target(&label);
        Ok(Self {
            label,
            backend,
            handle: None,
            extent,
            clear_color: [0.0, 0.0, 0.0, 1.0],
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn extent(&self) -> Extent {
        self.extent
    }

    pub fn set_clear_color(&mut self, rgba: [f32; 4]) {
        self.clear_color = rgba;
    }

    pub fn bind(&mut self) -> Result<()> {
        let handle = match self.handle {
            Some(handle) => handle,
            None => {
                let handle = self.backend.create(self.extent)?;
                tracing::debug!(label = %self.label, "created target");
                self.handle = Some(handle);
                handle
            }
        };
        self.backend.bind(handle, self.clear_color)
    }
}

impl Drop for GpuTarget {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.backend.destroy(handle);
        }
    }
}

impl std::fmt::Debug for GpuTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuTarget")
            .field("label", &self.label)
            .field("extent", &self.extent)
            .field("handle", &self.handle)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BufferUsage;
    use crate::headless::{HeadlessDevice, Op};

    fn triangle(device: &mut HeadlessDevice) -> AttributeBuffers {
        let mut attributes = AttributeBuffers::new("tri", 3);
        let mut positions = GpuBuffer::new(device, "tri/position", BufferUsage::Vertex);
        positions.write(&[0; 36]).unwrap();
        attributes.add_stream(0, 3, positions);
        attributes
    }

    #[test]
    fn shader_compiles_once() {
        let mut device = HeadlessDevice::new();
        let mut shader = GpuShader::new(&mut device, "flat", "vs", "fs");
        shader.bind().unwrap();
        shader.bind().unwrap();
        let journal = device.journal();
        assert_eq!(journal.borrow().count(|op| matches!(op, Op::Compile { .. })), 1);
        assert_eq!(journal.borrow().count(|op| matches!(op, Op::BindShader { .. })), 2);
    }

    #[test]
    fn new_sources_recompile() {
        let mut device = HeadlessDevice::new();
        let mut shader = GpuShader::new(&mut device, "flat", "vs", "fs");
        shader.compile().unwrap();
        shader.set_sources("vs2", "fs2");
        assert!(!shader.is_compiled());
        shader.compile().unwrap();
        let journal = device.journal();
        assert_eq!(journal.borrow().count(|op| matches!(op, Op::Compile { .. })), 2);
    }

    #[test]
    fn empty_stage_is_rejected() {
        let mut device = HeadlessDevice::new();
        let mut shader = GpuShader::new(&mut device, "broken", "vs", "  ");
        assert!(matches!(shader.compile(), Err(Error::Configuration(_))));
    }

    #[test]
    fn draw_reports_counts() {
        let mut device = HeadlessDevice::new();
        let mut attributes = triangle(&mut device);
        let mut shader = GpuShader::new(&mut device, "flat", "vs", "fs");
        shader.draw(&mut attributes).unwrap();
        let journal = device.journal();
        let draws: Vec<Op> = journal
            .borrow()
            .ops()
            .iter()
            .filter(|op| matches!(op, Op::Draw { .. }))
            .cloned()
            .collect();
        assert_eq!(
            draws,
            vec![Op::Draw {
                shader: "flat".into(),
                streams: 1,
                vertices: 3,
                indices: 0
            }]
        );
    }

    #[test]
    fn target_rejects_empty_extent() {
        let mut device = HeadlessDevice::new();
        assert!(GpuTarget::new(&mut device, "none", Extent::new(0, 8)).is_err());
        let mut target = GpuTarget::new(&mut device, "main", Extent::new(8, 8)).unwrap();
        target.bind().unwrap();
        target.bind().unwrap();
        let journal = device.journal();
        assert_eq!(
            journal
                .borrow()
                .count(|op| matches!(op, Op::CreateTarget { .. })),
            1
        );
    }
}
