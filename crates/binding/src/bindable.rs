use tessera_assets::{Channel, Image, Mesh, PropertySet, ShaderProgram, SourceType, TargetDesc};
use tessera_common::{AssetKind, Error, Result};
use tessera_gpu::{
    AttributeBuffers, BufferUsage, Device, Extent, GpuBuffer, GpuShader, GpuTarget, GpuTexture,
    Shared,
};
use tessera_transfer::{Transfer, TransferRegistry, byte_len, index_format, present_slots, upload_slot};

/// A cached GPU asset of any kind.
#[derive(Debug, Clone)]
pub enum BoundAsset {
    Attributes(Shared<AttributeBuffers>),
    Texture(Shared<GpuTexture>),
    Uniform(Shared<GpuBuffer>),
    Shader(Shared<GpuShader>),
    Target(Shared<GpuTarget>),
}

impl BoundAsset {
    pub fn kind(&self) -> AssetKind {
        match self {
            BoundAsset::Attributes(_) => AssetKind::Attributes,
            BoundAsset::Texture(_) => AssetKind::Texture,
            BoundAsset::Uniform(_) => AssetKind::Uniform,
            BoundAsset::Shader(_) => AssetKind::Shader,
            BoundAsset::Target(_) => AssetKind::Target,
        }
    }
}

/// A source type the cache can materialize on the GPU.
///
/// `allocate` builds the empty destination, `upload` fills it from the
/// current source state and returns the number of transfers issued.
pub trait Bindable: SourceType {
    type Asset: 'static;
    const ASSET: AssetKind;

    /// Rejects sources the cache must not materialize.
    fn validate(&self, registry: &TransferRegistry) -> Result<()>;
    fn allocate(&self, device: &mut dyn Device, label: &str) -> Result<Self::Asset>;
    fn upload(&self, asset: &mut Self::Asset) -> Result<usize>;
    fn needs_refresh(&self) -> bool;
    fn mark_refreshed(&mut self);

    fn into_bound(asset: Shared<Self::Asset>) -> BoundAsset;
    fn from_bound(bound: &BoundAsset) -> Option<&Shared<Self::Asset>>;
}

macro_rules! bound_variant {
    ($variant:ident) => {
        fn into_bound(asset: Shared<Self::Asset>) -> BoundAsset {
            BoundAsset::$variant(asset)
        }

        fn from_bound(bound: &BoundAsset) -> Option<&Shared<Self::Asset>> {
            match bound {
                BoundAsset::$variant(asset) => Some(asset),
                _ => None,
            }
        }
    };
}

macro_rules! transfer_tracking {
    () => {
        fn validate(&self, registry: &TransferRegistry) -> Result<()> {
            registry.validate(self)
        }

        fn needs_refresh(&self) -> bool {
            Transfer::is_changed(self)
        }

        fn mark_refreshed(&mut self) {
            Transfer::mark_applied(self);
        }
    };
}

fn gpu_count(value: usize, what: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| Error::config(format!("{value} {what} exceed the driver limit")))
}

/// A bound attribute set keeps its streams and index layout for life, so a
/// mesh may not drop a channel or change its index count after binding.
fn check_bound_channels(mesh: &Mesh, asset: &AttributeBuffers) -> Result<()> {
    for stream in asset.streams() {
        let channel = Channel::ALL
            .get(stream.location as usize)
            .copied()
            .ok_or_else(|| Error::config(format!("no mesh channel at location {}", stream.location)))?;
        if !mesh.has(channel) {
            return Err(Error::config(format!(
                "mesh dropped its {} channel after it was bound",
                channel.name()
            )));
        }
    }
    if let Some((_, format)) = asset.index() {
        if !mesh.has(Channel::Index) {
            return Err(Error::config("mesh dropped its index channel after it was bound"));
        }
        if format != index_format(mesh) || asset.index_count() as usize != mesh.index_count() {
            return Err(Error::config(format!(
                "mesh index layout changed from {} {format:?} indices to {} {:?} after it was bound",
                asset.index_count(),
                mesh.index_count(),
                index_format(mesh)
            )));
        }
    }
    Ok(())
}

impl Bindable for Mesh {
    type Asset = AttributeBuffers;
    const ASSET: AssetKind = AssetKind::Attributes;

    transfer_tracking!();

    fn allocate(&self, device: &mut dyn Device, label: &str) -> Result<AttributeBuffers> {
        let mut attributes = AttributeBuffers::new(label, gpu_count(self.vertex_count(), "vertices")?);
        for (slot, channel) in present_slots(self) {
            let usage = match channel {
                Channel::Index => BufferUsage::Index,
                _ => BufferUsage::Vertex,
            };
            let mut buffer = GpuBuffer::new(device, format!("{label}/{}", channel.name()), usage);
            buffer.set_size(byte_len(self, slot))?;
            match channel {
                Channel::Index => attributes.set_index(
                    buffer,
                    index_format(self),
                    gpu_count(self.index_count(), "indices")?,
                ),
                _ => attributes.add_stream(slot as u32, self.dim(slot) as u32, buffer),
            }
        }
        Ok(attributes)
    }

    fn upload(&self, asset: &mut AttributeBuffers) -> Result<usize> {
        check_bound_channels(self, asset)?;
        let mut uploads = 0;
        for (slot, channel) in present_slots(self) {
            let buffer = match channel {
                Channel::Index => asset.index_mut(),
                _ => asset.stream_mut(slot as u32),
            };
            let buffer = buffer.ok_or_else(|| {
                Error::config(format!("mesh gained a {} channel after it was bound", channel.name()))
            })?;
            buffer.set_size(byte_len(self, slot))?;
            upload_slot(self, slot, buffer)?;
            uploads += 1;
        }
        Ok(uploads)
    }

    bound_variant!(Attributes);
}

impl Bindable for Image {
    type Asset = GpuTexture;
    const ASSET: AssetKind = AssetKind::Texture;

    transfer_tracking!();

    fn allocate(&self, device: &mut dyn Device, label: &str) -> Result<GpuTexture> {
        let mut texture = GpuTexture::new(device, label);
        texture.set_extent(Extent::new(self.width(), self.height()))?;
        Ok(texture)
    }

    fn upload(&self, asset: &mut GpuTexture) -> Result<usize> {
        asset.set_extent(Extent::new(self.width(), self.height()))?;
        upload_slot(self, 0, asset)?;
        Ok(1)
    }

    bound_variant!(Texture);
}

impl Bindable for PropertySet {
    type Asset = GpuBuffer;
    const ASSET: AssetKind = AssetKind::Uniform;

    transfer_tracking!();

    fn allocate(&self, device: &mut dyn Device, label: &str) -> Result<GpuBuffer> {
        let mut buffer = GpuBuffer::new(device, label, BufferUsage::Uniform);
        buffer.set_size(byte_len(self, 0))?;
        Ok(buffer)
    }

    fn upload(&self, asset: &mut GpuBuffer) -> Result<usize> {
        upload_slot(self, 0, asset)?;
        Ok(1)
    }

    bound_variant!(Uniform);
}

impl Bindable for ShaderProgram {
    type Asset = GpuShader;
    const ASSET: AssetKind = AssetKind::Shader;

    fn validate(&self, _registry: &TransferRegistry) -> Result<()> {
        if self.vertex().trim().is_empty() || self.fragment().trim().is_empty() {
            return Err(Error::config(format!(
                "shader program `{}` has an empty stage",
                self.label()
            )));
        }
        Ok(())
    }

    fn allocate(&self, device: &mut dyn Device, label: &str) -> Result<GpuShader> {
        let label = format!("{label}/{}", self.label());
        Ok(GpuShader::new(device, label, self.vertex(), self.fragment()))
    }

    /// Recompiles from the current sources.
    fn upload(&self, asset: &mut GpuShader) -> Result<usize> {
        asset.set_sources(self.vertex(), self.fragment());
        asset.compile()?;
        Ok(1)
    }

    fn needs_refresh(&self) -> bool {
        self.is_changed()
    }

    fn mark_refreshed(&mut self) {
        self.mark_applied();
    }

    bound_variant!(Shader);
}

impl Bindable for TargetDesc {
    type Asset = GpuTarget;
    const ASSET: AssetKind = AssetKind::Target;

    fn validate(&self, _registry: &TransferRegistry) -> Result<()> {
        Ok(())
    }

    fn allocate(&self, device: &mut dyn Device, label: &str) -> Result<GpuTarget> {
        let label = format!("{label}/{}", self.label());
        GpuTarget::new(device, label, Extent::new(self.width(), self.height()))
    }

    fn upload(&self, asset: &mut GpuTarget) -> Result<usize> {
        let extent = Extent::new(self.width(), self.height());
        if asset.extent() != extent {
            return Err(Error::config(format!(
                "target `{}` cannot be resized from {}x{} to {}x{}",
                self.label(),
                asset.extent().width,
                asset.extent().height,
                extent.width,
                extent.height
            )));
        }
        asset.set_clear_color(self.clear_color());
        Ok(0)
    }

    fn needs_refresh(&self) -> bool {
        self.is_changed()
    }

    fn mark_refreshed(&mut self) {
        self.mark_applied();
    }

    bound_variant!(Target);
}
