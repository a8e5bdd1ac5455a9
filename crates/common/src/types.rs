use std::fmt;

/// Stable handle to a CPU-side source, issued by the store that owns it.
///
/// The generation is bumped every time a slot is vacated, so a handle that
/// outlives its source can never alias whatever lands in the slot next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId {
    index: u32,
    generation: u32,
}

impl SourceId {
    pub const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    pub const fn index(self) -> u32 {
        self.index
    }

    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

/// What kind of CPU data a source holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SourceKind {
    Mesh,
    Image,
    Properties,
    Shader,
    Target,
}

impl SourceKind {
    pub const fn name(self) -> &'static str {
        match self {
            SourceKind::Mesh => "mesh",
            SourceKind::Image => "image",
            SourceKind::Properties => "properties",
            SourceKind::Shader => "shader",
            SourceKind::Target => "target",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What kind of GPU object a binding materializes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AssetKind {
    /// One vertex buffer per present channel plus an optional index buffer.
    Attributes,
    Texture,
    /// A uniform block laid out by the layout compiler.
    Uniform,
    Shader,
    Target,
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AssetKind::Attributes => "attributes",
            AssetKind::Texture => "texture",
            AssetKind::Uniform => "uniform",
            AssetKind::Shader => "shader",
            AssetKind::Target => "target",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_ids_differ_by_generation() {
        let a = SourceId::new(3, 0);
        let b = SourceId::new(3, 1);
        assert_ne!(a, b);
        assert_eq!(a.index(), b.index());
        assert_eq!(b.to_string(), "3v1");
    }

    #[test]
    fn kinds_display() {
        assert_eq!(SourceKind::Properties.to_string(), "properties");
        assert_eq!(AssetKind::Uniform.to_string(), "uniform");
    }
}
