use glam::{Vec2, Vec3, Vec4};
use tessera_common::{Error, Result};

/// Logical attribute channels of a mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Channel {
    Position,
    Normal,
    TexCoord,
    Color,
    Index,
}

impl Channel {
    pub const ALL: [Channel; 5] = [
        Channel::Position,
        Channel::Normal,
        Channel::TexCoord,
        Channel::Color,
        Channel::Index,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Channel::Position => "position",
            Channel::Normal => "normal",
            Channel::TexCoord => "tex_coord",
            Channel::Color => "color",
            Channel::Index => "index",
        }
    }
}

/// Indexed triangle mesh with optional per-vertex channels.
///
/// An optional channel is either empty (absent) or exactly one entry per
/// position. Every mutation marks the mesh changed.
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    positions: Vec<Vec3>,
    normals: Vec<Vec3>,
    tex_coords: Vec<Vec2>,
    colors: Vec<Vec4>,
    indices: Vec<u32>,
    changed: bool,
}

impl Mesh {
    pub fn new(positions: Vec<Vec3>) -> Self {
        Self {
            positions,
            changed: true,
            ..Self::default()
        }
    }

    /// Unit quad in the XY plane with normals, UVs and two triangles.
    pub fn quad() -> Self {
        let mut mesh = Self::new(vec![
            Vec3::new(-0.5, -0.5, 0.0),
            Vec3::new(0.5, -0.5, 0.0),
            Vec3::new(0.5, 0.5, 0.0),
            Vec3::new(-0.5, 0.5, 0.0),
        ]);
        mesh.normals = vec![Vec3::Z; 4];
        mesh.tex_coords = vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(0.0, 1.0),
        ];
        mesh.indices = vec![0, 1, 2, 2, 3, 0];
        mesh
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    pub fn has(&self, channel: Channel) -> bool {
        match channel {
            Channel::Position => !self.positions.is_empty(),
            Channel::Normal => !self.normals.is_empty(),
            Channel::TexCoord => !self.tex_coords.is_empty(),
            Channel::Color => !self.colors.is_empty(),
            Channel::Index => !self.indices.is_empty(),
        }
    }

    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    pub fn normals(&self) -> &[Vec3] {
        &self.normals
    }

    pub fn tex_coords(&self) -> &[Vec2] {
        &self.tex_coords
    }

    pub fn colors(&self) -> &[Vec4] {
        &self.colors
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Mutable positions; the vertex count cannot change through this view.
    pub fn positions_mut(&mut self) -> &mut [Vec3] {
        self.changed = true;
        &mut self.positions
    }

    pub fn set_normals(&mut self, normals: Vec<Vec3>) -> Result<()> {
        self.check_channel_len(Channel::Normal, normals.len())?;
        self.normals = normals;
        self.changed = true;
        Ok(())
    }

    pub fn set_tex_coords(&mut self, tex_coords: Vec<Vec2>) -> Result<()> {
        self.check_channel_len(Channel::TexCoord, tex_coords.len())?;
        self.tex_coords = tex_coords;
        self.changed = true;
        Ok(())
    }

    pub fn set_colors(&mut self, colors: Vec<Vec4>) -> Result<()> {
        self.check_channel_len(Channel::Color, colors.len())?;
        self.colors = colors;
        self.changed = true;
        Ok(())
    }

    pub fn set_indices(&mut self, indices: Vec<u32>) -> Result<()> {
        let count = self.vertex_count();
        if let Some(bad) = indices.iter().find(|&&i| i as usize >= count) {
            return Err(Error::config(format!(
                "index {bad} out of range for {count} vertices"
            )));
        }
        self.indices = indices;
        self.changed = true;
        Ok(())
    }

    pub fn is_changed(&self) -> bool {
        self.changed
    }

    pub fn mark_applied(&mut self) {
        self.changed = false;
    }

    fn check_channel_len(&self, channel: Channel, len: usize) -> Result<()> {
        if len != 0 && len != self.vertex_count() {
            return Err(Error::config(format!(
                "{} channel has {len} entries, mesh has {} vertices",
                channel.name(),
                self.vertex_count()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quad_has_expected_channels() {
        let quad = Mesh::quad();
        assert_eq!(quad.vertex_count(), 4);
        assert_eq!(quad.index_count(), 6);
        assert!(quad.has(Channel::Normal));
        assert!(quad.has(Channel::TexCoord));
        assert!(!quad.has(Channel::Color));
    }

    #[test]
    fn channel_length_must_match_positions() {
        let mut mesh = Mesh::new(vec![Vec3::ZERO; 3]);
        assert!(mesh.set_colors(vec![Vec4::ONE; 2]).is_err());
        assert!(mesh.set_colors(vec![Vec4::ONE; 3]).is_ok());
        // clearing a channel is always allowed
        assert!(mesh.set_colors(Vec::new()).is_ok());
        assert!(!mesh.has(Channel::Color));
    }

    #[test]
    fn indices_must_reference_vertices() {
        let mut mesh = Mesh::new(vec![Vec3::ZERO; 3]);
        let err = mesh.set_indices(vec![0, 1, 3]).unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn mutation_marks_changed() {
        let mut mesh = Mesh::quad();
        mesh.mark_applied();
        assert!(!mesh.is_changed());
        mesh.positions_mut()[0].x = 2.0;
        assert!(mesh.is_changed());
    }
}
