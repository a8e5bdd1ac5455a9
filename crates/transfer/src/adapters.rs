//! One [`Transfer`] adapter per source type.

use crate::dispatch::{Strategy, Transfer};
use tessera_assets::{Channel, Image, Mesh, PropertySet};
use tessera_common::{Error, Result, SourceKind};
use tessera_gpu::IndexFormat;

/// Index width a mesh uploads with: u16 when every index fits.
pub fn index_format(mesh: &Mesh) -> IndexFormat {
    match mesh.indices().iter().max() {
        Some(&max) if max > u32::from(u16::MAX) => IndexFormat::U32,
        _ => IndexFormat::U16,
    }
}

/// Normalized float to unsigned byte, clamped.
fn unorm8(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

fn check_len(slot: usize, dst: &[u8], expected: usize) -> Result<()> {
    if dst.len() != expected {
        return Err(Error::config(format!(
            "slot {slot} needs {expected} bytes, destination holds {}",
            dst.len()
        )));
    }
    Ok(())
}

impl Transfer for Mesh {
    type Channel = Channel;

    const KIND: SourceKind = SourceKind::Mesh;
    const STRATEGY: Strategy = Strategy::Indirect;
    const SLOTS: usize = Channel::ALL.len();

    fn slot(&self, slot: usize) -> Option<Channel> {
        Channel::ALL.get(slot).copied().filter(|&c| self.has(c))
    }

    fn count(&self) -> usize {
        self.vertex_count()
    }

    fn elements(&self, slot: usize) -> usize {
        match Channel::ALL.get(slot) {
            Some(Channel::Index) => self.index_count(),
            Some(&c) if self.has(c) => self.vertex_count(),
            _ => 0,
        }
    }

    fn dim(&self, slot: usize) -> usize {
        match Channel::ALL.get(slot) {
            Some(Channel::Position | Channel::Normal) => 3,
            Some(Channel::TexCoord) => 2,
            Some(Channel::Color) => 4,
            Some(Channel::Index) => 1,
            None => 0,
        }
    }

    fn element_size(&self, slot: usize) -> usize {
        match Channel::ALL.get(slot) {
            Some(Channel::Position | Channel::Normal) => 12,
            Some(Channel::TexCoord) => 8,
            Some(Channel::Color) => 4,
            Some(Channel::Index) => index_format(self).size(),
            None => 0,
        }
    }

    fn alignment(&self, slot: usize) -> usize {
        match Channel::ALL.get(slot) {
            Some(Channel::Index) => index_format(self).size(),
            Some(_) => 4,
            None => 0,
        }
    }

    fn copy(&self, slot: usize, dst: &mut [u8]) -> Result<()> {
        let Some(channel) = Channel::ALL.get(slot).copied() else {
            return Err(Error::config(format!("mesh has no slot {slot}")));
        };
        check_len(slot, dst, self.elements(slot) * self.element_size(slot))?;
        match channel {
            Channel::Position => dst.copy_from_slice(bytemuck::cast_slice(self.positions())),
            Channel::Normal => dst.copy_from_slice(bytemuck::cast_slice(self.normals())),
            Channel::TexCoord => dst.copy_from_slice(bytemuck::cast_slice(self.tex_coords())),
            Channel::Color => {
                for (texel, color) in dst.chunks_exact_mut(4).zip(self.colors()) {
                    for (byte, component) in texel.iter_mut().zip(color.to_array()) {
                        *byte = unorm8(component);
                    }
                }
            }
            Channel::Index => match index_format(self) {
                IndexFormat::U16 => {
                    for (chunk, &index) in dst.chunks_exact_mut(2).zip(self.indices()) {
                        chunk.copy_from_slice(&(index as u16).to_le_bytes());
                    }
                }
                IndexFormat::U32 => dst.copy_from_slice(bytemuck::cast_slice(self.indices())),
            },
        }
        Ok(())
    }

    fn is_changed(&self) -> bool {
        Mesh::is_changed(self)
    }

    fn mark_applied(&mut self) {
        Mesh::mark_applied(self);
    }
}

impl Transfer for Image {
    type Channel = ();

    const KIND: SourceKind = SourceKind::Image;
    const STRATEGY: Strategy = Strategy::Direct;
    const SLOTS: usize = 1;

    fn slot(&self, slot: usize) -> Option<()> {
        (slot == 0).then_some(())
    }

    fn count(&self) -> usize {
        self.texel_count()
    }

    fn dim(&self, _slot: usize) -> usize {
        4
    }

    fn element_size(&self, _slot: usize) -> usize {
        4
    }

    fn alignment(&self, _slot: usize) -> usize {
        4
    }

    fn contiguous(&self, _slot: usize) -> &[u8] {
        self.bytes()
    }

    fn is_changed(&self) -> bool {
        Image::is_changed(self)
    }

    fn mark_applied(&mut self) {
        Image::mark_applied(self);
    }
}

/// A property set uploads as one block.
impl Transfer for PropertySet {
    type Channel = ();

    const KIND: SourceKind = SourceKind::Properties;
    const STRATEGY: Strategy = Strategy::Direct;
    const SLOTS: usize = 1;

    fn slot(&self, slot: usize) -> Option<()> {
        (slot == 0).then_some(())
    }

    fn count(&self) -> usize {
        1
    }

    fn dim(&self, _slot: usize) -> usize {
        self.layout().len()
    }

    fn element_size(&self, _slot: usize) -> usize {
        self.layout().size()
    }

    fn alignment(&self, _slot: usize) -> usize {
        self.layout().alignment()
    }

    fn contiguous(&self, _slot: usize) -> &[u8] {
        self.bytes()
    }

    fn is_changed(&self) -> bool {
        PropertySet::is_changed(self)
    }

    fn mark_applied(&mut self) {
        PropertySet::mark_applied(self);
    }
}
