use std::fmt;
use tessera_common::{Error, Result, SourceKind};
use tessera_gpu::{Destination, MapAccess, map_scoped};

/// How a source's bytes reach a destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Already contiguous in destination representation; written as is.
    Direct,
    /// Transcoded straight into a write mapping of the destination.
    Indirect,
}

/// Summary of one slot of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Descriptor {
    pub element_size: usize,
    pub alignment: usize,
    pub slots: usize,
    pub strategy: Strategy,
}

/// Describes how a source type's data reaches GPU storage.
///
/// A source exposes `SLOTS` slots; each may carry a channel or be absent
/// (a mesh without UVs). Direct types override
/// [`contiguous`](Self::contiguous), indirect ones [`copy`](Self::copy).
/// Types without change tracking keep the defaults and always re-upload.
pub trait Transfer {
    /// Logical channel id. Single-slot sources use `()`.
    type Channel: Copy + fmt::Debug;

    const KIND: SourceKind;
    const STRATEGY: Strategy;
    const SLOTS: usize;

    fn slot(&self, slot: usize) -> Option<Self::Channel>;

    /// Logical element count: vertices, texels, or one block.
    fn count(&self) -> usize;

    /// Elements stored in `slot`. Index slots override this.
    fn elements(&self, _slot: usize) -> usize {
        self.count()
    }

    /// Components per element.
    fn dim(&self, slot: usize) -> usize;

    /// Bytes per element in destination representation.
    fn element_size(&self, slot: usize) -> usize;

    fn alignment(&self, slot: usize) -> usize;

    fn contiguous(&self, _slot: usize) -> &[u8] {
        &[]
    }

    /// Writes `slot` into `dst`, which is exactly [`byte_len`] bytes.
    fn copy(&self, slot: usize, dst: &mut [u8]) -> Result<()> {
        let src = self.contiguous(slot);
        if src.len() != dst.len() {
            return Err(Error::config(format!(
                "slot {slot} holds {} bytes, destination expects {}",
                src.len(),
                dst.len()
            )));
        }
        dst.copy_from_slice(src);
        Ok(())
    }

    fn is_changed(&self) -> bool {
        true
    }

    fn mark_applied(&mut self) {}

    fn descriptor(&self, slot: usize) -> Descriptor {
        Descriptor {
            element_size: self.element_size(slot),
            alignment: self.alignment(slot),
            slots: Self::SLOTS,
            strategy: Self::STRATEGY,
        }
    }
}

/// Bytes `slot` occupies in its destination.
pub fn byte_len<T: Transfer + ?Sized>(source: &T, slot: usize) -> usize {
    source.elements(slot) * source.element_size(slot)
}

/// Slots that carry a channel, with that channel.
pub fn present_slots<T: Transfer + ?Sized>(source: &T) -> impl Iterator<Item = (usize, T::Channel)> + '_ {
    (0..T::SLOTS).filter_map(move |slot| source.slot(slot).map(|channel| (slot, channel)))
}

/// Moves one slot into `dst` using the type's strategy. Returns the number
/// of bytes transferred.
pub fn upload_slot<T, D>(source: &T, slot: usize, dst: &mut D) -> Result<usize>
where
    T: Transfer + ?Sized,
    D: Destination + ?Sized,
{
    let len = byte_len(source, slot);
    if len == 0 {
        return Err(Error::config(format!(
            "slot {slot} of `{}` is empty",
            dst.label()
        )));
    }
    match T::STRATEGY {
        Strategy::Direct => {
            let bytes = source.contiguous(slot);
            if bytes.len() != len {
                return Err(Error::config(format!(
                    "direct slot {slot} exposes {} bytes, descriptor says {len}",
                    bytes.len()
                )));
            }
            dst.write(bytes)?;
        }
        Strategy::Indirect => {
            map_scoped(dst, MapAccess::Write, len, |bytes| source.copy(slot, bytes))?;
        }
    }
    tracing::trace!(label = dst.label(), slot, bytes = len, strategy = ?T::STRATEGY, "uploaded slot");
    Ok(len)
}

/// Uploads every `(slot, destination)` pair. Returns the total bytes moved.
pub fn upload_all<T>(source: &T, targets: &mut [(usize, &mut dyn Destination)]) -> Result<usize>
where
    T: Transfer + ?Sized,
{
    let mut total = 0;
    for (slot, dst) in targets.iter_mut() {
        total += upload_slot(source, *slot, &mut **dst)?;
    }
    Ok(total)
}
