use crate::image::Image;
use crate::mesh::Mesh;
use crate::program::{ShaderProgram, TargetDesc};
use tessera_common::{Error, Result, SourceId, SourceKind};
use tessera_layout::PropertySet;

/// A source entry in the store.
#[derive(Debug, Clone)]
pub enum Source {
    Mesh(Mesh),
    Image(Image),
    Properties(PropertySet),
    Shader(ShaderProgram),
    Target(TargetDesc),
}

impl Source {
    pub fn kind(&self) -> SourceKind {
        match self {
            Source::Mesh(_) => SourceKind::Mesh,
            Source::Image(_) => SourceKind::Image,
            Source::Properties(_) => SourceKind::Properties,
            Source::Shader(_) => SourceKind::Shader,
            Source::Target(_) => SourceKind::Target,
        }
    }
}

/// A concrete type that can be stored as a [`Source`].
pub trait SourceType: Sized + 'static {
    const KIND: SourceKind;

    fn wrap(self) -> Source;
    fn view(source: &Source) -> Option<&Self>;
    fn view_mut(source: &mut Source) -> Option<&mut Self>;
}

macro_rules! source_type {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl SourceType for $ty {
                const KIND: SourceKind = SourceKind::$variant;

                fn wrap(self) -> Source {
                    Source::$variant(self)
                }

                fn view(source: &Source) -> Option<&Self> {
                    match source {
                        Source::$variant(s) => Some(s),
                        _ => None,
                    }
                }

                fn view_mut(source: &mut Source) -> Option<&mut Self> {
                    match source {
                        Source::$variant(s) => Some(s),
                        _ => None,
                    }
                }
            }
        )*
    };
}

source_type! {
    Mesh => Mesh,
    Image => Image,
    PropertySet => Properties,
    ShaderProgram => Shader,
    TargetDesc => Target,
}

#[derive(Debug, Clone, Default)]
struct Slot {
    generation: u32,
    source: Option<Source>,
}

/// Generation-counted arena owning every CPU-side source.
///
/// Ids handed out by [`insert`](Self::insert) stay valid until the source is
/// removed. Removing bumps the slot generation, so the old id resolves to
/// [`Error::UnknownSource`] even after the slot is reused.
#[derive(Debug, Clone, Default)]
pub struct SourceStore {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
}

impl SourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<S: SourceType>(&mut self, source: S) -> SourceId {
        self.insert_source(source.wrap())
    }

    pub fn insert_source(&mut self, source: Source) -> SourceId {
        self.live += 1;
        let kind = source.kind();
        let id = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.source = Some(source);
                SourceId::new(index, slot.generation)
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    source: Some(source),
                });
                SourceId::new(index, 0)
            }
        };
        tracing::trace!(%id, %kind, "source inserted");
        id
    }

    /// Removes a source, invalidating its id. Returns it if it was live.
    pub fn remove(&mut self, id: SourceId) -> Option<Source> {
        let slot = self.slot_mut(id)?;
        let source = slot.source.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index());
        self.live -= 1;
        tracing::trace!(%id, "source removed");
        Some(source)
    }

    pub fn contains(&self, id: SourceId) -> bool {
        self.source(id).is_some()
    }

    pub fn kind(&self, id: SourceId) -> Option<SourceKind> {
        self.source(id).map(Source::kind)
    }

    pub fn source(&self, id: SourceId) -> Option<&Source> {
        self.slots
            .get(id.index() as usize)
            .filter(|slot| slot.generation == id.generation())
            .and_then(|slot| slot.source.as_ref())
    }

    /// Typed access. Fails with `UnknownSource` for dead ids and
    /// `TypeMismatch` when the id holds a different kind.
    pub fn get<S: SourceType>(&self, id: SourceId) -> Result<&S> {
        let source = self.source(id).ok_or(Error::UnknownSource(id))?;
        S::view(source).ok_or_else(|| Error::kind_mismatch(S::KIND, source.kind()))
    }

    pub fn get_mut<S: SourceType>(&mut self, id: SourceId) -> Result<&mut S> {
        let source = self
            .slot_mut(id)
            .and_then(|slot| slot.source.as_mut())
            .ok_or(Error::UnknownSource(id))?;
        let found = source.kind();
        S::view_mut(source).ok_or_else(|| Error::kind_mismatch(S::KIND, found))
    }

    /// Number of live sources.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Ids of all live sources in slot order.
    pub fn ids(&self) -> impl Iterator<Item = SourceId> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.source
                .as_ref()
                .map(|_| SourceId::new(index as u32, slot.generation))
        })
    }

    fn slot_mut(&mut self, id: SourceId) -> Option<&mut Slot> {
        self.slots
            .get_mut(id.index() as usize)
            .filter(|slot| slot.generation == id.generation())
    }
}
