use crate::layout::PropertyLayout;
use crate::value::Property;
use tessera_common::{Error, Result};

/// CPU-side values for one property block, stored in block representation.
///
/// Every successful [`set`](Self::set) marks the set as changed until the
/// consumer calls [`mark_applied`](Self::mark_applied).
#[derive(Debug, Clone)]
pub struct PropertySet {
    layout: PropertyLayout,
    data: Vec<u8>,
    changed: bool,
}

impl PropertySet {
    /// Zero-initialized values for `layout`. A fresh set counts as changed.
    pub fn new(layout: PropertyLayout) -> Self {
        let data = vec![0; layout.size()];
        Self {
            layout,
            data,
            changed: true,
        }
    }

    pub fn layout(&self) -> &PropertyLayout {
        &self.layout
    }

    /// The encoded block, `layout().size()` bytes long.
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn set<T: Property>(&mut self, name: &str, value: T) -> Result<()> {
        let (offset, size) = self.locate::<T>(name)?;
        value.encode(&mut self.data[offset..offset + size]);
        self.changed = true;
        Ok(())
    }

    pub fn get<T: Property>(&self, name: &str) -> Result<T> {
        let (offset, size) = self.locate::<T>(name)?;
        Ok(T::decode(&self.data[offset..offset + size]))
    }

    pub fn is_changed(&self) -> bool {
        self.changed
    }

    pub fn mark_applied(&mut self) {
        self.changed = false;
    }

    fn locate<T: Property>(&self, name: &str) -> Result<(usize, usize)> {
        let field = self
            .layout
            .field(name)
            .ok_or_else(|| Error::config(format!("no property named `{name}`")))?;
        if field.ty() != T::TYPE {
            return Err(Error::TypeMismatch {
                expected: field.ty().glsl_name(),
                found: T::TYPE.glsl_name(),
            });
        }
        Ok((field.offset(), field.size()))
    }
}
