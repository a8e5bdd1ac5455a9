use crate::value::{Property, ValueType};
use std::collections::HashSet;
use tessera_common::{Error, Result};

/// Rounds `value` up to the next multiple of `align` (a power of two).
pub fn align_up(value: usize, align: usize) -> usize {
    debug_assert!(align.is_power_of_two());
    (value + align - 1) & !(align - 1)
}

/// One placed member of a property block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    name: String,
    ty: ValueType,
    offset: usize,
}

impl Field {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> ValueType {
        self.ty
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn size(&self) -> usize {
        self.ty.size()
    }

    pub fn alignment(&self) -> usize {
        self.ty.alignment()
    }

    /// First byte past this field.
    pub fn end(&self) -> usize {
        self.offset + self.size()
    }
}

/// Byte layout of an ordered list of typed fields.
///
/// The layout is a pure function of the type sequence: the same fields in
/// the same order always produce the same offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyLayout {
    fields: Vec<Field>,
    size: usize,
    alignment: usize,
}

impl PropertyLayout {
    /// Places every field at `align_up(previous_end, alignment)` and pads the
    /// total to the largest alignment seen.
    pub fn compile<I, S>(items: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, ValueType)>,
        S: Into<String>,
    {
        let mut fields = Vec::new();
        let mut seen = HashSet::new();
        let mut end = 0;
        let mut alignment = 1;

        for (name, ty) in items {
            let name = name.into();
            if !seen.insert(name.clone()) {
                return Err(Error::config(format!("duplicate property `{name}`")));
            }
            let offset = align_up(end, ty.alignment());
            end = offset + ty.size();
            alignment = alignment.max(ty.alignment());
            fields.push(Field { name, ty, offset });
        }

        if fields.is_empty() {
            return Err(Error::config("a property layout needs at least one field"));
        }

        let size = align_up(end, alignment);
        tracing::trace!(fields = fields.len(), size, alignment, "compiled property layout");
        Ok(Self {
            fields,
            size,
            alignment,
        })
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Always `false`; a compiled layout has at least one field.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Total padded size in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Largest member alignment.
    pub fn alignment(&self) -> usize {
        self.alignment
    }

    pub fn offset(&self, index: usize) -> Option<usize> {
        self.fields.get(index).map(Field::offset)
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Shading-language declaration of this layout as a uniform block.
    pub fn declaration(&self, block: &str) -> String {
        let mut out = format!("layout(std140) uniform {block} {{\n");
        for field in &self.fields {
            out.push_str(&format!("    {} {};\n", field.ty.glsl_name(), field.name));
        }
        out.push_str("};\n");
        out
    }
}

/// Collects fields in order before compiling them into a [`PropertyLayout`].
#[derive(Debug, Clone, Default)]
pub struct LayoutBuilder {
    items: Vec<(String, ValueType)>,
}

impl LayoutBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field<T: Property>(self, name: impl Into<String>) -> Self {
        self.field_of(name, T::TYPE)
    }

    pub fn field_of(mut self, name: impl Into<String>, ty: ValueType) -> Self {
        self.items.push((name.into(), ty));
        self
    }

    pub fn build(self) -> Result<PropertyLayout> {
        PropertyLayout::compile(self.items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Mat4, Vec2, Vec3, Vec4};

    #[test]
    fn color_vec2_vec3_offsets() {
        let layout = LayoutBuilder::new()
            .field::<Vec4>("color")
            .field::<Vec2>("offset")
            .field::<Vec3>("direction")
            .build()
            .unwrap();

        let offsets: Vec<usize> = layout.fields().iter().map(Field::offset).collect();
        assert_eq!(offsets, vec![0, 16, 32]);
        assert_eq!(layout.size(), 48);
        assert_eq!(layout.alignment(), 16);
    }

    #[test]
    fn scalars_pack_tightly() {
        let layout = PropertyLayout::compile([
            ("a", ValueType::FLOAT),
            ("b", ValueType::UINT),
            ("c", ValueType::INT),
        ])
        .unwrap();
        assert_eq!(layout.offset(0), Some(0));
        assert_eq!(layout.offset(1), Some(4));
        assert_eq!(layout.offset(2), Some(8));
        assert_eq!(layout.size(), 12);
    }

    #[test]
    fn scalar_after_vec3_fills_the_gap() {
        let layout = PropertyLayout::compile([("dir", ValueType::VEC3), ("len", ValueType::FLOAT)])
            .unwrap();
        assert_eq!(layout.offset(1), Some(12));
        assert_eq!(layout.size(), 16);
    }

    #[test]
    fn matrix_after_scalar_is_aligned() {
        let layout = LayoutBuilder::new()
            .field::<f32>("time")
            .field::<Mat4>("model")
            .build()
            .unwrap();
        assert_eq!(layout.field("model").unwrap().offset(), 16);
        assert_eq!(layout.size(), 80);
    }

    #[test]
    fn layout_is_deterministic() {
        let items = [
            ("x", ValueType::VEC2),
            ("y", ValueType::MAT3),
            ("z", ValueType::UVEC4),
        ];
        let a = PropertyLayout::compile(items).unwrap();
        let b = PropertyLayout::compile(items).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn empty_layout_is_a_configuration_error() {
        let err = LayoutBuilder::new().build().unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn duplicate_names_rejected() {
        let err = PropertyLayout::compile([("a", ValueType::FLOAT), ("a", ValueType::VEC2)])
            .unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn declaration_lists_fields_in_order() {
        let layout = LayoutBuilder::new()
            .field::<Vec4>("tint")
            .field::<f32>("strength")
            .build()
            .unwrap();
        let decl = layout.declaration("Material");
        assert_eq!(
            decl,
            "layout(std140) uniform Material {\n    vec4 tint;\n    float strength;\n};\n"
        );
    }

    #[test]
    fn align_up_rounds() {
        assert_eq!(align_up(0, 16), 0);
        assert_eq!(align_up(1, 16), 16);
        assert_eq!(align_up(24, 16), 32);
        assert_eq!(align_up(32, 16), 32);
    }
}
