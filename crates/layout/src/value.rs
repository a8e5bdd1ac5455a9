use glam::{IVec2, IVec3, IVec4, Mat2, Mat3, Mat4, UVec2, UVec3, UVec4, Vec2, Vec3, Vec4};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tessera_common::Error;

/// Component type of a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scalar {
    Float,
    Int,
    UInt,
}

impl Scalar {
    /// Size in bytes of one component.
    pub fn size(self) -> usize {
        4
    }

    fn name(self) -> &'static str {
        match self {
            Scalar::Float => "float",
            Scalar::Int => "int",
            Scalar::UInt => "uint",
        }
    }

    fn vector_prefix(self) -> &'static str {
        match self {
            Scalar::Float => "",
            Scalar::Int => "i",
            Scalar::UInt => "u",
        }
    }
}

/// A shading-language value type: scalar, 2..=4 vector, or square float matrix.
///
/// Fields are private so every value is one of the shapes a uniform block
/// can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ValueType {
    scalar: Scalar,
    columns: u8,
    rows: u8,
}

impl ValueType {
    pub const FLOAT: Self = Self::shape(Scalar::Float, 1, 1);
    pub const INT: Self = Self::shape(Scalar::Int, 1, 1);
    pub const UINT: Self = Self::shape(Scalar::UInt, 1, 1);
    pub const VEC2: Self = Self::shape(Scalar::Float, 1, 2);
    pub const VEC3: Self = Self::shape(Scalar::Float, 1, 3);
    pub const VEC4: Self = Self::shape(Scalar::Float, 1, 4);
    pub const IVEC2: Self = Self::shape(Scalar::Int, 1, 2);
    pub const IVEC3: Self = Self::shape(Scalar::Int, 1, 3);
    pub const IVEC4: Self = Self::shape(Scalar::Int, 1, 4);
    pub const UVEC2: Self = Self::shape(Scalar::UInt, 1, 2);
    pub const UVEC3: Self = Self::shape(Scalar::UInt, 1, 3);
    pub const UVEC4: Self = Self::shape(Scalar::UInt, 1, 4);
    pub const MAT2: Self = Self::shape(Scalar::Float, 2, 2);
    pub const MAT3: Self = Self::shape(Scalar::Float, 3, 3);
    pub const MAT4: Self = Self::shape(Scalar::Float, 4, 4);

    const fn shape(scalar: Scalar, columns: u8, rows: u8) -> Self {
        Self {
            scalar,
            columns,
            rows,
        }
    }

    /// Vector of `dim` components, or the scalar itself for `dim == 1`.
    pub fn vector(scalar: Scalar, dim: usize) -> Result<Self, Error> {
        match dim {
            1..=4 => Ok(Self::shape(scalar, 1, dim as u8)),
            _ => Err(Error::config(format!(
                "vectors have 1 to 4 components, got {dim}"
            ))),
        }
    }

    pub fn scalar(self) -> Scalar {
        self.scalar
    }

    pub fn is_matrix(self) -> bool {
        self.columns > 1
    }

    /// Components per column (the vector dimension for non-matrices).
    pub fn dim(self) -> usize {
        self.rows as usize
    }

    pub fn columns(self) -> usize {
        self.columns as usize
    }

    /// Total number of components.
    pub fn components(self) -> usize {
        self.columns() * self.dim()
    }

    /// The column vector of a matrix, or `self` for scalars and vectors.
    pub fn column(self) -> Self {
        Self::shape(self.scalar, 1, self.rows)
    }

    /// Scalars align to their size, 2-vectors to twice the component size,
    /// larger vectors to four times, matrices to their column vector.
    pub fn alignment(self) -> usize {
        if self.is_matrix() {
            return self.column().alignment();
        }
        let element = self.scalar.size();
        match self.rows {
            1 => element,
            2 => 2 * element,
            _ => 4 * element,
        }
    }

    /// Size in bytes. Matrix columns are spaced at the column alignment.
    pub fn size(self) -> usize {
        if self.is_matrix() {
            self.columns() * self.column().alignment()
        } else {
            self.dim() * self.scalar.size()
        }
    }

    /// Byte distance between consecutive matrix columns.
    pub fn column_stride(self) -> usize {
        self.column().alignment()
    }

    pub fn glsl_name(self) -> String {
        match (self.columns, self.rows) {
            (1, 1) => self.scalar.name().to_string(),
            (1, n) => format!("{}vec{n}", self.scalar.vector_prefix()),
            (n, _) => format!("mat{n}"),
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.glsl_name())
    }
}

impl FromStr for ValueType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ty = match s {
            "float" => Self::FLOAT,
            "int" => Self::INT,
            "uint" => Self::UINT,
            "vec2" => Self::VEC2,
            "vec3" => Self::VEC3,
            "vec4" => Self::VEC4,
            "ivec2" => Self::IVEC2,
            "ivec3" => Self::IVEC3,
            "ivec4" => Self::IVEC4,
            "uvec2" => Self::UVEC2,
            "uvec3" => Self::UVEC3,
            "uvec4" => Self::UVEC4,
            "mat2" => Self::MAT2,
            "mat3" => Self::MAT3,
            "mat4" => Self::MAT4,
            other => return Err(Error::config(format!("unsupported value type `{other}`"))),
        };
        Ok(ty)
    }
}

impl TryFrom<String> for ValueType {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ValueType> for String {
    fn from(value: ValueType) -> Self {
        value.glsl_name()
    }
}

/// A Rust type that can live in a property block.
///
/// Implementing this trait is what registers a type with the layout
/// compiler; a type without an implementation is rejected at compile time.
pub trait Property: Copy {
    const TYPE: ValueType;

    /// Writes the value in block representation. `dst` is exactly
    /// `TYPE.size()` bytes.
    fn encode(&self, dst: &mut [u8]);

    /// Reads a value back from `TYPE.size()` bytes.
    fn decode(src: &[u8]) -> Self;
}

macro_rules! packed_property {
    ($($ty:ty => $value:expr),* $(,)?) => {
        $(
            impl Property for $ty {
                const TYPE: ValueType = $value;

                fn encode(&self, dst: &mut [u8]) {
                    dst.copy_from_slice(bytemuck::bytes_of(self));
                }

                fn decode(src: &[u8]) -> Self {
                    bytemuck::pod_read_unaligned(src)
                }
            }
        )*
    };
}

// Types whose in-memory form already matches the block representation.
packed_property! {
    f32 => ValueType::FLOAT,
    i32 => ValueType::INT,
    u32 => ValueType::UINT,
    Vec2 => ValueType::VEC2,
    Vec3 => ValueType::VEC3,
    Vec4 => ValueType::VEC4,
    IVec2 => ValueType::IVEC2,
    IVec3 => ValueType::IVEC3,
    IVec4 => ValueType::IVEC4,
    UVec2 => ValueType::UVEC2,
    UVec3 => ValueType::UVEC3,
    UVec4 => ValueType::UVEC4,
    Mat2 => ValueType::MAT2,
    Mat4 => ValueType::MAT4,
}

// glam packs a Mat3 as 36 bytes; the block wants each column on a 16 byte stride.
impl Property for Mat3 {
    const TYPE: ValueType = ValueType::MAT3;

    fn encode(&self, dst: &mut [u8]) {
        let stride = Self::TYPE.column_stride();
        dst.fill(0);
        for (i, column) in [self.x_axis, self.y_axis, self.z_axis].iter().enumerate() {
            let at = i * stride;
            dst[at..at + 12].copy_from_slice(bytemuck::bytes_of(column));
        }
    }

    fn decode(src: &[u8]) -> Self {
        let stride = Self::TYPE.column_stride();
        let column = |i: usize| -> Vec3 { bytemuck::pod_read_unaligned(&src[i * stride..i * stride + 12]) };
        Mat3::from_cols(column(0), column(1), column(2))
    }
}
