//! Shader types, as seen by the lowering (already resolved by the front-end).

use crate::layout;
use std::rc::Rc;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Scalar {
    Bool,
    Int,
    UInt,
    Float,
    Double,
}

impl Scalar {
    pub fn is_float(self) -> bool {
        matches!(self, Self::Float | Self::Double)
    }

    pub fn is_integer(self) -> bool {
        matches!(self, Self::Int | Self::UInt)
    }

    /// Size in bytes (`bool` uses the 4-byte buffer representation).
    pub fn size(self) -> u32 {
        match self {
            Self::Double => 8,
            Self::Bool | Self::Int | Self::UInt | Self::Float => 4,
        }
    }
}

/// Buffer memory layout rules, inherited by nested aggregates.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum MemoryLayout {
    Std140,
    #[default]
    Std430,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ImageConfig {
    /// Component type of texels (`Float`, `Int` or `UInt`).
    pub sampled: Scalar,
    pub dim: spirv::Dim,
    pub format: spirv::ImageFormat,
    pub arrayed: bool,
    pub ms: bool,
    pub depth: bool,
    /// Storage (read/write) image, as opposed to one used with a sampler.
    pub storage: bool,
}

impl ImageConfig {
    pub fn sampled_2d() -> Self {
        Self {
            sampled: Scalar::Float,
            dim: spirv::Dim::Dim2D,
            format: spirv::ImageFormat::Unknown,
            arrayed: false,
            ms: false,
            depth: false,
            storage: false,
        }
    }

    pub fn storage(dim: spirv::Dim, format: spirv::ImageFormat, sampled: Scalar) -> Self {
        Self { sampled, dim, format, storage: true, ..Self::sampled_2d() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Type {
    Void,
    Scalar(Scalar),
    Vector(Scalar, u32),
    /// Column-major matrix of `columns` vectors of `rows` components.
    Matrix {
        scalar: Scalar,
        columns: u32,
        rows: u32,
    },
    Array(Rc<ArrayType>),
    Struct(Rc<StructType>),
    Image(ImageConfig),
    SampledImage(ImageConfig),
    Sampler {
        comparison: bool,
    },
    Function(Rc<FunctionType>),
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ArrayType {
    pub element: Type,
    /// `None` for runtime-sized arrays.
    pub len: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Member {
    pub name: String,
    pub ty: Type,
    pub offset: u32,
    /// Explicit array stride, overriding the one computed from the layout.
    pub array_stride: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct StructType {
    pub name: String,
    pub layout: MemoryLayout,
    pub members: Vec<Member>,
}

impl StructType {
    /// Builds a struct with member offsets computed by `layout`.
    pub fn new(
        name: impl Into<String>,
        layout: MemoryLayout,
        members: impl IntoIterator<Item = (String, Type)>,
    ) -> Self {
        let mut offset = 0;
        let members = members
            .into_iter()
            .map(|(name, ty)| {
                let (size, align) = layout::size_align(&ty, layout);
                offset = layout::round_up(offset, align);
                let member = Member { name, ty, offset, array_stride: None };
                offset += size;
                member
            })
            .collect();
        Self { name: name.into(), layout, members }
    }

    pub fn member(&self, index: u32) -> Option<&Member> {
        self.members.get(index as usize)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FunctionType {
    pub ret: Type,
    pub params: Vec<super::Var>,
}

impl Type {
    pub fn int() -> Self {
        Self::Scalar(Scalar::Int)
    }

    pub fn uint() -> Self {
        Self::Scalar(Scalar::UInt)
    }

    pub fn float() -> Self {
        Self::Scalar(Scalar::Float)
    }

    pub fn double() -> Self {
        Self::Scalar(Scalar::Double)
    }

    pub fn bool() -> Self {
        Self::Scalar(Scalar::Bool)
    }

    pub fn vec(scalar: Scalar, n: u32) -> Self {
        Self::Vector(scalar, n)
    }

    pub fn array(element: Type, len: Option<u32>) -> Self {
        Self::Array(Rc::new(ArrayType { element, len }))
    }

    pub fn structure(ty: StructType) -> Self {
        Self::Struct(Rc::new(ty))
    }

    /// The scalar component type, for scalars, vectors and matrices.
    pub fn scalar(&self) -> Option<Scalar> {
        match *self {
            Self::Scalar(s) | Self::Vector(s, _) | Self::Matrix { scalar: s, .. } => Some(s),
            _ => None,
        }
    }

    /// Number of components of a vector (`1` for scalars).
    pub fn vector_size(&self) -> Option<u32> {
        match *self {
            Self::Scalar(_) => Some(1),
            Self::Vector(_, n) => Some(n),
            _ => None,
        }
    }

    /// Type of a column, for matrices.
    pub fn column(&self) -> Option<Type> {
        match *self {
            Self::Matrix { scalar, rows, .. } => Some(Self::Vector(scalar, rows)),
            _ => None,
        }
    }

    /// Type of the element at `index` (member for structs, element for arrays,
    /// column for matrices, component for vectors).
    pub fn component(&self, index: u32) -> Option<Type> {
        match self {
            Self::Vector(s, n) if index < *n => Some(Self::Scalar(*s)),
            Self::Matrix { columns, .. } if index < *columns => self.column(),
            Self::Array(array) => Some(array.element.clone()),
            Self::Struct(st) => st.member(index).map(|m| m.ty.clone()),
            _ => None,
        }
    }

    pub fn is_opaque(&self) -> bool {
        matches!(self, Self::Image(_) | Self::SampledImage(_) | Self::Sampler { .. })
    }

    pub fn is_aggregate(&self) -> bool {
        matches!(self, Self::Array(_) | Self::Struct(_))
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Self::Void)
    }

    /// Whether this type (or any type nested in it) is double-precision.
    pub fn uses_double(&self) -> bool {
        match self {
            Self::Scalar(s) | Self::Vector(s, _) | Self::Matrix { scalar: s, .. } => {
                *s == Scalar::Double
            }
            Self::Array(array) => array.element.uses_double(),
            Self::Struct(st) => st.members.iter().any(|m| m.ty.uses_double()),
            Self::Function(f) => f.ret.uses_double(),
            Self::Void | Self::Image(_) | Self::SampledImage(_) | Self::Sampler { .. } => false,
        }
    }

    /// The image configuration, for images and sampled images.
    pub fn image_config(&self) -> Option<&ImageConfig> {
        match self {
            Self::Image(config) | Self::SampledImage(config) => Some(config),
            _ => None,
        }
    }

    /// Strips any number of array levels.
    pub fn innermost_element(&self) -> &Type {
        match self {
            Self::Array(array) => array.element.innermost_element(),
            _ => self,
        }
    }
}
