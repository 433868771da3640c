use super::{Scalar, Swizzle, Type, Var};

/// Declares a fieldless enum along with an `ALL` list of its variants.
macro_rules! all_variants {
    ($(#[$attr:meta])* pub enum $name:ident { $($(#[$vattr:meta])* $variant:ident,)* }) => {
        $(#[$attr])*
        pub enum $name { $($(#[$vattr])* $variant,)* }

        impl $name {
            pub const ALL: &'static [Self] = &[$(Self::$variant,)*];
        }
    };
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Literal {
    Bool(bool),
    Int(i32),
    UInt(u32),
    Float(f32),
    Double(f64),
}

impl Literal {
    pub fn scalar(self) -> Scalar {
        match self {
            Self::Bool(_) => Scalar::Bool,
            Self::Int(_) => Scalar::Int,
            Self::UInt(_) => Scalar::UInt,
            Self::Float(_) => Scalar::Float,
            Self::Double(_) => Scalar::Double,
        }
    }

    /// The literal `1` of a numeric scalar type (`None` for `Bool`).
    pub fn one(scalar: Scalar) -> Option<Self> {
        match scalar {
            Scalar::Bool => None,
            Scalar::Int => Some(Self::Int(1)),
            Scalar::UInt => Some(Self::UInt(1)),
            Scalar::Float => Some(Self::Float(1.0)),
            Scalar::Double => Some(Self::Double(1.0)),
        }
    }

    /// The literal `0` of a numeric scalar type (`false` for `Bool`).
    pub fn zero(scalar: Scalar) -> Self {
        match scalar {
            Scalar::Bool => Self::Bool(false),
            Scalar::Int => Self::Int(0),
            Scalar::UInt => Self::UInt(0),
            Scalar::Float => Self::Float(0.0),
            Scalar::Double => Self::Double(0.0),
        }
    }
}

macro_rules! literal_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(impl From<$ty> for Literal {
            fn from(v: $ty) -> Self {
                Self::$variant(v)
            }
        })*
    };
}
literal_from!(bool => Bool, i32 => Int, u32 => UInt, f32 => Float, f64 => Double);

all_variants! {
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
    pub enum UnOp {
        Neg,
        Plus,
        /// Logical negation (`!`).
        Not,
        /// Bitwise complement (`~`).
        BitNot,
    }
}

all_variants! {
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
    pub enum BinOp {
        Add,
        Sub,
        Mul,
        Div,
        Mod,
        Shl,
        Shr,
        BitAnd,
        BitOr,
        BitXor,
        LogAnd,
        LogOr,
        Eq,
        Ne,
        Lt,
        Le,
        Gt,
        Ge,
    }
}

impl BinOp {
    pub fn is_comparison(self) -> bool {
        matches!(self, Self::Eq | Self::Ne | Self::Lt | Self::Le | Self::Gt | Self::Ge)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum StepOp {
    PreInc,
    PreDec,
    PostInc,
    PostDec,
}

impl StepOp {
    pub fn is_pre(self) -> bool {
        matches!(self, Self::PreInc | Self::PreDec)
    }

    pub fn is_inc(self) -> bool {
        matches!(self, Self::PreInc | Self::PostInc)
    }
}

all_variants! {
    /// Built-in functions, type-generic (the opcode is picked from the
    /// argument types where it matters, e.g. `Min` on floats vs. integers).
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
    pub enum Intrinsic {
        // Angle and trigonometry.
        Radians,
        Degrees,
        Sin,
        Cos,
        Tan,
        Asin,
        Acos,
        Atan,
        Atan2,
        Sinh,
        Cosh,
        Tanh,
        Asinh,
        Acosh,
        Atanh,
        // Exponential.
        Pow,
        Exp,
        Log,
        Exp2,
        Log2,
        Sqrt,
        InverseSqrt,
        // Common.
        Abs,
        Sign,
        Floor,
        Trunc,
        Round,
        RoundEven,
        Ceil,
        Fract,
        Mod,
        /// `modf(x, out i)`.
        Modf,
        Min,
        Max,
        Clamp,
        Mix,
        Step,
        SmoothStep,
        Fma,
        /// `frexp(x, out exp)`.
        Frexp,
        Ldexp,
        IsNan,
        IsInf,
        FloatBitsToInt,
        FloatBitsToUint,
        IntBitsToFloat,
        UintBitsToFloat,
        // Packing.
        PackSnorm4x8,
        PackUnorm4x8,
        PackSnorm2x16,
        PackUnorm2x16,
        PackHalf2x16,
        PackDouble2x32,
        UnpackSnorm4x8,
        UnpackUnorm4x8,
        UnpackSnorm2x16,
        UnpackUnorm2x16,
        UnpackHalf2x16,
        UnpackDouble2x32,
        // Geometric.
        Length,
        Distance,
        Dot,
        Cross,
        Normalize,
        FaceForward,
        Reflect,
        Refract,
        // Matrix.
        OuterProduct,
        Transpose,
        Determinant,
        Inverse,
        // Vector relational.
        LessThan,
        LessThanEqual,
        GreaterThan,
        GreaterThanEqual,
        Equal,
        NotEqual,
        Any,
        All,
        Not,
        // Integer.
        /// `uaddCarry(x, y, out carry)`.
        UaddCarry,
        /// `usubBorrow(x, y, out borrow)`.
        UsubBorrow,
        /// `umulExtended(x, y, out msb, out lsb)`.
        UmulExtended,
        /// `imulExtended(x, y, out msb, out lsb)`.
        ImulExtended,
        BitfieldExtract,
        BitfieldInsert,
        BitfieldReverse,
        BitCount,
        FindLsb,
        FindMsb,
        // Atomics (first argument is the memory location).
        AtomicAdd,
        AtomicMin,
        AtomicMax,
        AtomicAnd,
        AtomicOr,
        AtomicXor,
        AtomicExchange,
        /// `atomicCompSwap(mem, compare, data)`.
        AtomicCompSwap,
        // Derivatives.
        Dfdx,
        Dfdy,
        Fwidth,
        DfdxCoarse,
        DfdyCoarse,
        FwidthCoarse,
        DfdxFine,
        DfdyFine,
        FwidthFine,
    }
}

all_variants! {
    /// Direct (sampler-less) image accesses; arguments are the image, then
    /// the coordinate, then (for multisampled images) the sample index, then
    /// any remaining values (texel data, atomic operands).
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
    pub enum ImageAccess {
        Size,
        Samples,
        Load,
        Store,
        AtomicAdd,
        AtomicMin,
        AtomicMax,
        AtomicAnd,
        AtomicOr,
        AtomicXor,
        AtomicExchange,
        /// `imageAtomicCompSwap(image, coord, compare, data)`.
        AtomicCompSwap,
    }
}

all_variants! {
    /// Sampler-backed accesses; arguments are the sampled image, then the
    /// coordinate, then the depth reference or gather component (if any),
    /// then any image operands in SPIR-V `ImageOperands` bit order (bias/lod,
    /// gradients, offsets).
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
    pub enum TextureAccess {
        /// `textureSize(s, lod)`.
        SizeLod,
        /// `textureSize(s)` (buffer, rectangle and multisampled images).
        Size,
        QueryLod,
        QueryLevels,
        Samples,
        Sample,
        SampleBias,
        SampleLod,
        SampleOffset,
        SampleBiasOffset,
        SampleLodOffset,
        SampleGrad,
        SampleGradOffset,
        SampleProj,
        SampleProjBias,
        SampleProjLod,
        SampleProjOffset,
        SampleProjGrad,
        SampleDref,
        SampleDrefBias,
        SampleDrefLod,
        SampleDrefOffset,
        SampleProjDref,
        SampleProjDrefLod,
        Fetch,
        FetchOffset,
        Gather,
        GatherOffset,
        GatherOffsets,
        GatherDref,
        GatherDrefOffset,
    }
}

impl TextureAccess {
    /// Size/level/LOD queries (i.e. no texel is read).
    pub fn is_query(self) -> bool {
        matches!(self, Self::SizeLod | Self::Size | Self::QueryLod | Self::QueryLevels | Self::Samples)
    }

    /// Whether the last argument is a texel offset (or, for `GatherOffsets`,
    /// an array of four offsets).
    pub fn has_offset(self) -> bool {
        matches!(
            self,
            Self::SampleOffset
                | Self::SampleBiasOffset
                | Self::SampleLodOffset
                | Self::SampleGradOffset
                | Self::SampleProjOffset
                | Self::SampleDrefOffset
                | Self::FetchOffset
                | Self::GatherOffset
                | Self::GatherOffsets
                | Self::GatherDrefOffset
        )
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Expr {
    /// Static type of the expression's value.
    pub ty: Type,
    pub kind: ExprKind,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ExprKind {
    Literal(Literal),
    Identifier(Var),

    /// `lhs = rhs` (`op: None`), or compound `lhs op= rhs`.
    Assign {
        op: Option<BinOp>,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },

    /// Declaration with initializer (e.g. `float x = ...;`).
    Init {
        var: Var,
        value: Box<Expr>,
    },

    Unary {
        op: UnOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },

    /// Conversion of `operand` to `Expr::ty`.
    Cast(Box<Expr>),

    Step {
        op: StepOp,
        operand: Box<Expr>,
    },

    /// Composite construction (vectors, matrices, arrays, structs).
    Construct(Vec<Expr>),

    Call {
        func: Var,
        args: Vec<Expr>,
    },

    /// `outer.member` (`index` into the struct type of `outer`).
    Member {
        outer: Box<Expr>,
        index: u32,
    },

    /// `array[index]` (also applies to matrix columns).
    Index {
        array: Box<Expr>,
        index: Box<Expr>,
    },

    Swizzle {
        outer: Box<Expr>,
        swizzle: Swizzle,
    },

    Intrinsic {
        intrinsic: Intrinsic,
        args: Vec<Expr>,
    },
    Image {
        access: ImageAccess,
        args: Vec<Expr>,
    },
    Texture {
        access: TextureAccess,
        args: Vec<Expr>,
    },

    /// `cond ? on_true : on_false`.
    Select {
        cond: Box<Expr>,
        on_true: Box<Expr>,
        on_false: Box<Expr>,
    },
}

impl ExprKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Literal(_) => "literal",
            Self::Identifier(_) => "identifier",
            Self::Assign { .. } => "assignment",
            Self::Init { .. } => "initialization",
            Self::Unary { .. } => "unary operation",
            Self::Binary { .. } => "binary operation",
            Self::Cast(_) => "cast",
            Self::Step { .. } => "increment/decrement",
            Self::Construct(_) => "composite construction",
            Self::Call { .. } => "function call",
            Self::Member { .. } => "member selection",
            Self::Index { .. } => "array access",
            Self::Swizzle { .. } => "swizzle",
            Self::Intrinsic { .. } => "intrinsic call",
            Self::Image { .. } => "image access",
            Self::Texture { .. } => "texture access",
            Self::Select { .. } => "ternary",
        }
    }
}

impl Expr {
    pub fn new(ty: Type, kind: ExprKind) -> Self {
        Self { ty, kind }
    }

    pub fn literal(value: impl Into<Literal>) -> Self {
        let value = value.into();
        Self::new(Type::Scalar(value.scalar()), ExprKind::Literal(value))
    }

    pub fn ident(var: &Var) -> Self {
        Self::new(var.ty.clone(), ExprKind::Identifier(var.clone()))
    }

    /// `outer.member`, typed from the struct type of `outer`.
    pub fn member(outer: Expr, index: u32) -> Option<Self> {
        let ty = match &outer.ty {
            Type::Struct(st) => st.member(index)?.ty.clone(),
            _ => return None,
        };
        Some(Self::new(ty, ExprKind::Member { outer: Box::new(outer), index }))
    }

    /// `array[index]`, typed from the array (or matrix) type of `array`.
    pub fn index(array: Expr, index: Expr) -> Option<Self> {
        let ty = match &array.ty {
            Type::Array(a) => a.element.clone(),
            Type::Matrix { .. } => array.ty.column()?,
            Type::Vector(s, _) => Type::Scalar(*s),
            _ => return None,
        };
        Some(Self::new(ty, ExprKind::Index { array: Box::new(array), index: Box::new(index) }))
    }

    pub fn swizzle(outer: Expr, swizzle: &str) -> Option<Self> {
        let swizzle = Swizzle::parse(swizzle)?;
        let (scalar, size) = match outer.ty {
            Type::Vector(s, n) => (s, n),
            Type::Scalar(s) => (s, 1),
            _ => return None,
        };
        if swizzle.components().iter().any(|&c| c >= size) {
            return None;
        }
        let ty = match swizzle.len() {
            1 => Type::Scalar(scalar),
            n => Type::Vector(scalar, n as u32),
        };
        Some(Self::new(ty, ExprKind::Swizzle { outer: Box::new(outer), swizzle }))
    }

    pub fn assign(lhs: Expr, rhs: Expr) -> Self {
        Self::new(lhs.ty.clone(), ExprKind::Assign { op: None, lhs: Box::new(lhs), rhs: Box::new(rhs) })
    }

    pub fn compound_assign(op: BinOp, lhs: Expr, rhs: Expr) -> Self {
        Self::new(
            lhs.ty.clone(),
            ExprKind::Assign { op: Some(op), lhs: Box::new(lhs), rhs: Box::new(rhs) },
        )
    }

    pub fn init(var: &Var, value: Expr) -> Self {
        Self::new(var.ty.clone(), ExprKind::Init { var: var.clone(), value: Box::new(value) })
    }

    pub fn binary(ty: Type, op: BinOp, lhs: Expr, rhs: Expr) -> Self {
        Self::new(ty, ExprKind::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) })
    }

    pub fn unary(op: UnOp, operand: Expr) -> Self {
        Self::new(operand.ty.clone(), ExprKind::Unary { op, operand: Box::new(operand) })
    }

    pub fn step(op: StepOp, operand: Expr) -> Self {
        Self::new(operand.ty.clone(), ExprKind::Step { op, operand: Box::new(operand) })
    }

    pub fn cast(ty: Type, operand: Expr) -> Self {
        Self::new(ty, ExprKind::Cast(Box::new(operand)))
    }

    pub fn construct(ty: Type, args: Vec<Expr>) -> Self {
        Self::new(ty, ExprKind::Construct(args))
    }

    pub fn call(func: &Var, args: Vec<Expr>) -> Option<Self> {
        let ty = match &func.ty {
            Type::Function(f) => f.ret.clone(),
            _ => return None,
        };
        Some(Self::new(ty, ExprKind::Call { func: func.clone(), args }))
    }

    pub fn intrinsic(ty: Type, intrinsic: Intrinsic, args: Vec<Expr>) -> Self {
        Self::new(ty, ExprKind::Intrinsic { intrinsic, args })
    }

    pub fn image(ty: Type, access: ImageAccess, args: Vec<Expr>) -> Self {
        Self::new(ty, ExprKind::Image { access, args })
    }

    pub fn texture(ty: Type, access: TextureAccess, args: Vec<Expr>) -> Self {
        Self::new(ty, ExprKind::Texture { access, args })
    }

    pub fn select(cond: Expr, on_true: Expr, on_false: Expr) -> Self {
        Self::new(
            on_true.ty.clone(),
            ExprKind::Select {
                cond: Box::new(cond),
                on_true: Box::new(on_true),
                on_false: Box::new(on_false),
            },
        )
    }

    /// Literals, and constructions made only of those.
    pub fn is_constant(&self) -> bool {
        match &self.kind {
            ExprKind::Literal(_) => true,
            ExprKind::Construct(args) => !args.is_empty() && args.iter().all(Expr::is_constant),
            _ => false,
        }
    }

    /// Whether this is an operation whose value depends on specialization
    /// constants, and only on constants (i.e. it can be folded into an
    /// `OpSpecConstantOp` instead of being computed at runtime).
    pub fn is_spec_constant(&self) -> bool {
        self.spec_constness() == Some(true)
    }

    /// `Some(depends_on_spec_constants)` for constant expressions.
    fn spec_constness(&self) -> Option<bool> {
        fn all(operands: &[&Expr]) -> Option<bool> {
            operands.iter().try_fold(false, |any, e| Some(any | e.spec_constness()?))
        }
        match &self.kind {
            ExprKind::Literal(_) => Some(false),
            ExprKind::Identifier(var) => var.is_specialization_constant().then_some(true),
            ExprKind::Unary { operand, .. } => all(&[&**operand]),
            ExprKind::Binary { lhs, rhs, .. } => all(&[&**lhs, &**rhs]),
            ExprKind::Select { cond, on_true, on_false } => all(&[&**cond, &**on_true, &**on_false]),
            _ => None,
        }
    }

    /// Whether this is a (possibly nested) member/array/swizzle chain rooted
    /// at a variable, i.e. something an access chain can address.
    pub fn is_chain(&self) -> bool {
        match &self.kind {
            ExprKind::Identifier(_) => true,
            ExprKind::Member { outer, .. } | ExprKind::Swizzle { outer, .. } => outer.is_chain(),
            // A dynamic component of a shuffled vector (e.g. `v.xy[i]`) has
            // no pointer of its own, so it's extracted from the loaded value.
            ExprKind::Index { array, index } => match &array.kind {
                ExprKind::Swizzle { swizzle, .. }
                    if swizzle.len() > 1
                        && !matches!(index.kind, ExprKind::Literal(Literal::Int(_) | Literal::UInt(_))) =>
                {
                    false
                }
                _ => array.is_chain(),
            },
            _ => false,
        }
    }
}
