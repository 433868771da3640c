//! Buffer memory layouts (`std140`/`std430`), i.e. sizes, alignments and
//! strides used for `Offset`, `ArrayStride` and `MatrixStride` decorations.

use crate::ast::{MemoryLayout, Type};

pub fn round_up(x: u32, align: u32) -> u32 {
    if align <= 1 {
        x
    } else {
        x.div_ceil(align) * align
    }
}

/// Alignment of aggregates (arrays, structs, and matrix columns) in `layout`,
/// from the alignment of their contents.
fn aggregate_align(align: u32, layout: MemoryLayout) -> u32 {
    match layout {
        // NOTE: this is the "extended alignment" rule of `std140`.
        MemoryLayout::Std140 => round_up(align, 16),
        MemoryLayout::Std430 => align,
    }
}

/// `(size, align)` of `ty` when stored in a buffer with `layout`.
///
/// Opaque and function types have no memory representation, and get `(0, 1)`.
pub fn size_align(ty: &Type, layout: MemoryLayout) -> (u32, u32) {
    match ty {
        Type::Void | Type::Function(_) => (0, 1),
        Type::Image(_) | Type::SampledImage(_) | Type::Sampler { .. } => (0, 1),

        Type::Scalar(s) => (s.size(), s.size()),
        Type::Vector(s, n) => {
            let size = s.size() * n;
            // 3-component vectors are aligned like 4-component ones.
            let align = s.size() * if *n == 3 { 4 } else { *n };
            (size, align)
        }
        Type::Matrix { columns, .. } => {
            let (stride, align) = column_stride_align(ty, layout);
            (stride * columns, align)
        }
        Type::Array(array) => {
            let (_, elem_align) = size_align(&array.element, layout);
            let stride = array_stride(&array.element, layout);
            let len = array.len.unwrap_or(0);
            (stride * len, aggregate_align(elem_align, layout))
        }
        Type::Struct(st) => {
            let (end, align) = st.members.iter().fold((0, 1), |(_, align), m| {
                let (size, member_align) = size_align(&m.ty, layout);
                (m.offset + size, align.max(member_align))
            });
            let align = aggregate_align(align, layout);
            (round_up(end, align), align)
        }
    }
}

fn column_stride_align(matrix: &Type, layout: MemoryLayout) -> (u32, u32) {
    let (_, align) = matrix.column().map_or((0, 1), |column| size_align(&column, layout));
    let align = aggregate_align(align, layout);
    (align, align)
}

/// Byte stride between consecutive elements of an array of `element`.
pub fn array_stride(element: &Type, layout: MemoryLayout) -> u32 {
    let (size, align) = size_align(element, layout);
    round_up(size, aggregate_align(align, layout))
}

/// Byte stride between consecutive columns of `matrix` (column-major).
pub fn matrix_stride(matrix: &Type, layout: MemoryLayout) -> u32 {
    column_stride_align(matrix, layout).0
}
