//! Image accesses, both direct (storage images) and through samplers.

use super::intrinsics::{form_of, AtomicSemantics, Form};
use super::{ExprLowerer, NO_VALUE};
use crate::ast::{Expr, ImageAccess, ImageConfig, Intrinsic, Literal, TextureAccess, Type};
use crate::error::{LowerError, Result};
use crate::spv::{Id, Op};
use lazy_static::lazy_static;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use spirv::ImageOperands;

/// Image operands, each taking some of the trailing arguments of an access.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum ImageOperand {
    Bias,
    Lod,
    /// `dPdx, dPdy`.
    Grad,
    Offset,
    /// Array of 4 (constant) offsets, for gathers.
    Offsets,
}

impl ImageOperand {
    fn arg_count(self) -> usize {
        match self {
            Self::Grad => 2,
            Self::Bias | Self::Lod | Self::Offset | Self::Offsets => 1,
        }
    }
}

#[derive(Copy, Clone, Debug)]
struct TextureEntry {
    op: Op,

    /// Whether `op` takes the image itself (extracted with `OpImage`), as
    /// opposed to the sampled image.
    needs_image: bool,

    /// Number of arguments (after the sampled image) passed as-is, before
    /// the image operands mask (e.g. coordinate and depth reference).
    fixed: usize,

    operands: &'static [ImageOperand],
}

macro_rules! texture_entries {
    ($($access:ident => $op:ident($handle:ident), $fixed:literal, [$($operand:ident),*];)*) => {
        &[$((
            TextureAccess::$access,
            TextureEntry {
                op: Op::$op,
                needs_image: texture_entries!(@needs_image $handle),
                fixed: $fixed,
                operands: &[$(ImageOperand::$operand),*],
            },
        ),)*]
    };
    (@needs_image image) => { true };
    (@needs_image sampled) => { false };
}

static TEXTURE_ACCESSES: &[(TextureAccess, TextureEntry)] = texture_entries! {
    SizeLod => ImageQuerySizeLod(image), 1, [];
    Size => ImageQuerySize(image), 0, [];
    QueryLod => ImageQueryLod(sampled), 1, [];
    QueryLevels => ImageQueryLevels(image), 0, [];
    Samples => ImageQuerySamples(image), 0, [];

    Sample => ImageSampleImplicitLod(sampled), 1, [];
    SampleBias => ImageSampleImplicitLod(sampled), 1, [Bias];
    SampleLod => ImageSampleExplicitLod(sampled), 1, [Lod];
    SampleOffset => ImageSampleImplicitLod(sampled), 1, [Offset];
    SampleBiasOffset => ImageSampleImplicitLod(sampled), 1, [Bias, Offset];
    SampleLodOffset => ImageSampleExplicitLod(sampled), 1, [Lod, Offset];
    SampleGrad => ImageSampleExplicitLod(sampled), 1, [Grad];
    SampleGradOffset => ImageSampleExplicitLod(sampled), 1, [Grad, Offset];

    SampleProj => ImageSampleProjImplicitLod(sampled), 1, [];
    SampleProjBias => ImageSampleProjImplicitLod(sampled), 1, [Bias];
    SampleProjLod => ImageSampleProjExplicitLod(sampled), 1, [Lod];
    SampleProjOffset => ImageSampleProjImplicitLod(sampled), 1, [Offset];
    SampleProjGrad => ImageSampleProjExplicitLod(sampled), 1, [Grad];

    SampleDref => ImageSampleDrefImplicitLod(sampled), 2, [];
    SampleDrefBias => ImageSampleDrefImplicitLod(sampled), 2, [Bias];
    SampleDrefLod => ImageSampleDrefExplicitLod(sampled), 2, [Lod];
    SampleDrefOffset => ImageSampleDrefImplicitLod(sampled), 2, [Offset];
    SampleProjDref => ImageSampleProjDrefImplicitLod(sampled), 2, [];
    SampleProjDrefLod => ImageSampleProjDrefExplicitLod(sampled), 2, [Lod];

    Fetch => ImageFetch(image), 1, [Lod];
    FetchOffset => ImageFetch(image), 1, [Lod, Offset];

    Gather => ImageGather(sampled), 2, [];
    GatherOffset => ImageGather(sampled), 2, [Offset];
    GatherOffsets => ImageGather(sampled), 2, [Offsets];
    GatherDref => ImageDrefGather(sampled), 2, [];
    GatherDrefOffset => ImageDrefGather(sampled), 2, [Offset];
};

lazy_static! {
    static ref TEXTURE_ACCESSES_BY_ID: FxHashMap<TextureAccess, TextureEntry> =
        TEXTURE_ACCESSES.iter().copied().collect();
}

/// Image atomics share the lowering of atomic intrinsics, only the pointer
/// differs (an `OpImageTexelPointer`).
fn atomic_intrinsic(access: ImageAccess) -> Option<Intrinsic> {
    Some(match access {
        ImageAccess::AtomicAdd => Intrinsic::AtomicAdd,
        ImageAccess::AtomicMin => Intrinsic::AtomicMin,
        ImageAccess::AtomicMax => Intrinsic::AtomicMax,
        ImageAccess::AtomicAnd => Intrinsic::AtomicAnd,
        ImageAccess::AtomicOr => Intrinsic::AtomicOr,
        ImageAccess::AtomicXor => Intrinsic::AtomicXor,
        ImageAccess::AtomicExchange => Intrinsic::AtomicExchange,
        ImageAccess::AtomicCompSwap => Intrinsic::AtomicCompSwap,
        ImageAccess::Size | ImageAccess::Samples | ImageAccess::Load | ImageAccess::Store => {
            return None;
        }
    })
}

fn check_arg_count(what: impl std::fmt::Debug, args: &[Expr], expected: usize) -> Result<()> {
    if args.len() != expected {
        return Err(LowerError::ArgCount {
            what: format!("{what:?}"),
            expected,
            found: args.len(),
        });
    }
    Ok(())
}

fn image_config(image: &Expr) -> Result<ImageConfig> {
    image.ty.image_config().copied().ok_or_else(|| LowerError::type_mismatch("image", &image.ty))
}

impl ExprLowerer<'_> {
    pub(super) fn lower_image_access(
        &mut self,
        access: ImageAccess,
        args: &[Expr],
        ty: &Type,
    ) -> Result<Id> {
        let image = args.first().ok_or(LowerError::ArgCount {
            what: format!("{access:?}"),
            expected: 1,
            found: 0,
        })?;
        let config = image_config(image)?;

        // Coordinate, then the sample index for multisampled images.
        let addressing = if config.ms { 2 } else { 1 };

        match access {
            ImageAccess::Size | ImageAccess::Samples => {
                check_arg_count(access, args, 1)?;
                let image = self.lower(image)?;
                let op = match access {
                    ImageAccess::Samples => Op::ImageQuerySamples,
                    _ => Op::ImageQuerySize,
                };
                Ok(self.emit(op, ty, [image]))
            }

            ImageAccess::Load => {
                check_arg_count(access, args, 1 + addressing)?;
                let operands = self.lower_addressed(args, config.ms)?;
                Ok(self.emit(Op::ImageRead, ty, operands))
            }

            ImageAccess::Store => {
                check_arg_count(access, args, 2 + addressing)?;
                let mut operands = self.lower_addressed(&args[..1 + addressing], config.ms)?;
                let texel = self.lower(&args[1 + addressing])?;
                operands.insert(2, texel);
                self.emit_void(Op::ImageWrite, operands);
                Ok(NO_VALUE)
            }

            _ => {
                let intrinsic =
                    atomic_intrinsic(access).ok_or(LowerError::UnsupportedImageAccess(access))?;
                let Some(Form::Atomic(ops)) = form_of(intrinsic) else {
                    return Err(LowerError::UnsupportedImageAccess(access));
                };
                let values_len = if access == ImageAccess::AtomicCompSwap { 2 } else { 1 };
                check_arg_count(access, args, 1 + addressing + values_len)?;

                let texel_type = self.module.register_type(&Type::Scalar(config.sampled));
                let pointer_type =
                    self.module.register_pointer_type(texel_type, spirv::StorageClass::Image);
                let image_pointer = self.lower_no_load(image)?;
                let coord = self.lower(&args[1])?;
                let sample = if config.ms {
                    self.lower(&args[2])?
                } else {
                    self.module.register_literal(Literal::UInt(0))
                };
                let pointer = self.emit_typed(
                    Op::ImageTexelPointer,
                    pointer_type,
                    [image_pointer, coord, sample],
                );

                let values = args[1 + addressing..]
                    .iter()
                    .map(|arg| self.lower(arg))
                    .collect::<Result<SmallVec<[Id; 2]>>>()?;
                self.atomic(
                    intrinsic,
                    ops,
                    AtomicSemantics::IMAGE,
                    Some(config.sampled),
                    pointer,
                    &values,
                    ty,
                )
            }
        }
    }

    /// `[image, coord]`, followed by `[Sample, sample]` for multisampled
    /// images.
    fn lower_addressed(&mut self, args: &[Expr], ms: bool) -> Result<SmallVec<[Id; 4]>> {
        let mut operands = SmallVec::new();
        operands.push(self.lower(&args[0])?);
        operands.push(self.lower(&args[1])?);
        if ms {
            let sample = self.lower(&args[2])?;
            operands.extend([ImageOperands::SAMPLE.bits(), sample]);
        }
        Ok(operands)
    }

    pub(super) fn lower_texture_access(
        &mut self,
        access: TextureAccess,
        args: &[Expr],
        ty: &Type,
    ) -> Result<Id> {
        let entry = *TEXTURE_ACCESSES_BY_ID
            .get(&access)
            .ok_or(LowerError::UnsupportedTextureAccess(access))?;
        let sampled_image = args.first().ok_or(LowerError::ArgCount {
            what: format!("{access:?}"),
            expected: 1,
            found: 0,
        })?;
        let config = image_config(sampled_image)?;

        // NOTE: buffer and rectangle images have no mipmaps, and for
        // multisampled images the sample index takes the place of the LOD.
        let lod_less = matches!(config.dim, spirv::Dim::DimBuffer | spirv::Dim::DimRect);
        let operands: SmallVec<[ImageOperand; 3]> = entry
            .operands
            .iter()
            .copied()
            .filter(|&operand| !(operand == ImageOperand::Lod && entry.op == Op::ImageFetch && lod_less))
            .collect();

        let expected = 1
            + entry.fixed
            + operands.iter().map(|operand| operand.arg_count()).sum::<usize>();
        check_arg_count(access, args, expected)?;

        let mut handle = self.lower(sampled_image)?;
        if entry.needs_image {
            if let Type::SampledImage(config) = sampled_image.ty {
                handle = self.emit(Op::Image, &Type::Image(config), [handle]);
            }
        }

        let mut ids: SmallVec<[Id; 8]> = SmallVec::new();
        ids.push(handle);
        for arg in &args[1..1 + entry.fixed] {
            ids.push(self.lower(arg)?);
        }

        // Operand arguments must follow the mask in ascending bit order.
        let mut trailing: SmallVec<[(ImageOperands, SmallVec<[Id; 2]>); 3]> = SmallVec::new();
        let mut remaining = &args[1 + entry.fixed..];
        for operand in operands {
            let (operand_args, rest) = remaining.split_at(operand.arg_count());
            remaining = rest;

            let bit = match operand {
                ImageOperand::Bias => ImageOperands::BIAS,
                ImageOperand::Lod if config.ms => ImageOperands::SAMPLE,
                ImageOperand::Lod => ImageOperands::LOD,
                ImageOperand::Grad => ImageOperands::GRAD,
                ImageOperand::Offset if operand_args.iter().all(Expr::is_constant) => {
                    ImageOperands::CONST_OFFSET
                }
                ImageOperand::Offset => ImageOperands::OFFSET,
                ImageOperand::Offsets => ImageOperands::CONST_OFFSETS,
            };
            let operand_ids = operand_args
                .iter()
                .map(|arg| self.lower(arg))
                .collect::<Result<SmallVec<[Id; 2]>>>()?;
            trailing.push((bit, operand_ids));
        }
        trailing.sort_by_key(|(bit, _)| bit.bits());

        if !trailing.is_empty() {
            let mask = trailing.iter().fold(ImageOperands::NONE, |mask, &(bit, _)| mask | bit);
            ids.push(mask.bits());
            ids.extend(trailing.into_iter().flat_map(|(_, operand_ids)| operand_ids));
        }

        Ok(self.emit(entry.op, ty, ids))
    }
}
