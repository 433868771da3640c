//! Lowering of (typed) expressions into SPIR-V instructions, appended to the
//! block being built, with types/constants/variables registered on the
//! [`Module`] along the way.
//!
//! Every expression lowers to either a value or a pointer (for anything that
//! names storage, e.g. variables and access chains), the latter being loaded
//! from only when a value is actually needed.

mod access_chain;
mod image;
mod intrinsics;
mod ops;

pub use access_chain::{linearize, Step};

use self::access_chain::Place;
use self::ops::Operand;
use crate::ast::{BinOp, Expr, ExprKind, FunctionType, Literal, Scalar, StepOp, Type, Var};
use crate::error::{LowerError, Result};
use crate::module::{Block, FuncScope, Module, ScopeEntry, VariableInfo};
use crate::spv::{Id, Inst, Op};
use smallvec::SmallVec;

/// "Result" of expressions that don't produce a value (e.g. `imageStore`).
pub const NO_VALUE: Id = 0;

/// Lowers expressions into `block`, which belongs to the function `func`.
pub struct ExprLowerer<'a> {
    module: &'a mut Module,
    func: &'a mut FuncScope,
    block: &'a mut Block,

    /// Current expression nesting depth.
    depth: usize,
}

/// A temporary standing in for an `out`/`inout` argument, to be copied back
/// into `place` after the call.
struct Writeback {
    temp: Id,
    temp_type: Id,
    place: Place,
}

impl<'a> ExprLowerer<'a> {
    pub fn new(module: &'a mut Module, func: &'a mut FuncScope, block: &'a mut Block) -> Self {
        Self { module, func, block, depth: 0 }
    }

    pub fn module(&mut self) -> &mut Module {
        self.module
    }

    /// Lowers `expr` to a value (loading from its storage, if needed), and
    /// returns its ID ([`NO_VALUE`] for `void` expressions with no result).
    pub fn lower(&mut self, expr: &Expr) -> Result<Id> {
        let entry = self.visit(expr, false)?;
        Ok(self.load(entry))
    }

    /// Lowers `expr` to a pointer to its storage, without loading from it.
    pub fn lower_no_load(&mut self, expr: &Expr) -> Result<Id> {
        let entry = self.visit(expr, true)?;
        if !entry.info.is_lvalue {
            return Err(LowerError::NotAssignable(expr.kind.name()));
        }
        Ok(entry.info.id)
    }

    /// With `want_pointer`, assignments result in the storage they wrote to,
    /// instead of the value they stored.
    fn visit(&mut self, expr: &Expr, want_pointer: bool) -> Result<ScopeEntry> {
        let max_depth = self.module.config.max_expr_depth;
        if self.depth >= max_depth {
            return Err(LowerError::TooDeep(max_depth));
        }
        self.depth += 1;
        let result = self.visit_kind(expr, want_pointer);
        self.depth -= 1;
        result
    }

    fn visit_kind(&mut self, expr: &Expr, want_pointer: bool) -> Result<ScopeEntry> {
        let ty = &expr.ty;
        match &expr.kind {
            &ExprKind::Literal(value) => {
                let id = self.module.register_literal(value);
                Ok(self.value(ty, id))
            }
            ExprKind::Identifier(var) if var.is_member() => self.visit_chain(expr),
            ExprKind::Identifier(var) => self.module.register_var(Some(&mut *self.func), var),

            ExprKind::Member { .. } | ExprKind::Index { .. } | ExprKind::Swizzle { .. } => {
                if expr.is_chain() {
                    self.visit_chain(expr)
                } else {
                    let id = self.lower_component_of_value(expr)?;
                    Ok(self.value(ty, id))
                }
            }

            ExprKind::Assign { op, lhs, rhs } => {
                let place = self.assignable_place(lhs)?;
                let value = match *op {
                    None => self.lower(rhs)?,
                    Some(op) => {
                        let current = self.load_place(&place);
                        let rhs_id = self.lower(rhs)?;
                        self.binary_op(
                            op,
                            Operand { ty: &lhs.ty, id: current, constant: false },
                            Operand { ty: &rhs.ty, id: rhs_id, constant: rhs.is_constant() },
                            &lhs.ty,
                            false,
                        )?
                    }
                };
                self.store_place(&place, value);
                Ok(match place.swizzle {
                    None if want_pointer => place.entry,
                    _ => self.value(ty, value),
                })
            }

            ExprKind::Init { var, value } => {
                let entry = self.module.register_var(Some(&mut *self.func), var)?;
                if !entry.info.is_lvalue {
                    return Err(LowerError::NotAssignable(expr.kind.name()));
                }
                let value = self.lower(value)?;
                self.store(entry.info.id, value);
                Ok(if want_pointer { entry } else { self.value(ty, value) })
            }

            ExprKind::Unary { op, operand } => {
                let fold = can_fold(expr, &[&**operand]);
                let id = self.lower(operand)?;
                let operand =
                    Operand { ty: &operand.ty, id, constant: operand.is_constant() };
                let id = self.unary_op(*op, operand, fold)?;
                Ok(self.value(ty, id))
            }

            ExprKind::Binary { op, lhs, rhs } => {
                let fold = can_fold(expr, &[&**lhs, &**rhs]);
                let lhs_id = self.lower(lhs)?;
                let rhs_id = self.lower(rhs)?;
                let id = self.binary_op(
                    *op,
                    Operand { ty: &lhs.ty, id: lhs_id, constant: lhs.is_constant() },
                    Operand { ty: &rhs.ty, id: rhs_id, constant: rhs.is_constant() },
                    ty,
                    fold,
                )?;
                Ok(self.value(ty, id))
            }

            ExprKind::Cast(operand) => {
                let id = self.lower(operand)?;
                let id = self.cast(
                    Operand { ty: &operand.ty, id, constant: operand.is_constant() },
                    ty,
                )?;
                Ok(self.value(ty, id))
            }

            &ExprKind::Step { op, ref operand } => {
                let id = self.lower_step(op, operand)?;
                Ok(self.value(ty, id))
            }

            ExprKind::Construct(args) => {
                let id = self.construct(ty, args, expr.is_constant())?;
                Ok(self.value(ty, id))
            }

            ExprKind::Call { func, args } => {
                let id = self.call(func, args)?;
                Ok(self.value(ty, id))
            }

            &ExprKind::Intrinsic { intrinsic, ref args } => {
                let id = self.lower_intrinsic(intrinsic, args, ty)?;
                Ok(self.value(ty, id))
            }
            &ExprKind::Image { access, ref args } => {
                let id = self.lower_image_access(access, args, ty)?;
                Ok(self.value(ty, id))
            }
            &ExprKind::Texture { access, ref args } => {
                let id = self.lower_texture_access(access, args, ty)?;
                Ok(self.value(ty, id))
            }

            ExprKind::Select { cond, on_true, on_false } => {
                let fold = can_fold(expr, &[&**cond, &**on_true, &**on_false]);
                let mut cond_id = self.lower(cond)?;
                let true_id = self.lower(on_true)?;
                let false_id = self.lower(on_false)?;

                // NOTE: scalar conditions for vector selects need SPIR-V 1.4.
                if let (Type::Scalar(Scalar::Bool), Some(n @ 2..)) = (&cond.ty, ty.vector_size())
                {
                    if self.module.config.version < (1, 4) {
                        cond_id = self.splat(Scalar::Bool, cond_id, n, cond.is_constant());
                    }
                }
                let id = self.emit_or_fold(fold, Op::Select, ty, [cond_id, true_id, false_id]);
                Ok(self.value(ty, id))
            }
        }
    }

    /// Member/array/swizzle chains rooted at a variable.
    fn visit_chain(&mut self, expr: &Expr) -> Result<ScopeEntry> {
        let place = self.place(expr)?;
        Ok(match place.swizzle {
            None => place.entry,
            Some(_) => {
                let id = self.load_place(&place);
                self.value(&expr.ty, id)
            }
        })
    }

    /// Member/array/swizzle applied to a value (e.g. `(a + b).xy`), instead of
    /// storage.
    fn lower_component_of_value(&mut self, expr: &Expr) -> Result<Id> {
        let ty = &expr.ty;
        match &expr.kind {
            ExprKind::Swizzle { outer, swizzle } => {
                let vector = self.lower(outer)?;
                Ok(match (&outer.ty, swizzle.components()) {
                    (Type::Scalar(_), [_]) => vector,
                    (&Type::Scalar(scalar), components) => {
                        self.splat(scalar, vector, components.len() as u32, outer.is_constant())
                    }
                    (_, &[component]) => self.emit(Op::CompositeExtract, ty, [vector, component]),
                    (_, components) => self.emit(
                        Op::VectorShuffle,
                        ty,
                        [vector, vector].into_iter().chain(components.iter().copied()),
                    ),
                })
            }
            &ExprKind::Member { ref outer, index } => {
                let composite = self.lower(outer)?;
                Ok(self.emit(Op::CompositeExtract, ty, [composite, index]))
            }
            ExprKind::Index { array, index } => {
                let composite = self.lower(array)?;
                if let Some(index) = literal_index(index) {
                    return Ok(self.emit(Op::CompositeExtract, ty, [composite, index]));
                }
                let index = self.lower(index)?;
                if let Type::Vector(..) = array.ty {
                    return Ok(self.emit(Op::VectorExtractDynamic, ty, [composite, index]));
                }

                // Dynamic indexing needs an access chain, i.e. storage.
                let temp = self.module.register_temp_variable(self.func, &array.ty);
                self.store(temp, composite);
                let element_type = self.module.register_type(ty);
                let pointer_type =
                    self.module.register_pointer_type(element_type, spirv::StorageClass::Function);
                let pointer = self.module.get_intermediate_result();
                self.block.push(
                    Inst::from(Op::AccessChain)
                        .with_result_type(pointer_type)
                        .with_result(pointer)
                        .with_operands([temp, index]),
                );
                let value = self.load(ScopeEntry {
                    info: VariableInfo::pointer(pointer),
                    storage: Some(spirv::StorageClass::Function),
                    type_id: element_type,
                });
                self.module.put_intermediate_result(pointer);
                Ok(value)
            }
            kind => Err(LowerError::NotChainable(kind.name())),
        }
    }

    fn lower_step(&mut self, op: StepOp, operand: &Expr) -> Result<Id> {
        let place = self.assignable_place(operand)?;
        let old = self.load_place(&place);

        let (scalar, size) = match operand.ty {
            Type::Scalar(s) if s != Scalar::Bool => (s, 1),
            Type::Vector(s, n) if s != Scalar::Bool => (s, n),
            _ => return Err(LowerError::type_mismatch("numeric scalar or vector", &operand.ty)),
        };
        let one = Literal::one(scalar)
            .ok_or_else(|| LowerError::type_mismatch("numeric scalar or vector", &operand.ty))?;
        let mut one = self.module.register_literal(one);
        if size > 1 {
            one = self.splat(scalar, one, size, true);
        }

        let bin_op = if op.is_inc() { BinOp::Add } else { BinOp::Sub };
        let new = self.binary_op(
            bin_op,
            Operand { ty: &operand.ty, id: old, constant: false },
            Operand { ty: &operand.ty, id: one, constant: true },
            &operand.ty,
            false,
        )?;
        self.store_place(&place, new);

        Ok(if op.is_pre() { new } else { old })
    }

    fn call(&mut self, func: &Var, args: &[Expr]) -> Result<Id> {
        let Type::Function(func_ty) = &func.ty else {
            return Err(LowerError::type_mismatch("function", &func.ty));
        };
        let FunctionType { ret, params } = &**func_ty;
        if args.len() != params.len() {
            return Err(LowerError::ArgCount {
                what: format!("call to `{}`", func.name),
                expected: params.len(),
                found: args.len(),
            });
        }

        let function_id = self.module.function_id(&func.name);
        let mut operands: SmallVec<[Id; 8]> = SmallVec::new();
        operands.push(function_id);
        let mut writebacks = vec![];
        for (arg, param) in args.iter().zip(params) {
            let id = if param.is_output_parameter() {
                let (pointer, writeback) = self.out_argument(arg, param.is_input_parameter())?;
                writebacks.extend(writeback);
                pointer
            } else if param.is_passed_by_reference() {
                self.by_reference_argument(arg)?
            } else {
                self.lower(arg)?
            };
            operands.push(id);
        }

        let id = self.emit(Op::FunctionCall, ret, operands);
        self.write_back(writebacks);
        Ok(id)
    }

    /// Pointer to `arg`, copied into a `Function`-storage temporary unless it
    /// already is in `Function` storage (e.g. images and samplers, which are
    /// declared in `UniformConstant` storage).
    fn by_reference_argument(&mut self, arg: &Expr) -> Result<Id> {
        if arg.is_chain() {
            let place = self.place(arg)?;
            if place.is_function_local() {
                return Ok(place.entry.info.id);
            }
            let value = self.load_place(&place);
            return Ok(self.spill(&arg.ty, value));
        }
        let value = self.lower(arg)?;
        Ok(self.spill(&arg.ty, value))
    }

    /// Pointer for an `out` (or, with `copy_in`, `inout`) argument, going
    /// through a temporary unless `arg` already is in `Function` storage.
    fn out_argument(&mut self, arg: &Expr, copy_in: bool) -> Result<(Id, Option<Writeback>)> {
        let place = self.assignable_place(arg)?;
        if place.is_function_local() {
            return Ok((place.entry.info.id, None));
        }

        let temp = self.module.register_temp_variable(self.func, &arg.ty);
        let temp_type = self.module.register_type(&arg.ty);
        if copy_in {
            let value = self.load_place(&place);
            self.store(temp, value);
        }
        Ok((temp, Some(Writeback { temp, temp_type, place })))
    }

    fn write_back(&mut self, writebacks: Vec<Writeback>) {
        for Writeback { temp, temp_type, place } in writebacks {
            let value = self.load(ScopeEntry {
                info: VariableInfo::pointer(temp),
                storage: Some(spirv::StorageClass::Function),
                type_id: temp_type,
            });
            self.store_place(&place, value);
        }
    }

    fn construct(&mut self, ty: &Type, args: &[Expr], mut constant: bool) -> Result<Id> {
        let target_scalar = ty.scalar();

        let mut ids: SmallVec<[Id; 4]> = SmallVec::new();
        for arg in args {
            let id = match (target_scalar, &arg.kind, arg.ty.scalar()) {
                (Some(to), &ExprKind::Literal(value), Some(from)) if from != to => {
                    self.module.register_literal(ops::convert_literal(value, to))
                }
                (Some(to), _, Some(from)) if from != to => {
                    let converted_ty = match arg.ty {
                        Type::Vector(_, n) => Type::Vector(to, n),
                        _ => Type::Scalar(to),
                    };
                    let id = self.lower(arg)?;
                    constant = false;
                    self.cast(Operand { ty: &arg.ty, id, constant: false }, &converted_ty)?
                }
                _ => self.lower(arg)?,
            };
            ids.push(id);
        }

        match *ty {
            Type::Scalar(_) => {
                let ([arg], &[id]) = (args, &ids[..]) else {
                    return Err(LowerError::ArgCount {
                        what: format!("`{ty:?}` constructor"),
                        expected: 1,
                        found: args.len(),
                    });
                };
                Ok(match arg.ty {
                    Type::Scalar(_) => id,
                    _ => self.emit(Op::CompositeExtract, ty, [id, 0]),
                })
            }

            Type::Vector(scalar, n) => {
                if let ([arg], &[id]) = (args, &ids[..]) {
                    match arg.ty {
                        Type::Scalar(_) => return Ok(self.splat(scalar, id, n, constant)),
                        Type::Vector(_, m) if m == n => return Ok(id),
                        Type::Vector(_, m) if m > n => {
                            return Ok(self.emit(
                                Op::VectorShuffle,
                                ty,
                                [id, id].into_iter().chain(0..n),
                            ));
                        }
                        _ => {}
                    }
                }
                // `OpConstantComposite` needs exactly one constituent per component.
                let constant = constant && args.iter().all(|arg| matches!(arg.ty, Type::Scalar(_)));
                Ok(self.composite(ty, &ids, constant))
            }

            Type::Matrix { scalar, columns, rows } => {
                let column_ty = Type::Vector(scalar, rows);
                match (args, &ids[..]) {
                    ([arg], &[id]) if arg.ty == *ty => Ok(id),
                    ([arg], &[diagonal]) if matches!(arg.ty, Type::Scalar(_)) => {
                        let zero = self.module.register_literal(Literal::zero(scalar));
                        let column_ids: SmallVec<[Id; 4]> = (0..columns)
                            .map(|c| {
                                let components: SmallVec<[Id; 4]> = (0..rows)
                                    .map(|r| if r == c { diagonal } else { zero })
                                    .collect();
                                self.composite(&column_ty, &components, constant)
                            })
                            .collect();
                        Ok(self.composite(ty, &column_ids, constant))
                    }
                    _ if args.iter().all(|arg| arg.ty == column_ty) => {
                        Ok(self.composite(ty, &ids, constant))
                    }
                    _ if args.len() == (columns * rows) as usize
                        && args.iter().all(|arg| matches!(arg.ty, Type::Scalar(_))) =>
                    {
                        let column_ids: SmallVec<[Id; 4]> = ids
                            .chunks(rows as usize)
                            .map(|components| self.composite(&column_ty, components, constant))
                            .collect();
                        Ok(self.composite(ty, &column_ids, constant))
                    }
                    _ => Err(LowerError::UnsupportedCast {
                        from: args.first().map_or(Type::Void, |arg| arg.ty.clone()),
                        to: ty.clone(),
                    }),
                }
            }

            Type::Array(_) | Type::Struct(_) => Ok(self.composite(ty, &ids, constant)),

            _ => Err(LowerError::type_mismatch("constructible type", ty)),
        }
    }

    /// A composite constant if `constant`, otherwise `OpCompositeConstruct`.
    fn composite(&mut self, ty: &Type, constituents: &[Id], constant: bool) -> Id {
        if constant {
            self.module.register_composite(constituents, ty)
        } else {
            self.emit(Op::CompositeConstruct, ty, constituents.iter().copied())
        }
    }

    /// Replicates the `scalar` value `id` into a vector of `n` components.
    fn splat(&mut self, scalar: Scalar, id: Id, n: u32, constant: bool) -> Id {
        let constituents: SmallVec<[Id; 4]> = (0..n).map(|_| id).collect();
        self.composite(&Type::Vector(scalar, n), &constituents, constant)
    }

    /// Stores `value` into a fresh `Function`-storage temporary.
    fn spill(&mut self, ty: &Type, value: Id) -> Id {
        let temp = self.module.register_temp_variable(self.func, ty);
        self.store(temp, value);
        temp
    }

    fn value(&mut self, ty: &Type, id: Id) -> ScopeEntry {
        ScopeEntry { info: VariableInfo::value(id), storage: None, type_id: self.module.register_type(ty) }
    }

    /// Appends an instruction with a result of type `ty`, returning its ID.
    fn emit(&mut self, opcode: Op, ty: &Type, operands: impl IntoIterator<Item = u32>) -> Id {
        let type_id = self.module.register_type(ty);
        self.emit_typed(opcode, type_id, operands)
    }

    fn emit_typed(&mut self, opcode: Op, type_id: Id, operands: impl IntoIterator<Item = u32>) -> Id {
        let id = self.module.next_id();
        self.block.push(
            Inst::from(opcode).with_result_type(type_id).with_result(id).with_operands(operands),
        );
        id
    }

    /// Appends an instruction without a result.
    fn emit_void(&mut self, opcode: Op, operands: impl IntoIterator<Item = u32>) {
        self.block.push(Inst::from(opcode).with_operands(operands));
    }

    /// Like [`ExprLowerer::emit`], but with `fold`, the operation is done at
    /// specialization time instead (as an `OpSpecConstantOp`).
    fn emit_or_fold(&mut self, fold: bool, opcode: Op, ty: &Type, operands: impl IntoIterator<Item = u32>) -> Id {
        if fold {
            let type_id = self.module.register_type(ty);
            let operands: SmallVec<[Id; 4]> = operands.into_iter().collect();
            self.module.register_spec_constant_op(type_id, opcode, &operands)
        } else {
            self.emit(opcode, ty, operands)
        }
    }

    /// The value of `entry`, loading from it if it's a pointer.
    fn load(&mut self, entry: ScopeEntry) -> Id {
        if entry.info.is_rvalue || entry.info.id == NO_VALUE {
            return entry.info.id;
        }
        self.emit_typed(Op::Load, entry.type_id, [entry.info.id])
    }

    fn store(&mut self, pointer: Id, value: Id) {
        self.emit_void(Op::Store, [pointer, value]);
    }
}

/// Whether `expr` can be computed as an `OpSpecConstantOp` (only integer and
/// boolean operations are allowed for shaders).
fn can_fold(expr: &Expr, operands: &[&Expr]) -> bool {
    let foldable_type = |ty: &Type| matches!(ty, Type::Scalar(s) if !s.is_float());
    expr.is_spec_constant()
        && foldable_type(&expr.ty)
        && operands.iter().all(|operand| foldable_type(&operand.ty))
}

/// The index of `array[index]`, if it's an integer literal.
fn literal_index(index: &Expr) -> Option<u32> {
    match index.kind {
        ExprKind::Literal(Literal::Int(i)) => u32::try_from(i).ok(),
        ExprKind::Literal(Literal::UInt(i)) => Some(i),
        _ => None,
    }
}
