//! Access chains, i.e. nested member/array/swizzle selections, flattened into
//! a single `OpAccessChain` (plus an `OpVectorShuffle`, for swizzles of more
//! than one component, which can't be addressed through a pointer).

use super::ExprLowerer;
use crate::ast::{Expr, ExprKind, Swizzle, Type, Var};
use crate::error::{LowerError, Result};
use crate::module::{layout_of_storage, ScopeEntry, VariableInfo};
use crate::spv::{Id, Inst, Op};
use log::trace;
use smallvec::SmallVec;

#[derive(Clone, Debug, PartialEq)]
pub enum Step<'a> {
    /// The variable the chain starts at (always, and only, the first step).
    Head(&'a Var),

    /// Struct member `index`, with `name` only for members accessed as
    /// variables of their own (e.g. interface block members).
    Member { index: u32, name: Option<&'a str> },

    Index(&'a Expr),

    /// Only ever the last step (nested swizzles are composed into one).
    Swizzle(Swizzle),
}

/// Flattens a chain expression into `[Head, steps...]`, outermost first.
pub fn linearize(expr: &Expr) -> Result<SmallVec<[Step<'_>; 4]>> {
    let mut steps = SmallVec::new();
    linearize_into(expr, &mut steps)?;
    Ok(steps)
}

fn linearize_into<'a>(expr: &'a Expr, steps: &mut SmallVec<[Step<'a>; 4]>) -> Result<()> {
    match &expr.kind {
        ExprKind::Identifier(var) => {
            linearize_var(var, steps);
            Ok(())
        }
        &ExprKind::Member { ref outer, index } => {
            linearize_into(outer, steps)?;
            push_step(steps, Step::Member { index, name: None })
        }
        ExprKind::Index { array, index } => {
            linearize_into(array, steps)?;
            push_step(steps, Step::Index(index))
        }
        ExprKind::Swizzle { outer, swizzle } => {
            linearize_into(outer, steps)?;
            push_step(steps, Step::Swizzle(swizzle.clone()))
        }
        kind => Err(LowerError::NotChainable(kind.name())),
    }
}

/// Member variables re-anchor through their outer variable.
fn linearize_var<'a>(var: &'a Var, steps: &mut SmallVec<[Step<'a>; 4]>) {
    match &var.outer {
        Some((outer, index)) => {
            linearize_var(outer, steps);
            steps.push(Step::Member { index: *index, name: Some(&var.name) });
        }
        None => steps.push(Step::Head(var)),
    }
}

/// Appends `step`, composing it into a preceding swizzle if there is one
/// (e.g. `v.zyx.xy` is `v.zy`, and `v.zyx[1]` is `v.y`).
fn push_step<'a>(steps: &mut SmallVec<[Step<'a>; 4]>, step: Step<'a>) -> Result<()> {
    let composed = match (steps.last(), &step) {
        (Some(Step::Swizzle(inner)), Step::Swizzle(outer)) => outer.compose(inner),
        (Some(Step::Swizzle(inner)), Step::Index(index)) => super::literal_index(index)
            .and_then(|i| Swizzle::new(&[i]))
            .and_then(|s| s.compose(inner)),
        (Some(Step::Swizzle(_)), _) => None,
        _ => {
            steps.push(step);
            return Ok(());
        }
    };
    let composed = composed.ok_or(LowerError::NotChainable("swizzle"))?;
    if let Some(last) = steps.last_mut() {
        *last = Step::Swizzle(composed);
    }
    Ok(())
}

/// Storage named by an expression: a pointer, and possibly a swizzle of
/// more than one component (which can only be applied to the loaded vector).
#[derive(Clone, Debug)]
pub(super) struct Place {
    pub(super) entry: ScopeEntry,

    /// Type of the value `entry` points to.
    pub(super) ty: Type,

    pub(super) swizzle: Option<Swizzle>,

    /// `false` for chains into values copied to storage only to be indexed
    /// (e.g. by-value parameters), where stores would have no effect.
    pub(super) assignable: bool,
}

impl Place {
    /// Whether `entry` can be passed as-is to a by-reference parameter.
    pub(super) fn is_function_local(&self) -> bool {
        self.swizzle.is_none()
            && self.entry.info.is_lvalue
            && self.entry.storage == Some(spirv::StorageClass::Function)
    }
}

impl ExprLowerer<'_> {
    pub(super) fn place(&mut self, expr: &Expr) -> Result<Place> {
        match &expr.kind {
            ExprKind::Identifier(var) if !var.is_member() => {
                let entry = self.module.register_var(Some(&mut *self.func), var)?;
                Ok(Place {
                    entry,
                    ty: var.ty.clone(),
                    swizzle: None,
                    assignable: entry.info.is_lvalue,
                })
            }
            _ if expr.is_chain() => {
                let steps = linearize(expr)?;
                self.create(&steps)
            }
            kind => Err(LowerError::NotAssignable(kind.name())),
        }
    }

    pub(super) fn assignable_place(&mut self, expr: &Expr) -> Result<Place> {
        let place = self.place(expr)?;
        if !place.assignable {
            return Err(LowerError::NotAssignable(expr.kind.name()));
        }
        Ok(place)
    }

    /// Emits the `OpAccessChain` for `steps` (as produced by [`linearize`]).
    pub(super) fn create(&mut self, steps: &[Step<'_>]) -> Result<Place> {
        if steps.len() < 2 {
            return Err(LowerError::ChainTooShort(steps.len()));
        }
        let Step::Head(head) = &steps[0] else {
            return Err(LowerError::NotChainable("access chain without a variable"));
        };

        let mut entry = self.module.register_var(Some(&mut *self.func), head)?;
        let assignable = entry.info.is_lvalue;

        // Synthetic `outer::member` variables are anchored on this.
        let mut anchor = entry.info.id;

        if !entry.info.is_lvalue {
            let temp = self.spill(&head.ty, entry.info.id);
            let type_id = self.module.register_type(&head.ty);
            entry = ScopeEntry {
                info: VariableInfo::pointer(temp),
                storage: Some(spirv::StorageClass::Function),
                type_id,
            };
        }
        let storage = entry.storage.unwrap_or(spirv::StorageClass::Function);

        let mut ty = head.ty.clone();
        let mut layout = layout_of_storage(storage);
        let mut array_stride = None;
        let mut indices: SmallVec<[Id; 4]> = SmallVec::new();
        let mut swizzle = None;

        for step in &steps[1..] {
            match step {
                Step::Head(var) => return Err(LowerError::UnknownVariable(var.name.clone())),
                &Step::Member { index, name } => {
                    let Type::Struct(st) = &ty else {
                        return Err(LowerError::type_mismatch("struct", &ty));
                    };
                    let Some(member) = st.member(index) else {
                        return Err(LowerError::type_mismatch("struct with more members", &ty));
                    };
                    let (member_ty, member_stride, struct_layout) =
                        (member.ty.clone(), member.array_stride, st.layout);

                    if let Some(name) = name {
                        anchor = self.module.register_member_variable(
                            Some(&*self.func),
                            anchor,
                            name,
                            index,
                        )?;
                    }
                    indices.push(self.module.register_member_variable_index(index));
                    layout = Some(struct_layout);
                    array_stride = member_stride;
                    ty = member_ty;
                }
                Step::Index(index) => {
                    let element = ty
                        .component(0)
                        .ok_or_else(|| LowerError::type_mismatch("array, matrix or vector", &ty))?;
                    indices.push(self.lower(index)?);
                    array_stride = None;
                    ty = element;
                }
                Step::Swizzle(s) => match *s.components() {
                    // NOTE: `.x` of a scalar is the scalar itself.
                    [0] if matches!(ty, Type::Scalar(_)) => {}
                    [component] => {
                        let element = ty
                            .component(component)
                            .ok_or_else(|| LowerError::type_mismatch("vector", &ty))?;
                        indices.push(self.module.register_literal(component));
                        ty = element;
                    }
                    _ => swizzle = Some(s.clone()),
                },
            }
        }

        if indices.is_empty() {
            return Ok(Place { entry, ty, swizzle, assignable });
        }

        let type_id = self.module.register_type_in(&ty, layout, array_stride);
        let pointer_type = self.module.register_pointer_type(type_id, storage);
        let id = self.module.get_intermediate_result();
        self.block.push(
            Inst::from(Op::AccessChain)
                .with_result_type(pointer_type)
                .with_result(id)
                .with_operands([entry.info.id].into_iter().chain(indices.iter().copied())),
        );
        trace!("access chain %{id} = %{}{indices:?} in {storage:?}", entry.info.id);

        Ok(Place {
            entry: ScopeEntry { info: VariableInfo::pointer(id), storage: Some(storage), type_id },
            ty,
            swizzle,
            assignable,
        })
    }

    pub(super) fn load_place(&mut self, place: &Place) -> Id {
        let value = self.load(place.entry);
        match &place.swizzle {
            None => value,
            Some(swizzle) => {
                let result_ty = match place.ty {
                    Type::Vector(scalar, _) => Type::Vector(scalar, swizzle.len() as u32),
                    _ => place.ty.clone(),
                };
                self.emit(
                    Op::VectorShuffle,
                    &result_ty,
                    [value, value].into_iter().chain(swizzle.components().iter().copied()),
                )
            }
        }
    }

    /// Stores `value` into `place`, merging it into the current vector value
    /// first, for swizzles.
    pub(super) fn store_place(&mut self, place: &Place, value: Id) {
        let Some(swizzle) = &place.swizzle else {
            self.store(place.entry.info.id, value);
            return;
        };
        let vector = self.load(place.entry);
        let size = place.ty.vector_size().unwrap_or(1);
        let merged = self.emit_typed(
            Op::VectorShuffle,
            place.entry.type_id,
            [vector, value].into_iter().chain(swizzle.write_mask_indices(size)),
        );
        self.store(place.entry.info.id, merged);
    }
}
