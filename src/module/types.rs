//! Type registration (`OpType*` declarations and their layout decorations).

use super::Module;
use crate::ast::{ImageConfig, MemoryLayout, Scalar, StructType, Type};
use crate::layout;
use crate::spv::{Id, Inst, Op};
use log::trace;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

/// Cache key for types: most types are keyed by their (normalized) AST form,
/// but arrays also depend on the layout context they're registered in.
#[derive(Clone, PartialEq, Eq, Hash)]
enum TypeKey {
    Plain(Type),
    Array { element: Id, len: Option<u32>, stride: Option<u32> },

    /// Anonymous struct of the given member types (e.g. `OpIAddCarry` results).
    Tuple(SmallVec<[Id; 4]>),
}

#[derive(Default)]
pub(super) struct TypeCaches {
    types: FxHashMap<TypeKey, Id>,
    pointers: FxHashMap<(Id, u32), Id>,
    functions: FxHashMap<SmallVec<[Id; 4]>, Id>,
}

/// Layout context of variables in `storage`, for strides of arrays that
/// aren't nested in a struct (which always has its own layout).
pub(crate) fn layout_of_storage(storage: spirv::StorageClass) -> Option<MemoryLayout> {
    match storage {
        spirv::StorageClass::Uniform => Some(MemoryLayout::Std140),
        spirv::StorageClass::PushConstant | spirv::StorageClass::StorageBuffer => {
            Some(MemoryLayout::Std430)
        }
        _ => None,
    }
}

impl Module {
    /// Registers `ty` (and, first, every type it refers to), outside of any
    /// buffer layout (i.e. arrays get no `ArrayStride`).
    pub fn register_type(&mut self, ty: &Type) -> Id {
        self.register_type_in(ty, None, None)
    }

    /// Like [`Module::register_type`], but arrays get an `ArrayStride`
    /// decoration following `layout`.
    pub fn register_type_with_layout(&mut self, ty: &Type, layout: MemoryLayout) -> Id {
        self.register_type_in(ty, Some(layout), None)
    }

    /// Registers `ty` with an optional layout context, and an array stride
    /// overriding the layout's (only used if `ty` is an array).
    pub(crate) fn register_type_in(
        &mut self,
        ty: &Type,
        layout: Option<MemoryLayout>,
        explicit_stride: Option<u32>,
    ) -> Id {
        match ty {
            Type::Array(array) => {
                let element = self.register_type_in(&array.element, layout, None);
                let stride = if array.element.innermost_element().is_opaque() {
                    None
                } else {
                    explicit_stride.or_else(|| layout.map(|l| layout::array_stride(&array.element, l)))
                };
                let key = TypeKey::Array { element, len: array.len, stride };
                if let Some(&id) = self.caches.types.get(&key) {
                    return id;
                }

                let inst = match array.len {
                    Some(len) => {
                        let len = self.register_literal(len);
                        Inst::from(Op::TypeArray).with_operands([element, len])
                    }
                    None => Inst::from(Op::TypeRuntimeArray).with_operands([element]),
                };
                let id = self.next_id();
                self.declarations.push(inst.with_result(id));
                if let Some(stride) = stride {
                    self.decorate(id, spirv::Decoration::ArrayStride, [stride]);
                }
                trace!("type %{id} = {ty:?}");
                self.caches.types.insert(key, id);
                id
            }
            _ => {
                // `OpTypeSampler` doesn't distinguish comparison samplers.
                let normalized = match ty {
                    Type::Sampler { .. } => Type::Sampler { comparison: false },
                    _ => ty.clone(),
                };
                let key = TypeKey::Plain(normalized);
                if let Some(&id) = self.caches.types.get(&key) {
                    return id;
                }
                let id = self.register_non_array_type(ty);
                trace!("type %{id} = {ty:?}");
                self.caches.types.insert(key, id);
                id
            }
        }
    }

    fn register_non_array_type(&mut self, ty: &Type) -> Id {
        let inst = match ty {
            Type::Void => Inst::from(Op::TypeVoid),
            &Type::Scalar(scalar) => match scalar {
                Scalar::Bool => Inst::from(Op::TypeBool),
                Scalar::Int => Inst::from(Op::TypeInt).with_operands([32, 1]),
                Scalar::UInt => Inst::from(Op::TypeInt).with_operands([32, 0]),
                Scalar::Float => Inst::from(Op::TypeFloat).with_operands([32]),
                Scalar::Double => Inst::from(Op::TypeFloat).with_operands([64]),
            },
            &Type::Vector(scalar, n) => {
                let component = self.register_type(&Type::Scalar(scalar));
                Inst::from(Op::TypeVector).with_operands([component, n])
            }
            &Type::Matrix { scalar, columns, rows } => {
                let column = self.register_type(&Type::Vector(scalar, rows));
                Inst::from(Op::TypeMatrix).with_operands([column, columns])
            }
            Type::Struct(st) => return self.register_struct_type(st),
            Type::Image(config) => {
                let sampled_type = self.register_type(&Type::Scalar(config.sampled));
                Inst::from(Op::TypeImage).with_operands(image_type_operands(sampled_type, config))
            }
            Type::SampledImage(config) => {
                let image = self.register_type(&Type::Image(*config));
                Inst::from(Op::TypeSampledImage).with_operands([image])
            }
            Type::Sampler { .. } => Inst::from(Op::TypeSampler),
            Type::Function(f) => {
                let ret = self.register_type(&f.ret);
                let params: SmallVec<[Id; 4]> = f
                    .params
                    .iter()
                    .map(|param| {
                        let ty = self.register_type(&param.ty);
                        if param.is_passed_by_reference() {
                            self.register_pointer_type(ty, spirv::StorageClass::Function)
                        } else {
                            ty
                        }
                    })
                    .collect();
                return self.register_function_type(ret, &params);
            }
            // NOTE: arrays are handled by `register_type_in`.
            Type::Array(_) => return self.register_type_in(ty, None, None),
        };
        let id = self.next_id();
        self.declarations.push(inst.with_result(id));
        id
    }

    fn register_struct_type(&mut self, st: &StructType) -> Id {
        let member_types: SmallVec<[Id; 4]> = st
            .members
            .iter()
            .map(|m| self.register_type_in(&m.ty, Some(st.layout), m.array_stride))
            .collect();

        let id = self.next_id();
        self.declarations.push(Inst::from(Op::TypeStruct).with_result(id).with_operands(member_types));
        self.debug.push(Inst::from(Op::Name).with_result(id).with_name(st.name.as_str()));

        for (index, member) in (0..).zip(&st.members) {
            self.debug.push(
                Inst::from(Op::MemberName)
                    .with_result_type(id)
                    .with_result(index)
                    .with_name(member.name.as_str()),
            );
            self.decorate_member(id, index, spirv::Decoration::Offset, [member.offset]);

            let inner = member.ty.innermost_element();
            if let Type::Matrix { .. } = inner {
                let stride = layout::matrix_stride(inner, st.layout);
                self.decorate_member(id, index, spirv::Decoration::ColMajor, []);
                self.decorate_member(id, index, spirv::Decoration::MatrixStride, [stride]);
            }
        }
        id
    }

    /// Registers an undecorated struct type with the given member types.
    pub fn register_tuple_type(&mut self, members: &[Id]) -> Id {
        let key = TypeKey::Tuple(SmallVec::from_slice(members));
        if let Some(&id) = self.caches.types.get(&key) {
            return id;
        }
        let id = self.next_id();
        self.declarations
            .push(Inst::from(Op::TypeStruct).with_result(id).with_operands(members.iter().copied()));
        trace!("type %{id} = tuple {members:?}");
        self.caches.types.insert(key, id);
        id
    }

    pub fn register_pointer_type(&mut self, pointee: Id, storage: spirv::StorageClass) -> Id {
        let key = (pointee, storage as u32);
        if let Some(&id) = self.caches.pointers.get(&key) {
            return id;
        }
        let id = self.next_id();
        self.declarations
            .push(Inst::from(Op::TypePointer).with_result(id).with_operands([storage as u32, pointee]));
        trace!("type %{id} = pointer to %{pointee} in {storage:?}");
        self.caches.pointers.insert(key, id);
        id
    }

    pub fn register_function_type(&mut self, ret: Id, params: &[Id]) -> Id {
        let key: SmallVec<[Id; 4]> = [ret].into_iter().chain(params.iter().copied()).collect();
        if let Some(&id) = self.caches.functions.get(&key) {
            return id;
        }
        let id = self.next_id();
        self.declarations.push(Inst::from(Op::TypeFunction).with_result(id).with_operands(key.iter().copied()));
        self.caches.functions.insert(key, id);
        id
    }
}

fn image_type_operands(sampled_type: Id, config: &ImageConfig) -> [u32; 7] {
    [
        sampled_type,
        config.dim as u32,
        config.depth as u32,
        config.arrayed as u32,
        config.ms as u32,
        // 1 = used with a sampler, 2 = used without (storage images).
        if config.storage { 2 } else { 1 },
        config.format as u32,
    ]
}
