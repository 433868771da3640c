//! Variable registration and name scoping.

use super::types::layout_of_storage;
use super::{FuncScope, Module};
use crate::ast::{Type, Variable};
use crate::error::{LowerError, Result};
use crate::spv::{Id, Inst, Op};
use crate::FxIndexMap;
use lazy_static::lazy_static;
use log::trace;
use rustc_hash::FxHashMap;

/// How a lowered value (or named entity) can be used.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct VariableInfo {
    pub id: Id,

    /// `id` is a pointer to storage (i.e. it can be loaded from/stored to).
    pub is_lvalue: bool,

    /// `id` is a value (i.e. it can be used directly as an operand).
    pub is_rvalue: bool,
}

impl VariableInfo {
    pub fn pointer(id: Id) -> Self {
        Self { id, is_lvalue: true, is_rvalue: false }
    }

    pub fn value(id: Id) -> Self {
        Self { id, is_lvalue: false, is_rvalue: true }
    }
}

/// A name visible in some scope.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ScopeEntry {
    pub info: VariableInfo,

    /// Storage class, for pointers (`None` for values, e.g. specialization
    /// constants and by-value function parameters).
    pub storage: Option<spirv::StorageClass>,

    /// The type of the value (for pointers, of the pointee).
    pub type_id: Id,
}

#[derive(Clone, Debug, Default)]
pub struct Scope {
    entries: FxIndexMap<String, ScopeEntry>,
}

impl Scope {
    pub fn get(&self, name: &str) -> Option<&ScopeEntry> {
        self.entries.get(name)
    }

    pub(super) fn insert(&mut self, name: &str, entry: ScopeEntry) {
        self.entries.insert(name.to_string(), entry);
    }

    /// Reverse lookup, by ID.
    pub fn name_of(&self, id: Id) -> Option<&str> {
        self.entries.iter().find(|(_, entry)| entry.info.id == id).map(|(name, _)| &name[..])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

macro_rules! builtins {
    ($($name:literal => $builtin:ident,)*) => {
        static BUILTINS: &[(&str, spirv::BuiltIn)] = &[$(($name, spirv::BuiltIn::$builtin),)*];
    };
}

builtins! {
    "gl_Position" => Position,
    "gl_PointSize" => PointSize,
    "gl_ClipDistance" => ClipDistance,
    "gl_CullDistance" => CullDistance,
    "gl_VertexID" => VertexId,
    "gl_InstanceID" => InstanceId,
    "gl_PrimitiveID" => PrimitiveId,
    "gl_InvocationID" => InvocationId,
    "gl_Layer" => Layer,
    "gl_ViewportIndex" => ViewportIndex,
    "gl_TessLevelOuter" => TessLevelOuter,
    "gl_TessLevelInner" => TessLevelInner,
    "gl_TessCoord" => TessCoord,
    "gl_PatchVertices" => PatchVertices,
    "gl_FragCoord" => FragCoord,
    "gl_PointCoord" => PointCoord,
    "gl_FrontFacing" => FrontFacing,
    "gl_SampleID" => SampleId,
    "gl_SamplePosition" => SamplePosition,
    "gl_SampleMask" => SampleMask,
    "gl_FragDepth" => FragDepth,
    "gl_HelperInvocation" => HelperInvocation,
    "gl_NumWorkgroups" => NumWorkgroups,
    "gl_WorkgroupSize" => WorkgroupSize,
    "gl_WorkgroupID" => WorkgroupId,
    "gl_LocalInvocationID" => LocalInvocationId,
    "gl_GlobalInvocationID" => GlobalInvocationId,
    "gl_LocalInvocationIndex" => LocalInvocationIndex,
    "gl_WorkDim" => WorkDim,
    "gl_GlobalSize" => GlobalSize,
    "gl_EnqueuedWorkgroupSize" => EnqueuedWorkgroupSize,
    "gl_GlobalOffset" => GlobalOffset,
    "gl_GlobalLinearID" => GlobalLinearId,
    "gl_SubgroupSize" => SubgroupSize,
    "gl_SubgroupMaxSize" => SubgroupMaxSize,
    "gl_NumSubgroups" => NumSubgroups,
    "gl_NumEnqueuedSubgroups" => NumEnqueuedSubgroups,
    "gl_SubgroupID" => SubgroupId,
    "gl_SubgroupLocalInvocationID" => SubgroupLocalInvocationId,
    "gl_VertexIndex" => VertexIndex,
    "gl_InstanceIndex" => InstanceIndex,
    "gl_BaseVertex" => BaseVertex,
    "gl_BaseInstance" => BaseInstance,
    "gl_DrawIndex" => DrawIndex,
    "gl_DeviceIndex" => DeviceIndex,
    "gl_ViewIndex" => ViewIndex,
    "gl_FragStencilRefEXT" => FragStencilRefEXT,
}

lazy_static! {
    static ref BUILTINS_BY_NAME: FxHashMap<&'static str, spirv::BuiltIn> =
        BUILTINS.iter().copied().collect();
}

/// The built-in a variable named `name` stands for, if any.
pub fn builtin_of(name: &str) -> Option<spirv::BuiltIn> {
    BUILTINS_BY_NAME.get(name).copied()
}

impl Module {
    /// Looks up `name` in the function scope (if any), then in module scope.
    pub fn lookup(&self, func: Option<&FuncScope>, name: &str) -> Option<ScopeEntry> {
        func.and_then(|func| func.locals.get(name)).or_else(|| self.globals.get(name)).copied()
    }

    /// Storage class for `var`, based on its classification.
    pub fn storage_class_of(&self, var: &Variable) -> spirv::StorageClass {
        use spirv::StorageClass as S;

        if var.is_shader_output() {
            S::Output
        } else if var.is_shader_input() || var.is_builtin() {
            S::Input
        } else if var.is_uniform() {
            if var.is_constant() || var.ty.innermost_element().is_opaque() {
                S::UniformConstant
            } else if var.is_storage_buffer() {
                self.storage_buffer_class()
            } else {
                S::Uniform
            }
        } else if var.is_storage_buffer() {
            self.storage_buffer_class()
        } else if var.is_push_constant() {
            S::PushConstant
        } else if var.is_local() || var.is_parameter() {
            S::Function
        } else {
            S::Private
        }
    }

    fn storage_buffer_class(&self) -> spirv::StorageClass {
        // `StorageBuffer` is only core since SPIR-V 1.3 (before that, storage
        // buffers are `Uniform` with a `BufferBlock` struct type).
        if self.config.version >= (1, 3) {
            spirv::StorageClass::StorageBuffer
        } else {
            spirv::StorageClass::Uniform
        }
    }

    /// Declares a variable named `name` (of type `ty`), unless one already
    /// exists in the current scope, and returns its pointer ID.
    ///
    /// `Function` storage requires `func`, where the declaration is queued (and
    /// later hoisted to the start of the function, by `end_function`).
    pub fn register_variable(
        &mut self,
        func: Option<&mut FuncScope>,
        name: &str,
        storage: spirv::StorageClass,
        ty: &Type,
    ) -> Result<VariableInfo> {
        self.register_variable_entry(func, name, storage, ty).map(|entry| entry.info)
    }

    fn register_variable_entry(
        &mut self,
        mut func: Option<&mut FuncScope>,
        name: &str,
        storage: spirv::StorageClass,
        ty: &Type,
    ) -> Result<ScopeEntry> {
        let is_local = storage == spirv::StorageClass::Function;

        let existing = if is_local {
            func.as_deref().and_then(|func| func.locals.get(name).copied())
        } else {
            self.globals.get(name).copied()
        };
        if let Some(entry) = existing {
            return Ok(entry);
        }
        if is_local && func.is_none() {
            return Err(LowerError::NoFunctionScope(name.to_string()));
        }

        let id = self.next_id();

        // Avoid e.g. a block variable and its struct type having the same name.
        let debug_name = match ty {
            Type::Struct(st) if st.name == name => format!("{name}Inst"),
            _ => name.to_string(),
        };
        self.debug.push(Inst::from(Op::Name).with_result(id).with_name(debug_name));

        if let Some(builtin) = builtin_of(name) {
            self.decorate(id, spirv::Decoration::BuiltIn, [builtin as u32]);
        }

        let type_id = self.register_type_in_storage(ty, storage);
        let pointer_type = self.register_pointer_type(type_id, storage);
        let inst = Inst::from(Op::Variable)
            .with_result_type(pointer_type)
            .with_result(id)
            .with_operands([storage as u32]);

        let entry = ScopeEntry { info: VariableInfo::pointer(id), storage: Some(storage), type_id };
        match func.as_deref_mut() {
            Some(func) if is_local => {
                func.function.variables.push(inst);
                func.locals.insert(name, entry);
            }
            _ => {
                self.declarations.push(inst);
                self.globals.insert(name, entry);
            }
        }
        trace!("variable %{id} `{name}` in {storage:?}");
        Ok(entry)
    }

    pub(crate) fn register_type_in_storage(&mut self, ty: &Type, storage: spirv::StorageClass) -> Id {
        match layout_of_storage(storage) {
            Some(layout) => self.register_type_with_layout(ty, layout),
            None => self.register_type(ty),
        }
    }

    /// Resolves `var` to a scope entry, declaring it (with the storage class
    /// chosen by [`Module::storage_class_of`]) on first use.
    ///
    /// Members of interface blocks resolve to their outermost variable.
    pub fn register_var(
        &mut self,
        func: Option<&mut FuncScope>,
        var: &Variable,
    ) -> Result<ScopeEntry> {
        if let Some(outer) = var.outer() {
            return self.register_var(func, outer);
        }
        if let Some(entry) = self.lookup(func.as_deref(), &var.name) {
            return Ok(entry);
        }
        if var.is_specialization_constant() {
            return Err(LowerError::UnknownVariable(var.name.clone()));
        }

        let storage = self.storage_class_of(var);
        self.register_variable_entry(func, &var.name, storage, &var.ty)
    }

    /// Registers the synthetic `outer::name` entity for a member of the
    /// variable `outer`, along with its index constant, and returns its ID.
    pub fn register_member_variable(
        &mut self,
        func: Option<&FuncScope>,
        outer: Id,
        name: &str,
        index: u32,
    ) -> Result<Id> {
        let outer_name = func
            .and_then(|func| func.locals.name_of(outer))
            .or_else(|| self.globals.name_of(outer))
            .or_else(|| {
                self.member_variables
                    .iter()
                    .find(|(_, ids)| ids.1 == outer)
                    .map(|(name, _)| &name[..])
            })
            .ok_or_else(|| LowerError::UnknownVariable(format!("%{outer}")))?;
        let full_name = format!("{outer_name}::{name}");

        if let Some(&(_, id)) = self.member_variables.get(&full_name) {
            return Ok(id);
        }
        let id = self.next_id();
        self.register_member_variable_index(index);
        self.member_variables.insert(full_name, (outer, id));
        Ok(id)
    }

    /// The outermost variable a (possibly nested) member variable belongs to.
    pub fn outer_variable(&self, member: Id) -> Option<Id> {
        let outer_of =
            |id: Id| self.member_variables.values().find(|&&(_, m)| m == id).map(|&(outer, _)| outer);
        let mut outer = outer_of(member)?;
        while let Some(next) = outer_of(outer) {
            outer = next;
        }
        Some(outer)
    }

    /// Declares an unnamed `Function` variable (e.g. to pass a value by
    /// reference), and returns its pointer ID.
    pub fn register_temp_variable(&mut self, func: &mut FuncScope, ty: &Type) -> Id {
        let type_id = self.register_type(ty);
        let pointer_type = self.register_pointer_type(type_id, spirv::StorageClass::Function);
        let id = self.next_id();
        func.function.variables.push(
            Inst::from(Op::Variable)
                .with_result_type(pointer_type)
                .with_result(id)
                .with_operands([spirv::StorageClass::Function as u32]),
        );
        id
    }

    pub fn bind_variable(&mut self, var: Id, binding: u32, set: u32) {
        self.decorate(var, spirv::Decoration::Binding, [binding]);
        self.decorate(var, spirv::Decoration::DescriptorSet, [set]);
    }

    /// Binds the buffer variable `name`, and decorates its struct type with
    /// `block_decoration` (`Block` or `BufferBlock`), once per type.
    pub fn bind_buffer_variable(
        &mut self,
        name: &str,
        binding: u32,
        set: u32,
        block_decoration: spirv::Decoration,
    ) -> Result<()> {
        let entry =
            self.globals.get(name).copied().ok_or_else(|| LowerError::UnknownVariable(name.to_string()))?;
        self.bind_variable(entry.info.id, binding, set);
        if self.block_types.insert(entry.type_id) {
            self.decorate(entry.type_id, block_decoration, []);
        }
        Ok(())
    }

    pub fn decorate_location(&mut self, var: Id, location: u32) {
        self.decorate(var, spirv::Decoration::Location, [location]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustc_hash::FxHashSet;

    #[test]
    fn builtin_table_is_one_to_one() {
        let mut names = FxHashSet::default();
        let mut builtins = FxHashSet::default();
        for &(name, builtin) in BUILTINS {
            assert!(names.insert(name), "{name} listed twice");
            assert!(builtins.insert(builtin as u32), "{builtin:?} listed twice");
            assert_eq!(builtin_of(name), Some(builtin));
        }
        assert_eq!(builtin_of("position"), None);
    }
}
