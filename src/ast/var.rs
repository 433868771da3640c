use super::Type;
use std::rc::Rc;

bitflags::bitflags! {
    /// Classification of a variable, as decided by the front-end.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct VarFlags: u32 {
        const UNIFORM = 1 << 0;
        const BUILTIN = 1 << 1;
        const SHADER_INPUT = 1 << 2;
        const SHADER_OUTPUT = 1 << 3;
        const CONSTANT = 1 << 4;
        const PUSH_CONSTANT = 1 << 5;
        const SPECIALIZATION_CONSTANT = 1 << 6;
        const LOCAL = 1 << 7;
        const PARAMETER = 1 << 8;
        const OUTPUT_PARAMETER = 1 << 9;
        const INPUT_PARAMETER = 1 << 10;
        const STORAGE_BUFFER = 1 << 11;
    }
}

/// Shared handle to a [`Variable`] (the AST references variables from
/// multiple places, e.g. declarations and every use).
pub type Var = Rc<Variable>;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Variable {
    pub name: String,
    pub ty: Type,
    pub flags: VarFlags,

    /// For members of an interface block (or any struct variable): the
    /// enclosing variable and the member index in it.
    pub outer: Option<(Var, u32)>,
}

impl Variable {
    pub fn new(name: impl Into<String>, ty: Type, flags: VarFlags) -> Var {
        Rc::new(Self { name: name.into(), ty, flags, outer: None })
    }

    /// Creates the variable for member `index` of `outer`.
    pub fn member_of(outer: &Var, index: u32, name: impl Into<String>, ty: Type) -> Var {
        Rc::new(Self {
            name: name.into(),
            ty,
            flags: outer.flags,
            outer: Some((outer.clone(), index)),
        })
    }

    pub fn is_uniform(&self) -> bool {
        self.flags.contains(VarFlags::UNIFORM)
    }

    pub fn is_builtin(&self) -> bool {
        self.flags.contains(VarFlags::BUILTIN)
    }

    pub fn is_shader_input(&self) -> bool {
        self.flags.contains(VarFlags::SHADER_INPUT)
    }

    pub fn is_shader_output(&self) -> bool {
        self.flags.contains(VarFlags::SHADER_OUTPUT)
    }

    pub fn is_constant(&self) -> bool {
        self.flags.contains(VarFlags::CONSTANT)
    }

    pub fn is_push_constant(&self) -> bool {
        self.flags.contains(VarFlags::PUSH_CONSTANT)
    }

    pub fn is_specialization_constant(&self) -> bool {
        self.flags.contains(VarFlags::SPECIALIZATION_CONSTANT)
    }

    pub fn is_local(&self) -> bool {
        self.flags.contains(VarFlags::LOCAL)
    }

    pub fn is_parameter(&self) -> bool {
        self.flags.intersects(
            VarFlags::PARAMETER | VarFlags::INPUT_PARAMETER | VarFlags::OUTPUT_PARAMETER,
        )
    }

    pub fn is_output_parameter(&self) -> bool {
        self.flags.contains(VarFlags::OUTPUT_PARAMETER)
    }

    /// `inout` parameters are both input and output parameters.
    pub fn is_input_parameter(&self) -> bool {
        self.flags.contains(VarFlags::INPUT_PARAMETER)
    }

    pub fn is_storage_buffer(&self) -> bool {
        self.flags.contains(VarFlags::STORAGE_BUFFER)
    }

    pub fn is_member(&self) -> bool {
        self.outer.is_some()
    }

    pub fn outer(&self) -> Option<&Var> {
        self.outer.as_ref().map(|(outer, _)| outer)
    }

    /// Parameters passed by reference, i.e. as a Function-storage pointer.
    pub fn is_passed_by_reference(&self) -> bool {
        self.is_output_parameter() || self.ty.is_aggregate() || self.ty.is_opaque()
    }
}
