//! Functions and their basic blocks.

use super::vars::{Scope, ScopeEntry, VariableInfo};
use super::Module;
use crate::ast::{Type, Var};
use crate::error::{LowerError, Result};
use crate::spv::{shape, Id, Inst, Op};
use log::debug;

/// A basic block: a label, straight-line instructions, and one terminator.
#[derive(Clone, Debug, PartialEq)]
pub struct Block {
    pub label: Id,
    pub instructions: Vec<Inst>,

    /// Only `None` while the block is still being built.
    pub terminator: Option<Inst>,
}

impl Block {
    pub fn new(label: Id) -> Self {
        Self { label, instructions: vec![], terminator: None }
    }

    pub fn push(&mut self, inst: Inst) {
        self.instructions.push(inst);
    }

    pub fn is_terminated(&self) -> bool {
        self.terminator.is_some()
    }

    /// Ends the block with `terminator` (which must be a branch, a return, or
    /// `OpKill`), at most once.
    pub fn terminate(&mut self, terminator: Inst) -> Result<()> {
        if !shape::is_block_terminator(terminator.opcode) {
            return Err(LowerError::NotATerminator(terminator.opcode));
        }
        if self.terminator.is_some() {
            return Err(LowerError::AlreadyTerminated(self.label));
        }
        self.terminator = Some(terminator);
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Function {
    pub name: String,
    pub id: Id,
    pub return_type: Id,
    pub control: spirv::FunctionControl,
    pub function_type: Id,

    /// `(type, id)` of each `OpFunctionParameter`.
    pub params: Vec<(Id, Id)>,

    /// `OpVariable`s declared so far, not yet hoisted into the first block.
    pub variables: Vec<Inst>,

    pub blocks: Vec<Block>,
}

impl Function {
    pub(super) fn try_for_each_inst<E>(
        &self,
        mut f: impl FnMut(&Inst) -> Result<(), E>,
    ) -> Result<(), E> {
        f(&Inst::from(Op::Function)
            .with_result_type(self.return_type)
            .with_result(self.id)
            .with_operands([self.control.bits(), self.function_type]))?;
        for &(ty, id) in &self.params {
            f(&Inst::from(Op::FunctionParameter).with_result_type(ty).with_result(id))?;
        }
        for (i, block) in self.blocks.iter().enumerate() {
            f(&Inst::from(Op::Label).with_result(block.label))?;
            if i == 0 {
                for inst in &self.variables {
                    f(inst)?;
                }
            }
            for inst in block.instructions.iter().chain(&block.terminator) {
                f(inst)?;
            }
        }
        f(&Inst::from(Op::FunctionEnd))
    }
}

/// A function being built, along with its local name scope.
///
/// Lookups go through the local scope first, then the module scope.
pub struct FuncScope {
    pub function: Function,
    pub(super) locals: Scope,
}

impl FuncScope {
    pub fn id(&self) -> Id {
        self.function.id
    }

    pub fn add_block(&mut self, block: Block) {
        self.function.blocks.push(block);
    }

    pub fn locals(&self) -> &Scope {
        &self.locals
    }
}

impl Module {
    /// ID of the function `name`, reserved on first use (so that it can be
    /// called before being defined).
    pub fn function_id(&mut self, name: &str) -> Id {
        if let Some(&id) = self.function_ids.get(name) {
            return id;
        }
        let id = self.next_id();
        self.function_ids.insert(name.to_string(), id);
        id
    }

    /// Starts building the function `name`.
    ///
    /// Aggregate, opaque and output parameters are passed by reference, i.e.
    /// as `Function`-storage pointers.
    pub fn begin_function(&mut self, name: &str, ret: &Type, params: &[Var]) -> FuncScope {
        let id = self.function_id(name);
        let return_type = self.register_type(ret);

        let mut locals = Scope::default();
        let mut param_ids = Vec::with_capacity(params.len());
        for param in params {
            let value_type = self.register_type(&param.ty);
            let by_ref = param.is_passed_by_reference();
            let ty = if by_ref {
                self.register_pointer_type(value_type, spirv::StorageClass::Function)
            } else {
                value_type
            };
            let param_id = self.next_id();
            self.debug.push(Inst::from(Op::Name).with_result(param_id).with_name(param.name.as_str()));

            let entry = if by_ref {
                ScopeEntry {
                    info: VariableInfo::pointer(param_id),
                    storage: Some(spirv::StorageClass::Function),
                    type_id: value_type,
                }
            } else {
                ScopeEntry { info: VariableInfo::value(param_id), storage: None, type_id: value_type }
            };
            locals.insert(&param.name, entry);
            param_ids.push((ty, param_id));
        }

        let param_types: Vec<Id> = param_ids.iter().map(|&(ty, _)| ty).collect();
        let function_type = self.register_function_type(return_type, &param_types);
        self.debug.push(Inst::from(Op::Name).with_result(id).with_name(name));

        debug!("begin function `{name}` (%{id}), {} parameter(s)", params.len());

        FuncScope {
            function: Function {
                name: name.to_string(),
                id,
                return_type,
                control: spirv::FunctionControl::NONE,
                function_type,
                params: param_ids,
                variables: vec![],
                blocks: vec![],
            },
            locals,
        }
    }

    /// Allocates a new (empty) block.
    pub fn new_block(&mut self) -> Block {
        Block::new(self.next_id())
    }

    /// Finishes building a function, hoisting all its local variables to the
    /// start of its first block, and adds it to the module.
    pub fn end_function(&mut self, scope: FuncScope) -> Result<Id> {
        let mut function = scope.function;
        if function.blocks.is_empty() {
            return Err(LowerError::EmptyFunction(function.name));
        }
        if let Some(block) = function.blocks.iter().find(|block| !block.is_terminated()) {
            return Err(LowerError::Unterminated(block.label));
        }

        let variables = std::mem::take(&mut function.variables);
        function.blocks[0].instructions.splice(0..0, variables);

        let id = function.id;
        debug!(
            "end function `{}` (%{id}), {} block(s), {} local(s) in scope",
            function.name,
            function.blocks.len(),
            scope.locals.len(),
        );
        self.functions.push(function);
        Ok(id)
    }
}
