//! In-memory SPIR-V module under construction: ID allocation, the logical
//! layout sections, and deduplicating registration of types, constants and
//! variables (the latter in the [`types`], [`consts`] and [`vars`] submodules).

mod consts;
mod deserialize;
mod func;
mod types;
mod vars;

pub use func::{Block, FuncScope, Function};
pub use vars::{ScopeEntry, VariableInfo};
pub(crate) use types::layout_of_storage;

use crate::config::BuildConfig;
use crate::error::Result;
use crate::scan::ModuleRequirements;
use crate::spv::{self, write, Id, Inst, Op};
use crate::{FxIndexMap, FxIndexSet};
use log::debug;
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;
use std::fmt::Write as _;
use std::io;
use std::path::Path;

/// A SPIR-V module being built (or read back by [`Module::deserialize`]).
///
/// Sections are kept separately, and only concatenated (in the SPIR-V
/// "logical layout" order) by [`Module::serialize`].
pub struct Module {
    pub config: BuildConfig,

    /// Next ID to allocate (i.e. the header's ID bound).
    next_id: Id,

    pub capabilities: Vec<Inst>,
    pub extensions: Vec<Inst>,
    pub ext_imports: Vec<Inst>,
    pub memory_model: Option<Inst>,
    pub entry_point: Option<Inst>,
    pub execution_modes: Vec<Inst>,
    pub debug: Vec<Inst>,
    pub decorations: Vec<Inst>,

    /// Types, constants and global variables, in registration order (which
    /// guarantees definitions precede uses).
    pub declarations: Vec<Inst>,

    pub functions: Vec<Function>,

    caches: types::TypeCaches,
    literals: FxHashMap<consts::LiteralKey, Id>,
    composites: FxHashMap<(SmallVec<[Id; 4]>, Id), Id>,

    /// Module-scope names (global variables and specialization constants).
    globals: vars::Scope,

    /// Synthetic `outer::member` names, to their `(outer, member)` IDs.
    member_variables: FxIndexMap<String, (Id, Id)>,

    /// Functions by name, including ones only reserved for forward calls.
    function_ids: FxHashMap<String, Id>,

    /// Struct types already decorated with `Block`/`BufferBlock`.
    block_types: FxHashSet<Id>,

    capability_set: FxIndexSet<u32>,
    extension_set: FxIndexSet<String>,

    glsl_std_450: Option<Id>,

    /// Execution modes registered before the entry-point, with a placeholder
    /// (`0`) where the entry-point function ID goes.
    pending_execution_modes: Vec<Inst>,

    intermediates: FxHashSet<Id>,
    busy_intermediates: FxHashSet<Id>,
}

impl Module {
    fn empty(config: BuildConfig) -> Self {
        Self {
            config,
            next_id: 1,
            capabilities: vec![],
            extensions: vec![],
            ext_imports: vec![],
            memory_model: None,
            entry_point: None,
            execution_modes: vec![],
            debug: vec![],
            decorations: vec![],
            declarations: vec![],
            functions: vec![],
            caches: Default::default(),
            literals: Default::default(),
            composites: Default::default(),
            globals: Default::default(),
            member_variables: Default::default(),
            function_ids: Default::default(),
            block_types: Default::default(),
            capability_set: Default::default(),
            extension_set: Default::default(),
            glsl_std_450: None,
            pending_execution_modes: vec![],
            intermediates: Default::default(),
            busy_intermediates: Default::default(),
        }
    }

    pub fn new(config: BuildConfig) -> Self {
        let mut module = Self::empty(config);

        // NOTE: the extended instruction set import always gets `%1`.
        module.glsl_std_450();

        module.debug.push(
            Inst::from(Op::Source)
                .with_operands([spirv::SourceLanguage::GLSL as u32, 450]),
        );

        let capability = match module.config.execution_model {
            spirv::ExecutionModel::Kernel => spirv::Capability::Kernel,
            _ => spirv::Capability::Shader,
        };
        module.register_capability(capability);

        module.memory_model = Some(Inst::from(Op::MemoryModel).with_operands([
            spirv::AddressingModel::Logical as u32,
            module.config.memory_model as u32,
        ]));

        module
    }

    /// Allocates a fresh ID.
    pub fn next_id(&mut self) -> Id {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// The header's ID bound, i.e. one past the largest allocated ID.
    pub fn bound(&self) -> Id {
        self.next_id
    }

    /// The `GLSL.std.450` extended instruction set (imported on first use).
    pub fn glsl_std_450(&mut self) -> Id {
        if let Some(id) = self.glsl_std_450 {
            return id;
        }
        let id = self.next_id();
        self.ext_imports.push(Inst::from(Op::ExtInstImport).with_result(id).with_name("GLSL.std.450"));
        self.glsl_std_450 = Some(id);
        id
    }

    /// Obtains an ID for a transient value.
    ///
    /// IDs are never recycled (see [`Module::put_intermediate_result`]).
    pub fn get_intermediate_result(&mut self) -> Id {
        let id = self.next_id();
        self.intermediates.insert(id);
        self.busy_intermediates.insert(id);
        id
    }

    /// Marks a transient value as no longer in use.
    // NOTE: the ID is *not* made available again, as instructions not yet
    // emitted (e.g. queued local variables) may still refer to it.
    pub fn put_intermediate_result(&mut self, id: Id) {
        self.busy_intermediates.remove(&id);
    }

    pub fn is_intermediate(&self, id: Id) -> bool {
        self.intermediates.contains(&id)
    }

    pub fn is_busy_intermediate(&self, id: Id) -> bool {
        self.busy_intermediates.contains(&id)
    }

    pub fn register_capability(&mut self, capability: spirv::Capability) {
        if self.capability_set.insert(capability as u32) {
            self.capabilities.push(Inst::from(Op::Capability).with_operands([capability as u32]));
        }
    }

    pub fn has_capability(&self, capability: spirv::Capability) -> bool {
        self.capability_set.contains(&(capability as u32))
    }

    pub fn register_extension(&mut self, name: &str) {
        if self.extension_set.insert(name.to_string()) {
            self.extensions.push(Inst::from(Op::Extension).with_name(name));
        }
    }

    /// Declares all the capabilities found by a [`scan`](crate::scan) pass.
    pub fn register_requirements(&mut self, requirements: &ModuleRequirements) {
        for &capability in &requirements.capabilities {
            self.register_capability(capability);
        }
    }

    /// Resolves the interface variables found by a [`scan`](crate::scan) pass,
    /// returning `(inputs, outputs)` IDs, for [`Module::register_entry_point`].
    pub fn register_interface(
        &mut self,
        requirements: &ModuleRequirements,
    ) -> Result<(Vec<Id>, Vec<Id>)> {
        let mut resolve = |vars: &FxIndexMap<String, crate::ast::Var>| -> Result<Vec<Id>> {
            let mut ids: Vec<Id> = vec![];
            for var in vars.values() {
                let id = self.register_var(None, var)?.info.id;
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
            Ok(ids)
        };
        let inputs = resolve(&requirements.inputs)?;
        let outputs = resolve(&requirements.outputs)?;
        Ok((inputs, outputs))
    }

    pub fn decorate(
        &mut self,
        id: Id,
        decoration: spirv::Decoration,
        operands: impl IntoIterator<Item = u32>,
    ) {
        self.decorations.push(
            Inst::from(Op::Decorate)
                .with_operands([id, decoration as u32])
                .with_operands(operands),
        );
    }

    pub fn decorate_member(
        &mut self,
        id: Id,
        index: u32,
        decoration: spirv::Decoration,
        operands: impl IntoIterator<Item = u32>,
    ) {
        self.decorations.push(
            Inst::from(Op::MemberDecorate)
                .with_operands([id, index, decoration as u32])
                .with_operands(operands),
        );
    }

    pub fn register_entry_point(&mut self, function_id: Id, name: &str, inputs: &[Id], outputs: &[Id]) {
        let model = self.config.execution_model;
        debug!("entry-point `{name}` (%{function_id}, {model:?})");

        self.entry_point = Some(
            Inst::from(Op::EntryPoint)
                .with_result_type(model as u32)
                .with_result(function_id)
                .with_name(name)
                .with_operands(inputs.iter().chain(outputs).copied()),
        );

        if model == spirv::ExecutionModel::Fragment {
            self.register_execution_mode(self.config.fragment_origin, []);
        }

        for mut mode in self.pending_execution_modes.drain(..) {
            mode.operands[0] = function_id;
            self.execution_modes.push(mode);
        }
    }

    /// Adds an execution mode to the entry-point, or queues it if the
    /// entry-point isn't known yet.
    pub fn register_execution_mode(
        &mut self,
        mode: spirv::ExecutionMode,
        operands: impl IntoIterator<Item = u32>,
    ) {
        let entry_function = self.entry_point.as_ref().and_then(|inst| inst.result_id);
        let inst = Inst::from(Op::ExecutionMode)
            .with_operands([entry_function.unwrap_or(0), mode as u32])
            .with_operands(operands);
        match entry_function {
            Some(_) => self.execution_modes.push(inst),
            None => self.pending_execution_modes.push(inst),
        }
    }

    /// Visits every instruction, in the order they'd be serialized in.
    fn try_for_each_inst<E>(&self, mut f: impl FnMut(&Inst) -> Result<(), E>) -> Result<(), E> {
        let sections = [
            &self.capabilities[..],
            &self.extensions[..],
            &self.ext_imports[..],
            self.memory_model.as_slice(),
            self.entry_point.as_slice(),
            &self.execution_modes[..],
            &self.debug[..],
            &self.decorations[..],
            &self.declarations[..],
        ];
        for inst in sections.into_iter().flatten() {
            f(inst)?;
        }
        for func in &self.functions {
            func.try_for_each_inst(&mut f)?;
        }
        Ok(())
    }

    pub fn header(&self) -> [u32; spv::HEADER_LEN] {
        [spirv::MAGIC_NUMBER, self.config.version_word(), self.config.generator, self.next_id, 0]
    }

    /// Encodes the whole module, header included.
    pub fn serialize(&self) -> io::Result<Vec<u32>> {
        let mut emitter = write::ModuleEmitter::with_header(self.header());
        self.try_for_each_inst(|inst| emitter.push_inst(inst))?;
        debug!("serialized module: bound {}, {} words", self.next_id, emitter.words.len());
        Ok(emitter.words)
    }

    pub fn write_to_spv_file(&self, path: impl AsRef<Path>) -> io::Result<()> {
        let words = self.serialize()?;
        write::ModuleEmitter { words }.write_to_spv_file(path)
    }

    /// Textual form of the module, one instruction per line.
    pub fn disassemble(&self) -> String {
        let mut out = String::new();
        let (major, minor) = self.config.version;
        let _ = writeln!(out, "; SPIR-V {major}.{minor}");
        let _ = writeln!(out, "; Generator: {:#010x}", self.config.generator);
        let _ = writeln!(out, "; Bound: {}", self.next_id);
        let _ = self.try_for_each_inst(|inst| writeln!(out, "{inst}"));
        out
    }
}
