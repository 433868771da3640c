//! Reading back a [`Module`] from SPIR-V binary form.

use super::{Block, Function, Module};
use crate::config::BuildConfig;
use crate::spv::{read, shape, Inst, Op};
use log::debug;
use std::io;
use std::path::Path;

// FIXME(eddyb) stop abusing `io::Error` for error reporting.
fn invalid(reason: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, format!("malformed SPIR-V ({reason})"))
}

/// Where module-level instructions go, by opcode.
enum Section {
    Capabilities,
    Extensions,
    ExtImports,
    MemoryModel,
    EntryPoint,
    ExecutionModes,
    Debug,
    Decorations,
    Declarations,
}

fn section_of(opcode: Op) -> Section {
    match opcode {
        Op::Capability => Section::Capabilities,
        Op::Extension => Section::Extensions,
        Op::ExtInstImport => Section::ExtImports,
        Op::MemoryModel => Section::MemoryModel,
        Op::EntryPoint => Section::EntryPoint,
        Op::ExecutionMode | Op::ExecutionModeId => Section::ExecutionModes,
        Op::Source
        | Op::SourceExtension
        | Op::Name
        | Op::MemberName
        | Op::String
        | Op::Line
        | Op::NoLine
        | Op::ModuleProcessed => Section::Debug,
        Op::Decorate | Op::MemberDecorate | Op::DecorationGroup | Op::GroupDecorate => {
            Section::Decorations
        }
        _ => Section::Declarations,
    }
}

impl Module {
    /// Parses a SPIR-V module, e.g. as produced by [`Module::serialize`].
    ///
    /// The result serializes back to the same words, but its deduplication
    /// caches and name scopes start out empty (i.e. further registrations will
    /// not reuse the existing declarations).
    pub fn deserialize(words: Vec<u32>) -> io::Result<Self> {
        Self::from_parser(read::ModuleParser::read_from_spv_words(words)?)
    }

    pub fn read_from_spv_file(path: impl AsRef<Path>) -> io::Result<Self> {
        Self::from_parser(read::ModuleParser::read_from_spv_file(path)?)
    }

    fn from_parser(parser: read::ModuleParser) -> io::Result<Self> {
        let mut module = Self::empty(BuildConfig {
            version: parser.version(),
            generator: parser.generator(),
            ..BuildConfig::default()
        });
        module.next_id = parser.bound();

        let mut func: Option<Function> = None;
        let mut block: Option<Block> = None;
        let mut inst_count = 0;

        for inst in parser {
            let inst = inst?;
            inst_count += 1;

            if let Some(current) = &mut func {
                match inst.opcode {
                    Op::FunctionParameter if block.is_none() && current.blocks.is_empty() => {
                        let (ty, id) = inst
                            .result_type_id
                            .zip(inst.result_id)
                            .ok_or_else(|| invalid("OpFunctionParameter without result"))?;
                        current.params.push((ty, id));
                    }
                    Op::Label => {
                        if block.is_some() {
                            return Err(invalid("OpLabel inside an unterminated block"));
                        }
                        let label =
                            inst.result_id.ok_or_else(|| invalid("OpLabel without result"))?;
                        block = Some(Block::new(label));
                    }
                    Op::FunctionEnd => {
                        if block.is_some() {
                            return Err(invalid("OpFunctionEnd inside an unterminated block"));
                        }
                        module.functions.extend(func.take());
                    }
                    opcode => {
                        let current_block = block
                            .as_mut()
                            .ok_or_else(|| invalid(&format!("Op{opcode:?} outside of a block")))?;
                        if shape::is_block_terminator(opcode) {
                            current_block.terminator = Some(inst);
                            current.blocks.extend(block.take());
                        } else {
                            current_block.instructions.push(inst);
                        }
                    }
                }
                continue;
            }

            if inst.opcode == Op::Function {
                func = Some(function_from_inst(&inst)?);
                continue;
            }
            if inst.opcode == Op::FunctionEnd || shape::is_block_terminator(inst.opcode) {
                return Err(invalid(&format!("Op{:?} outside of a function", inst.opcode)));
            }

            module.add_module_level_inst(inst)?;
        }

        if func.is_some() {
            return Err(invalid("missing OpFunctionEnd"));
        }

        module.name_functions();

        debug!(
            "deserialized module: {inst_count} instruction(s), {} function(s), bound {}",
            module.functions.len(),
            module.next_id
        );
        Ok(module)
    }

    fn add_module_level_inst(&mut self, inst: Inst) -> io::Result<()> {
        match section_of(inst.opcode) {
            Section::Capabilities => {
                if let Some(&capability) = inst.operands.first() {
                    self.capability_set.insert(capability);
                }
                self.capabilities.push(inst);
            }
            Section::Extensions => {
                if let Some(name) = &inst.name {
                    self.extension_set.insert(name.clone());
                }
                self.extensions.push(inst);
            }
            Section::ExtImports => {
                if inst.name.as_deref() == Some("GLSL.std.450") {
                    self.glsl_std_450 = inst.result_id;
                }
                self.ext_imports.push(inst);
            }
            Section::MemoryModel => {
                if let Some(model) = inst.operands.get(1).copied().and_then(spirv::MemoryModel::from_u32) {
                    self.config.memory_model = model;
                }
                self.memory_model = Some(inst);
            }
            Section::EntryPoint => {
                if self.entry_point.is_some() {
                    return Err(invalid("multiple entry-points are not supported"));
                }
                if let Some(model) = inst.result_type_id.and_then(spirv::ExecutionModel::from_u32) {
                    self.config.execution_model = model;
                }
                self.entry_point = Some(inst);
            }
            Section::ExecutionModes => self.execution_modes.push(inst),
            Section::Debug => self.debug.push(inst),
            Section::Decorations => self.decorations.push(inst),
            Section::Declarations => self.declarations.push(inst),
        }
        Ok(())
    }

    /// Recovers function names from their `OpName`s.
    fn name_functions(&mut self) {
        for func in &mut self.functions {
            let name = self.debug.iter().find_map(|inst| match inst.opcode {
                Op::Name if inst.result_id == Some(func.id) => inst.name.clone(),
                _ => None,
            });
            if let Some(name) = name {
                self.function_ids.insert(name.clone(), func.id);
                func.name = name;
            }
        }
    }
}

fn function_from_inst(inst: &Inst) -> io::Result<Function> {
    let (return_type, id) = inst
        .result_type_id
        .zip(inst.result_id)
        .ok_or_else(|| invalid("OpFunction without result"))?;
    let &[control, function_type] = &inst.operands[..] else {
        return Err(invalid("OpFunction needs exactly 2 operands"));
    };
    Ok(Function {
        name: String::new(),
        id,
        return_type,
        control: spirv::FunctionControl::from_bits_truncate(control),
        function_type,
        params: vec![],
        variables: vec![],
        blocks: vec![],
    })
}
