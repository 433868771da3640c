fn main() -> std::io::Result<()> {
    match &std::env::args().collect::<Vec<_>>()[..] {
        [_, in_file, out_file] => {
            let module = shader_lower::Module::read_from_spv_file(in_file)?;

            let (major, minor) = module.config.version;
            eprintln!("SPIR-V {major}.{minor} module:");

            if !module.capabilities.is_empty() {
                eprintln!("  Capabilities:");
                for inst in &module.capabilities {
                    match inst.operands.first().copied().and_then(spirv::Capability::from_u32) {
                        Some(cap) => eprintln!("    {cap:?}"),
                        None => eprintln!("    {inst}"),
                    }
                }
            }

            if let Some(entry_point) = &module.entry_point {
                eprintln!("  Entry-point: {entry_point}");
            }

            eprintln!(
                "  {} declaration(s), {} decoration(s), {} function(s):",
                module.declarations.len(),
                module.decorations.len(),
                module.functions.len()
            );
            for func in &module.functions {
                let inst_count: usize = func.blocks.iter().map(|b| b.instructions.len() + 1).sum();
                eprintln!(
                    "    %{} `{}`: {} block(s), {inst_count} instruction(s)",
                    func.id,
                    func.name,
                    func.blocks.len()
                );
            }

            module.write_to_spv_file(out_file)
        }
        args => {
            eprintln!("Usage: {} IN OUT", args[0]);
            std::process::exit(1);
        }
    }
}
