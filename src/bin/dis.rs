use std::io::Write as _;

fn main() -> std::io::Result<()> {
    match &std::env::args().collect::<Vec<_>>()[..] {
        [_, in_file] => {
            let module = shader_lower::Module::read_from_spv_file(in_file)?;
            std::io::stdout().lock().write_all(module.disassemble().as_bytes())
        }
        args => {
            eprintln!("Usage: {} IN", args[0]);
            std::process::exit(1);
        }
    }
}
