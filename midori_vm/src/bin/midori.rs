//! Command-line driver: compile and run a Midori script.
//!
//! Exit code 0 on success, 1 on any phase failure (lex, parse, check,
//! codegen, runtime). Diagnostics go to stderr, program output to
//! stdout.

use std::process::ExitCode;

use midori_vm::{api, disassembler};

const USAGE: &str = "Usage: midori <script.mdr> [--disassemble] [--emit-ast]";

fn main() -> ExitCode {
    let mut script = None;
    let mut show_disassembly = false;
    let mut emit_ast = false;

    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--disassemble" => show_disassembly = true,
            "--emit-ast" => emit_ast = true,
            "--help" | "-h" => {
                println!("{}", USAGE);
                return ExitCode::SUCCESS;
            }
            other if other.starts_with("--") => {
                eprintln!("Unknown option '{}'.\n{}", other, USAGE);
                return ExitCode::FAILURE;
            }
            path => {
                if script.replace(path.to_string()).is_some() {
                    eprintln!("{}", USAGE);
                    return ExitCode::FAILURE;
                }
            }
        }
    }

    let Some(script) = script else {
        eprintln!("{}", USAGE);
        return ExitCode::FAILURE;
    };

    let source = match std::fs::read_to_string(&script) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Could not read '{}': {}", script, e);
            return ExitCode::FAILURE;
        }
    };

    if emit_ast {
        return match api::parse(&source, &script) {
            Ok(program) => {
                match serde_json::to_string_pretty(&program) {
                    Ok(rendered) => println!("{}", rendered),
                    Err(e) => {
                        eprintln!("Could not serialize the AST: {}", e);
                        return ExitCode::FAILURE;
                    }
                }
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("{}", e);
                ExitCode::FAILURE
            }
        };
    }

    let executable = match api::compile(&source, &script) {
        Ok(executable) => executable,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    if show_disassembly {
        println!("{}", disassembler::disassemble(&executable));
        return ExitCode::SUCCESS;
    }

    let mut vm = midori_vm::Vm::new(executable);
    let result = vm.run();
    print!("{}", vm.output());
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}
