use std::{
    io::Write,
    path::{Path, PathBuf},
    process::ExitCode,
};

use automato::{
    bytecode::{
        disassemble::render_chunk,
        serialize::{DecodeError, EncodeError},
        Chunk,
    },
    compiler::CompileError,
    vm::{InterpretError, Vm},
};
use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(version, about = "Expression compiler and bytecode virtual machine")]
struct Cli {
    /// Disassemble compiled chunks and trace execution on stderr
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

impl Cli {
    pub fn command(&self) -> &Command {
        self.command.as_ref().unwrap_or(&Command::Repl)
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Evaluate a source file as one expression
    Run(RunArgs),
    /// Evaluate one expression per line of input
    Repl,
    /// Compile a source file into a chunk file
    Compile(CompileArgs),
    /// Execute a previously compiled chunk file
    Exec(ExecArgs),
}

#[derive(Debug, Args)]
struct RunArgs {
    file: PathBuf,
}

#[derive(Debug, Args)]
struct CompileArgs {
    file: PathBuf,
    /// Where to write the chunk
    #[arg(short, long)]
    output: PathBuf,
}

#[derive(Debug, Args)]
struct ExecArgs {
    file: PathBuf,
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid chunk file {}: {source}", .path.display())]
    Decode { path: PathBuf, source: DecodeError },
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Interpret(#[from] InterpretError),
    #[error("Terminal IO failed: {0}")]
    Terminal(#[from] std::io::Error),
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Cli::parse();
    let vm = Vm::new().with_debug(args.debug);

    let result = match args.command() {
        Command::Repl => repl_command(vm),
        Command::Run(run) => run_command(vm, run),
        Command::Compile(compile) => compile_command(compile, args.debug),
        Command::Exec(exec) => exec_command(vm, exec),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn repl_command(mut vm: Vm) -> Result<(), CliError> {
    println!("Welcome to the automato REPL!");
    println!("EOF to exit. (Ctrl+D on *nix, Ctrl+Z on Windows)");

    let mut input = String::new();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let read = std::io::stdin().read_line(&mut input)?;
        if read == 0 {
            break;
        }

        let source = input.trim();
        if !source.is_empty() {
            if let Err(e) = vm.interpret(source) {
                eprintln!("{e}");
            }
        }

        input.clear()
    }

    Ok(())
}

fn run_command(mut vm: Vm, args: &RunArgs) -> Result<(), CliError> {
    let source = read_source(&args.file)?;
    vm.interpret(&source)?;
    Ok(())
}

fn compile_command(args: &CompileArgs, debug: bool) -> Result<(), CliError> {
    let source = read_source(&args.file)?;
    let chunk = automato::compile(&source)?;
    if debug {
        eprint!("{}", render_chunk(&chunk, &args.file.display().to_string()));
    }

    let bytes = chunk.to_bytes()?;
    std::fs::write(&args.output, bytes).map_err(|source| CliError::Write {
        path: args.output.clone(),
        source,
    })
}

fn exec_command(mut vm: Vm, args: &ExecArgs) -> Result<(), CliError> {
    let bytes = std::fs::read(&args.file).map_err(|source| CliError::Read {
        path: args.file.clone(),
        source,
    })?;
    let chunk = Chunk::from_bytes(&bytes).map_err(|source| CliError::Decode {
        path: args.file.clone(),
        source,
    })?;
    vm.interpret_chunk(&chunk)?;
    Ok(())
}

fn read_source(path: &Path) -> Result<String, CliError> {
    std::fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })
}
