use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};

use tesselc::options::{OptimizationLevel, Options, OutputFormat, TargetArch};
use tesselc::{compile, write_ir, CompileError, Reporter};

/// Tessel compiler front end: parses, checks, and lowers a source file to
/// textual IR for the back-end toolchain.
#[derive(Parser, Debug)]
#[command(name = "tesselc", version, about)]
struct Cli {
    /// Input source file.
    input: PathBuf,

    /// Output file; the extension is rewritten to match --emit.
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[arg(long, value_enum, default_value = "ir")]
    emit: Emit,

    #[arg(short = 'O', default_value = "2", help = "Optimization level: 0-3, s, z")]
    opt: String,

    #[arg(long, value_enum, default_value = "auto")]
    target: Target,

    #[arg(long, help = "Module name recorded in the emitted IR")]
    module_name: Option<String>,

    #[arg(long)]
    debug_info: bool,

    #[arg(long)]
    pic: bool,

    #[arg(long)]
    simd: bool,

    #[arg(long)]
    fast_math: bool,

    #[arg(long, value_name = "BYTES", help = "Process stack budget")]
    stack_size: Option<usize>,

    #[arg(long = "target-option", value_name = "OPT")]
    target_options: Vec<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Emit {
    Ir,
    Bc,
    Asm,
    Obj,
    Exe,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Target {
    X86,
    X86_64,
    Arm,
    Aarch64,
    Wasm,
    Auto,
}

fn main() -> ExitCode {
    match run(Cli::parse()) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("tesselc: error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let source = fs::read_to_string(&cli.input)
        .with_context(|| format!("failed to read {}", cli.input.display()))?;
    let file = cli.input.display().to_string();
    let options = build_options(&cli)?;

    let mut reporter = Reporter::new();
    let result = compile(&source, &file, &options, &mut reporter);

    for diagnostic in reporter.diagnostics() {
        eprintln!("{diagnostic}");
    }

    match result {
        Ok(module) => {
            let path = write_ir(&module, &options)
                .with_context(|| format!("failed to write {}", options.output_path().display()))?;
            eprintln!(
                "wrote {} ({} function(s), {} error(s), {} warning(s))",
                path.display(),
                module.functions.len(),
                reporter.error_count(),
                reporter.diagnostics().len() - reporter.error_count(),
            );
            Ok(ExitCode::SUCCESS)
        }
        Err(CompileError::SourceErrors(count)) => {
            eprintln!("compilation failed with {count} error(s)");
            Ok(ExitCode::FAILURE)
        }
        Err(err) => Err(err.into()),
    }
}

fn build_options(cli: &Cli) -> Result<Options> {
    let optimization_level = match cli.opt.as_str() {
        "0" => OptimizationLevel::O0,
        "1" => OptimizationLevel::O1,
        "2" => OptimizationLevel::O2,
        "3" => OptimizationLevel::O3,
        "s" => OptimizationLevel::Os,
        "z" => OptimizationLevel::Oz,
        other => anyhow::bail!("unsupported optimization level: -O{other}"),
    };

    let mut options = Options::default();
    options.optimization_level = optimization_level;
    options.target_arch = match cli.target {
        Target::X86 => TargetArch::X86,
        Target::X86_64 => TargetArch::X86_64,
        Target::Arm => TargetArch::Arm,
        Target::Aarch64 => TargetArch::Aarch64,
        Target::Wasm => TargetArch::Wasm,
        Target::Auto => TargetArch::Auto.resolve(),
    };
    options.output_format = match cli.emit {
        Emit::Ir => OutputFormat::IrText,
        Emit::Bc => OutputFormat::IrBitcode,
        Emit::Asm => OutputFormat::Assembly,
        Emit::Obj => OutputFormat::Object,
        Emit::Exe => OutputFormat::Executable,
    };
    options.output_filename = match &cli.output {
        Some(path) => path.clone(),
        None => cli.input.clone(),
    };
    if let Some(name) = &cli.module_name {
        options.module_name = name.clone();
    }
    options.debug_info = cli.debug_info;
    options.pic = cli.pic;
    options.simd = cli.simd;
    options.fast_math = cli.fast_math;
    if let Some(stack_size) = cli.stack_size {
        options.stack_size = stack_size;
    }
    options.target_options = cli.target_options.clone();
    Ok(options)
}
