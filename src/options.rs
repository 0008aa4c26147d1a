use std::path::PathBuf;

/// Back-end optimization level forwarded with the emitted module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OptimizationLevel {
    O0,
    O1,
    #[default]
    O2,
    O3,
    Os,
    Oz,
}

impl OptimizationLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            OptimizationLevel::O0 => "O0",
            OptimizationLevel::O1 => "O1",
            OptimizationLevel::O2 => "O2",
            OptimizationLevel::O3 => "O3",
            OptimizationLevel::Os => "Os",
            OptimizationLevel::Oz => "Oz",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TargetArch {
    X86,
    X86_64,
    Arm,
    Aarch64,
    Wasm,
    #[default]
    Auto,
}

impl TargetArch {
    /// `Auto` resolves against the host at option-build time.
    pub fn resolve(self) -> TargetArch {
        if self != TargetArch::Auto {
            return self;
        }
        match std::env::consts::ARCH {
            "x86" => TargetArch::X86,
            "arm" => TargetArch::Arm,
            "aarch64" => TargetArch::Aarch64,
            "wasm32" | "wasm64" => TargetArch::Wasm,
            _ => TargetArch::X86_64,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TargetArch::X86 => "x86",
            TargetArch::X86_64 => "x86_64",
            TargetArch::Arm => "arm",
            TargetArch::Aarch64 => "aarch64",
            TargetArch::Wasm => "wasm",
            TargetArch::Auto => "auto",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    IrText,
    IrBitcode,
    Assembly,
    Object,
    Executable,
}

impl OutputFormat {
    pub fn extension(self) -> Option<&'static str> {
        match self {
            OutputFormat::IrText => Some("ll"),
            OutputFormat::IrBitcode => Some("bc"),
            OutputFormat::Assembly => Some("s"),
            OutputFormat::Object => Some("o"),
            OutputFormat::Executable => None,
        }
    }
}

/// Everything the lowering phase and the back-end need to know about how
/// to produce output.
#[derive(Debug, Clone)]
pub struct Options {
    pub optimization_level: OptimizationLevel,
    pub target_arch: TargetArch,
    pub output_format: OutputFormat,
    pub output_filename: PathBuf,
    pub module_name: String,
    pub debug_info: bool,
    pub pic: bool,
    pub simd: bool,
    pub fast_math: bool,
    /// Process stack budget in bytes.
    pub stack_size: usize,
    /// Opaque strings forwarded to the back-end untouched.
    pub target_options: Vec<String>,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            optimization_level: OptimizationLevel::default(),
            target_arch: TargetArch::default().resolve(),
            output_format: OutputFormat::default(),
            output_filename: PathBuf::from("out"),
            module_name: "tessel_module".to_string(),
            debug_info: false,
            pic: false,
            simd: false,
            fast_math: false,
            stack_size: 8 * 1024 * 1024,
            target_options: Vec::new(),
        }
    }
}

impl Options {
    pub fn with_output(filename: impl Into<PathBuf>) -> Self {
        Options {
            output_filename: filename.into(),
            ..Options::default()
        }
    }

    /// Output path with the extension rewritten to match the format
    /// (`.ll`, `.bc`, `.s`, `.o`, or none for executables).
    pub fn output_path(&self) -> PathBuf {
        let mut path = self.output_filename.clone();
        match self.output_format.extension() {
            Some(ext) => {
                path.set_extension(ext);
            }
            None => {
                path.set_extension("");
            }
        }
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_contract() {
        let options = Options::default();
        assert_eq!(options.optimization_level, OptimizationLevel::O2);
        assert_eq!(options.output_format, OutputFormat::IrText);
        assert_eq!(options.stack_size, 8 * 1024 * 1024);
        assert_ne!(options.target_arch, TargetArch::Auto);
    }

    #[test]
    fn extension_follows_output_format() {
        let mut options = Options::with_output("build/prog.tsl");
        assert_eq!(options.output_path(), PathBuf::from("build/prog.ll"));
        options.output_format = OutputFormat::Object;
        assert_eq!(options.output_path(), PathBuf::from("build/prog.o"));
        options.output_format = OutputFormat::Executable;
        assert_eq!(options.output_path(), PathBuf::from("build/prog"));
    }

    #[test]
    fn auto_arch_resolves_to_a_concrete_target() {
        assert_ne!(TargetArch::Auto.resolve(), TargetArch::Auto);
        assert_eq!(TargetArch::Wasm.resolve(), TargetArch::Wasm);
    }
}
