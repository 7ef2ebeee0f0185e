//! Kernel source text and the compile step that binds it to host routines.
//!
//! Source is a list of `kernel` declarations, one per entry point, each with
//! a typed parameter list. Compiling checks every declaration against the
//! host routine registered under the same name.

use std::collections::BTreeMap;
use std::fmt;

use tracing::debug;

use crate::error::{KernelError, Result};

/// Entry point of the one-worker-per-element strategy.
pub const NAIVE_ENTRY: &str = "mmul";
/// Entry point of the row-per-worker strategy with private A and local B.
pub const TILED_ENTRY: &str = "mmul_row_private_a_local_b";

/// Declarations of every kernel the host device provides.
pub const KERNEL_SOURCE: &str = "\
// C(i,j) per work item
kernel mmul(
    const int N,
    global const float* A,
    global const float* B,
    global float* C);

// C row per work item, A row private, B column staged in local memory
kernel mmul_row_private_a_local_b(
    const int N,
    global const float* A,
    global const float* B,
    global float* C,
    local float* Bwrk);
";

/// Kind of a kernel parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// `const int` scalar: the matrix order.
    Order,
    /// `global const float*`: read-only matrix.
    GlobalRead,
    /// `global float*`: output matrix.
    GlobalWrite,
    /// `local float*`: team-shared scratch memory.
    Local,
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ParamKind::Order => "const int",
            ParamKind::GlobalRead => "global const float*",
            ParamKind::GlobalWrite => "global float*",
            ParamKind::Local => "local float*",
        };
        f.write_str(s)
    }
}

/// A declared kernel parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub kind: ParamKind,
    pub name: String,
}

/// Host routine an entry point is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryPoint {
    Naive,
    RowTiled,
}

impl EntryPoint {
    fn lookup(name: &str) -> Option<Self> {
        match name {
            NAIVE_ENTRY => Some(EntryPoint::Naive),
            TILED_ENTRY => Some(EntryPoint::RowTiled),
            _ => None,
        }
    }

    /// Parameter kinds the host routine expects, in order.
    pub fn signature(self) -> &'static [ParamKind] {
        use ParamKind::*;
        match self {
            EntryPoint::Naive => &[Order, GlobalRead, GlobalRead, GlobalWrite],
            EntryPoint::RowTiled => &[Order, GlobalRead, GlobalRead, GlobalWrite, Local],
        }
    }
}

/// A compiled entry point, ready to launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Kernel {
    name: String,
    entry: EntryPoint,
    params: Vec<Param>,
}

impl Kernel {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entry(&self) -> EntryPoint {
        self.entry
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }
}

/// The result of compiling kernel source.
#[derive(Debug, Clone, Default)]
pub struct Program {
    kernels: BTreeMap<String, Kernel>,
}

impl Program {
    /// Compile kernel source text.
    ///
    /// # Errors
    /// Returns `KernelError::Compile` for a malformed declaration, an entry
    /// point with no host routine, a duplicate entry point, or a parameter
    /// list that does not match the host routine.
    pub fn compile(source: &str) -> Result<Program> {
        let stripped: String = source
            .lines()
            .map(|line| line.split("//").next().unwrap_or(""))
            .collect::<Vec<_>>()
            .join("\n");

        let mut kernels = BTreeMap::new();
        for decl in stripped.split(';').map(str::trim).filter(|d| !d.is_empty()) {
            let kernel = parse_declaration(decl)?;
            debug!(kernel = %kernel.name, params = kernel.params.len(), "compiled entry point");
            if kernels.contains_key(&kernel.name) {
                return Err(compile_error(&kernel.name, "duplicate entry point"));
            }
            kernels.insert(kernel.name.clone(), kernel);
        }
        Ok(Program { kernels })
    }

    /// Look up a compiled entry point by name.
    pub fn kernel(&self, name: &str) -> Result<Kernel> {
        self.kernels
            .get(name)
            .cloned()
            .ok_or_else(|| KernelError::UnknownEntryPoint(name.to_string()))
    }

    pub fn entry_points(&self) -> impl Iterator<Item = &str> {
        self.kernels.keys().map(String::as_str)
    }
}

fn compile_error(entry: &str, reason: impl Into<String>) -> KernelError {
    KernelError::Compile {
        entry: entry.to_string(),
        reason: reason.into(),
    }
}

fn parse_declaration(decl: &str) -> Result<Kernel> {
    let rest = decl
        .strip_prefix("kernel")
        .filter(|r| r.starts_with(char::is_whitespace))
        .ok_or_else(|| compile_error(decl, "expected 'kernel' declaration"))?;

    let (name, params) = rest
        .split_once('(')
        .ok_or_else(|| compile_error(decl, "missing parameter list"))?;
    let name = name.trim();
    let params = params
        .trim_end()
        .strip_suffix(')')
        .ok_or_else(|| compile_error(name, "unterminated parameter list"))?;

    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(compile_error(name, "invalid entry point name"));
    }

    let params = params
        .split(',')
        .map(|p| parse_param(name, p))
        .collect::<Result<Vec<_>>>()?;

    let entry = EntryPoint::lookup(name)
        .ok_or_else(|| compile_error(name, "no host routine for this entry point"))?;

    let declared: Vec<ParamKind> = params.iter().map(|p| p.kind).collect();
    if declared != entry.signature() {
        let show = |kinds: &[ParamKind]| {
            kinds
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        };
        return Err(compile_error(
            name,
            format!(
                "parameter list ({}) does not match host routine ({})",
                show(&declared),
                show(entry.signature())
            ),
        ));
    }

    Ok(Kernel {
        name: name.to_string(),
        entry,
        params,
    })
}

fn parse_param(entry: &str, param: &str) -> Result<Param> {
    let spaced = param.replace('*', " * ");
    let tokens: Vec<&str> = spaced.split_whitespace().collect();
    let (name, ty) = tokens
        .split_last()
        .ok_or_else(|| compile_error(entry, "empty parameter"))?;

    let kind = match ty {
        ["const", "int"] | ["int"] => ParamKind::Order,
        ["global", "const", "float", "*"] => ParamKind::GlobalRead,
        ["global", "float", "*"] => ParamKind::GlobalWrite,
        ["local", "float", "*"] => ParamKind::Local,
        _ => {
            return Err(compile_error(
                entry,
                format!("unsupported parameter type in '{}'", param.trim()),
            ))
        }
    };

    Ok(Param {
        kind,
        name: (*name).to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_builtin_source() {
        let program = Program::compile(KERNEL_SOURCE).unwrap();
        let names: Vec<&str> = program.entry_points().collect();
        assert_eq!(names, vec![NAIVE_ENTRY, TILED_ENTRY]);

        let naive = program.kernel(NAIVE_ENTRY).unwrap();
        assert_eq!(naive.entry(), EntryPoint::Naive);
        assert_eq!(naive.params().len(), 4);
        assert_eq!(naive.params()[0].name, "N");

        let tiled = program.kernel(TILED_ENTRY).unwrap();
        assert_eq!(tiled.entry(), EntryPoint::RowTiled);
        assert_eq!(tiled.params()[4].kind, ParamKind::Local);
        assert_eq!(tiled.params()[4].name, "Bwrk");
    }

    #[test]
    fn test_unknown_entry_point_lookup() {
        let program = Program::compile(KERNEL_SOURCE).unwrap();
        assert_eq!(
            program.kernel("mmul_block").unwrap_err(),
            KernelError::UnknownEntryPoint("mmul_block".to_string())
        );
    }

    #[test]
    fn test_compile_rejects_unbound_entry_point() {
        let src = "kernel mmul_block(const int N, global const float* A, global const float* B, global float* C);";
        let err = Program::compile(src).unwrap_err();
        assert!(matches!(err, KernelError::Compile { entry, .. } if entry == "mmul_block"));
    }

    #[test]
    fn test_compile_rejects_signature_mismatch() {
        // C declared read-only
        let src = "kernel mmul(const int N, global const float* A, global const float* B, global const float* C);";
        let err = Program::compile(src).unwrap_err();
        match err {
            KernelError::Compile { entry, reason } => {
                assert_eq!(entry, "mmul");
                assert!(reason.contains("does not match"), "{reason}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_compile_rejects_missing_local_param() {
        let src = "kernel mmul_row_private_a_local_b(int N, global const float* A, global const float* B, global float* C);";
        assert!(Program::compile(src).is_err());
    }

    #[test]
    fn test_compile_rejects_malformed() {
        assert!(Program::compile("void mmul(int N);").is_err());
        assert!(Program::compile("kernel mmul(int N").is_err());
        assert!(Program::compile("kernel mmul(double N);").is_err());
        assert!(Program::compile("kernelmmul(int N);").is_err());
    }

    #[test]
    fn test_compile_rejects_duplicate() {
        let decl = "kernel mmul(const int N, global const float* A, global const float* B, global float* C);\n";
        let src = format!("{decl}{decl}");
        let err = Program::compile(&src).unwrap_err();
        assert!(matches!(err, KernelError::Compile { reason, .. } if reason.contains("duplicate")));
    }

    #[test]
    fn test_compile_subset_and_comments() {
        let src = "// only the naive kernel\nkernel mmul(int N, global const float *A, global const float *B, global float *C); // trailing";
        let program = Program::compile(src).unwrap();
        assert!(program.kernel(NAIVE_ENTRY).is_ok());
        assert!(program.kernel(TILED_ENTRY).is_err());
    }
}
