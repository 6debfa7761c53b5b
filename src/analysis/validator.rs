//! Static screening of parsed code before execution.
//!
//! The check walks every statement (including `for`/`if` bodies) and
//! rejects any import whose module name matches the denylist exactly.
//! Matching is lexical: `os.path` is not `os`, and a forbidden capability
//! reached through an alias or an attribute chain is not detected here.
//! The evaluator's fixed capability table is what actually bounds what
//! accepted code can touch.

use tracing::{debug, warn};

use super::ast::{ImportName, Stmt};
use super::AnalysisError;

/// Module names whose import causes rejection.
pub const UNSAFE_MODULES: [&str; 4] = ["os", "sys", "subprocess", "shutil"];

pub fn check(program: &[Stmt]) -> Result<(), AnalysisError> {
    for stmt in program {
        check_stmt(stmt)?;
    }
    Ok(())
}

fn check_stmt(stmt: &Stmt) -> Result<(), AnalysisError> {
    match stmt {
        Stmt::Import(names) => check_names(names),
        Stmt::FromImport { module, names } => {
            if is_unsafe(module) {
                return reject(module);
            }
            check_names(names)
        }
        Stmt::For { body, .. } => check(body),
        Stmt::If { branches, orelse } => {
            for (_, body) in branches {
                check(body)?;
            }
            check(orelse)
        }
        Stmt::Assign { .. } | Stmt::Expr(_) => Ok(()),
    }
}

fn check_names(names: &[ImportName]) -> Result<(), AnalysisError> {
    for name in names {
        if is_unsafe(&name.module) {
            return reject(&name.module);
        }
    }
    Ok(())
}

fn is_unsafe(module: &str) -> bool {
    UNSAFE_MODULES.contains(&module)
}

fn reject(module: &str) -> Result<(), AnalysisError> {
    warn!(module, "rejecting code with unsafe import");
    debug!(denylist = ?UNSAFE_MODULES);
    Err(AnalysisError::UnsafeImport(module.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::parser::parse;

    fn check_src(src: &str) -> Result<(), AnalysisError> {
        check(&parse(src).unwrap())
    }

    #[test]
    fn rejects_each_denylisted_module() {
        for module in UNSAFE_MODULES {
            let err = check_src(&format!("import {}\n", module)).unwrap_err();
            match err {
                AnalysisError::UnsafeImport(m) => assert_eq!(m, module),
                other => panic!("unexpected error: {:?}", other),
            }
        }
    }

    #[test]
    fn rejects_unsafe_import_mixed_with_allowed_ones() {
        let err = check_src("import seaborn\nimport os, math\n").unwrap_err();
        assert!(matches!(err, AnalysisError::UnsafeImport(m) if m == "os"));
    }

    #[test]
    fn rejects_from_import_of_unsafe_module() {
        let err = check_src("from os import path\n").unwrap_err();
        assert!(matches!(err, AnalysisError::UnsafeImport(m) if m == "os"));
    }

    #[test]
    fn rejects_unsafe_import_nested_in_blocks() {
        let src = "if True:\n    for i in [1]:\n        import subprocess\n";
        let err = check_src(src).unwrap_err();
        assert!(matches!(err, AnalysisError::UnsafeImport(m) if m == "subprocess"));
    }

    #[test]
    fn matching_is_exact_not_prefix() {
        // lexical screening only; `os.path` is a different dotted name
        assert!(check_src("import os.path\n").is_ok());
        assert!(check_src("import osmium\n").is_ok());
    }

    #[test]
    fn accepts_plain_analysis_code() {
        let src = "avg = df.groupby('gender')['purchase_amount'].mean()\nprint(avg)\n";
        assert!(check_src(src).is_ok());
    }
}
