//! Validation and execution of generated analysis code.
//!
//! One pass per question: strip fence markers, parse, screen imports,
//! evaluate against the fixed namespace. The dataset is cloned before
//! execution, so whatever the code does to `df` stays inside that run.

pub mod ast;
mod interp;
mod lexer;
pub mod parser;
pub mod validator;
pub mod value;

use thiserror::Error;
use tracing::debug;

use crate::dataset::Frame;
use crate::render::RenderSink;

use interp::Interpreter;

#[derive(Debug, Error)]
pub enum AnalysisError {
    /// The candidate text is not valid code; nothing was executed.
    #[error("parse error: {0}")]
    Parse(String),
    /// A denylisted import was found; nothing was executed.
    #[error("unsafe import: {0}")]
    UnsafeImport(String),
    /// Accepted code failed while running; partial output is discarded.
    #[error("execution error: {0}")]
    Execution(String),
}

impl AnalysisError {
    /// True when the code was rejected before execution.
    pub fn is_rejection(&self) -> bool {
        matches!(self, AnalysisError::Parse(_) | AnalysisError::UnsafeImport(_))
    }
}

/// Remove a markdown code fence (with optional language label) around
/// generated text. Unfenced input is returned trimmed; prose around the
/// first fenced block is dropped.
pub fn strip_code_fences(raw: &str) -> String {
    let Some(start) = raw.find("```") else {
        return raw.trim().to_string();
    };
    let after = &raw[start + 3..];
    // the rest of the fence line is the language label
    let body = match after.find('\n') {
        Some(nl) => &after[nl + 1..],
        None => after,
    };
    let body = match body.find("```") {
        Some(end) => &body[..end],
        None => body,
    };
    body.trim().to_string()
}

/// Validate and execute one piece of candidate code against the dataset.
/// Returns the captured output, or the first error encountered.
pub fn run_analysis(
    code: &str,
    dataset: &Frame,
    sink: &mut dyn RenderSink,
) -> Result<String, AnalysisError> {
    let program = parser::parse(code).map_err(|e| AnalysisError::Parse(e.to_string()))?;
    validator::check(&program)?;
    debug!(statements = program.len(), "candidate code accepted");
    Interpreter::new(dataset.clone(), sink)
        .run(&program)
        .map_err(AnalysisError::Execution)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Frame;
    use crate::render::RecordingSink;

    fn dataset() -> Frame {
        let csv = "gender,purchase_amount\nFemale,101.0\nMale,80.0\nFemale,105.5\nMale,62.0\n";
        Frame::from_csv(csv.as_bytes()).unwrap()
    }

    #[test]
    fn fenced_and_bare_input_strip_to_the_same_code() {
        assert_eq!(strip_code_fences("```python\nprint(1)\n```"), "print(1)");
        assert_eq!(strip_code_fences("```\nprint(1)\n```"), "print(1)");
        assert_eq!(strip_code_fences("print(1)"), "print(1)");
        assert_eq!(
            strip_code_fences("Here you go:\n```python\nprint(1)\n```\nHope that helps!"),
            "print(1)"
        );
        assert_eq!(strip_code_fences("```python\nprint(1)\n"), "print(1)");
    }

    #[test]
    fn both_forms_execute_identically() {
        let mut sink = RecordingSink::default();
        let fenced = strip_code_fences("```python\nprint(1)\n```");
        let bare = strip_code_fences("print(1)");
        let a = run_analysis(&fenced, &dataset(), &mut sink).unwrap();
        let b = run_analysis(&bare, &dataset(), &mut sink).unwrap();
        assert_eq!(a, "1\n");
        assert_eq!(a, b);
    }

    #[test]
    fn unsafe_import_is_rejected_before_execution() {
        let mut sink = RecordingSink::default();
        let code = "import os\nos.system('rm -rf /')\nprint('never')\n";
        let err = run_analysis(code, &dataset(), &mut sink).unwrap_err();
        assert!(matches!(&err, AnalysisError::UnsafeImport(m) if m == "os"));
        assert!(err.is_rejection());
        // nothing ran: no artifacts, and the error carries no output
        assert!(sink.figures.is_empty() && sink.texts.is_empty() && sink.tables.is_empty());
    }

    #[test]
    fn invalid_syntax_is_rejected_with_a_parse_reason() {
        let mut sink = RecordingSink::default();
        let err = run_analysis("print(]\n", &dataset(), &mut sink).unwrap_err();
        assert!(matches!(err, AnalysisError::Parse(_)));
        assert!(err.is_rejection());
        assert!(err.to_string().starts_with("parse error"));
    }

    #[test]
    fn runtime_failures_are_execution_errors() {
        let mut sink = RecordingSink::default();
        let err = run_analysis("print(df['missing'])\n", &dataset(), &mut sink).unwrap_err();
        assert!(matches!(err, AnalysisError::Execution(_)));
        assert!(!err.is_rejection());
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn dataset_is_not_mutated_across_runs() {
        let data = dataset();
        let mut sink = RecordingSink::default();
        run_analysis("df['extra'] = 1\nprint(df.shape)\n", &data, &mut sink).unwrap();
        // the caller's frame is untouched and a second run sees the original
        assert_eq!(data.n_cols(), 2);
        let out = run_analysis("print(df.shape)\n", &data, &mut sink).unwrap();
        assert_eq!(out, "(4, 2)\n");
    }

    #[test]
    fn mutation_is_visible_within_a_single_run() {
        let mut sink = RecordingSink::default();
        let out = run_analysis(
            "df['extra'] = 1\nprint(df['extra'].sum())\n",
            &dataset(),
            &mut sink,
        )
        .unwrap();
        assert_eq!(out, "4\n");
    }

    #[test]
    fn demo_question_produces_one_line_per_gender() {
        let code = "avg_purchase = df.groupby('gender')['purchase_amount'].mean()\n\
                    print(\"Female:\", avg_purchase['Female'])\n\
                    print(\"Male:\", avg_purchase['Male'])\n";
        let mut sink = RecordingSink::default();
        let out = run_analysis(code, &dataset(), &mut sink).unwrap();
        assert_eq!(out, "Female: 103.25\nMale: 71.0\n");
    }

    #[test]
    fn repeated_execution_of_the_same_code_is_identical() {
        let data = dataset();
        let code = "print(df.groupby('gender')['purchase_amount'].mean())\n";
        let mut sink = RecordingSink::default();
        let first = run_analysis(code, &data, &mut sink).unwrap();
        let second = run_analysis(code, &data, &mut sink).unwrap();
        assert_eq!(first, second);
    }
}
