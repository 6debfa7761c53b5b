//! End-to-end flow: load a file, generate code offline, validate, execute.

use std::fs;

use anyhow::Result;
use dgpt::analysis::{run_analysis, strip_code_fences, AnalysisError};
use dgpt::codegen;
use dgpt::dataset::Frame;
use dgpt::render::{ChartKind, RecordingSink};
use dgpt::session::SessionStore;

const CSV: &str = "\
gender,purchase_amount,category
Female,101.0,Books
Male,80.0,Games
Female,105.5,Books
Male,62.0,Games
";

fn load_dataset(dir: &tempfile::TempDir) -> Result<Frame> {
    let path = dir.path().join("purchases.csv");
    fs::write(&path, CSV)?;
    Ok(Frame::load(&path)?)
}

#[test]
fn demo_question_end_to_end() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let frame = load_dataset(&dir)?;

    let mut store = SessionStore::default();
    let id = store.create("purchases.csv", frame);
    let session = store.get(&id).expect("session just created");

    let raw = codegen::canned_response("Show the average purchase amount by gender");
    let code = strip_code_fences(&raw);
    let mut sink = RecordingSink::default();
    let output = run_analysis(&code, session.dataset(), &mut sink)?;

    let lines: Vec<&str> = output.lines().collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0], "Female: 103.25");
    assert_eq!(lines[1], "Male: 71.0");

    store.remove(&id);
    Ok(())
}

#[test]
fn unsafe_code_is_rejected_and_nothing_is_touched() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let frame = load_dataset(&dir)?;
    let marker = dir.path().join("marker.txt");
    fs::write(&marker, "still here")?;

    let code = format!("import os\nos.system('rm -rf {}')\n", dir.path().display());
    let mut sink = RecordingSink::default();
    let err = run_analysis(&code, &frame, &mut sink).unwrap_err();

    assert!(matches!(&err, AnalysisError::UnsafeImport(m) if m == "os"));
    assert!(marker.exists());
    assert_eq!(fs::read_to_string(&marker)?, "still here");
    Ok(())
}

#[test]
fn bar_plot_question_registers_a_figure() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let frame = load_dataset(&dir)?;

    let raw = codegen::canned_response("Create a bar plot of purchase amount by category");
    let code = strip_code_fences(&raw);
    let mut sink = RecordingSink::default();
    let output = run_analysis(&code, &frame, &mut sink)?;

    // the chart goes through the sink, not the captured text
    assert_eq!(output, "");
    assert_eq!(sink.figures.len(), 1);
    let fig = &sink.figures[0];
    assert_eq!(fig.kind, ChartKind::Bar);
    assert_eq!(fig.title.as_deref(), Some("Purchase Amount by Category"));
    assert_eq!(
        fig.points,
        vec![("Books".to_string(), 103.25), ("Games".to_string(), 71.0)]
    );
    Ok(())
}

#[test]
fn questions_in_one_session_do_not_see_each_others_mutations() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let frame = load_dataset(&dir)?;

    let mut store = SessionStore::default();
    let id = store.create("purchases.csv", frame);
    let session = store.get(&id).expect("session just created");

    let mut sink = RecordingSink::default();
    let first = run_analysis(
        "df['discount'] = 5\nprint(len(df.columns))\n",
        session.dataset(),
        &mut sink,
    )?;
    assert_eq!(first, "4\n");

    let second = run_analysis("print(len(df.columns))\n", session.dataset(), &mut sink)?;
    assert_eq!(second, "3\n");
    Ok(())
}

#[test]
fn fenced_and_unfenced_generations_behave_identically() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let frame = load_dataset(&dir)?;
    let mut sink = RecordingSink::default();

    for raw in ["```python\nprint(len(df))\n```", "print(len(df))"] {
        let code = strip_code_fences(raw);
        assert_eq!(code, "print(len(df))");
        let out = run_analysis(&code, &frame, &mut sink)?;
        assert_eq!(out, "4\n");
    }
    Ok(())
}
