//! Request handlers: one-shot questions and the interactive session loop.

pub mod ask;
pub mod repl;

use anyhow::Result;
use owo_colors::OwoColorize;
use tracing::info;

use crate::{
    analysis::{self, AnalysisError},
    cli::Cli,
    codegen::{self, GenerateOptions},
    config::Config,
    printer::{MarkdownPrinter, TextPrinter},
    render::TerminalRenderer,
    session::Session,
};

/// Generate, validate and execute code for one question, presenting
/// exactly one of captured output or an error message.
pub(crate) async fn answer_question(
    args: &Cli,
    cfg: &Config,
    model: &str,
    session: &Session,
    question: &str,
) -> Result<()> {
    let offline = args.offline || cfg.get("OPENAI_API_KEY").is_none();
    let raw = if offline {
        info!("using the canned generator (offline or no API key)");
        codegen::canned_response(question)
    } else {
        codegen::generate(
            cfg,
            question,
            session.dataset(),
            &GenerateOptions {
                model: model.to_string(),
                temperature: args.temperature,
                top_p: args.top_p,
                caching: !args.no_cache,
            },
        )
        .await?
    };

    let code = analysis::strip_code_fences(&raw);
    if args.show_code {
        if cfg.get_bool("PRETTIFY_MARKDOWN") {
            MarkdownPrinter::default().print(&format!("```python\n{}\n```", code));
        } else {
            println!("{}", code.dimmed());
            println!();
        }
    }

    let mut renderer = TerminalRenderer::default();
    match analysis::run_analysis(&code, session.dataset(), &mut renderer) {
        Ok(output) => {
            TextPrinter::with_color("green").print("Analysis completed");
            if !output.is_empty() {
                print!("{}", output);
                if !output.ends_with('\n') {
                    println!();
                }
            }
        }
        Err(err) => report_error(&err),
    }
    Ok(())
}

fn report_error(err: &AnalysisError) {
    let heading = if err.is_rejection() {
        "Rejected"
    } else {
        "Failed"
    };
    TextPrinter::with_color("red").print(&format!("{}: {}", heading, err));
}
