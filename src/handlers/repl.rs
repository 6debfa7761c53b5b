//! Interactive session: one dataset, many questions.

use std::io::{self, BufRead, Write};

use anyhow::{bail, Result};
use is_terminal::IsTerminal;
use owo_colors::OwoColorize;

use crate::{
    cli::Cli, config::Config, dataset::Frame, handlers::answer_question, session::SessionStore,
};

pub async fn run(args: &Cli, cfg: &Config, model: &str) -> Result<()> {
    let frame = Frame::load(&args.file)?;
    let source = args.file.to_string_lossy().into_owned();

    let mut store = SessionStore::default();
    let id = store.create(&source, frame);

    let interactive = io::stdin().is_terminal();
    if interactive {
        println!("{} {}", "Loaded".green(), source);
        if let Some(session) = store.get(&id) {
            if !args.no_preview {
                let rows = args
                    .preview_rows
                    .or_else(|| cfg.get_usize("PREVIEW_ROWS"))
                    .unwrap_or(5);
                print!("{}", session.dataset().preview(rows));
                println!();
                print!("{}", session.dataset().info());
            }
        }
        println!();
        println!("Ask questions about your data. Type 'exit' to quit.");
    }

    let stdin = io::stdin();
    loop {
        if interactive {
            print!("{} ", "dgpt>".magenta());
            io::stdout().flush().ok();
        }
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if matches!(question, "exit" | "quit") {
            break;
        }
        let Some(session) = store.get(&id) else {
            bail!("session store lost the active dataset");
        };
        answer_question(args, cfg, model, session, question).await?;
        if interactive {
            println!();
        }
    }

    store.remove(&id);
    Ok(())
}
