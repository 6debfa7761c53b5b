//! One-shot handler: load the file, answer a single question, tear down.

use anyhow::{bail, Result};

use crate::{
    cli::Cli, config::Config, dataset::Frame, handlers::answer_question, session::SessionStore,
};

pub async fn run(args: &Cli, cfg: &Config, model: &str, question: &str) -> Result<()> {
    let frame = Frame::load(&args.file)?;
    let source = args.file.to_string_lossy().into_owned();

    let mut store = SessionStore::default();
    let id = store.create(&source, frame);
    let Some(session) = store.get(&id) else {
        bail!("session store lost the freshly loaded dataset");
    };

    if !args.no_preview {
        let rows = args
            .preview_rows
            .or_else(|| cfg.get_usize("PREVIEW_ROWS"))
            .unwrap_or(5);
        print!("{}", session.dataset().preview(rows));
        println!();
        print!("{}", session.dataset().info());
        println!();
    }

    answer_question(args, cfg, model, session, question).await?;
    store.remove(&id);
    Ok(())
}
