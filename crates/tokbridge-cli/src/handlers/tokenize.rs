//! `tokenize`: launch a tokenizer server and run texts through it.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use tokbridge_core::tokenize_texts;
use tokbridge_runtime::{CmdOptions, ServerTokenizer, TokenizerConfig};

pub async fn execute(
    port: u16,
    dir: Option<PathBuf>,
    texts: &[String],
    command: &[String],
) -> Result<()> {
    let Some((program, args)) = command.split_first() else {
        bail!("no tokenizer server command given");
    };

    let mut options = CmdOptions::new(program.as_str()).with_args(args.iter().cloned());
    if let Some(dir) = dir {
        options = options.with_dir(dir);
    }

    let config = TokenizerConfig::from_env().context("invalid TOKBRIDGE_* configuration")?;
    let tokenizer = ServerTokenizer::new(program.as_str(), options, port, config);

    let results = tokenize_texts(&tokenizer, texts)
        .await
        .with_context(|| format!("tokenizing with `{}` failed", command.join(" ")))?;

    let mut stdout = std::io::stdout().lock();
    for result in &results {
        serde_json::to_writer(&mut stdout, result)?;
        writeln!(stdout)?;
    }
    Ok(())
}
