use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use catlab_normalize::Normalizer;
use catlab_types::Utterance;

fn main() -> Result<()> {
    let mut args = env::args().skip(1);
    let mut rules: Option<PathBuf> = None;
    let mut words = Vec::new();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--rules" => {
                rules = Some(args.next().map(PathBuf::from).context("--rules needs a path")?);
            }
            _ => words.push(arg),
        }
    }
    if words.is_empty() {
        bail!(
            "usage: cargo run -p catlab-normalize --example normalize -- [--rules <file>] <text...>"
        );
    }

    let normalizer = match rules {
        Some(path) => Normalizer::load(&path)
            .with_context(|| format!("loading rules from {}", path.display()))?,
        None => Normalizer::default(),
    };

    let utterance = Utterance::new(&words.join(" "));
    println!("Input : {}", utterance);
    println!("Output: {}", normalizer.normalize(&utterance));
    Ok(())
}
