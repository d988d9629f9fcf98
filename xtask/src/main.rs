use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use catlab_db::{CategoryLabelDatabase, GroupedForm};
use clap::{Parser, Subcommand};
use serde_json::{Map, Value, json};

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Category label database maintenance utilities")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a database and report duplicate entries.
    CheckDb {
        #[arg(long)]
        path: PathBuf,
        /// Fail when duplicates are found.
        #[arg(long, default_value_t = false)]
        strict: bool,
    },
    /// List surface forms bound to more than one slot value.
    Homonyms {
        #[arg(long)]
        path: PathBuf,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::CheckDb { path, strict } => check_db(&path, strict)?,
        Commands::Homonyms { path, json } => homonyms(&path, json)?,
    }

    Ok(())
}

fn load(path: &Path) -> Result<CategoryLabelDatabase> {
    CategoryLabelDatabase::from_file(path)
        .with_context(|| format!("Failed to load database {}", path.display()))
}

fn check_db(path: &Path, strict: bool) -> Result<()> {
    let db = load(path)?;

    let mut seen: HashMap<(&[String], &str, &str), usize> = HashMap::new();
    for record in db.iter() {
        *seen
            .entry((
                record.form.as_slice(),
                record.value.as_str(),
                record.slot.as_str(),
            ))
            .or_default() += 1;
    }
    let mut duplicates: Vec<_> = seen.into_iter().filter(|(_, n)| *n > 1).collect();
    duplicates.sort();

    for ((form, value, slot), n) in &duplicates {
        eprintln!("- '{}' listed {} times for {}={}", form.join(" "), n, slot, value);
    }
    println!(
        "{}: {} records, {} surface forms, {} homonyms, {} duplicates.",
        path.display(),
        db.record_count(),
        db.form_count(),
        db.homonyms().count(),
        duplicates.len()
    );

    if strict && !duplicates.is_empty() {
        bail!("Database contains duplicate entries.");
    }
    Ok(())
}

fn homonyms(path: &Path, as_json: bool) -> Result<()> {
    let db = load(path)?;
    let groups: Vec<&GroupedForm> = db.homonyms().collect();

    if as_json {
        let out: Vec<_> = groups
            .iter()
            .map(|g| {
                let preferred = g
                    .preferred()
                    .map(|(slot, value)| json!({"slot": slot, "value": value}));
                let slots: Map<String, Value> = g
                    .slots
                    .iter()
                    .map(|(slot, values)| (slot.clone(), json!(values)))
                    .collect();
                json!({
                    "form": g.form.join(" "),
                    "slots": slots,
                    "preferred": preferred,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    for group in groups {
        let bindings: Vec<String> = group
            .slots
            .iter()
            .flat_map(|(slot, values)| values.iter().map(move |v| format!("{slot}={v}")))
            .collect();
        let using = group
            .preferred()
            .map(|(slot, value)| format!("{slot}={value}"))
            .unwrap_or_default();
        println!(
            "{:<24} {} (using {})",
            group.form.join(" "),
            bindings.join(", "),
            using
        );
    }
    Ok(())
}
