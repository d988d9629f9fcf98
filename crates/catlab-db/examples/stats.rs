use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use catlab_db::CategoryLabelDatabase;

fn main() -> Result<()> {
    let path = env::args()
        .nth(1)
        .map(PathBuf::from)
        .context("usage: cargo run -p catlab-db --example stats -- <path-to-cldb.json>")?;

    let db = CategoryLabelDatabase::from_file(&path)
        .with_context(|| format!("loading database from {}", path.display()))?;

    let longest = db.grouped().first().map(|g| g.form.len()).unwrap_or(0);
    let mut slots: Vec<&str> = db.by_form().iter().map(|e| e.slot_upper.as_str()).collect();
    slots.sort_unstable();
    slots.dedup();

    println!("Database     : {}", path.display());
    println!("Records      : {}", db.record_count());
    println!("Surface forms: {}", db.form_count());
    println!("Slots        : {}", slots.join(", "));
    println!("Longest form : {} tokens", longest);
    println!("Homonyms     : {}", db.homonyms().count());

    Ok(())
}
