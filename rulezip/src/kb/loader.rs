//! This module loads relation files from a directory into a [KnowledgeBase].
//!
//! Each `.tsv` (tab-separated) or `.csv` (comma-separated) file holds the
//! facts of one relation; the file stem is the relation name, the arity is
//! taken from the first row.

use std::path::{Path, PathBuf};

use crate::error::Error;
use crate::kb::KnowledgeBase;

/// Loads every relation file in `directory` into a fresh [KnowledgeBase].
///
/// Files with other extensions are skipped; an empty directory is an error.
pub fn load_directory(directory: &Path) -> Result<KnowledgeBase, Error> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(directory)
        .map_err(|error| Error::IoReading {
            error,
            filename: directory.to_path_buf(),
        })?
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| {
            matches!(
                path.extension().and_then(|extension| extension.to_str()),
                Some("tsv") | Some("csv")
            )
        })
        .collect();
    paths.sort();

    if paths.is_empty() {
        return Err(Error::EmptyDirectory(directory.to_path_buf()));
    }

    let mut kb = KnowledgeBase::new();
    for path in &paths {
        load_file(&mut kb, path)?;
    }

    log::info!(
        "loaded {} relations, {} facts, {} constants from {}",
        kb.relation_count(),
        kb.fact_count(),
        kb.constant_count(),
        directory.display()
    );

    Ok(kb)
}

/// Loads one relation file into `kb`.
pub fn load_file(kb: &mut KnowledgeBase, path: &Path) -> Result<(), Error> {
    let name = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or_default()
        .to_string();
    let delimiter = match path.extension().and_then(|extension| extension.to_str()) {
        Some("csv") => b',',
        _ => b'\t',
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .delimiter(delimiter)
        .flexible(true)
        .from_path(path)?;

    let mut relation = None;
    let mut arity = 0;
    for (row, record) in reader.records().enumerate() {
        let record = record?;
        if record.is_empty() {
            continue;
        }

        let relation = match relation {
            Some(relation) => relation,
            None => {
                arity = record.len();
                let id = kb.add_relation(&name, arity)?;
                relation = Some(id);
                id
            }
        };
        if record.len() != arity {
            return Err(Error::InconsistentArity {
                relation: name,
                expected: arity,
                found: record.len(),
                row: row + 1,
            });
        }

        let fact: Vec<_> = record
            .iter()
            .map(|symbol| kb.symbols_mut().add_str(symbol.trim()).value())
            .collect();
        kb.add_fact(relation, &fact)?;
    }

    Ok(())
}
