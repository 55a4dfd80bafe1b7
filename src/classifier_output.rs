//src/classifier_output.rs

use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind};
use std::path::Path;

use flate2::read::MultiGzDecoder;

use crate::error::{Error, Result};
use crate::types::{FixRankRecord, RankAssignment, TaxonomyTable};

/// Open a classifier table, transparently decompressing `.gz` files.
fn open_table(path: &Path) -> Result<Box<dyn BufRead>> {
    let f = File::open(path)?;

    let is_gz = path
        .extension()
        .map(|ext| ext == "gz")
        .unwrap_or(false);

    let reader: Box<dyn BufRead> = if is_gz {
        Box::new(BufReader::new(MultiGzDecoder::new(f)))
    } else {
        Box::new(BufReader::new(f))
    };
    Ok(reader)
}

/// Parses the confidence-filtered (`--format filterbyconf`) classifier table:
/// ```text
/// taxid\tdomain\tphylum\tclass\torder\tfamily\tgenus
/// amplicon_id_0\tBacteria\tProteobacteria\t...\tunclassified_Rhizobiales
/// ```
/// The header row is optional. Each row becomes `id -> "rank1;rank2;...;rankN;"`.
///
/// Errors with `ParseIntegrity` when rows disagree on rank depth, a rank name
/// is empty or contains `;`, or an id shows up twice with different taxonomy. An empty file gives an empty table.
pub fn parse_filter_by_conf<P: AsRef<Path>>(path: P) -> Result<TaxonomyTable> {
    let path = path.as_ref();
    let reader = open_table(path)?;

    let mut table = TaxonomyTable::new();
    let mut depth: Option<usize> = None;

    for (i, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        let line_no = i + 1;
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.split('\t').map(str::trim).collect();
        let (id, ranks) = match fields.split_first() {
            Some(split) => split,
            None => continue,
        };

        // Header row names the ranks
        if depth.is_none() && *id == "taxid" {
            table.ranks = Some(ranks.iter().map(|r| r.to_string()).collect());
            depth = Some(ranks.len());
            continue;
        }

        if id.is_empty() {
            return Err(Error::parse_integrity(path, line_no, "missing identifier"));
        }
        if ranks.is_empty() {
            return Err(Error::parse_integrity(
                path,
                line_no,
                format!("no rank fields for `{id}`"),
            ));
        }
        // Each field must be exactly one `;` segment
        if let Some(bad) = ranks.iter().find(|r| r.is_empty() || r.contains(';')) {
            return Err(Error::parse_integrity(
                path,
                line_no,
                format!("`{id}` has an empty or `;`-bearing rank name `{bad}`"),
            ));
        }
        match depth {
            Some(d) if d != ranks.len() => {
                return Err(Error::parse_integrity(
                    path,
                    line_no,
                    format!("`{id}` has {} ranks, expected {d}", ranks.len()),
                ));
            }
            Some(_) => {}
            None => depth = Some(ranks.len()),
        }

        let mut tax_str = ranks.join(";");
        tax_str.push(';');

        if let Some(prev) = table.insert_new(id.to_string(), tax_str.clone()) {
            if prev != tax_str {
                return Err(Error::parse_integrity(
                    path,
                    line_no,
                    format!("`{id}` assigned both `{prev}` and `{tax_str}`"),
                ));
            }
            log::debug!("Repeated identical row for {id} at line {line_no}");
        }
    }

    log::info!(
        "Parsed {} taxonomy assignments ({} ranks) from {}",
        table.len(),
        table.rank_depth(),
        path.display()
    );
    Ok(table)
}

/// Parses the fixed-rank (`--format fixrank`) classifier table:
/// ```text
/// <id>\t[strand]\t<taxon>\t<rank>\t<conf>\t<taxon>\t<rank>\t<conf>...
/// ```
/// The strand column may be absent. Every row must carry the same number
/// of `(taxon, rank, conf)` triples.
pub fn parse_fix_rank<P: AsRef<Path>>(path: P) -> Result<Vec<FixRankRecord>> {
    let path = path.as_ref();
    let reader = open_table(path)?;

    let mut records = Vec::new();
    let mut num_triples: Option<usize> = None;

    for (i, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        let line_no = i + 1;
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }

        let parts: Vec<&str> = line.split('\t').collect();
        let id = parts[0].trim();
        let mut rest = &parts[1..];
        // Drop the strand column
        if rest.len() % 3 == 1 {
            rest = &rest[1..];
        }
        if id.is_empty() || rest.is_empty() || rest.len() % 3 != 0 {
            return Err(Error::parse_integrity(
                path,
                line_no,
                "expected an id followed by (taxon, rank, confidence) triples",
            ));
        }

        let n = rest.len() / 3;
        match num_triples {
            Some(expected) if expected != n => {
                return Err(Error::parse_integrity(
                    path,
                    line_no,
                    format!("`{id}` has {n} ranks, expected {expected}"),
                ));
            }
            Some(_) => {}
            None => num_triples = Some(n),
        }

        let mut assignments = Vec::with_capacity(n);
        for triple in rest.chunks(3) {
            let conf: f64 = triple[2].trim().parse().map_err(|_| {
                Error::parse_integrity(
                    path,
                    line_no,
                    format!("bad confidence `{}` for `{id}`", triple[2]),
                )
            })?;
            assignments.push(RankAssignment {
                taxon: triple[0].trim().to_string(),
                rank: triple[1].trim().to_string(),
                conf,
            });
        }

        records.push(FixRankRecord {
            id: id.to_string(),
            assignments,
        });
    }

    log::info!("Parsed {} fixRank rows from {}", records.len(), path.display());
    Ok(records)
}

/// Ids of the sequences the classifier skipped as too short, one per line.
/// The classifier only writes this file when it has something to say,
/// so a missing file means no short sequences.
pub fn parse_short_seqs<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let path = path.as_ref();
    let reader = match open_table(path) {
        Ok(r) => r,
        Err(Error::Io(e)) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut ids = Vec::new();
    for line_result in reader.lines() {
        let line = line_result?;
        let id = line.trim();
        if !id.is_empty() {
            ids.push(id.to_string());
        }
    }
    Ok(ids)
}
