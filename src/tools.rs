//! File-to-file query tools over a loaded [`Similarity`].

use crate::config::files_handling::open_lines;
use crate::error::{GentsError, Result};
use crate::evaluate::{BucketScore, Evaluation};
use crate::similarity::{format_neighbours, Missing, Similarity};

use rand::Rng;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{info, warn};

fn score_or_sentinel(score: std::result::Result<f32, Missing>) -> f32 {
    score.unwrap_or_else(|missing| missing.sentinel())
}

fn write_all<I, T>(path: &Path, lines: I) -> Result<usize>
where
    I: IntoIterator<Item = T>,
    T: std::fmt::Display,
{
    let f = File::create(path).map_err(|e| GentsError::write(path, e))?;
    let mut out = BufWriter::new(f);
    let mut written = 0;
    for line in lines {
        writeln!(out, "{}", line).map_err(|e| GentsError::write(path, e))?;
        written += 1;
    }
    out.flush().map_err(|e| GentsError::write(path, e))?;
    Ok(written)
}

/// Splits every input line into whitespace separated fields, dropping blank
/// lines. Line numbers start at 1.
fn read_fields(path: &Path) -> Result<Vec<(usize, Vec<String>)>> {
    let mut lines = Vec::new();
    for (i, line) in open_lines(path)?.enumerate() {
        let line = line.map_err(|e| GentsError::read(path, e))?;
        let fields: Vec<String> = line.split_whitespace().map(str::to_string).collect();
        if !fields.is_empty() {
            lines.push((i + 1, fields));
        }
    }
    Ok(lines)
}

/// Writes `line<TAB>word<TAB>neighbours` for every word of the input file, in
/// input order. Unknown words get an empty list.
pub fn neighbours(similarity: &Similarity, input: &Path, output: &Path, k: usize, threads: usize) -> Result<usize> {
    let mut line_numbers = Vec::new();
    let mut words = Vec::new();
    for (line_no, fields) in read_fields(input)? {
        for word in fields {
            line_numbers.push(line_no);
            words.push(word);
        }
    }
    info!("searching {} neighbours for {} words", k, words.len());

    let results = similarity.batch_top_k(&words, k, threads)?;
    let lines = line_numbers.iter().zip(&words).zip(&results).map(|((line_no, word), result)| {
        let list = result.as_deref().map(format_neighbours).unwrap_or_default();
        format!("{}\t{}\t{}", line_no, word, list)
    });
    write_all(output, lines)
}

/// Reads `word1 word2 gold` lines and writes them back with the cosine
/// appended. Pairs with a word outside the matrix score 0.
pub fn pairs(similarity: &Similarity, input: &Path, output: &Path) -> Result<usize> {
    let mut lines = Vec::new();
    for (line_no, fields) in read_fields(input)? {
        if fields.len() < 3 {
            warn!("{}:{}: expected `word1 word2 score`, skipped", input.display(), line_no);
            continue;
        }
        let score = similarity.pairwise(&fields[0], &fields[1]).unwrap_or(0.0).max(0.0);
        lines.push(format!("{}\t{}\t{}\t{}", fields[0], fields[1], fields[2], score));
    }
    write_all(output, lines)
}

/// Reads `target candidate1 candidate2` lines and writes both scores. A missing
/// word shows up as its negative code.
pub fn pick(similarity: &Similarity, input: &Path, output: &Path) -> Result<usize> {
    let mut lines = Vec::new();
    for (line_no, fields) in read_fields(input)? {
        if fields.len() < 3 {
            warn!("{}:{}: expected `target candidate1 candidate2`, skipped", input.display(), line_no);
            continue;
        }
        let first = score_or_sentinel(similarity.pairwise(&fields[0], &fields[1]));
        let second = score_or_sentinel(similarity.pairwise(&fields[0], &fields[2]));
        lines.push(format!("{}\t{}\t{}\t{}\t{}", fields[0], fields[1], fields[2], first, second));
    }
    write_all(output, lines)
}

/// Runs the evaluation and writes one `frequency<TAB>average` line per bucket.
pub fn evaluate<R: Rng>(evaluation: &Evaluation, output: &Path, rng: &mut R) -> Result<Vec<BucketScore>> {
    let scores = evaluation.run(rng);
    write_all(output, &scores)?;
    Ok(scores)
}

#[cfg(test)]
mod tests {

    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn pets() -> Similarity {
        let labels = vec!["cat".to_string(), "dog".to_string(), "tree".to_string()];
        let matrix = vec![vec![(0, 1.0), (1, 2.0)], vec![(0, 1.0), (1, 1.0)], vec![(2, 5.0)]];
        Similarity::new(labels, &matrix)
    }

    #[test]
    fn neighbour_lists_keep_line_numbers() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("words.txt");
        let output = dir.path().join("neighbours.txt");
        fs::write(&input, "cat dog\n\nbird\n").unwrap();

        let sim = pets();
        assert_eq!(neighbours(&sim, &input, &output, 2, 2).unwrap(), 3);

        let score = sim.pairwise("cat", "dog").unwrap();
        let expected = format!("1\tcat\tdog ({s})\n1\tdog\tcat ({s})\n3\tbird\t\n", s = score);
        assert_eq!(fs::read_to_string(&output).unwrap(), expected);
    }

    #[test]
    fn pairs_append_clamped_scores() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("rg.txt");
        let output = dir.path().join("rg.out");
        fs::write(&input, "cat\tdog\t3.9\ncat\tbird\t0.5\nbroken\n").unwrap();

        let sim = pets();
        assert_eq!(pairs(&sim, &input, &output).unwrap(), 2);

        let content = fs::read_to_string(&output).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], format!("cat\tdog\t3.9\t{}", sim.pairwise("cat", "dog").unwrap()));
        assert_eq!(lines[1], "cat\tbird\t0.5\t0");
    }

    #[test]
    fn pick_reports_both_candidates() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("pick.txt");
        let output = dir.path().join("pick.out");
        fs::write(&input, "cat dog tree\ncat bird dog\n").unwrap();

        let sim = pets();
        pick(&sim, &input, &output).unwrap();

        let content = fs::read_to_string(&output).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], format!("cat\tdog\ttree\t{}\t0", sim.pairwise("cat", "dog").unwrap()));
        assert!(lines[1].starts_with("cat\tbird\tdog\t-2\t"));
    }
}
