//! Graph-based extraction: PageRank over a sentence-overlap graph
use crate::utils::TextUtils;

const DAMPING: f64 = 0.85;
const MAX_ITERATIONS: usize = 50;
const TOLERANCE: f64 = 1e-4;

/// Word budget for the selected sentences.
pub const WORD_BUDGET: usize = 50;

/// Shared content terms normalised by the log lengths of both sentences.
fn overlap(a: &[String], b: &[String]) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let common = a.iter().filter(|term| b.contains(term)).count() as f64;
    let denominator = (a.len() as f64).ln() + (b.len() as f64).ln();
    if denominator <= 0.0 {
        // both single-term sentences: identical or unrelated
        return if common > 0.0 { 1.0 } else { 0.0 };
    }
    common / denominator
}

pub(crate) fn pagerank(weights: &[Vec<f64>]) -> Vec<f64> {
    let n = weights.len();
    if n == 0 {
        return Vec::new();
    }
    let out_weight: Vec<f64> = weights.iter().map(|row| row.iter().sum()).collect();
    let mut scores = vec![1.0 / n as f64; n];

    for _ in 0..MAX_ITERATIONS {
        let mut next = vec![(1.0 - DAMPING) / n as f64; n];
        for (j, row) in weights.iter().enumerate() {
            if out_weight[j] == 0.0 {
                // dangling sentence spreads its rank evenly
                let share = DAMPING * scores[j] / n as f64;
                next.iter_mut().for_each(|v| *v += share);
                continue;
            }
            for (i, weight) in row.iter().enumerate() {
                if *weight > 0.0 {
                    next[i] += DAMPING * scores[j] * weight / out_weight[j];
                }
            }
        }
        let delta = next
            .iter()
            .zip(scores.iter())
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max);
        scores = next;
        if delta < TOLERANCE {
            break;
        }
    }
    scores
}

/// Picks sentences by rank until `word_budget` words are covered, then
/// restores their original order.
pub fn summarize(sentences: &[String], word_budget: usize) -> String {
    let terms: Vec<Vec<String>> = sentences.iter().map(|s| TextUtils::content_terms(s)).collect();
    let n = sentences.len();
    let mut weights = vec![vec![0.0f64; n]; n];
    for i in 0..n {
        for j in (i + 1)..n {
            let w = overlap(&terms[i], &terms[j]);
            weights[i][j] = w;
            weights[j][i] = w;
        }
    }

    let scores = pagerank(&weights);
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| scores[b].partial_cmp(&scores[a]).unwrap_or(std::cmp::Ordering::Equal));

    let mut selected = Vec::new();
    let mut words = 0;
    for index in order {
        if words >= word_budget && !selected.is_empty() {
            break;
        }
        words += TextUtils::count_words(&sentences[index]);
        selected.push(index);
    }
    selected.sort_unstable();

    selected
        .into_iter()
        .map(|i| sentences[i].as_str())
        .collect::<Vec<_>>()
        .join(". ")
}
