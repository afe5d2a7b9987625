//! TF-IDF sentence vectors and centrality-based extraction
use std::collections::HashMap;

use crate::search::cosine_similarity;
use crate::utils::TextUtils;

/// Terms shorter than two characters carry no signal for weighting.
fn terms(sentence: &str) -> Vec<String> {
    TextUtils::tokenize(sentence)
        .into_iter()
        .filter(|t| t.chars().count() >= 2)
        .collect()
}

/// One L2-normalised TF-IDF row per sentence over the shared vocabulary.
///
/// Uses smoothed idf, `ln((1 + n) / (1 + df)) + 1`, so a term present in every
/// sentence still contributes. Sentences without terms get an all-zero row.
pub fn vectorize(sentences: &[String]) -> Vec<Vec<f32>> {
    let tokenized: Vec<Vec<String>> = sentences.iter().map(|s| terms(s)).collect();

    let mut vocabulary: HashMap<&str, usize> = HashMap::new();
    let mut document_frequency: Vec<usize> = Vec::new();
    for sentence_terms in &tokenized {
        let mut seen: Vec<usize> = Vec::new();
        for term in sentence_terms {
            let next = vocabulary.len();
            let index = *vocabulary.entry(term.as_str()).or_insert(next);
            if index == document_frequency.len() {
                document_frequency.push(0);
            }
            if !seen.contains(&index) {
                seen.push(index);
                document_frequency[index] += 1;
            }
        }
    }

    let n = sentences.len() as f32;
    let idf: Vec<f32> = document_frequency
        .iter()
        .map(|df| ((1.0 + n) / (1.0 + *df as f32)).ln() + 1.0)
        .collect();

    tokenized
        .iter()
        .map(|sentence_terms| {
            let mut row = vec![0.0f32; vocabulary.len()];
            for term in sentence_terms {
                if let Some(&index) = vocabulary.get(term.as_str()) {
                    row[index] += 1.0;
                }
            }
            for (value, weight) in row.iter_mut().zip(idf.iter()) {
                *value *= weight;
            }
            let norm = row.iter().map(|v| v * v).sum::<f32>().sqrt();
            if norm > 0.0 {
                row.iter_mut().for_each(|v| *v /= norm);
            }
            row
        })
        .collect()
}

/// Scores each sentence by the sum of its similarities to every sentence
/// and returns the best `count`, highest score first.
pub fn summarize(sentences: &[String], count: usize) -> String {
    let vectors = vectorize(sentences);
    let scores: Vec<f32> = vectors
        .iter()
        .map(|row| vectors.iter().map(|other| cosine_similarity(row, other)).sum())
        .collect();

    let mut order: Vec<usize> = (0..sentences.len()).collect();
    order.sort_by(|&a, &b| {
        scores[b]
            .partial_cmp(&scores[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    order
        .into_iter()
        .take(count.max(1))
        .map(|i| sentences[i].as_str())
        .collect::<Vec<_>>()
        .join(". ")
}
