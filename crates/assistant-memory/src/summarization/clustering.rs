//! K-means over TF-IDF sentence vectors; one representative per cluster
use super::tfidf;
use crate::search::cosine_similarity;

const MAX_ITERATIONS: usize = 100;

fn squared_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Deterministic seeding: the first sentence, then repeatedly the sentence
/// farthest from every centroid chosen so far.
fn farthest_point_seeds(vectors: &[Vec<f32>], k: usize) -> Vec<Vec<f32>> {
    let mut centroids = vec![vectors[0].clone()];
    while centroids.len() < k {
        let mut best = (0usize, f32::MIN);
        for (i, v) in vectors.iter().enumerate() {
            let nearest = centroids
                .iter()
                .map(|c| squared_distance(v, c))
                .fold(f32::MAX, f32::min);
            if nearest > best.1 {
                best = (i, nearest);
            }
        }
        centroids.push(vectors[best.0].clone());
    }
    centroids
}

fn nearest_centroid(vector: &[f32], centroids: &[Vec<f32>]) -> usize {
    let mut best = (0usize, f32::MAX);
    for (i, c) in centroids.iter().enumerate() {
        let d = squared_distance(vector, c);
        if d < best.1 {
            best = (i, d);
        }
    }
    best.0
}

/// Cluster assignment for each vector after Lloyd iterations.
pub(crate) fn kmeans(vectors: &[Vec<f32>], k: usize) -> (Vec<Vec<f32>>, Vec<usize>) {
    let mut centroids = farthest_point_seeds(vectors, k);
    let mut assignments = vec![usize::MAX; vectors.len()];

    for _ in 0..MAX_ITERATIONS {
        let next: Vec<usize> = vectors.iter().map(|v| nearest_centroid(v, &centroids)).collect();
        if next == assignments {
            break;
        }
        assignments = next;

        for (cluster, centroid) in centroids.iter_mut().enumerate() {
            let members: Vec<&Vec<f32>> = vectors
                .iter()
                .zip(assignments.iter())
                .filter(|(_, a)| **a == cluster)
                .map(|(v, _)| v)
                .collect();
            // an emptied cluster keeps its previous centroid
            if members.is_empty() {
                continue;
            }
            for (d, value) in centroid.iter_mut().enumerate() {
                *value = members.iter().map(|m| m[d]).sum::<f32>() / members.len() as f32;
            }
        }
    }
    (centroids, assignments)
}

/// The sentence closest to each of `count` centroids, in original order.
pub fn summarize(sentences: &[String], count: usize) -> String {
    let k = count.max(1).min(sentences.len());
    let vectors = tfidf::vectorize(sentences);
    let (centroids, _) = kmeans(&vectors, k);

    let mut picked: Vec<usize> = centroids
        .iter()
        .map(|centroid| {
            let mut best = (0usize, f32::MIN);
            for (i, v) in vectors.iter().enumerate() {
                let score = cosine_similarity(centroid, v);
                if score > best.1 {
                    best = (i, score);
                }
            }
            best.0
        })
        .collect();
    picked.sort_unstable();
    picked.dedup();

    picked
        .into_iter()
        .map(|i| sentences[i].as_str())
        .collect::<Vec<_>>()
        .join(". ")
}
