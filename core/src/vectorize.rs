use crate::vocab::{TermWeights, Vocabulary};
use crate::TermId;
use std::collections::BTreeMap;

pub type DenseVector = Vec<f32>;

/// Convert `value` to an L2-normalized TF-IDF vector in `vocab`'s space.
///
/// Terms missing from the vocabulary are ignored. A value with no known terms
/// maps to the zero vector, as does a term with no entry in `weights`.
pub fn vectorize(value: &str, vocab: &Vocabulary, weights: &TermWeights, sublinear_tf: bool) -> DenseVector {
    let mut out = vec![0.0f32; vocab.len()];

    // BTreeMap keeps accumulation order fixed so output is bit-identical across calls.
    let mut tf_raw: BTreeMap<usize, u32> = BTreeMap::new();
    for term in vocab.tokenizer().tokenize(value) {
        if let Some(tid) = vocab.term_index(&term) {
            *tf_raw.entry(tid as usize).or_insert(0) += 1;
        }
    }
    if tf_raw.is_empty() { return out; }

    let mut norm = 0.0f32;
    for (tid, count) in tf_raw {
        let Some(idf) = weights.get(tid as TermId) else { continue };
        let tf = if sublinear_tf { 1.0 + (count as f32).ln() } else { count as f32 };
        let w = tf * idf;
        out[tid] = w;
        norm += w * w;
    }
    norm = norm.sqrt();
    if norm > 0.0 {
        for w in out.iter_mut() { *w /= norm; }
    }
    out
}
