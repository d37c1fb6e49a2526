use crate::tokenizer::Tokenizer;
use crate::TermId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// How inverse document frequency is derived from (N, df).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IdfScheme {
    /// idf = ln((1 + N) / (1 + df)) + 1
    #[default]
    Smooth,
    /// idf = ln(1 + N / df)
    LogPlusOne,
}

impl IdfScheme {
    /// Always finite and > 0 for df in 1..=N.
    pub fn idf(self, num_docs: u32, df: u32) -> f32 {
        let n = num_docs as f32;
        let df = df.max(1) as f32;
        match self {
            IdfScheme::Smooth => ((1.0 + n) / (1.0 + df)).ln() + 1.0,
            IdfScheme::LogPlusOne => (1.0 + n / df).ln(),
        }
    }
}

/// Fitted term statistics for one field.
///
/// Column indices are assigned in lexicographic term order, so two builds over
/// the same values always produce the same vocabulary.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Vocabulary {
    tokenizer: Tokenizer,
    dictionary: HashMap<String, TermId>,
    terms: Vec<String>,
    df: Vec<u32>,
    num_docs: u32,
}

impl Vocabulary {
    pub fn build<I, S>(values: I, tokenizer: &Tokenizer) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut counts: BTreeMap<String, u32> = BTreeMap::new();
        let mut num_docs: u32 = 0;
        for value in values {
            num_docs += 1;
            let seen_in_doc: BTreeSet<String> = tokenizer.tokenize(value.as_ref()).into_iter().collect();
            for term in seen_in_doc {
                *counts.entry(term).or_insert(0) += 1;
            }
        }

        let mut dictionary = HashMap::with_capacity(counts.len());
        let mut terms = Vec::with_capacity(counts.len());
        let mut df = Vec::with_capacity(counts.len());
        for (tid, (term, count)) in counts.into_iter().enumerate() {
            dictionary.insert(term.clone(), tid as TermId);
            terms.push(term);
            df.push(count);
        }
        Self { tokenizer: tokenizer.clone(), dictionary, terms, df, num_docs }
    }

    pub fn tokenizer(&self) -> &Tokenizer { &self.tokenizer }
    pub fn len(&self) -> usize { self.terms.len() }
    pub fn is_empty(&self) -> bool { self.terms.is_empty() }
    pub fn num_docs(&self) -> u32 { self.num_docs }

    pub fn term_index(&self, term: &str) -> Option<TermId> { self.dictionary.get(term).copied() }
    pub fn term(&self, tid: TermId) -> Option<&str> { self.terms.get(tid as usize).map(String::as_str) }
    pub fn doc_freq(&self, tid: TermId) -> Option<u32> { self.df.get(tid as usize).copied() }

    /// Terms in column order.
    pub fn iter(&self) -> impl Iterator<Item = (TermId, &str)> {
        self.terms.iter().enumerate().map(|(i, t)| (i as TermId, t.as_str()))
    }

    pub fn weights(&self, scheme: IdfScheme) -> TermWeights {
        TermWeights {
            idf: self.df.iter().map(|&df| scheme.idf(self.num_docs, df)).collect(),
        }
    }
}

/// Per-column IDF weights derived from a [`Vocabulary`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TermWeights {
    idf: Vec<f32>,
}

impl TermWeights {
    pub fn len(&self) -> usize { self.idf.len() }
    pub fn is_empty(&self) -> bool { self.idf.is_empty() }
    pub fn get(&self, tid: TermId) -> Option<f32> { self.idf.get(tid as usize).copied() }
    pub fn as_slice(&self) -> &[f32] { &self.idf }
}
