use crate::error::{BuildError, IndexError, Result};
use crate::flat::{FlatIndex, Neighbor};
use crate::record::Record;
use crate::tokenizer::{Tokenizer, TokenizerConfig};
use crate::vectorize::{vectorize, DenseVector};
use crate::vocab::{IdfScheme, TermWeights, Vocabulary};
use crate::RecordId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub tokenizer: TokenizerConfig,
    pub idf: IdfScheme,
    pub sublinear_tf: bool,
}

/// Fitted vocabulary, weights and row matrix for one field.
#[derive(Debug, Clone)]
pub struct FieldIndex {
    vocab: Vocabulary,
    weights: TermWeights,
    index: FlatIndex,
    sublinear_tf: bool,
}

impl FieldIndex {
    /// Fit a vocabulary on `values` and index every value as one row.
    pub fn build(values: &[String], config: &EngineConfig) -> Result<Self> {
        let tokenizer = Tokenizer::new(config.tokenizer.clone());
        let vocab = Vocabulary::build(values, &tokenizer);
        let weights = vocab.weights(config.idf);
        let vectors = values.iter().map(|v| vectorize(v, &vocab, &weights, config.sublinear_tf));
        let index = FlatIndex::build(vectors)?;
        Ok(Self { vocab, weights, index, sublinear_tf: config.sublinear_tf })
    }

    pub fn vocabulary(&self) -> &Vocabulary { &self.vocab }
    pub fn weights(&self) -> &TermWeights { &self.weights }
    pub fn flat(&self) -> &FlatIndex { &self.index }
    pub fn rows(&self) -> usize { self.index.len() }
    pub fn dimension(&self) -> usize { self.vocab.len() }

    /// Vectorize with the statistics fitted at build time.
    pub fn vectorize(&self, value: &str) -> DenseVector {
        vectorize(value, &self.vocab, &self.weights, self.sublinear_tf)
    }

    pub fn search(&self, query: &str, k: usize) -> Result<Vec<Neighbor>> {
        self.index.search(&self.vectorize(query), k)
    }
}

/// Per-field TF-IDF indexes over one record corpus.
///
/// Build once with [`SearchEngine::build_index`], then search from any number
/// of threads; searching only needs `&self`.
#[derive(Debug, Clone, Default)]
pub struct SearchEngine {
    config: EngineConfig,
    fields: BTreeMap<String, FieldIndex>,
    num_records: usize,
    ready: bool,
}

impl SearchEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config, ..Default::default() }
    }

    pub fn config(&self) -> &EngineConfig { &self.config }

    /// Replace all state with fresh indexes for `fields` over `records`.
    ///
    /// Fields are independent: those that fail are listed in the returned
    /// error while the rest are indexed and searchable.
    pub fn build_index<S: AsRef<str>>(&mut self, records: &[Record], fields: &[S]) -> std::result::Result<(), BuildError> {
        let mut built = BTreeMap::new();
        let mut failed = BuildError::default();

        for field in fields {
            let field = field.as_ref();
            match self.build_field(records, field) {
                Ok(fi) => {
                    tracing::info!(field, rows = fi.rows(), dimension = fi.dimension(), "field indexed");
                    built.insert(field.to_string(), fi);
                }
                Err(err) => {
                    tracing::warn!(field, error = %err, "field failed to index");
                    failed.failed.insert(field.to_string(), err);
                }
            }
        }

        self.fields = built;
        self.num_records = records.len();
        self.ready = true;
        tracing::info!(records = records.len(), fields = self.fields.len(), failed = failed.failed.len(), "index build complete");
        if failed.is_empty() { Ok(()) } else { Err(failed) }
    }

    fn build_field(&self, records: &[Record], field: &str) -> Result<FieldIndex> {
        if !records.is_empty() && records.iter().all(|r| r.get(field).is_none()) {
            return Err(IndexError::UnknownField(field.to_string()));
        }
        let values: Vec<String> = records
            .iter()
            .map(|r| r.get(field).map(|v| v.as_text().into_owned()).unwrap_or_default())
            .collect();
        FieldIndex::build(&values, &self.config)
    }

    /// Record ids nearest to `query` in `field`, closest first.
    pub fn search(&self, query: &str, field: &str, k: usize) -> Result<Vec<RecordId>> {
        Ok(self.search_with_distances(query, field, k)?.into_iter().map(|n| n.record).collect())
    }

    pub fn search_with_distances(&self, query: &str, field: &str, k: usize) -> Result<Vec<Neighbor>> {
        let fi = self.field_index(field).ok_or_else(|| IndexError::UnknownField(field.to_string()))?;
        let hits = fi.search(query, k)?;
        tracing::debug!(field, k, hits = hits.len(), "search");
        Ok(hits)
    }

    pub fn field_index(&self, field: &str) -> Option<&FieldIndex> { self.fields.get(field) }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldIndex)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn num_records(&self) -> usize { self.num_records }
    pub fn is_ready(&self) -> bool { self.ready }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn statuses(values: &[&str]) -> Vec<Record> {
        values.iter().map(|s| Record::new().with("status", *s)).collect()
    }

    #[test]
    fn engine_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SearchEngine>();
    }

    #[test]
    fn uninitialized_engine_rejects_search() {
        let engine = SearchEngine::default();
        assert!(!engine.is_ready());
        assert_eq!(engine.search("200", "status", 1), Err(IndexError::UnknownField("status".into())));
    }

    #[test]
    fn status_example() {
        let mut engine = SearchEngine::default();
        engine.build_index(&statuses(&["200", "404", "200"]), &["status"]).unwrap();
        assert_eq!(engine.search("200", "status", 2).unwrap(), vec![0, 2]);
        assert_eq!(engine.search("200", "status", 3).unwrap(), vec![0, 2, 1]);
    }

    #[test]
    fn missing_field_fails_alone() {
        let records = vec![
            Record::new().with("status", 200i64).with("url", "/alpha"),
            Record::new().with("status", 404i64).with("url", "/beta"),
        ];
        let mut engine = SearchEngine::default();
        let err = engine.build_index(&records, &["status", "referer", "url"]).unwrap_err();
        assert_eq!(err.failed.len(), 1);
        assert_eq!(err.failed.get("referer"), Some(&IndexError::UnknownField("referer".into())));
        assert_eq!(engine.search("404", "status", 1).unwrap(), vec![1]);
        assert_eq!(engine.search("/beta", "url", 1).unwrap(), vec![1]);
        assert!(matches!(engine.search("x", "referer", 1), Err(IndexError::UnknownField(_))));
    }

    #[test]
    fn sparse_field_uses_empty_string() {
        let records = vec![Record::new().with("referer", "https://example.com/"), Record::new()];
        let mut engine = SearchEngine::default();
        engine.build_index(&records, &["referer"]).unwrap();
        let fi = engine.field_index("referer").unwrap();
        assert_eq!(fi.rows(), 2);
        assert!(fi.flat().row(1).unwrap().iter().all(|&x| x == 0.0));
    }

    #[test]
    fn rebuild_replaces_state() {
        let mut engine = SearchEngine::default();
        engine.build_index(&statuses(&["200", "404"]), &["status"]).unwrap();
        let records = vec![Record::new().with("url", "/x")];
        engine.build_index(&records, &["url"]).unwrap();
        assert_eq!(engine.num_records(), 1);
        assert!(engine.field_index("status").is_none());
        assert_eq!(engine.search("/x", "url", 5).unwrap(), vec![0]);
    }

    #[test]
    fn empty_corpus_builds_empty_index() {
        let mut engine = SearchEngine::default();
        engine.build_index(&[], &["status"]).unwrap();
        assert!(engine.is_ready());
        assert!(engine.search("200", "status", 5).unwrap().is_empty());
    }
}
