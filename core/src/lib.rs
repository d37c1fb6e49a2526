//! TF-IDF vectorization and exhaustive nearest-neighbour search over
//! per-field text of web-server access-log records.
//!
//! ```
//! use logvec_core::{Record, SearchEngine};
//!
//! let records: Vec<Record> = ["200", "404", "200"]
//!     .iter()
//!     .map(|s| Record::new().with("status", *s))
//!     .collect();
//!
//! let mut engine = SearchEngine::default();
//! engine.build_index(&records, &["status"]).unwrap();
//! assert_eq!(engine.search("200", "status", 2).unwrap(), vec![0, 2]);
//! ```

pub mod engine;
pub mod error;
pub mod flat;
pub mod record;
pub mod source;
pub mod tokenizer;
pub mod vectorize;
pub mod vocab;

pub type TermId = u32;
/// Position of a record in the corpus it was indexed from.
pub type RecordId = usize;

pub use engine::{EngineConfig, FieldIndex, SearchEngine};
pub use error::{BuildError, IndexError};
pub use flat::{FlatIndex, Neighbor};
pub use record::{FieldValue, LogField, Record};
pub use source::{load_path, InputFormat, ParseStats, RecordSource};
pub use tokenizer::{Tokenizer, TokenizerConfig};
pub use vectorize::{vectorize, DenseVector};
pub use vocab::{IdfScheme, TermWeights, Vocabulary};
