//! Exhaustive nearest-neighbour index.
//!
//! Every query scans all rows: O(rows * dimension). Access-log corpora from a
//! single host stay small enough that a full scan beats building any graph or
//! tree structure, and it gives exact, reproducible rankings.

use crate::error::{IndexError, Result};
use crate::vectorize::DenseVector;
use crate::RecordId;
use serde::Serialize;
use std::cmp::Ordering;

/// One search hit: a row (record) index and its squared Euclidean distance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Neighbor {
    pub record: RecordId,
    pub distance: f32,
}

impl Neighbor {
    fn rank_cmp(&self, other: &Self) -> Ordering {
        self.distance.total_cmp(&other.distance).then(self.record.cmp(&other.record))
    }
}

/// Row-major matrix of vectors; row i is record i.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlatIndex {
    dim: usize,
    rows: usize,
    data: Vec<f32>,
}

impl FlatIndex {
    /// Store `vectors` as rows in input order. The first row fixes the
    /// dimension; an empty input gives an empty 0-dimension index.
    pub fn build<I>(vectors: I) -> Result<Self>
    where
        I: IntoIterator<Item = DenseVector>,
    {
        let mut vectors = vectors.into_iter();
        let Some(first) = vectors.next() else { return Ok(Self::default()) };
        let dim = first.len();
        let (lower, _) = vectors.size_hint();
        let mut data = Vec::with_capacity(dim * (lower + 1));
        data.extend_from_slice(&first);
        let mut rows = 1;
        for v in vectors {
            if v.len() != dim {
                return Err(IndexError::DimensionMismatch { row: rows, expected: dim, actual: v.len() });
            }
            data.extend_from_slice(&v);
            rows += 1;
        }
        Ok(Self { dim, rows, data })
    }

    pub fn len(&self) -> usize { self.rows }
    pub fn is_empty(&self) -> bool { self.rows == 0 }
    pub fn dimension(&self) -> usize { self.dim }

    #[inline]
    pub fn row(&self, i: usize) -> Option<&[f32]> {
        if i >= self.rows { return None; }
        let start = i * self.dim;
        Some(&self.data[start..start + self.dim])
    }

    /// The `k` rows closest to `query`, ascending by distance, ties by row.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if query.len() != self.dim {
            return Err(IndexError::InvalidQuery { expected: self.dim, actual: query.len() });
        }
        if k == 0 || self.rows == 0 {
            return Ok(vec![]);
        }

        let mut hits: Vec<Neighbor> = (0..self.rows)
            .map(|i| {
                let start = i * self.dim;
                let row = &self.data[start..start + self.dim];
                Neighbor { record: i, distance: squared_euclidean(query, row) }
            })
            .collect();

        if k < hits.len() {
            hits.select_nth_unstable_by(k - 1, Neighbor::rank_cmp);
            hits.truncate(k);
        }
        hits.sort_unstable_by(Neighbor::rank_cmp);
        Ok(hits)
    }
}

#[inline]
pub fn squared_euclidean(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b).map(|(x, y)| { let d = x - y; d * d }).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(n: usize) -> FlatIndex {
        FlatIndex::build((0..n).map(|i| vec![i as f32, 0.0, 0.0])).unwrap()
    }

    #[test]
    fn rows_keep_input_order() {
        let index = line(4);
        assert_eq!(index.len(), 4);
        assert_eq!(index.dimension(), 3);
        assert_eq!(index.row(2), Some(&[2.0, 0.0, 0.0][..]));
        assert_eq!(index.row(4), None);
    }

    #[test]
    fn search_top_k() {
        let index = line(10);
        let hits = index.search(&[0.0, 0.0, 0.0], 3).unwrap();
        let ids: Vec<usize> = hits.iter().map(|h| h.record).collect();
        assert_eq!(ids, vec![0, 1, 2]);
        assert_eq!(hits[2].distance, 4.0);
    }

    #[test]
    fn ties_break_by_record_index() {
        let index = FlatIndex::build(vec![vec![1.0], vec![-1.0], vec![0.0], vec![1.0], vec![-1.0]]).unwrap();
        let hits = index.search(&[0.0], 5).unwrap();
        let ids: Vec<usize> = hits.iter().map(|h| h.record).collect();
        assert_eq!(ids, vec![2, 0, 1, 3, 4]);

        let hits = index.search(&[0.0], 2).unwrap();
        let ids: Vec<usize> = hits.iter().map(|h| h.record).collect();
        assert_eq!(ids, vec![2, 0]);
    }

    #[test]
    fn k_larger_than_rows_returns_all() {
        let index = line(3);
        assert_eq!(index.search(&[0.0, 0.0, 0.0], 50).unwrap().len(), 3);
    }

    #[test]
    fn k_zero_is_empty() {
        let index = line(3);
        assert!(index.search(&[0.0, 0.0, 0.0], 0).unwrap().is_empty());
    }

    #[test]
    fn dimension_mismatch_on_build() {
        let err = FlatIndex::build(vec![vec![1.0, 2.0], vec![1.0]]).unwrap_err();
        assert_eq!(err, IndexError::DimensionMismatch { row: 1, expected: 2, actual: 1 });
    }

    #[test]
    fn invalid_query_dimension() {
        let index = line(2);
        let err = index.search(&[0.0], 1).unwrap_err();
        assert_eq!(err, IndexError::InvalidQuery { expected: 3, actual: 1 });
    }

    #[test]
    fn empty_index() {
        let index = FlatIndex::build(Vec::<DenseVector>::new()).unwrap();
        assert!(index.is_empty());
        assert!(index.search(&[], 5).unwrap().is_empty());
    }

    #[test]
    fn zero_dimension_rows_all_match() {
        let index = FlatIndex::build(vec![vec![], vec![], vec![]]).unwrap();
        let hits = index.search(&[], 2).unwrap();
        assert_eq!(hits, vec![Neighbor { record: 0, distance: 0.0 }, Neighbor { record: 1, distance: 0.0 }]);
    }
}
