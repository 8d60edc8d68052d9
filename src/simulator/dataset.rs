//! Synthetic records for the simulated engine

use super::Rng;
use crate::dimension::Dimension;

/// Row-major records, one value per dimension
#[derive(Debug, Clone)]
pub struct Dataset {
    dimensions: Vec<Dimension>,
    records: Vec<Vec<f64>>,
}

impl Dataset {
    /// Records must have exactly one value per dimension
    pub fn new(dimensions: Vec<Dimension>, records: Vec<Vec<f64>>) -> Self {
        debug_assert!(
            records.iter().all(|r| r.len() == dimensions.len()),
            "every record needs one value per dimension"
        );
        Dataset {
            dimensions,
            records,
        }
    }

    /// `count` records drawn uniformly from each dimension's range. About one
    /// value in eight is snapped to a tenth of the range so boundary
    /// comparisons see exact ties.
    pub fn generate<R: Rng>(dimensions: Vec<Dimension>, count: usize, rng: &mut R) -> Self {
        let records = (0..count)
            .map(|_| {
                dimensions
                    .iter()
                    .map(|dimension| {
                        let range = dimension.range();
                        if rng.gen_range(0, 8) == 0 {
                            range.low() + range.width() * rng.gen_range(0, 11) as f64 / 10.0
                        } else {
                            range.low() + range.width() * rng.gen_unit()
                        }
                    })
                    .collect()
            })
            .collect();
        Dataset::new(dimensions, records)
    }

    pub fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    pub fn dimension(&self, name: &str) -> Option<&Dimension> {
        self.dimensions.iter().find(|d| d.name() == name)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Values of one dimension, in record order
    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        let position = self.dimensions.iter().position(|d| d.name() == name)?;
        Some(self.records.iter().map(|r| r[position]).collect())
    }

    /// Count records per bin of `dimension`, keeping only records whose
    /// `filter_dimension` value passes `keep`
    pub fn histogram(
        &self,
        filter_dimension: &str,
        keep: impl Fn(f64) -> bool,
        dimension: &str,
    ) -> Option<Vec<f64>> {
        let filter_at = self.dimensions.iter().position(|d| d.name() == filter_dimension)?;
        let bin_at = self.dimensions.iter().position(|d| d.name() == dimension)?;
        let binned = &self.dimensions[bin_at];

        let mut counts = vec![0.0; binned.bins() as usize];
        for record in self.records.iter().filter(|r| keep(r[filter_at])) {
            counts[binned.bin_of(record[bin_at])] += 1.0;
        }
        Some(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dimension::Interval;
    use crate::simulator::DeterministicRng;

    fn dims() -> Vec<Dimension> {
        vec![
            Dimension::new("x", Interval::new(0.0, 100.0).unwrap(), 10).unwrap(),
            Dimension::new("y", Interval::new(-1.0, 1.0).unwrap(), 4).unwrap(),
        ]
    }

    #[test]
    fn test_generate_stays_in_range() {
        let mut rng = DeterministicRng::new(5);
        let dataset = Dataset::generate(dims(), 500, &mut rng);
        assert_eq!(dataset.len(), 500);
        for value in dataset.column("y").unwrap() {
            assert!((-1.0..=1.0).contains(&value));
        }
    }

    #[test]
    fn test_histogram_filters_and_bins() {
        let dataset = Dataset::new(
            dims(),
            vec![vec![10.0, -0.9], vec![20.0, 0.9], vec![90.0, 0.9], vec![100.0, 1.0]],
        );
        let all = dataset.histogram("x", |_| true, "y").unwrap();
        assert_eq!(all, vec![1.0, 0.0, 0.0, 3.0]);

        let low_x = dataset.histogram("x", |v| v <= 50.0, "y").unwrap();
        assert_eq!(low_x, vec![1.0, 0.0, 0.0, 1.0]);
        assert!(dataset.histogram("x", |_| true, "missing").is_none());
    }
}
