//! A fixed table of 360 one-degree buckets holding the best signal strength
//! seen at each angle.
//!
//! Angles are mapped to buckets by rounding to the nearest integer degree.
//! Anything that rounds outside of `[0, 360)` is refused rather than wrapped,
//! since a malformed reading says nothing trustworthy about where the antenna
//! was pointing. Empty buckets are `None`, so no real reading can ever be
//! mistaken for "no data".

/// Number of buckets, one per integer degree.
pub const BUCKETS: usize = 360;

/// The accumulated readings for one integer degree.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bucket {
    /// Largest strength recorded in this bucket.
    pub max: f64,
    sum: f64,
    count: u32,
}

impl Bucket {
    fn new(strength: f64) -> Self {
        Self {
            max: strength,
            sum: strength,
            count: 1,
        }
    }

    fn update(&mut self, strength: f64) {
        if strength > self.max {
            self.max = strength;
        }
        self.sum += strength;
        self.count += 1;
    }

    /// Running average of every strength recorded in this bucket.
    pub fn mean(&self) -> f64 {
        self.sum / self.count as f64
    }

    /// How many samples landed in this bucket.
    pub fn count(&self) -> u32 {
        self.count
    }
}

/// The bucket table itself. See the module documentation.
#[derive(Debug, Clone, PartialEq)]
pub struct AngleBucketStore {
    buckets: [Option<Bucket>; BUCKETS],
}

impl Default for AngleBucketStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AngleBucketStore {
    /// Creates a store with every bucket empty.
    pub fn new() -> Self {
        Self {
            buckets: [None; BUCKETS],
        }
    }

    /// Empties every bucket.
    pub fn clear(&mut self) {
        self.buckets = [None; BUCKETS];
    }

    /// Maps a continuous angle onto a bucket index, if it has one.
    pub fn bucket_index(angle_deg: f64) -> Option<usize> {
        let rounded = angle_deg.round();
        if rounded.is_finite() && (0.0..BUCKETS as f64).contains(&rounded) {
            Some(rounded as usize)
        } else {
            None
        }
    }

    /// Records `strength` at `angle_deg`. Returns `false` when the angle does
    /// not round into `[0, 360)` and the sample was dropped; logging that is
    /// left to the caller.
    pub fn record(&mut self, angle_deg: f64, strength: f64) -> bool {
        let Some(index) = Self::bucket_index(angle_deg) else {
            return false;
        };

        match &mut self.buckets[index] {
            Some(bucket) => bucket.update(strength),
            slot @ None => *slot = Some(Bucket::new(strength)),
        }
        true
    }

    /// Returns the bucket for an integer degree, if it holds any data.
    pub fn get(&self, degree: usize) -> Option<&Bucket> {
        self.buckets.get(degree).and_then(Option::as_ref)
    }

    /// Iterates over every non-empty bucket in ascending degree order. The
    /// iterator borrows the store, so calling this again starts over.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Bucket)> + '_ {
        self.buckets
            .iter()
            .enumerate()
            .filter_map(|(degree, bucket)| bucket.as_ref().map(|b| (degree, b)))
    }

    /// True when no bucket holds any data.
    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(Option::is_none)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_store_is_empty() {
        let store = AngleBucketStore::new();
        assert!(store.is_empty());
        assert_eq!(store.iter().count(), 0);
    }

    #[test]
    fn keeps_the_maximum() {
        let mut store = AngleBucketStore::new();
        assert!(store.record(10.0, 5.0));
        assert!(store.record(10.2, 3.0));
        assert!(store.record(9.6, -20.0));

        let bucket = store.get(10).unwrap();
        assert_eq!(bucket.max, 5.0);
        assert_eq!(bucket.count(), 3);
        assert_eq!(bucket.mean(), -4.0);
    }

    #[test]
    fn negative_readings_are_still_data() {
        // A reading equal to an old magic sentinel must not vanish.
        let mut store = AngleBucketStore::new();
        store.record(45.0, -54.0);
        assert_eq!(store.get(45).map(|b| b.max), Some(-54.0));
    }

    #[test]
    fn out_of_range_angles_are_dropped() {
        let mut store = AngleBucketStore::new();
        assert!(!store.record(360.6, 1.0));
        assert!(!store.record(359.5, 1.0));
        assert!(!store.record(-0.6, 1.0));
        assert!(!store.record(f64::NAN, 1.0));
        assert!(!store.record(f64::INFINITY, 1.0));
        assert!(store.is_empty());
    }

    #[test]
    fn edges_round_into_range() {
        let mut store = AngleBucketStore::new();
        assert!(store.record(-0.4, 1.0));
        assert!(store.record(359.4, 2.0));
        let degrees: Vec<usize> = store.iter().map(|(d, _)| d).collect();
        assert_eq!(degrees, vec![0, 359]);
    }

    #[test]
    fn iterates_in_ascending_order_and_restarts() {
        let mut store = AngleBucketStore::new();
        for angle in [200.0, 3.0, 90.0, 3.1] {
            store.record(angle, angle);
        }

        let first: Vec<usize> = store.iter().map(|(d, _)| d).collect();
        let second: Vec<usize> = store.iter().map(|(d, _)| d).collect();
        assert_eq!(first, vec![3, 90, 200]);
        assert_eq!(first, second);
    }

    #[test]
    fn clear_empties_everything() {
        let mut store = AngleBucketStore::new();
        store.record(1.0, 1.0);
        store.record(2.0, 1.0);
        store.clear();
        assert!(store.is_empty());
        assert_eq!(store.get(1), None);
    }
}
