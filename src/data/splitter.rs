// ============================================================
// Layer 4 — Train/Validation Splitter
// ============================================================
// Shuffles prepared molecules and splits them into a training
// and a validation set. Molecules arrive grouped by source, so
// without the shuffle the validation set would hold a single
// data source only.

use rand::seq::SliceRandom;

/// Randomly shuffle `records` and split into (train, validation).
/// `train_fraction` is the proportion kept for training, e.g. 0.8.
pub fn split_train_val<T>(mut records: Vec<T>, train_fraction: f64) -> (Vec<T>, Vec<T>) {
    let mut rng = rand::thread_rng();
    records.shuffle(&mut rng);

    let total    = records.len();
    let split_at = ((total as f64) * train_fraction).round() as usize;
    let split_at = split_at.min(total);

    let val = records.split_off(split_at);

    tracing::debug!(
        "Dataset split: {} training, {} validation molecules",
        records.len(),
        val.len(),
    );

    (records, val)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correct_split_sizes() {
        let items: Vec<usize> = (0..100).collect();
        let (train, val)      = split_train_val(items, 0.8);
        assert_eq!(train.len(), 80);
        assert_eq!(val.len(),   20);
    }

    #[test]
    fn test_all_items_preserved() {
        let items: Vec<usize> = (0..50).collect();
        let (train, val)      = split_train_val(items, 0.7);
        assert_eq!(train.len() + val.len(), 50);
    }

    #[test]
    fn test_empty_dataset() {
        let items: Vec<usize> = Vec::new();
        let (train, val)      = split_train_val(items, 0.8);
        assert!(train.is_empty());
        assert!(val.is_empty());
    }
}
