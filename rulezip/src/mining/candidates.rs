//! This module defines [CandidatePool], the bounded best-first buffer
//! backing each round of the beam search.

/// Keeps the `width` best items seen so far, ordered by descending score.
#[derive(Debug)]
pub struct CandidatePool<T> {
    width: usize,
    items: Vec<(f64, T)>,
}

impl<T> CandidatePool<T> {
    /// Creates an empty pool holding at most `width` items.
    pub fn new(width: usize) -> Self {
        Self {
            width,
            items: Vec::with_capacity(width + 1),
        }
    }

    /// Offers an item; it is kept only while it ranks among the best
    /// `width` scores. Ties keep the earlier arrival ahead.
    pub fn offer(&mut self, score: f64, item: T) {
        let position = self
            .items
            .iter()
            .position(|&(held, _)| held < score)
            .unwrap_or(self.items.len());
        if position >= self.width {
            return;
        }
        self.items.insert(position, (score, item));
        self.items.truncate(self.width);
    }

    /// The best item currently held.
    pub fn best(&self) -> Option<&T> {
        self.items.first().map(|(_, item)| item)
    }

    /// Drains the pool in descending score order.
    pub fn into_items(self) -> impl Iterator<Item = T> {
        self.items.into_iter().map(|(_, item)| item)
    }

    /// Number of items currently held.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True if nothing has been kept.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod test {
    use quickcheck_macros::quickcheck;

    use super::CandidatePool;

    #[test]
    fn keeps_the_best_in_order() {
        let mut pool = CandidatePool::new(2);
        pool.offer(1.0, "low");
        pool.offer(3.0, "high");
        pool.offer(2.0, "middle");

        assert_eq!(pool.best(), Some(&"high"));
        let drained: Vec<_> = pool.into_items().collect();
        assert_eq!(drained, vec!["high", "middle"]);
    }

    #[test]
    fn ties_keep_the_earlier_arrival() {
        let mut pool = CandidatePool::new(1);
        pool.offer(1.0, "first");
        pool.offer(1.0, "second");
        assert_eq!(pool.best(), Some(&"first"));
    }

    #[quickcheck]
    fn never_exceeds_its_width(scores: Vec<u32>, width: usize) -> bool {
        let width = width % 8 + 1;
        let mut pool = CandidatePool::new(width);
        for (index, score) in scores.iter().enumerate() {
            pool.offer(*score as f64, index);
        }
        pool.len() <= width && pool.len() <= scores.len()
    }
}
