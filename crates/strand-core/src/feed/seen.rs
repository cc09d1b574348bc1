use bloomfilter::Bloom;
use nostr::{Event, EventId};

use crate::constants::{SEEN_FILTER_CAPACITY, SEEN_FILTER_FP_RATE};

/// Rotating membership filter over viewed note ids.
///
/// Two bloom-filter generations are kept. Lookups check both; inserts go to
/// the current one. Once `capacity` ids have been inserted the current
/// generation becomes the previous one and the old previous is dropped, so
/// an id is remembered for at least `capacity` and at most `2 * capacity`
/// insertions. False positives are possible, false negatives within that
/// window are not.
pub struct SeenNotesFilter {
    current: Bloom<EventId>,
    previous: Option<Bloom<EventId>>,
    capacity: usize,
    fp_rate: f64,
    inserted: usize,
    rotations: u64,
}

impl SeenNotesFilter {
    pub fn new(capacity: usize, fp_rate: f64) -> Self {
        let capacity = capacity.max(1);
        Self {
            current: Bloom::new_for_fp_rate(capacity, fp_rate),
            previous: None,
            capacity,
            fp_rate,
            inserted: 0,
            rotations: 0,
        }
    }

    /// Mark `id` as seen. Returns `true` if it was not seen before.
    pub fn insert(&mut self, id: &EventId) -> bool {
        if self.contains(id) {
            return false;
        }
        self.current.set(id);
        self.inserted += 1;
        if self.inserted >= self.capacity {
            self.rotate();
        }
        true
    }

    pub fn contains(&self, id: &EventId) -> bool {
        self.current.check(id) || self.previous.as_ref().is_some_and(|p| p.check(id))
    }

    /// Drop events that were already seen. Does not mark the rest.
    pub fn retain_unseen(&self, events: Vec<Event>) -> Vec<Event> {
        events.into_iter().filter(|e| !self.contains(&e.id)).collect()
    }

    pub fn rotations(&self) -> u64 {
        self.rotations
    }

    /// Forget every id and start over as a fresh filter.
    pub fn clear(&mut self) {
        self.current.clear();
        self.previous = None;
        self.inserted = 0;
        self.rotations = 0;
    }

    fn rotate(&mut self) {
        let fresh = Bloom::new_for_fp_rate(self.capacity, self.fp_rate);
        self.previous = Some(std::mem::replace(&mut self.current, fresh));
        self.inserted = 0;
        self.rotations += 1;
        tracing::debug!(rotations = self.rotations, "rotated seen-notes filter");
    }
}

impl Default for SeenNotesFilter {
    fn default() -> Self {
        Self::new(SEEN_FILTER_CAPACITY, SEEN_FILTER_FP_RATE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nostr::{EventBuilder, Keys, Kind};

    fn ids(n: usize) -> Vec<EventId> {
        (0..n)
            .map(|i| EventId::from_byte_array([i as u8 + 1; 32]))
            .collect()
    }

    #[test]
    fn test_insert_and_contains() {
        let mut seen = SeenNotesFilter::default();
        let [a, b] = [EventId::from_byte_array([1; 32]), EventId::from_byte_array([2; 32])];

        assert!(seen.insert(&a));
        assert!(!seen.insert(&a));
        assert!(seen.contains(&a));
        assert!(!seen.contains(&b));
    }

    #[test]
    fn test_old_entries_age_out_after_two_rotations() {
        let mut seen = SeenNotesFilter::new(10, 1e-9);
        let batch = ids(30);

        for id in &batch[..10] {
            seen.insert(id);
        }
        assert_eq!(seen.rotations(), 1);
        // Still held by the previous generation.
        assert!(batch[..10].iter().all(|id| seen.contains(id)));

        for id in &batch[10..20] {
            seen.insert(id);
        }
        assert_eq!(seen.rotations(), 2);
        assert!(batch[10..20].iter().all(|id| seen.contains(id)));
        assert!(batch[..10].iter().all(|id| !seen.contains(id)));
    }

    #[test]
    fn test_clear_starts_over() {
        let mut seen = SeenNotesFilter::new(10, 1e-9);
        let batch = ids(15);
        for id in &batch {
            seen.insert(id);
        }
        assert_eq!(seen.rotations(), 1);

        seen.clear();
        assert_eq!(seen.rotations(), 0);
        assert!(batch.iter().all(|id| !seen.contains(id)));

        // The insert count restarted too, so the next rotation is a full
        // capacity away.
        for id in &batch[..9] {
            seen.insert(id);
        }
        assert_eq!(seen.rotations(), 0);
        seen.insert(&batch[9]);
        assert_eq!(seen.rotations(), 1);
    }

    #[test]
    fn test_retain_unseen() {
        let keys = Keys::generate();
        let notes: Vec<Event> = (0..3)
            .map(|i| {
                EventBuilder::new(Kind::from(1u16), format!("note {}", i))
                    .sign_with_keys(&keys)
                    .unwrap()
            })
            .collect();

        let mut seen = SeenNotesFilter::default();
        seen.insert(&notes[1].id);

        let unseen = seen.retain_unseen(notes.clone());
        assert_eq!(unseen.len(), 2);
        assert!(unseen.iter().all(|e| e.id != notes[1].id));

        seen.clear();
        assert_eq!(seen.retain_unseen(notes).len(), 3);
    }
}
