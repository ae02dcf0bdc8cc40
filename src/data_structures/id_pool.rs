//! Reusable integer ids.
//!
//! Instance slots and backend resource tables hand out small dense ids and
//! want freed ids back before minting new ones, so storage stays compact.

/// Tracks which ids are in use and which were released for reuse.
///
/// Released ids are handed out again in LIFO order. When nothing is free a
/// fresh id equal to the current number of used ids is minted, skipping
/// forward if that value was added manually.
#[derive(Debug, Clone)]
pub struct IdPool<T = u32> {
    used: Vec<T>,
    unused: Vec<T>,
}

impl<T> IdPool<T>
where
    T: Copy + PartialEq + From<u32> + std::fmt::Debug,
{
    pub fn new() -> Self {
        Self {
            used: Vec::new(),
            unused: Vec::new(),
        }
    }

    /// Mark `id` as used. Adding an id that is already used does nothing.
    pub fn add(&mut self, id: T) {
        if self.used.contains(&id) {
            return;
        }
        self.unused.retain(|free| *free != id);
        self.used.push(id);
    }

    /// Release `id`. Returns `false` and warns if it was not in use.
    pub fn remove(&mut self, id: T) -> bool {
        match self.used.iter().position(|used| *used == id) {
            Some(index) => {
                self.used.swap_remove(index);
                self.unused.push(id);
                true
            }
            None => {
                log::warn!("releasing id {:?} which is not in use", id);
                false
            }
        }
    }

    /// Hand out an id and mark it used.
    pub fn acquire(&mut self) -> T {
        if let Some(id) = self.unused.pop() {
            self.used.push(id);
            return id;
        }
        let mut candidate = self.used.len() as u32;
        while self.used.contains(&T::from(candidate)) {
            candidate += 1;
        }
        let id = T::from(candidate);
        self.used.push(id);
        id
    }

    pub fn has_unused(&self) -> bool {
        !self.unused.is_empty()
    }

    /// Number of ids currently in use.
    pub fn count(&self) -> usize {
        self.used.len()
    }

    pub fn contains(&self, id: T) -> bool {
        self.used.contains(&id)
    }

    pub fn clear(&mut self) {
        self.used.clear();
        self.unused.clear();
    }
}

impl<T> Default for IdPool<T>
where
    T: Copy + PartialEq + From<u32> + std::fmt::Debug,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::IdPool;

    #[test]
    fn reuses_released_ids_last_in_first_out() {
        let mut pool: IdPool<u32> = IdPool::new();
        assert_eq!(pool.acquire(), 0);
        assert_eq!(pool.acquire(), 1);
        assert_eq!(pool.acquire(), 2);

        assert!(pool.remove(0));
        assert!(pool.remove(2));
        assert!(pool.has_unused());

        assert_eq!(pool.acquire(), 2);
        assert_eq!(pool.acquire(), 0);
        assert!(!pool.has_unused());
        assert_eq!(pool.count(), 3);
    }

    #[test]
    fn acquired_ids_are_marked_used() {
        let mut pool: IdPool<u32> = IdPool::new();
        let first = pool.acquire();
        let second = pool.acquire();
        assert_ne!(first, second);
        assert!(pool.contains(first));
        assert!(pool.contains(second));
    }

    #[test]
    fn minting_skips_manually_added_ids() {
        let mut pool: IdPool<u32> = IdPool::new();
        pool.add(1);
        assert_eq!(pool.acquire(), 2);
        assert_eq!(pool.acquire(), 3);
        assert_eq!(pool.count(), 3);
    }

    #[test]
    fn removing_unknown_id_reports_failure() {
        let mut pool: IdPool<u32> = IdPool::new();
        pool.acquire();
        assert!(!pool.remove(7));
        assert!(pool.remove(0));
        assert!(!pool.remove(0));
        assert_eq!(pool.count(), 0);
    }

    #[test]
    fn releasing_twice_does_not_hand_the_id_out_twice() {
        let mut pool: IdPool<u32> = IdPool::new();
        pool.acquire();
        pool.acquire();
        assert!(pool.remove(1));
        assert!(!pool.remove(1));
        assert!(!pool.remove(9));

        assert_eq!(pool.acquire(), 1);
        assert!(!pool.has_unused());
        assert_eq!(pool.acquire(), 2);
    }

    #[test]
    fn re_adding_a_released_id_takes_it_off_the_free_list() {
        let mut pool: IdPool<u32> = IdPool::new();
        pool.acquire();
        pool.remove(0);
        pool.add(0);
        assert!(!pool.has_unused());
        assert_eq!(pool.acquire(), 1);
    }
}
