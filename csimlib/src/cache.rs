use std::collections::VecDeque;
use crate::config::CacheGeometry;
use crate::error::SimulationError;

/// A resident cache line. Only the tag and the dirty bit are modelled, never the data itself
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CacheBlock {
    pub tag: u64,
    pub dirty: bool,
}

/// What happened to a set when a new block was inserted into it
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Insertion {
    /// The set had a free way, nothing was removed
    Allocated,
    /// The set was full, and the least recently used block was removed to make room
    Evicted(CacheBlock),
}

/// A single set of an LRU cache
///
/// Blocks are kept in recency order, with the most recently used block at the front and the least
/// recently used at the back. The back is the only block which is ever evicted.
///
/// The ordering is a plain double ended queue of owned blocks rather than a linked list, a hit
/// moves the block with a remove and a push instead of relinking neighbours. For the
/// associativities a simulator deals with the linear scan this implies is no worse than walking
/// a list, which has to happen for the tag search anyway
#[derive(Debug)]
pub struct CacheSet {
    blocks: VecDeque<CacheBlock>,
    capacity: usize,
}

impl CacheSet {
    pub(crate) fn new(capacity: usize) -> Self {
        debug_assert!(capacity > 0);
        Self {
            blocks: VecDeque::new(),
            capacity,
        }
    }

    /// The number of resident blocks, 0 for an empty set
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.blocks.len() == self.capacity
    }

    /// Iterates the resident blocks from most to least recently used
    pub fn iter(&self) -> impl Iterator<Item = &CacheBlock> {
        self.blocks.iter()
    }

    /// The most recently used block
    pub fn mru(&self) -> Option<&CacheBlock> {
        self.blocks.front()
    }

    /// The least recently used block, which is the next eviction victim once the set is full
    pub fn lru(&self) -> Option<&CacheBlock> {
        self.blocks.back()
    }

    pub fn contains(&self, tag: u64) -> bool {
        self.blocks.iter().any(|block| block.tag == tag)
    }

    pub fn dirty_count(&self) -> usize {
        self.blocks.iter().filter(|block| block.dirty).count()
    }

    /// Looks for a block with the given tag, and if there is one, makes it the most recently used
    ///
    /// The block keeps its dirty bit when it is moved. The returned reference lets the caller apply
    /// the side effects of the access, such as a store marking the block dirty
    ///
    /// # Arguments
    ///
    /// * `tag`: The tag of the accessed address
    ///
    /// returns: Some on a hit, None on a miss. A miss leaves the set untouched
    pub fn lookup_and_promote(&mut self, tag: u64) -> Option<&mut CacheBlock> {
        let position = self.blocks.iter().position(|block| block.tag == tag)?;
        // Already at the front on repeated accesses, skip the shuffle
        if position != 0 {
            let block = self.blocks.remove(position)?;
            self.blocks.push_front(block);
        }
        self.blocks.front_mut()
    }

    /// Inserts a new block as the most recently used, evicting the least recently used block when
    /// the set is full
    ///
    /// The caller must have already checked the tag is not resident, see
    /// [`CacheSet::lookup_and_promote`]
    ///
    /// # Arguments
    ///
    /// * `tag`: The tag of the new block
    /// * `dirty`: Whether the block starts dirty, true when the miss was caused by a store
    ///
    /// returns: Result<Insertion, SimulationError>, with the victim if one was evicted
    pub fn insert(&mut self, tag: u64, dirty: bool) -> Result<Insertion, SimulationError> {
        debug_assert!(!self.contains(tag), "tag {tag:#x} is already resident");
        let block = CacheBlock { tag, dirty };
        if self.blocks.len() < self.capacity {
            self.blocks
                .try_reserve(1)
                .map_err(|source| SimulationError::Allocation { what: "cache block", source })?;
            self.blocks.push_front(block);
            return Ok(Insertion::Allocated);
        }
        // Full, and capacity is never 0, so there is always a victim
        let insertion = match self.blocks.pop_back() {
            Some(victim) => Insertion::Evicted(victim),
            None => Insertion::Allocated,
        };
        self.blocks.push_front(block);
        debug_assert!(self.blocks.len() <= self.capacity);
        Ok(insertion)
    }
}

/// A set-associative cache with LRU replacement, write-back, and write-allocate
///
/// The cache only tracks which blocks are resident and whether they are dirty. Deciding what an
/// access does (hit, miss, eviction) and counting the results is the job of the
/// [`Simulator`](crate::simulator::Simulator), the cache provides the address decomposition and
/// the sets to act on
#[derive(Debug)]
pub struct Cache {
    geometry: CacheGeometry,
    sets: Vec<CacheSet>,
    set_selection_bit_mask: u64,
}

impl Cache {
    /// Builds an empty cache, with 2^s sets of E ways each
    ///
    /// Blocks are only allocated as they are brought in, so an empty cache only costs the sets
    ///
    /// returns: Result<Cache, SimulationError>, failing if the sets cannot be allocated
    pub fn new(geometry: CacheGeometry) -> Result<Self, SimulationError> {
        let num_sets = geometry.num_sets();
        let mut sets = Vec::new();
        sets.try_reserve_exact(num_sets)
            .map_err(|source| SimulationError::Allocation { what: "cache sets", source })?;
        sets.extend((0..num_sets).map(|_| CacheSet::new(geometry.associativity())));
        Ok(Self {
            geometry,
            sets,
            set_selection_bit_mask: num_sets as u64 - 1,
        })
    }

    /// Converts an address into a set index and a tag
    ///
    /// The set index is bits [b, b + s) of the address, and the tag is everything above that. The
    /// block offset bits are discarded. Every address is valid
    ///
    /// # Examples
    ///
    /// ```
    /// use csimlib::cache::Cache;
    /// use csimlib::config::CacheGeometry;
    /// let cache = Cache::new(CacheGeometry::new(2, 1, 4).unwrap()).unwrap();
    /// assert_eq!(cache.address_to_set_and_tag(0x1234), (3, 0x48));
    /// ```
    pub fn address_to_set_and_tag(&self, address: u64) -> (usize, u64) {
        let set = (address >> self.geometry.block_bits()) & self.set_selection_bit_mask;
        // s + b may be exactly 64, in which case there are no tag bits left
        let tag = address
            .checked_shr(self.geometry.set_bits() + self.geometry.block_bits())
            .unwrap_or(0);
        (set as usize, tag)
    }

    pub fn geometry(&self) -> &CacheGeometry {
        &self.geometry
    }

    /// The set an address decomposes into, see [`Cache::address_to_set_and_tag`]
    pub(crate) fn set_mut(&mut self, index: usize) -> &mut CacheSet {
        &mut self.sets[index]
    }

    pub fn sets(&self) -> impl Iterator<Item = &CacheSet> {
        self.sets.iter()
    }

    pub fn get_resident_block_count(&self) -> u64 {
        self.sets.iter().map(|set| set.len() as u64).sum()
    }

    pub fn get_dirty_block_count(&self) -> u64 {
        self.sets.iter().map(|set| set.dirty_count() as u64).sum()
    }

    /// The number of bytes held in dirty blocks, which would have to be written back if the cache
    /// were flushed
    pub fn get_dirty_bytes(&self) -> u64 {
        self.get_dirty_block_count().saturating_mul(self.geometry.block_size())
    }

    /// Gets the number of ways which have never held a block. Useful for analysing how much of
    /// the cache a trace touches, or debugging
    pub fn get_unused_way_count(&self) -> u64 {
        let total = (self.sets.len() as u64).saturating_mul(self.geometry.associativity() as u64);
        total - self.get_resident_block_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(set: &CacheSet) -> Vec<u64> {
        set.iter().map(|block| block.tag).collect()
    }

    #[test]
    fn empty_set_has_no_size() {
        let set = CacheSet::new(4);
        assert_eq!(set.len(), 0);
        assert!(set.is_empty());
        assert!(!set.is_full());
        assert_eq!(set.mru(), None);
        assert_eq!(set.lru(), None);
    }

    #[test]
    fn lookup_miss_does_not_mutate() {
        let mut set = CacheSet::new(2);
        set.insert(1, false).unwrap();
        assert!(set.lookup_and_promote(2).is_none());
        assert_eq!(tags(&set), vec![1]);
    }

    #[test]
    fn inserts_at_the_front_until_full() {
        let mut set = CacheSet::new(3);
        for tag in 0..3 {
            assert_eq!(set.insert(tag, false).unwrap(), Insertion::Allocated);
        }
        assert_eq!(tags(&set), vec![2, 1, 0]);
        assert!(set.is_full());
    }

    #[test]
    fn hit_promotes_to_front_and_keeps_dirty_bit() {
        let mut set = CacheSet::new(3);
        set.insert(0, true).unwrap();
        set.insert(1, false).unwrap();
        set.insert(2, false).unwrap();
        let block = set.lookup_and_promote(0).unwrap();
        assert!(block.dirty);
        assert_eq!(tags(&set), vec![0, 2, 1]);
        // Middle of the set
        set.lookup_and_promote(2).unwrap();
        assert_eq!(tags(&set), vec![2, 0, 1]);
        // Already at the front
        set.lookup_and_promote(2).unwrap();
        assert_eq!(tags(&set), vec![2, 0, 1]);
    }

    #[test]
    fn handle_from_lookup_mutates_resident_block() {
        let mut set = CacheSet::new(2);
        set.insert(5, false).unwrap();
        set.lookup_and_promote(5).unwrap().dirty = true;
        assert_eq!(set.dirty_count(), 1);
    }

    #[test]
    fn full_set_evicts_least_recently_used() {
        let mut set = CacheSet::new(2);
        set.insert(0, true).unwrap();
        set.insert(1, false).unwrap();
        // 0 becomes most recent, so 1 is the victim
        set.lookup_and_promote(0).unwrap();
        assert_eq!(set.lru().map(|block| block.tag), Some(1));
        let insertion = set.insert(2, false).unwrap();
        assert_eq!(insertion, Insertion::Evicted(CacheBlock { tag: 1, dirty: false }));
        assert_eq!(tags(&set), vec![2, 0]);
        let insertion = set.insert(3, false).unwrap();
        assert_eq!(insertion, Insertion::Evicted(CacheBlock { tag: 0, dirty: true }));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn direct_mapped_set_always_replaces() {
        let mut set = CacheSet::new(1);
        assert_eq!(set.insert(7, false).unwrap(), Insertion::Allocated);
        for tag in 8..20 {
            assert!(matches!(set.insert(tag, false).unwrap(), Insertion::Evicted(_)));
            assert_eq!(set.len(), 1);
            assert_eq!(set.mru(), set.lru());
        }
    }

    #[test]
    fn decomposes_addresses() {
        let cache = Cache::new(CacheGeometry::new(4, 1, 4).unwrap()).unwrap();
        assert_eq!(cache.address_to_set_and_tag(0), (0, 0));
        assert_eq!(cache.address_to_set_and_tag(0xf), (0, 0));
        assert_eq!(cache.address_to_set_and_tag(0x10), (1, 0));
        assert_eq!(cache.address_to_set_and_tag(0xf0), (15, 0));
        assert_eq!(cache.address_to_set_and_tag(0x100), (0, 1));
        assert_eq!(cache.address_to_set_and_tag(u64::MAX), (15, u64::MAX >> 8));
    }

    #[test]
    fn decomposes_with_no_set_bits() {
        let cache = Cache::new(CacheGeometry::new(0, 2, 0).unwrap()).unwrap();
        assert_eq!(cache.address_to_set_and_tag(0x1234), (0, 0x1234));
    }

    #[test]
    fn decomposes_when_no_tag_bits_remain() {
        let cache = Cache::new(CacheGeometry::new(4, 1, 60).unwrap()).unwrap();
        assert_eq!(cache.address_to_set_and_tag(u64::MAX), (15, 0));
    }

    #[test]
    fn counts_dirty_blocks_across_sets() {
        let mut cache = Cache::new(CacheGeometry::new(1, 2, 3).unwrap()).unwrap();
        cache.set_mut(0).insert(1, true).unwrap();
        cache.set_mut(0).insert(2, false).unwrap();
        cache.set_mut(1).insert(1, true).unwrap();
        assert_eq!(cache.get_resident_block_count(), 3);
        assert_eq!(cache.get_dirty_block_count(), 2);
        assert_eq!(cache.get_dirty_bytes(), 16);
        assert_eq!(cache.get_unused_way_count(), 1);
    }

    #[test]
    fn oversized_cache_fails_to_allocate() {
        let geometry = CacheGeometry::new(62, 1, 0).unwrap();
        assert!(matches!(Cache::new(geometry), Err(SimulationError::Allocation { .. })));
    }
}
