use std::fmt;
use std::time::{Duration, Instant};
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use crate::cache::{Cache, Insertion};
use crate::config::CacheGeometry;
use crate::error::SimulationError;
use crate::trace::{AccessEvent, Operation, Trace};

/// The simulator applies accesses to a cache one at a time, classifies them, and collects results.
///
/// It supports calling simulate multiple times, the cache state carries over and the time taken to
/// simulate and the results are updated accordingly
pub struct Simulator {
    cache: Cache,
    result: SimulationResult,
    events_processed: u64,
    simulation_time: Duration,
}

/// The result of a cache simulation. Can be serialised to JSON, or displayed as a one line summary
#[derive(Debug, Default, Copy, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct SimulationResult {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    /// Bytes in blocks which are dirty and still resident at the end of the run
    pub dirty_bytes: u64,
    /// Bytes in dirty blocks which were evicted over the run
    pub dirty_evictions: u64,
}

impl fmt::Display for SimulationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "hits:{} misses:{} evictions:{} dirty_bytes_in_cache:{} dirty_bytes_evicted:{}",
            self.hits, self.misses, self.evictions, self.dirty_bytes, self.dirty_evictions
        )
    }
}

/// How a single access was served
#[derive(Debug, Copy, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub enum AccessOutcome {
    #[serde(rename = "hit")]
    Hit,
    #[serde(rename = "miss")]
    Miss,
    #[serde(rename = "miss eviction")]
    MissEviction,
}

impl AccessOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            AccessOutcome::Hit => "hit",
            AccessOutcome::Miss => "miss",
            AccessOutcome::MissEviction => "miss eviction",
        }
    }
}

impl fmt::Display for AccessOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// An access together with its outcome, displayed as a verbose trace line
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct AccessRecord {
    pub event: AccessEvent,
    pub outcome: AccessOutcome,
}

impl fmt::Display for AccessRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.event, self.outcome)
    }
}

impl Simulator {

    /// Creates a new simulator with an empty cache
    ///
    /// # Arguments
    ///
    /// * `geometry`: The geometry of the cache, usually from the command line or a JSON file
    ///
    /// returns: Result<Simulator, SimulationError>, failing only if the cache can't be allocated
    pub fn new(geometry: CacheGeometry) -> Result<Self, SimulationError> {
        debug!("Building cache with {} sets of {} ways, {} byte blocks", geometry.num_sets(), geometry.associativity(), geometry.block_size());
        Ok(Self {
            cache: Cache::new(geometry)?,
            result: SimulationResult::default(),
            events_processed: 0,
            simulation_time: Duration::new(0, 0),
        })
    }

    /// Applies a single access to the cache
    ///
    /// A hit moves the block to the front of its set, a miss brings the block in, evicting the least
    /// recently used block of the set if it is full. Stores mark the block they touch dirty,
    /// whether they hit or miss
    ///
    /// # Arguments
    ///
    /// * `event`: The access
    ///
    /// returns: Result<AccessOutcome, SimulationError>, internally the result is updated
    pub fn access(&mut self, event: AccessEvent) -> Result<AccessOutcome, SimulationError> {
        let (set_index, tag) = self.cache.address_to_set_and_tag(event.address);
        let is_store = event.operation == Operation::Store;
        let block_size = self.cache.geometry().block_size();
        let set = self.cache.set_mut(set_index);
        let outcome = if let Some(block) = set.lookup_and_promote(tag) {
            // Loads never clean a block
            block.dirty |= is_store;
            self.result.hits += 1;
            AccessOutcome::Hit
        } else {
            // Counted once the block is in, a failed allocation leaves the counters alone
            let insertion = set.insert(tag, is_store)?;
            self.result.misses += 1;
            match insertion {
                Insertion::Allocated => AccessOutcome::Miss,
                Insertion::Evicted(victim) => {
                    self.result.evictions += 1;
                    if victim.dirty {
                        self.result.dirty_evictions = self.result.dirty_evictions.saturating_add(block_size);
                    }
                    AccessOutcome::MissEviction
                }
            }
        };
        self.events_processed += 1;
        trace!("set {set_index} tag {tag:#x}: {event} {outcome}");
        Ok(outcome)
    }

    /// Replays a trace held in memory, see [`Simulator::simulate_with`]
    pub fn simulate(&mut self, bytes: &[u8]) -> Result<&SimulationResult, SimulationError> {
        self.simulate_with(bytes, |_| {})
    }

    /// Replays a trace held in memory, calling `on_access` with the outcome of every access
    ///
    /// The trace is read up to its end or the first malformed line. An access with an unknown
    /// operation stops the simulation before it touches the cache, and no result is produced. The
    /// time spent up to that point still counts towards the execution time
    ///
    /// Note that reads from the byte array are *guaranteed to be sequential*. This means that when
    /// using something like mmap, one can advise the operating system that sequential reads will be
    /// used, which can increase read performance
    ///
    /// # Arguments
    ///
    /// * `bytes`: The trace
    /// * `on_access`: Called after each access is applied, used for verbose output
    ///
    /// returns: Result<&SimulationResult, SimulationError>
    pub fn simulate_with<F>(&mut self, bytes: &[u8], mut on_access: F) -> Result<&SimulationResult, SimulationError>
    where
        F: FnMut(&AccessRecord),
    {
        let start = Instant::now();
        let replayed = self.replay(bytes, &mut on_access);
        let end = Instant::now();
        self.simulation_time += end - start;
        replayed?;
        Ok(self.finish())
    }

    fn replay<F>(&mut self, bytes: &[u8], on_access: &mut F) -> Result<(), SimulationError>
    where
        F: FnMut(&AccessRecord),
    {
        let mut trace = Trace::new(bytes);
        while let Some(event) = trace.next() {
            let event = event.map_err(|e| {
                debug!("Stopping at trace line {}: {e}", trace.line_number());
                e
            })?;
            let outcome = self.access(event)?;
            on_access(&AccessRecord { event, outcome });
        }
        Ok(())
    }

    /// Brings the dirty byte count up to date with the cache, and returns the results so far
    pub fn finish(&mut self) -> &SimulationResult {
        self.result.dirty_bytes = self.cache.get_dirty_bytes();
        &self.result
    }

    /// The number of accesses applied, always equal to hits + misses
    pub fn get_events_processed(&self) -> u64 {
        self.events_processed
    }

    /// Gets the wall-clock execution time for processing
    pub fn get_execution_time(&self) -> &Duration {
        &self.simulation_time
    }

    pub fn get_cache(&self) -> &Cache {
        &self.cache
    }
}
