use crate::error::{Error, Result};
use crate::staircase::{Tiers, MAX_TIER};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::warn;

/// Number of stimulus pools a settings document can refer to
pub const POOL_COUNT: u8 = 10;

/// Items per pool in the default catalog
pub const DEFAULT_POOL_ITEMS: usize = 8;

/// Lateral distance per separation tier, in focus-target units
pub const SIDE_OFFSET: f64 = 0.5;

/// Render scale shed per scale tier
pub const SCALE_STEP: f64 = 0.01;

/// Identifier of a stimulus pool, always in `1..=POOL_COUNT`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct PoolId(u8);

impl PoolId {
    pub fn new(id: u8) -> Option<Self> {
        (1..=POOL_COUNT).contains(&id).then_some(Self(id))
    }

    pub fn get(self) -> u8 {
        self.0
    }

    pub fn all() -> impl Iterator<Item = PoolId> {
        (1..=POOL_COUNT).map(PoolId)
    }
}

impl TryFrom<u8> for PoolId {
    type Error = String;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        PoolId::new(value).ok_or_else(|| format!("pool id {value} outside 1..={POOL_COUNT}"))
    }
}

impl From<PoolId> for u8 {
    fn from(id: PoolId) -> Self {
        id.0
    }
}

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One concrete stimulus: an item inside a pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StimulusId {
    pub pool: PoolId,
    pub item: usize,
}

/// A left/right pair; `matching` is the coin flip, not an equality check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StimulusPair {
    pub left: StimulusId,
    pub right: StimulusId,
    pub matching: bool,
}

/// Where and how large the pair is drawn, relative to the focus target
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub lateral_offset: f64,
    pub scale: f64,
}

impl Placement {
    /// Lower separation tiers sit closer to the focus target; higher scale
    /// tiers render smaller.
    pub fn from_tiers(tiers: Tiers) -> Self {
        Self {
            lateral_offset: f64::from(tiers.separation) * SIDE_OFFSET,
            scale: SCALE_STEP * f64::from(MAX_TIER + 1 - tiers.scale),
        }
    }
}

/// Item counts per pool, supplied by whoever owns the actual assets
#[derive(Debug, Clone, PartialEq)]
pub struct StimulusCatalog {
    pools: BTreeMap<PoolId, usize>,
}

impl StimulusCatalog {
    pub fn empty() -> Self {
        Self {
            pools: BTreeMap::new(),
        }
    }

    pub fn uniform(items_per_pool: usize) -> Self {
        Self {
            pools: PoolId::all().map(|id| (id, items_per_pool)).collect(),
        }
    }

    pub fn with_pool(mut self, pool: PoolId, items: usize) -> Self {
        self.pools.insert(pool, items);
        self
    }

    fn stocked(&self) -> impl Iterator<Item = (PoolId, usize)> + '_ {
        self.pools
            .iter()
            .filter(|(_, items)| **items > 0)
            .map(|(id, items)| (*id, *items))
    }
}

impl Default for StimulusCatalog {
    fn default() -> Self {
        Self::uniform(DEFAULT_POOL_ITEMS)
    }
}

/// Draws same/different pairs from the active pools
#[derive(Debug, Clone)]
pub struct StimulusSelector {
    pools: Vec<(PoolId, usize)>,
}

impl StimulusSelector {
    /// Resolves `active` against the catalog. Pools the catalog cannot serve
    /// are dropped; if nothing is left every stocked pool becomes active.
    pub fn new(catalog: &StimulusCatalog, active: &BTreeSet<PoolId>) -> Result<Self> {
        let mut pools: Vec<(PoolId, usize)> = catalog
            .stocked()
            .filter(|(id, _)| active.contains(id))
            .collect();

        if pools.is_empty() {
            if !active.is_empty() {
                warn!(?active, "no active pool is stocked, falling back to all pools");
            }
            pools = catalog.stocked().collect();
        }

        if pools.is_empty() {
            return Err(Error::EmptyCatalog);
        }

        Ok(Self { pools })
    }

    pub fn active_pools(&self) -> Vec<PoolId> {
        self.pools.iter().map(|(id, _)| *id).collect()
    }

    pub fn draw_pair<R: Rng + ?Sized>(&self, rng: &mut R) -> StimulusPair {
        let (pool, items) = self.pools[rng.gen_range(0..self.pools.len())];
        let right = StimulusId {
            pool,
            item: rng.gen_range(0..items),
        };

        let matching = rng.gen_bool(0.5);
        let left = if matching {
            right
        } else {
            // may land on the same item; still a non-match trial
            StimulusId {
                pool,
                item: rng.gen_range(0..items),
            }
        };

        StimulusPair {
            left,
            right,
            matching,
        }
    }
}
