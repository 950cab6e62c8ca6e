use serde::Deserialize;
use crate::error::ConfigError;

/// The geometry of a set-associative cache
///
/// Constructed through [`CacheGeometry::new`] or deserialised from JSON of the form
/// `{"s": 4, "E": 2, "b": 4}`; both paths go through the same validation, so a geometry which
/// exists is always one a cache can be built from
#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "GeometryConfig")]
pub struct CacheGeometry {
    set_bits: u32,
    associativity: usize,
    block_bits: u32,
}

/// The JSON input format for a geometry, before validation
#[derive(Debug, Deserialize)]
struct GeometryConfig {
    s: u32,
    #[serde(rename = "E", alias = "e")]
    associativity: usize,
    b: u32,
}

impl TryFrom<GeometryConfig> for CacheGeometry {
    type Error = ConfigError;

    fn try_from(value: GeometryConfig) -> Result<Self, Self::Error> {
        CacheGeometry::new(value.s, value.associativity, value.b)
    }
}

impl CacheGeometry {
    /// Validates and creates a geometry
    ///
    /// # Arguments
    ///
    /// * `set_bits`: s, the number of set index bits. The cache has 2^s sets
    /// * `associativity`: E, the number of lines per set
    /// * `block_bits`: b, the number of block offset bits. Each block is 2^b bytes
    ///
    /// returns: Result<CacheGeometry, ConfigError>
    ///
    /// # Examples
    ///
    /// ```
    /// use csimlib::config::CacheGeometry;
    /// let geometry = CacheGeometry::new(4, 2, 4).unwrap();
    /// assert_eq!(geometry.num_sets(), 16);
    /// assert_eq!(geometry.block_size(), 16);
    /// assert!(CacheGeometry::new(4, 0, 4).is_err());
    /// ```
    pub fn new(set_bits: u32, associativity: usize, block_bits: u32) -> Result<Self, ConfigError> {
        if associativity == 0 {
            return Err(ConfigError::ZeroAssociativity);
        }
        if set_bits >= u64::BITS || set_bits >= usize::BITS {
            return Err(ConfigError::TooManySets(set_bits));
        }
        if block_bits >= u64::BITS {
            return Err(ConfigError::BlockTooLarge(block_bits));
        }
        if set_bits + block_bits > u64::BITS {
            return Err(ConfigError::AddressTooNarrow { set_bits, block_bits });
        }
        Ok(Self {
            set_bits,
            associativity,
            block_bits,
        })
    }

    pub fn set_bits(&self) -> u32 {
        self.set_bits
    }

    pub fn associativity(&self) -> usize {
        self.associativity
    }

    pub fn block_bits(&self) -> u32 {
        self.block_bits
    }

    /// S = 2^s
    pub fn num_sets(&self) -> usize {
        1 << self.set_bits
    }

    /// B = 2^b, in bytes
    pub fn block_size(&self) -> u64 {
        1 << self.block_bits
    }
}
