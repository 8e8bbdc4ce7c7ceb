use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use crate::context::CallContext;
use crate::proto::memory::Unit;
use crate::proto::{Filter, Laptop, Memory};
use crate::{Error, Result};

/// Concurrent in-memory catalog keyed by laptop id.
///
/// Records cross the store boundary only as owned clones: `save` keeps its own
/// copy and `find`/`search` hand out fresh ones, so no caller ever holds a
/// reference into the map.
#[derive(Clone, Default)]
pub struct LaptopStore {
    laptops: Arc<RwLock<HashMap<String, Laptop>>>,
}

impl LaptopStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a copy of `laptop`.
    ///
    /// Fails with `AlreadyExists` if a laptop with the same id is stored; the
    /// existing record is left untouched.
    pub async fn save(&self, laptop: &Laptop) -> Result<()> {
        let mut laptops = self.laptops.write().await;

        if laptops.contains_key(&laptop.id) {
            return Err(Error::AlreadyExists(format!(
                "laptop '{}' already exists",
                laptop.id
            )));
        }

        laptops.insert(laptop.id.clone(), laptop.clone());
        Ok(())
    }

    /// Returns a copy of the laptop with `id`.
    pub async fn find(&self, id: &str) -> Option<Laptop> {
        let laptops = self.laptops.read().await;
        laptops.get(id).cloned()
    }

    /// Number of stored laptops.
    pub async fn len(&self) -> usize {
        self.laptops.read().await.len()
    }

    /// Returns true if no laptop is stored.
    pub async fn is_empty(&self) -> bool {
        self.laptops.read().await.is_empty()
    }

    /// Passes a copy of every laptop matching `filter` to `found`.
    ///
    /// `ctx` is checked before each candidate; a cancelled or expired call
    /// stops the enumeration. An error returned by `found` also stops it and
    /// is returned as is.
    pub async fn search<F>(&self, ctx: &CallContext, filter: &Filter, mut found: F) -> Result<()>
    where
        F: FnMut(Laptop) -> Result<()>,
    {
        let laptops = self.laptops.read().await;

        for laptop in laptops.values() {
            ctx.check()?;
            debug!(id = %laptop.id, "checking laptop");

            if is_qualified(filter, laptop) {
                found(laptop.clone())?;
            }
        }

        Ok(())
    }
}

/// Returns true if `laptop` satisfies every bound in `filter`.
pub fn is_qualified(filter: &Filter, laptop: &Laptop) -> bool {
    if laptop.price_usd > filter.max_price_usd {
        return false;
    }

    let (cores, min_ghz) = laptop
        .cpu
        .as_ref()
        .map_or((0, 0.0), |cpu| (cpu.number_cores, cpu.min_ghz));

    if cores < filter.min_cpu_cores {
        return false;
    }

    if min_ghz < filter.min_cpu_ghz {
        return false;
    }

    memory_bits(laptop.ram.as_ref()) >= memory_bits(filter.min_ram.as_ref())
}

/// Converts a memory size to bits. Missing memory or an unknown unit is zero.
pub fn memory_bits(memory: Option<&Memory>) -> u64 {
    let Some(memory) = memory else {
        return 0;
    };

    let shift = match memory.unit() {
        Unit::Unknown => return 0,
        Unit::Bit => 0,
        Unit::Byte => 3,
        Unit::Kilobyte => 13,
        Unit::Megabyte => 23,
        Unit::Gigabyte => 33,
        Unit::Terabyte => 43,
    };

    if memory.value.leading_zeros() < shift {
        return u64::MAX;
    }
    memory.value << shift
}
