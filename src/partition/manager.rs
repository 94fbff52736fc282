//! Partition manager.
//!
//! Decides which worlds are streamed as another dimension and migrates their
//! caches accordingly. The manager tracks three things:
//!
//! - the world-name → dimension mapping from configuration
//! - every compressor seen so far (one cache exists per compressor)
//! - the worlds currently loaded
//!
//! Whenever one of these changes, the affected worlds are reconciled: for each
//! known compressor, the world's default cache is migrated to its tag.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::cache::CacheDirectory;
use crate::compression::Compressor;
use crate::error::PartitionError;
use crate::world::ChunkSource;

use super::config::PartitionConfig;
use super::tag::PartitionTag;

/// Tracks partition mappings and migrates caches to match them.
pub struct PartitionManager<W: ChunkSource> {
    directory: Arc<CacheDirectory<W>>,
    applicable: Mutex<HashMap<String, PartitionTag>>,
    compressors: Mutex<Vec<Arc<dyn Compressor>>>,
    worlds: Mutex<HashMap<String, Arc<W>>>,
}

impl<W: ChunkSource> PartitionManager<W> {
    pub fn new(directory: Arc<CacheDirectory<W>>) -> Self {
        Self {
            directory,
            applicable: Mutex::new(HashMap::new()),
            compressors: Mutex::new(Vec::new()),
            worlds: Mutex::new(HashMap::new()),
        }
    }

    pub fn directory(&self) -> &Arc<CacheDirectory<W>> {
        &self.directory
    }

    /// Apply every mapping of a parsed configuration.
    ///
    /// Returns the number of migrations performed.
    pub fn apply_config(&self, config: &PartitionConfig) -> Result<usize, PartitionError> {
        let mappings = config.resolve()?;
        Ok(mappings
            .into_iter()
            .map(|(world, tag)| self.apply_to_world(&world, tag))
            .sum())
    }

    /// Stream the world named `name` as dimension `tag`.
    ///
    /// If the world is loaded its caches are migrated now, otherwise when it
    /// loads. Returns the number of migrations performed.
    pub fn apply_to_world(&self, name: &str, tag: PartitionTag) -> usize {
        self.applicable.lock().insert(name.to_string(), tag);
        info!(world = name, partition = %tag, "applied partition to world");

        let world = self.worlds.lock().get(name).cloned();
        match world {
            Some(world) => self.reconcile_world(&world),
            None => 0,
        }
    }

    /// Forget the mapping for `name`. Caches already migrated keep their tag.
    pub fn unapply_from_world(&self, name: &str) -> Option<PartitionTag> {
        self.applicable.lock().remove(name)
    }

    /// Partition configured for a world, if any.
    pub fn partition_for(&self, name: &str) -> Option<PartitionTag> {
        self.applicable.lock().get(name).copied()
    }

    /// Record a compressor and give every applicable world a tagged cache
    /// for it.
    ///
    /// Idempotent by profile: a compressor whose profile is already known is
    /// ignored. Returns the number of migrations performed.
    pub async fn register_compressor(self: &Arc<Self>, compressor: Arc<dyn Compressor>) -> usize {
        {
            let mut compressors = self.compressors.lock();
            let profile = compressor.profile();
            if compressors.iter().any(|c| c.profile() == profile) {
                return 0;
            }
            debug!(%profile, "registered compressor");
            compressors.push(compressor);
        }
        self.reconcile_all().await
    }

    /// Number of known compressors.
    pub fn compressor_count(&self) -> usize {
        self.compressors.lock().len()
    }

    /// Track a loaded world, migrating its caches if it is applicable.
    ///
    /// Returns the number of migrations performed.
    pub fn world_loaded(&self, world: Arc<W>) -> usize {
        self.worlds
            .lock()
            .insert(world.name().to_string(), world.clone());
        self.reconcile_world(&world)
    }

    /// Stop tracking a world and drop its caches.
    ///
    /// Returns the number of caches removed.
    pub fn world_unloaded(&self, name: &str) -> usize {
        match self.worlds.lock().remove(name) {
            Some(world) => self.directory.remove_world(world.id()),
            None => 0,
        }
    }

    /// Release cached payloads under memory pressure.
    ///
    /// Cache instances, their tags and counters survive. Returns the number of
    /// entries dropped.
    pub fn low_memory(&self) -> usize {
        let dropped = self.directory.prune();
        warn!(entries = dropped, "low memory: dropped cached chunk payloads");

        let worlds: Vec<_> = self.worlds.lock().values().cloned().collect();
        for world in &worlds {
            self.reconcile_world(world);
        }
        dropped
    }

    /// Migrate the caches of one world for every known compressor.
    ///
    /// Creates the default cache first when none exists yet. Returns the
    /// number of migrations performed.
    pub fn reconcile_world(&self, world: &Arc<W>) -> usize {
        let Some(tag) = self.partition_for(world.name()) else {
            return 0;
        };
        let compressors: Vec<_> = self.compressors.lock().clone();

        let mut migrated = 0;
        for compressor in compressors {
            let profile = compressor.profile();
            self.directory.instance(world, &compressor);
            match self.directory.migrate(world.id(), &profile, tag) {
                Ok(migration) if migration.performed() => migrated += 1,
                Ok(_) => {}
                Err(e) => warn!(
                    world = world.name(),
                    %profile,
                    error = %e,
                    "partition migration rejected"
                ),
            }
        }
        migrated
    }

    /// Reconcile every loaded world, one scheduled task per world.
    ///
    /// Returns the total number of migrations performed.
    pub async fn reconcile_all(self: &Arc<Self>) -> usize {
        let worlds: Vec<_> = self.worlds.lock().values().cloned().collect();

        let mut tasks = JoinSet::new();
        for world in worlds {
            let manager = Arc::clone(self);
            tasks.spawn(async move { manager.reconcile_world(&world) });
        }

        let mut migrated = 0;
        while let Some(result) = tasks.join_next().await {
            match result {
                Ok(count) => migrated += count,
                Err(e) => warn!(error = %e, "partition reconcile task failed"),
            }
        }
        migrated
    }
}
