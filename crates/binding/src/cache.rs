use crate::bindable::{Bindable, BoundAsset};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::rc::Rc;
use tessera_assets::SourceStore;
use tessera_common::{AssetKind, Error, Result, SourceId, SourceKind};
use tessera_gpu::{Device, Shared, shared};
use tessera_transfer::TransferRegistry;

/// Binding cache configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Prepended to every driver object label the cache creates.
    pub label_prefix: String,
}

/// Running counters for instrumentation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub binds: u64,
    pub hits: u64,
    pub misses: u64,
    /// Transfers issued by initial binds and refreshes.
    pub uploads: u64,
    /// Refreshes that found the source unchanged.
    pub skipped: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        if self.binds == 0 {
            0.0
        } else {
            self.hits as f64 / self.binds as f64
        }
    }
}

type Key = (SourceId, AssetKind);

/// Type-erased refresh, monomorphized per source type at bind time.
type RefreshFn = fn(&mut SourceStore, SourceId, &BoundAsset) -> Result<Option<usize>>;

struct Entry {
    source_kind: SourceKind,
    asset: BoundAsset,
    refresh: RefreshFn,
}

fn refresh_entry<S: Bindable>(sources: &mut SourceStore, id: SourceId, bound: &BoundAsset) -> Result<Option<usize>> {
    let asset = S::from_bound(bound).ok_or_else(|| Error::TypeMismatch {
        expected: S::ASSET.to_string(),
        found: bound.kind().to_string(),
    })?;
    let source = sources.get_mut::<S>(id)?;
    if !source.needs_refresh() {
        return Ok(None);
    }
    let uploads = source.upload(&mut asset.borrow_mut())?;
    source.mark_refreshed();
    Ok(Some(uploads))
}

/// One GPU asset per (source, asset kind), created on first bind.
///
/// Entries live until [`evict`](Self::evict) or
/// [`purge_stale`](Self::purge_stale) removes them; the cache never drops
/// an entry on its own.
pub struct BindingCache {
    config: CacheConfig,
    registry: TransferRegistry,
    entries: BTreeMap<Key, Entry>,
    stats: CacheStats,
}

impl Default for BindingCache {
    fn default() -> Self {
        Self::new(TransferRegistry::with_defaults(), CacheConfig::default())
    }
}

impl BindingCache {
    pub fn new(registry: TransferRegistry, config: CacheConfig) -> Self {
        Self {
            config,
            registry,
            entries: BTreeMap::new(),
            stats: CacheStats::default(),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn registry(&self) -> &TransferRegistry {
        &self.registry
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: SourceId) -> bool {
        self.entries.keys().any(|(entry_id, _)| *entry_id == id)
    }

    /// The asset bound for `id`, if any. Never materializes.
    pub fn get<S: Bindable>(&self, id: SourceId) -> Option<Shared<S::Asset>> {
        self.entries
            .get(&(id, S::ASSET))
            .and_then(|entry| S::from_bound(&entry.asset))
            .map(Rc::clone)
    }

    /// Returns the asset for `id`, creating and filling it on first use.
    /// Later calls return the same shared asset untouched.
    pub fn bind<S: Bindable>(
        &mut self,
        device: &mut dyn Device,
        sources: &mut SourceStore,
        id: SourceId,
    ) -> Result<Shared<S::Asset>> {
        self.stats.binds += 1;
        let found = sources.kind(id).ok_or(Error::UnknownSource(id))?;
        if found != S::KIND {
            return Err(Error::kind_mismatch(S::KIND, found));
        }

        if let Some(entry) = self.entries.get(&(id, S::ASSET)) {
            if entry.source_kind != S::KIND {
                return Err(Error::kind_mismatch(S::KIND, entry.source_kind));
            }
            let asset = S::from_bound(&entry.asset).ok_or_else(|| Error::TypeMismatch {
                expected: S::ASSET.to_string(),
                found: entry.asset.kind().to_string(),
            })?;
            self.stats.hits += 1;
            tracing::trace!(%id, asset = %S::ASSET, "binding cache hit");
            return Ok(Rc::clone(asset));
        }

        self.stats.misses += 1;
        let source = sources.get_mut::<S>(id)?;
        source.validate(&self.registry)?;
        let label = format!("{}{}/{id}", self.config.label_prefix, S::KIND);
        let mut asset = source.allocate(device, &label)?;
        let uploads = source.upload(&mut asset)?;
        source.mark_refreshed();
        self.stats.uploads += uploads as u64;

        let asset = shared(asset);
        self.entries.insert(
            (id, S::ASSET),
            Entry {
                source_kind: S::KIND,
                asset: S::into_bound(Rc::clone(&asset)),
                refresh: refresh_entry::<S>,
            },
        );
        tracing::debug!(%id, %label, asset = %S::ASSET, uploads, "bound source");
        Ok(asset)
    }

    /// Re-uploads a bound source if it changed. Returns whether it did.
    pub fn refresh<S: Bindable>(&mut self, sources: &mut SourceStore, id: SourceId) -> Result<bool> {
        let found = sources.kind(id).ok_or(Error::UnknownSource(id))?;
        if found != S::KIND {
            return Err(Error::kind_mismatch(S::KIND, found));
        }
        let entry = self
            .entries
            .get(&(id, S::ASSET))
            .ok_or_else(|| Error::config(format!("{} source {id} is not bound", S::KIND)))?;
        let outcome = refresh_entry::<S>(sources, id, &entry.asset)?;
        Ok(self.record_refresh(id, outcome))
    }

    /// Refreshes every entry whose source is still live. Returns the number
    /// of entries that uploaded.
    pub fn refresh_all(&mut self, sources: &mut SourceStore) -> Result<usize> {
        let mut refreshed = 0;
        let keys: Vec<Key> = self.entries.keys().copied().collect();
        for key in keys {
            let (id, _) = key;
            if !sources.contains(id) {
                tracing::trace!(%id, "skipping stale binding");
                continue;
            }
            let Some(entry) = self.entries.get(&key) else {
                continue;
            };
            let outcome = (entry.refresh)(sources, id, &entry.asset)?;
            if self.record_refresh(id, outcome) {
                refreshed += 1;
            }
        }
        Ok(refreshed)
    }

    fn record_refresh(&mut self, id: SourceId, outcome: Option<usize>) -> bool {
        match outcome {
            Some(uploads) => {
                self.stats.uploads += uploads as u64;
                tracing::debug!(%id, uploads, "refreshed binding");
                true
            }
            None => {
                self.stats.skipped += 1;
                tracing::trace!(%id, "binding up to date");
                false
            }
        }
    }

    /// Drops every entry for `id`. Returns how many were removed.
    pub fn evict(&mut self, id: SourceId) -> usize {
        let before = self.entries.len();
        self.entries.retain(|(entry_id, _), _| *entry_id != id);
        let removed = before - self.entries.len();
        if removed > 0 {
            tracing::debug!(%id, removed, "evicted bindings");
        }
        removed
    }

    /// Drops entries whose source is no longer in `sources`.
    pub fn purge_stale(&mut self, sources: &SourceStore) -> usize {
        let before = self.entries.len();
        self.entries.retain(|(id, _), _| sources.contains(*id));
        let removed = before - self.entries.len();
        if removed > 0 {
            tracing::debug!(removed, "purged stale bindings");
        }
        removed
    }
}

impl std::fmt::Debug for BindingCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BindingCache")
            .field("entries", &self.entries.len())
            .field("stats", &self.stats)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Vec3, Vec4};
    use tessera_assets::{Image, Mesh, PropertySet, ShaderProgram, TargetDesc};
    use tessera_gpu::HeadlessDevice;
    use tessera_gpu::headless::{FailPoint, Op};
    use tessera_layout::LayoutBuilder;

    fn setup() -> (HeadlessDevice, SourceStore, BindingCache) {
        (HeadlessDevice::new(), SourceStore::new(), BindingCache::default())
    }

    fn tint_block() -> PropertySet {
        let layout = LayoutBuilder::new().field::<Vec4>("tint").build().unwrap();
        PropertySet::new(layout)
    }

    #[test]
    fn bind_returns_the_same_asset() {
        let (mut device, mut sources, mut cache) = setup();
        let id = sources.insert(Mesh::quad());

        let a = cache.bind::<Mesh>(&mut device, &mut sources, id).unwrap();
        let b = cache.bind::<Mesh>(&mut device, &mut sources, id).unwrap();
        assert!(Rc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);

        let stats = cache.stats();
        assert_eq!((stats.binds, stats.hits, stats.misses), (2, 1, 1));
        // position, normal, tex_coord, index
        assert_eq!(stats.uploads, 4);
    }

    #[test]
    fn equal_sources_get_distinct_entries() {
        let (mut device, mut sources, mut cache) = setup();
        let a = sources.insert(Mesh::quad());
        let b = sources.insert(Mesh::quad());
        let first = cache.bind::<Mesh>(&mut device, &mut sources, a).unwrap();
        let second = cache.bind::<Mesh>(&mut device, &mut sources, b).unwrap();
        assert!(!Rc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn mesh_binds_one_buffer_per_channel() {
        let (mut device, mut sources, mut cache) = setup();
        let id = sources.insert(Mesh::quad());
        let attributes = cache.bind::<Mesh>(&mut device, &mut sources, id).unwrap();
        let attributes = attributes.borrow();
        let locations: Vec<u32> = attributes.streams().iter().map(|s| s.location).collect();
        assert_eq!(locations, vec![0, 1, 2]);
        assert_eq!(attributes.vertex_count(), 4);
        assert_eq!(attributes.index_count(), 6);
        assert_eq!(
            attributes.index().map(|(_, format)| format),
            Some(tessera_gpu::IndexFormat::U16)
        );
    }

    #[test]
    fn second_refresh_copies_nothing() {
        let (mut device, mut sources, mut cache) = setup();
        let id = sources.insert(tint_block());
        cache.bind::<PropertySet>(&mut device, &mut sources, id).unwrap();

        sources
            .get_mut::<PropertySet>(id)
            .unwrap()
            .set("tint", Vec4::ONE)
            .unwrap();
        let journal = device.journal();
        journal.borrow_mut().clear();

        assert!(cache.refresh::<PropertySet>(&mut sources, id).unwrap());
        assert_eq!(journal.borrow().uploads(), 1);
        assert!(!cache.refresh::<PropertySet>(&mut sources, id).unwrap());
        assert_eq!(journal.borrow().uploads(), 1);
        assert_eq!(cache.stats().skipped, 1);
    }

    #[test]
    fn refresh_after_several_edits_uploads_once() {
        let (mut device, mut sources, mut cache) = setup();
        let id = sources.insert(Image::filled(2, 2, [0; 4]));
        cache.bind::<Image>(&mut device, &mut sources, id).unwrap();
        let image = sources.get_mut::<Image>(id).unwrap();
        image.set_texel(0, 0, [1, 2, 3, 4]).unwrap();
        image.set_texel(1, 1, [5, 6, 7, 8]).unwrap();

        let journal = device.journal();
        journal.borrow_mut().clear();
        assert_eq!(cache.refresh_all(&mut sources).unwrap(), 1);
        assert_eq!(journal.borrow().uploads(), 1);
        let expected = sources.get::<Image>(id).unwrap().bytes().to_vec();
        assert_eq!(journal.borrow().last_upload("image/0v0"), Some(&expected[..]));
    }

    #[test]
    fn kind_mismatch_is_a_type_error() {
        let (mut device, mut sources, mut cache) = setup();
        let id = sources.insert(Mesh::quad());
        assert!(matches!(
            cache.bind::<Image>(&mut device, &mut sources, id),
            Err(Error::TypeMismatch { .. })
        ));
        assert!(cache.is_empty());
    }

    #[test]
    fn removed_sources_are_unknown() {
        let (mut device, mut sources, mut cache) = setup();
        let id = sources.insert(Mesh::quad());
        sources.remove(id);
        assert!(matches!(
            cache.bind::<Mesh>(&mut device, &mut sources, id),
            Err(Error::UnknownSource(_))
        ));
    }

    #[test]
    fn empty_sources_fail_on_first_bind() {
        let (mut device, mut sources, mut cache) = setup();
        let id = sources.insert(Mesh::default());
        assert!(matches!(
            cache.bind::<Mesh>(&mut device, &mut sources, id),
            Err(Error::Configuration(_))
        ));
        let id = sources.insert(ShaderProgram::new("blank", "", "void main() {}"));
        assert!(matches!(
            cache.bind::<ShaderProgram>(&mut device, &mut sources, id),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn unregistered_kinds_are_refused() {
        let mut device = HeadlessDevice::new();
        let mut sources = SourceStore::new();
        let mut cache = BindingCache::new(TransferRegistry::new(), CacheConfig::default());
        let id = sources.insert(Mesh::quad());
        assert!(matches!(
            cache.bind::<Mesh>(&mut device, &mut sources, id),
            Err(Error::Configuration(msg)) if msg.contains("no transfer registered")
        ));
    }

    #[test]
    fn evict_then_rebind_creates_a_fresh_entry() {
        let (mut device, mut sources, mut cache) = setup();
        let id = sources.insert(Mesh::quad());
        let first = cache.bind::<Mesh>(&mut device, &mut sources, id).unwrap();
        assert_eq!(cache.evict(id), 1);
        assert!(!cache.contains(id));
        let second = cache.bind::<Mesh>(&mut device, &mut sources, id).unwrap();
        assert!(!Rc::ptr_eq(&first, &second));
    }

    #[test]
    fn purge_drops_only_stale_entries() {
        let (mut device, mut sources, mut cache) = setup();
        let kept = sources.insert(Mesh::quad());
        let gone = sources.insert(Image::filled(1, 1, [0; 4]));
        cache.bind::<Mesh>(&mut device, &mut sources, kept).unwrap();
        cache.bind::<Image>(&mut device, &mut sources, gone).unwrap();
        sources.remove(gone);

        assert_eq!(cache.refresh_all(&mut sources).unwrap(), 0);
        assert_eq!(cache.purge_stale(&sources), 1);
        assert!(cache.contains(kept));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn changed_shader_recompiles() {
        let (mut device, mut sources, mut cache) = setup();
        let id = sources.insert(ShaderProgram::new("flat", "vs", "fs"));
        cache.bind::<ShaderProgram>(&mut device, &mut sources, id).unwrap();
        sources
            .get_mut::<ShaderProgram>(id)
            .unwrap()
            .set_sources("vs2", "fs2");
        assert!(cache.refresh::<ShaderProgram>(&mut sources, id).unwrap());
        let journal = device.journal();
        assert_eq!(journal.borrow().count(|op| matches!(op, Op::Compile { .. })), 2);
    }

    #[test]
    fn resized_target_is_rejected() {
        let (mut device, mut sources, mut cache) = setup();
        let id = sources.insert(TargetDesc::new("main", 64, 64));
        cache.bind::<TargetDesc>(&mut device, &mut sources, id).unwrap();
        sources.get_mut::<TargetDesc>(id).unwrap().resize(32, 32);
        assert!(matches!(
            cache.refresh::<TargetDesc>(&mut sources, id),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn grown_mesh_cannot_reuse_its_buffers() {
        let (mut device, mut sources, mut cache) = setup();
        let id = sources.insert(Mesh::new(vec![Vec3::ZERO; 3]));
        cache.bind::<Mesh>(&mut device, &mut sources, id).unwrap();
        let grown = sources.get_mut::<Mesh>(id).unwrap();
        *grown = Mesh::new(vec![Vec3::ZERO; 6]);
        assert!(matches!(
            cache.refresh::<Mesh>(&mut sources, id),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn cleared_channels_cannot_keep_stale_buffers() {
        let (mut device, mut sources, mut cache) = setup();
        let mut quad = Mesh::quad();
        quad.set_colors(vec![Vec4::ONE; 4]).unwrap();
        let id = sources.insert(quad);
        let attributes = cache.bind::<Mesh>(&mut device, &mut sources, id).unwrap();
        assert_eq!(attributes.borrow().streams().len(), 4);

        sources.get_mut::<Mesh>(id).unwrap().set_colors(Vec::new()).unwrap();
        let journal = device.journal();
        journal.borrow_mut().clear();
        let Err(Error::Configuration(message)) = cache.refresh::<Mesh>(&mut sources, id) else {
            panic!("expected a configuration error");
        };
        assert!(message.contains("color"));
        assert_eq!(journal.borrow().uploads(), 0);

        let id = sources.insert(Mesh::quad());
        cache.bind::<Mesh>(&mut device, &mut sources, id).unwrap();
        sources.get_mut::<Mesh>(id).unwrap().set_indices(Vec::new()).unwrap();
        assert!(matches!(
            cache.refresh::<Mesh>(&mut sources, id),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn reordered_indices_refresh_in_place() {
        let (mut device, mut sources, mut cache) = setup();
        let id = sources.insert(Mesh::quad());
        cache.bind::<Mesh>(&mut device, &mut sources, id).unwrap();

        sources
            .get_mut::<Mesh>(id)
            .unwrap()
            .set_indices(vec![0, 2, 1, 0, 3, 2])
            .unwrap();
        assert!(cache.refresh::<Mesh>(&mut sources, id).unwrap());

        sources
            .get_mut::<Mesh>(id)
            .unwrap()
            .set_indices(vec![0, 1, 2])
            .unwrap();
        assert!(matches!(
            cache.refresh::<Mesh>(&mut sources, id),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn driver_failures_surface_on_bind() {
        let (mut device, mut sources, mut cache) = setup();
        let id = sources.insert(Image::filled(1, 1, [0; 4]));
        device.fail_next(FailPoint::Create);
        assert!(matches!(
            cache.bind::<Image>(&mut device, &mut sources, id),
            Err(Error::Driver(_))
        ));
        assert!(cache.is_empty());
    }

    #[test]
    fn label_prefix_applies() {
        let mut device = HeadlessDevice::new();
        let mut sources = SourceStore::new();
        let config: CacheConfig = serde_json::from_str(r#"{"label_prefix": "scene:"}"#).unwrap();
        let mut cache = BindingCache::new(TransferRegistry::with_defaults(), config);
        let id = sources.insert(Image::filled(1, 1, [7; 4]));
        cache.bind::<Image>(&mut device, &mut sources, id).unwrap();
        assert_eq!(
            device.journal().borrow().last_upload("scene:image/0v0"),
            Some(&[7u8; 4][..])
        );
    }
}
