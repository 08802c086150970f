//! The [`Manager`] is the façade gameplay code talks to. It owns the entity
//! directory, one sparse-set table per registered component type, one asset
//! pool per registered asset type, the ordered system list and the deferred
//! command queue.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, trace, warn};

use crate::asset::{AssetLoader, AssetPool, AssetStore, ErasedAssetStore, Handle};
use crate::component::{Signature, TypeIdentity, TypeRegistry, MAX_COMPONENTS};
use crate::entity::{EntityDirectory, EntityId};
use crate::storage::{ComponentStorage, SparseSet};
use crate::system::{AnySystem, FnSystem, StepDiagnostics, System};
use crate::EcsError;

/// A structural mutation queued to run after the current system finishes.
type Command = Box<dyn FnOnce(&mut Manager)>;

struct AssetEntry {
    id: TypeIdentity,
    store: Box<dyn ErasedAssetStore>,
}

fn downcast_table<T: 'static>(slot: &Option<Box<dyn ComponentStorage>>) -> Option<&SparseSet<T>> {
    slot.as_ref()?.as_any().downcast_ref()
}

fn downcast_table_mut<T: 'static>(
    slot: &mut Option<Box<dyn ComponentStorage>>,
) -> Option<&mut SparseSet<T>> {
    slot.as_mut()?.as_any_mut().downcast_mut()
}

// ---------------------------------------------------------------------------
// Manager
// ---------------------------------------------------------------------------

/// Owner of all entities, component tables, asset pools and systems.
///
/// References handed out by [`add_component`](Self::add_component),
/// [`get_component_mut`](Self::get_component_mut) or [`view_mut`](Self::view_mut)
/// borrow the manager, so no table can be structurally changed while one is
/// held. Systems that need to create or destroy entities while walking a
/// table either collect owners first or [`defer`](Self::defer) the change.
pub struct Manager {
    registry: Arc<TypeRegistry>,
    directory: EntityDirectory,
    /// Indexed by `TypeIdentity::index()`. `None` for identities that are not
    /// registered components (asset types, types of other managers).
    tables: Vec<Option<Box<dyn ComponentStorage>>>,
    /// Rust TypeId -> identity, for registered component types only.
    component_ids: HashMap<TypeId, TypeIdentity>,
    assets: HashMap<TypeId, AssetEntry>,
    systems: Vec<Box<dyn AnySystem>>,
    commands: Vec<Command>,
    step_count: u64,
    last_diagnostics: StepDiagnostics,
}

impl std::fmt::Debug for Manager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Manager")
            .field("entity_count", &self.directory.alive_count())
            .field("component_types", &self.component_ids.len())
            .field(
                "loaded_assets",
                &self.assets.values().map(|a| a.store.len()).sum::<usize>(),
            )
            .field("system_names", &self.system_names())
            .field("step_count", &self.step_count)
            .finish()
    }
}

impl Default for Manager {
    fn default() -> Self {
        Self::new()
    }
}

impl Manager {
    /// Create a manager with its own private [`TypeRegistry`].
    pub fn new() -> Self {
        Self::with_registry(Arc::new(TypeRegistry::new()))
    }

    /// Create a manager that draws type identities from `registry`, e.g.
    /// [`TypeRegistry::global`] to share identities process-wide.
    pub fn with_registry(registry: Arc<TypeRegistry>) -> Self {
        Self {
            registry,
            directory: EntityDirectory::new(),
            tables: Vec::new(),
            component_ids: HashMap::new(),
            assets: HashMap::new(),
            systems: Vec::new(),
            commands: Vec::new(),
            step_count: 0,
            last_diagnostics: StepDiagnostics::default(),
        }
    }

    /// The registry this manager draws identities from.
    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    // -- entities -----------------------------------------------------------

    /// Allocate a new entity with an empty signature.
    pub fn create_entity(&mut self) -> EntityId {
        let entity = self.directory.create();
        trace!(entity = %entity, "entity created");
        entity
    }

    /// Destroy `entity`, removing every component its signature lists.
    ///
    /// The identifier is not reused. Destroying a dead or unknown entity
    /// returns [`EcsError::StaleEntity`] and changes nothing.
    pub fn destroy_entity(&mut self, entity: EntityId) -> Result<(), EcsError> {
        let Some(signature) = self.directory.release(entity) else {
            warn!(entity = %entity, "destroy_entity on a dead or unknown entity");
            return Err(EcsError::StaleEntity { entity });
        };
        for id in signature.iter() {
            if let Some(Some(table)) = self.tables.get_mut(id.index()) {
                table.remove_entity(entity);
            }
        }
        trace!(entity = %entity, components = signature.len(), "entity destroyed");
        Ok(())
    }

    pub fn is_alive(&self, entity: EntityId) -> bool {
        self.directory.is_alive(entity)
    }

    /// The component signature of `entity` (empty once destroyed).
    pub fn signature(&self, entity: EntityId) -> Signature {
        self.directory.signature(entity)
    }

    /// Number of alive entities.
    pub fn entity_count(&self) -> usize {
        self.directory.alive_count()
    }

    /// Alive entities in ascending identifier order.
    pub fn entities(&self) -> Vec<EntityId> {
        self.directory.iter_alive().collect()
    }

    // -- components ---------------------------------------------------------

    /// Register `T` as a component type and create its table.
    ///
    /// Registering an already registered type returns its identity and keeps
    /// the existing table.
    ///
    /// # Panics
    ///
    /// Panics if `T`'s identity does not fit in a [`Signature`].
    pub fn register_component<T: 'static>(&mut self) -> TypeIdentity {
        self.try_register_component::<T>()
            .unwrap_or_else(|e| panic!("{e}"))
    }

    /// Fallible form of [`register_component`](Self::register_component).
    pub fn try_register_component<T: 'static>(&mut self) -> Result<TypeIdentity, EcsError> {
        if let Some(existing) = self.component_id::<T>() {
            return Ok(existing);
        }

        let id = self.registry.identity_of::<T>();
        let name = std::any::type_name::<T>();
        if id.index() >= MAX_COMPONENTS {
            return Err(EcsError::SignatureFull {
                name,
                max: MAX_COMPONENTS,
            });
        }

        if id.index() >= self.tables.len() {
            self.tables.resize_with(id.index() + 1, || None);
        }
        self.tables[id.index()] = Some(Box::new(SparseSet::<T>::new()));
        self.component_ids.insert(TypeId::of::<T>(), id);
        debug!(component = name, id = id.index(), "component registered");
        Ok(id)
    }

    /// Identity of `T` if it is a registered component of this manager.
    pub fn component_id<T: 'static>(&self) -> Option<TypeIdentity> {
        self.component_ids.get(&TypeId::of::<T>()).copied()
    }

    /// Attach `value` to `entity`, overwriting any existing `T`, and return
    /// the stored value.
    ///
    /// # Panics
    ///
    /// Panics if `T` is not registered or `entity` is not alive.
    pub fn add_component<T: 'static>(&mut self, entity: EntityId, value: T) -> &mut T {
        self.try_add_component(entity, value)
            .unwrap_or_else(|e| panic!("{e}"))
    }

    /// Fallible form of [`add_component`](Self::add_component).
    pub fn try_add_component<T: 'static>(
        &mut self,
        entity: EntityId,
        value: T,
    ) -> Result<&mut T, EcsError> {
        let id = self.expect_registered::<T>()?;
        if !self.directory.is_alive(entity) {
            return Err(EcsError::StaleEntity { entity });
        }
        let table = downcast_table_mut::<T>(&mut self.tables[id.index()]).ok_or(
            EcsError::UnregisteredComponent {
                name: std::any::type_name::<T>(),
            },
        )?;
        self.directory.set_bit(entity, id);
        Ok(table.insert(entity, value))
    }

    /// Detach and return `entity`'s `T`. `None` if it had none.
    ///
    /// # Panics
    ///
    /// Panics if `T` is not registered.
    pub fn remove_component<T: 'static>(&mut self, entity: EntityId) -> Option<T> {
        let id = self
            .expect_registered::<T>()
            .unwrap_or_else(|e| panic!("{e}"));
        self.directory.clear_bit(entity, id);
        downcast_table_mut::<T>(&mut self.tables[id.index()])?.remove(entity)
    }

    /// `entity`'s `T`, if its signature says it has one.
    pub fn get_component<T: 'static>(&self, entity: EntityId) -> Option<&T> {
        let id = self.component_id::<T>()?;
        if !self.directory.signature(entity).contains(id) {
            return None;
        }
        downcast_table::<T>(&self.tables[id.index()])?.get(entity)
    }

    pub fn get_component_mut<T: 'static>(&mut self, entity: EntityId) -> Option<&mut T> {
        let id = self.component_id::<T>()?;
        if !self.directory.signature(entity).contains(id) {
            return None;
        }
        downcast_table_mut::<T>(&mut self.tables[id.index()])?.get_mut(entity)
    }

    /// Whether `entity`'s signature lists `T`.
    pub fn has_component<T: 'static>(&self, entity: EntityId) -> bool {
        self.component_id::<T>()
            .is_some_and(|id| self.directory.signature(entity).contains(id))
    }

    /// The table for `T`.
    ///
    /// # Panics
    ///
    /// Panics if `T` is not registered.
    pub fn view<T: 'static>(&self) -> &SparseSet<T> {
        self.try_view::<T>().unwrap_or_else(|e| panic!("{e}"))
    }

    pub fn try_view<T: 'static>(&self) -> Result<&SparseSet<T>, EcsError> {
        let id = self.expect_registered::<T>()?;
        downcast_table::<T>(&self.tables[id.index()]).ok_or(EcsError::UnregisteredComponent {
            name: std::any::type_name::<T>(),
        })
    }

    /// Mutable access to the table for `T`.
    ///
    /// Values can be changed in place, but adding or removing entries must go
    /// through the manager so signatures stay in sync.
    ///
    /// # Panics
    ///
    /// Panics if `T` is not registered.
    pub fn view_mut<T: 'static>(&mut self) -> ValuesMut<'_, T> {
        let id = self
            .expect_registered::<T>()
            .unwrap_or_else(|e| panic!("{e}"));
        let table = downcast_table_mut::<T>(&mut self.tables[id.index()])
            .unwrap_or_else(|| panic!("table for {} missing", std::any::type_name::<T>()));
        ValuesMut { table }
    }

    /// Mutable access to two different tables at once.
    ///
    /// # Panics
    ///
    /// Panics if either type is unregistered or `A` and `B` are the same type.
    pub fn views_mut<A: 'static, B: 'static>(&mut self) -> (ValuesMut<'_, A>, ValuesMut<'_, B>) {
        let a = self
            .expect_registered::<A>()
            .unwrap_or_else(|e| panic!("{e}"));
        let b = self
            .expect_registered::<B>()
            .unwrap_or_else(|e| panic!("{e}"));
        assert_ne!(a, b, "views_mut needs two distinct component types");

        let (low, high) = (a.index().min(b.index()), a.index().max(b.index()));
        let (head, tail) = self.tables.split_at_mut(high);
        let (slot_a, slot_b) = if a.index() == low {
            (&mut head[low], &mut tail[0])
        } else {
            (&mut tail[0], &mut head[low])
        };
        let table_a = downcast_table_mut::<A>(slot_a)
            .unwrap_or_else(|| panic!("table for {} missing", std::any::type_name::<A>()));
        let table_b = downcast_table_mut::<B>(slot_b)
            .unwrap_or_else(|| panic!("table for {} missing", std::any::type_name::<B>()));
        (ValuesMut { table: table_a }, ValuesMut { table: table_b })
    }

    fn expect_registered<T: 'static>(&self) -> Result<TypeIdentity, EcsError> {
        self.component_id::<T>()
            .ok_or(EcsError::UnregisteredComponent {
                name: std::any::type_name::<T>(),
            })
    }

    // -- assets -------------------------------------------------------------

    /// Register `T` as an asset type loaded by `loader`.
    ///
    /// Registering again replaces the loader and starts from an empty pool.
    pub fn register_asset<T, L>(&mut self, loader: L) -> TypeIdentity
    where
        T: 'static,
        L: AssetLoader<T> + 'static,
    {
        let id = self.registry.identity_of::<T>();
        let store: AssetStore<T> = AssetStore::new(Box::new(loader));
        let previous = self.assets.insert(
            TypeId::of::<T>(),
            AssetEntry {
                id,
                store: Box::new(store),
            },
        );
        debug!(
            asset = std::any::type_name::<T>(),
            id = id.index(),
            replaced = previous.is_some(),
            "asset type registered"
        );
        id
    }

    /// Identity of `T` if it is a registered asset type of this manager.
    pub fn asset_id<T: 'static>(&self) -> Option<TypeIdentity> {
        self.assets.get(&TypeId::of::<T>()).map(|entry| entry.id)
    }

    /// Handle for `key`, calling the loader only on a cache miss.
    ///
    /// A failed load is logged and returns [`Handle::invalid`]; nothing is
    /// cached, so a later call tries again.
    ///
    /// # Panics
    ///
    /// Panics if `T` is not a registered asset type.
    pub fn load_asset<T: 'static>(&mut self, key: &str) -> Handle<T> {
        match self.try_load_asset::<T>(key) {
            Ok(handle) => handle,
            Err(e @ EcsError::AssetLoad { .. }) => {
                warn!(key = key, error = %e, "asset load failed");
                Handle::invalid()
            }
            Err(e) => panic!("{e}"),
        }
    }

    /// Fallible form of [`load_asset`](Self::load_asset) that reports why a
    /// load failed.
    pub fn try_load_asset<T: 'static>(&mut self, key: &str) -> Result<Handle<T>, EcsError> {
        let store = self.asset_store_mut::<T>()?;
        store.load(key).map_err(|e| EcsError::AssetLoad {
            key: key.to_owned(),
            details: format!("{e:#}"),
        })
    }

    /// Store an already built asset under `key` without calling the loader.
    /// An empty key stores it uncached.
    ///
    /// # Panics
    ///
    /// Panics if `T` is not a registered asset type.
    pub fn insert_asset<T: 'static>(&mut self, key: &str, value: T) -> Handle<T> {
        let store = self
            .asset_store_mut::<T>()
            .unwrap_or_else(|e| panic!("{e}"));
        store.pool.insert(key, value)
    }

    pub fn get_asset<T: 'static>(&self, handle: Handle<T>) -> Option<&T> {
        self.asset_store::<T>().ok()?.pool.get(handle)
    }

    pub fn get_asset_mut<T: 'static>(&mut self, handle: Handle<T>) -> Option<&mut T> {
        self.asset_store_mut::<T>().ok()?.pool.get_mut(handle)
    }

    /// Unload the asset behind `handle`, invalidating every copy of it.
    pub fn unload_asset<T: 'static>(&mut self, handle: Handle<T>) -> Option<T> {
        self.asset_store_mut::<T>().ok()?.pool.unload(handle)
    }

    /// Cached handle for `key`, if it is still loaded.
    pub fn find_asset<T: 'static>(&self, key: &str) -> Option<Handle<T>> {
        self.asset_store::<T>().ok()?.pool.find(key)
    }

    /// The pool for `T`, for inspection.
    pub fn asset_pool<T: 'static>(&self) -> Option<&AssetPool<T>> {
        self.asset_store::<T>().ok().map(|store| &store.pool)
    }

    /// Unload every asset of type `T`. The loader stays registered.
    pub fn clear_assets<T: 'static>(&mut self) {
        if let Ok(store) = self.asset_store_mut::<T>() {
            store.pool.clear();
        }
    }

    /// Unload every asset of every type.
    pub fn clear_all_assets(&mut self) {
        for entry in self.assets.values_mut() {
            entry.store.clear();
        }
    }

    fn asset_store<T: 'static>(&self) -> Result<&AssetStore<T>, EcsError> {
        self.assets
            .get(&TypeId::of::<T>())
            .and_then(|entry| entry.store.as_any().downcast_ref())
            .ok_or(EcsError::UnregisteredAsset {
                name: std::any::type_name::<T>(),
            })
    }

    fn asset_store_mut<T: 'static>(&mut self) -> Result<&mut AssetStore<T>, EcsError> {
        self.assets
            .get_mut(&TypeId::of::<T>())
            .and_then(|entry| entry.store.as_any_mut().downcast_mut())
            .ok_or(EcsError::UnregisteredAsset {
                name: std::any::type_name::<T>(),
            })
    }

    // -- systems ------------------------------------------------------------

    /// Append `system` to the step order and return it for further setup.
    ///
    /// Systems registered from inside a step first run on the next step.
    pub fn register_system<S: System>(&mut self, system: S) -> &mut S {
        debug!(
            system = System::name(&system),
            order = self.systems.len(),
            "system registered"
        );
        self.systems.push(Box::new(system));
        let Some(last) = self.systems.last_mut() else {
            unreachable!("system list is non-empty after push");
        };
        match last.as_any_mut().downcast_mut::<S>() {
            Some(system) => system,
            None => unreachable!("last system has the type that was just pushed"),
        }
    }

    /// Register a closure as a named system.
    pub fn register_fn_system<F>(&mut self, name: &str, func: F)
    where
        F: FnMut(&mut Manager, f32) + 'static,
    {
        self.register_system(FnSystem::new(name, func));
    }

    /// The first registered system of type `S`.
    ///
    /// Systems are detached while a step runs, so this returns `None` for
    /// every system when called from inside any system's `update`.
    pub fn system<S: System>(&self) -> Option<&S> {
        self.systems
            .iter()
            .find_map(|s| s.as_any().downcast_ref::<S>())
    }

    pub fn system_mut<S: System>(&mut self) -> Option<&mut S> {
        self.systems
            .iter_mut()
            .find_map(|s| s.as_any_mut().downcast_mut::<S>())
    }

    pub fn system_count(&self) -> usize {
        self.systems.len()
    }

    /// The names of all registered systems, in execution order.
    pub fn system_names(&self) -> Vec<&str> {
        self.systems.iter().map(|s| s.name()).collect()
    }

    /// Run every system once, in registration order.
    ///
    /// Commands deferred by a system are applied right after its `update`
    /// returns, before the next system runs.
    pub fn step(&mut self, dt: f32) {
        let step_start = Instant::now();
        let mut running = std::mem::take(&mut self.systems);
        let mut system_times = Vec::with_capacity(running.len());

        for system in running.iter_mut() {
            let sys_start = Instant::now();
            trace!(system = system.name(), "running system");
            system.run(self, dt);
            self.flush_commands();
            system_times.push((system.name().to_owned(), sys_start.elapsed()));
        }

        // Anything registered mid-step landed in the (empty) live list.
        running.append(&mut self.systems);
        self.systems = running;
        self.step_count += 1;
        self.last_diagnostics = StepDiagnostics {
            system_times,
            total_time: step_start.elapsed(),
        };
    }

    /// Number of completed steps.
    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    /// Diagnostics from the last step (timing per system).
    pub fn last_diagnostics(&self) -> &StepDiagnostics {
        &self.last_diagnostics
    }

    // -- deferred commands --------------------------------------------------

    /// Queue a mutation to run once the current system pass is over.
    pub fn defer<F>(&mut self, command: F)
    where
        F: FnOnce(&mut Manager) + 'static,
    {
        self.commands.push(Box::new(command));
    }

    /// Queue `entity` for destruction.
    pub fn defer_destroy(&mut self, entity: EntityId) {
        self.defer(move |manager| {
            // Two passes may queue the same entity; the second is a no-op.
            if let Err(e) = manager.destroy_entity(entity) {
                trace!(error = %e, "deferred destroy skipped");
            }
        });
    }

    /// Number of queued commands.
    pub fn pending_commands(&self) -> usize {
        self.commands.len()
    }

    /// Apply queued commands in FIFO order, including any they queue.
    pub fn flush_commands(&mut self) {
        while !self.commands.is_empty() {
            let batch = std::mem::take(&mut self.commands);
            for command in batch {
                command(self);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// ValuesMut
// ---------------------------------------------------------------------------

/// Mutable view of one table that allows changing values but not adding or
/// removing entries (which would desync signatures).
pub struct ValuesMut<'a, T> {
    table: &'a mut SparseSet<T>,
}

impl<'a, T> ValuesMut<'a, T> {
    pub fn get(&self, entity: EntityId) -> Option<&T> {
        self.table.get(entity)
    }

    pub fn get_mut(&mut self, entity: EntityId) -> Option<&mut T> {
        self.table.get_mut(entity)
    }

    pub fn contains(&self, entity: EntityId) -> bool {
        self.table.contains(entity)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn owners(&self) -> &[EntityId] {
        self.table.owners()
    }

    pub fn values(&self) -> &[T] {
        self.table.values()
    }

    pub fn values_mut(&mut self) -> &mut [T] {
        self.table.values_mut()
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &T)> {
        self.table.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (EntityId, &mut T)> {
        self.table.iter_mut()
    }

    /// Read-only access to the whole table.
    pub fn as_table(&self) -> &SparseSet<T> {
        &*self.table
    }
}
