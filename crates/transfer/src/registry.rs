use crate::dispatch::{Strategy, Transfer, present_slots};
use std::any::type_name;
use std::collections::BTreeMap;
use tessera_assets::{Image, Mesh, PropertySet};
use tessera_common::{Error, Result, SourceKind};

/// What the registry knows about one source kind's adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub type_name: &'static str,
    pub strategy: Strategy,
    pub slots: usize,
}

impl Registration {
    fn of<T: Transfer>() -> (SourceKind, Self) {
        (
            T::KIND,
            Self {
                type_name: type_name::<T>(),
                strategy: T::STRATEGY,
                slots: T::SLOTS,
            },
        )
    }
}

/// Source kinds with a validated transfer adapter.
#[derive(Debug, Clone, Default)]
pub struct TransferRegistry {
    entries: BTreeMap<SourceKind, Registration>,
}

impl TransferRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the mesh, image and property set adapters.
    pub fn with_defaults() -> Self {
        let entries = [
            Registration::of::<Mesh>(),
            Registration::of::<Image>(),
            Registration::of::<PropertySet>(),
        ]
        .into_iter()
        .collect();
        Self { entries }
    }

    /// Registering the same type twice is a no-op. A different type for an
    /// already registered kind is rejected.
    pub fn register<T: Transfer>(&mut self) -> Result<()> {
        let name = type_name::<T>();
        if T::SLOTS == 0 {
            return Err(Error::config(format!("`{name}` declares no transfer slots")));
        }
        if let Some(existing) = self.entries.get(&T::KIND) {
            if existing.type_name == name {
                return Ok(());
            }
            return Err(Error::config(format!(
                "{} sources already transfer through `{}`, cannot register `{name}`",
                T::KIND,
                existing.type_name
            )));
        }
        tracing::debug!(kind = %T::KIND, type_name = name, slots = T::SLOTS, "registered transfer");
        let (kind, registration) = Registration::of::<T>();
        self.entries.insert(kind, registration);
        Ok(())
    }

    pub fn get(&self, kind: SourceKind) -> Option<&Registration> {
        self.entries.get(&kind)
    }

    pub fn contains(&self, kind: SourceKind) -> bool {
        self.entries.contains_key(&kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = SourceKind> + '_ {
        self.entries.keys().copied()
    }

    /// Checks that `T` is the adapter registered for its kind and that
    /// every present slot of `source` has a usable descriptor.
    pub fn validate<T: Transfer>(&self, source: &T) -> Result<()> {
        let registered = self.entries.get(&T::KIND).ok_or_else(|| {
            Error::config(format!("no transfer registered for {} sources", T::KIND))
        })?;
        if registered.type_name != type_name::<T>() {
            return Err(Error::TypeMismatch {
                expected: registered.type_name.to_string(),
                found: type_name::<T>().to_string(),
            });
        }
        let mut present = 0;
        for (slot, channel) in present_slots(source) {
            present += 1;
            let d = source.descriptor(slot);
            if d.element_size == 0 {
                return Err(Error::config(format!(
                    "slot {slot} ({channel:?}) has a zero element size"
                )));
            }
            if !d.alignment.is_power_of_two() {
                return Err(Error::config(format!(
                    "slot {slot} ({channel:?}) alignment {} is not a power of two",
                    d.alignment
                )));
            }
        }
        if present == 0 {
            return Err(Error::config(format!("{} source has no data", T::KIND)));
        }
        Ok(())
    }
}
