//! Lookup of material models by identifier.

use std::collections::BTreeMap;
use std::sync::Arc;

use num_complex::Complex64;

use crate::analytic::{ConstantMaterial, DrudeLorentzMaterial};
use crate::provider::{MaterialError, MaterialProvider};
use crate::tabulated::TabulatedMaterial;

/// Map from identifier to shared material model.
#[derive(Clone, Default)]
pub struct MaterialRegistry {
    materials: BTreeMap<String, Arc<dyn MaterialProvider>>,
}

impl MaterialRegistry {
    /// An empty registry.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A registry holding the built-in models:
    /// `vacuum`, `Au_Drude`, `Ag_Drude`, `Au_JC`, `SiO2`, `SiO2_Palik`.
    pub fn with_builtins() -> Result<Self, MaterialError> {
        let mut registry = Self::empty();
        registry.register("vacuum", ConstantMaterial::vacuum());
        registry.register("Au_Drude", DrudeLorentzMaterial::gold());
        registry.register("Ag_Drude", DrudeLorentzMaterial::silver());
        registry.register("Au_JC", TabulatedMaterial::gold_johnson_christy()?);
        registry.register("SiO2", ConstantMaterial::new("SiO₂", Complex64::new(2.13, 0.0)));
        registry.register("SiO2_Palik", TabulatedMaterial::sio2_palik()?);
        Ok(registry)
    }

    /// Add or replace a material.
    pub fn register(&mut self, id: impl Into<String>, material: impl MaterialProvider + 'static) {
        self.materials.insert(id.into(), Arc::new(material));
    }

    pub fn get(&self, id: &str) -> Result<Arc<dyn MaterialProvider>, MaterialError> {
        self.materials
            .get(id)
            .cloned()
            .ok_or_else(|| MaterialError::NotFound(id.to_string()))
    }

    /// Registered identifiers in sorted order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.materials.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for MaterialRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.ids()).finish()
    }
}
