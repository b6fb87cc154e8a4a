//! Species template registry.
//!
//! Shared geometry and material for each species are owned by the scene
//! collaborator; it registers an opaque handle pair here once loaded.
//! Scattering a species without a registered template is a generation
//! precondition failure.

use std::collections::HashMap;

use super::species::Species;
use crate::core::{Error, Result};

/// Opaque handle the scene collaborator resolves to a graphics resource.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TemplateHandle(pub u64);

/// Geometry and material shared by every instance of a species.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SpeciesTemplate {
    pub geometry: TemplateHandle,
    pub material: TemplateHandle,
}

#[derive(Clone, Debug, Default)]
pub struct TemplateRegistry {
    templates: HashMap<Species, SpeciesTemplate>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with sequential handles for every species.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        for (i, species) in Species::ALL.into_iter().enumerate() {
            let base = i as u64 * 2;
            registry.register(species, SpeciesTemplate {
                geometry: TemplateHandle(base),
                material: TemplateHandle(base + 1),
            });
        }
        registry
    }

    /// Register or replace the template for a species.
    pub fn register(&mut self, species: Species, template: SpeciesTemplate) -> Option<SpeciesTemplate> {
        self.templates.insert(species, template)
    }

    pub fn unregister(&mut self, species: Species) -> Option<SpeciesTemplate> {
        self.templates.remove(&species)
    }

    pub fn get(&self, species: Species) -> Option<&SpeciesTemplate> {
        self.templates.get(&species)
    }

    /// Template for `species`, or a `GenerationPrecondition` error.
    pub fn require(&self, species: Species) -> Result<SpeciesTemplate> {
        self.templates
            .get(&species)
            .copied()
            .ok_or(Error::GenerationPrecondition { species })
    }

    pub fn is_complete(&self) -> bool {
        Species::ALL.iter().all(|s| self.templates.contains_key(s))
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}
