//! Registry of filters the plugin offers to the host.

use crate::error::PluginError;
use crate::filter::{StabilizerFilter, VideoFilter};
use crate::settings::FilterSettings;

type Factory = fn(&FilterSettings) -> Result<Box<dyn VideoFilter>, PluginError>;

struct Registration {
    id: &'static str,
    factory: Factory,
    defaults: fn() -> FilterSettings,
}

fn factory<F: VideoFilter + 'static>(settings: &FilterSettings) -> Result<Box<dyn VideoFilter>, PluginError> {
    Ok(Box::new(F::create(settings)?))
}

/// Filters available by identifier.
pub struct FilterRegistry {
    filters: Vec<Registration>,
}

impl FilterRegistry {
    /// Registry holding every filter this plugin ships.
    pub fn new() -> Self {
        let mut registry = Self { filters: Vec::new() };
        registry.register::<StabilizerFilter>(StabilizerFilter::ID);
        registry
    }

    pub fn register<F: VideoFilter + 'static>(&mut self, id: &'static str) {
        self.filters.retain(|r| r.id != id);
        self.filters.push(Registration {
            id,
            factory: factory::<F>,
            defaults: F::defaults,
        });
    }

    pub fn ids(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.filters.iter().map(|r| r.id)
    }

    pub fn defaults(&self, id: &str) -> Option<FilterSettings> {
        self.find(id).map(|r| (r.defaults)())
    }

    /// Create a filter from host settings JSON.
    pub fn create(&self, id: &str, settings_json: &str) -> Result<Box<dyn VideoFilter>, PluginError> {
        let registration = self.find(id).ok_or_else(|| PluginError::NotFound(id.to_string()))?;
        let settings = FilterSettings::from_json(settings_json)?;
        (registration.factory)(&settings)
    }

    fn find(&self, id: &str) -> Option<&Registration> {
        self.filters.iter().find(|r| r.id == id)
    }
}

impl Default for FilterRegistry {
    fn default() -> Self {
        Self::new()
    }
}
