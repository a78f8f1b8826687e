//! SteadyFrame Plugin - Host video-filter adapter for the stabilizer.

pub mod error;
pub mod filter;
pub mod host;
pub mod logging;
pub mod properties;
pub mod registry;
pub mod settings;

pub use error::PluginError;
pub use filter::{StabilizerFilter, VideoFilter};
pub use host::{frame_view, pixel_format, HostPlane};
pub use properties::{stabilizer_properties, PropertyDescriptor, PropertyValue};
pub use registry::FilterRegistry;
pub use settings::FilterSettings;
