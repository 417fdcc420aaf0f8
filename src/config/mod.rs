//! Configuration module

mod site;

pub use site::SiteConfig;
pub use site::ApiConfig;
pub use site::GenerateConfig;
pub use site::LabelsConfig;
pub use site::ListingConfig;
pub use site::PathsConfig;
pub use site::ACCESS_TOKEN_ENV;
