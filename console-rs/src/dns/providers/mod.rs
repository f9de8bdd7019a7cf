//! Built-in vendor providers

pub mod cloudflare;
pub mod digitalocean;
pub mod gandi;
pub mod hetzner;

pub use cloudflare::Cloudflare;
pub use digitalocean::DigitalOcean;
pub use gandi::Gandi;
pub use hetzner::Hetzner;
