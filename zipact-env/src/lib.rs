//! # ZipAct Environments
//!
//! Text environments an agent acts in, one action string at a time.
//!
//! - [`HouseholdSim`]: a deterministic ALFWorld-style kitchen
//! - [`MockShop`]: a scripted WebShop-style storefront
//! - [`RemoteEnv`]: JSON-over-HTTP adapter for the real simulators
//!
//! [`AnyEnv::open`] picks one from an [`EnvSpec`].

pub mod domain;
pub mod environment;
pub mod household;
pub mod shop;
pub mod remote;

pub use domain::Domain;
pub use environment::{AnyEnv, EnvSpec, Environment, Info, Reset, Transition};
pub use household::HouseholdSim;
pub use shop::MockShop;
pub use remote::RemoteEnv;
