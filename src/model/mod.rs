//! # Statistical Models
//!
//! The numerical utilities, reference panel, copying-HMM pass, the two
//! haplotype updaters, the proportion updater and the MCMC engine that
//! drives them.

pub mod hmm;
pub mod mcmc;
pub mod pair;
pub mod panel;
pub mod proportions;
pub mod single;
pub mod stats;

pub use mcmc::{McmcEngine, McmcSettings, McmcTrace};
pub use pair::PairHapSampler;
pub use panel::Panel;
pub use proportions::ProportionSampler;
pub use single::SingleHapSampler;
