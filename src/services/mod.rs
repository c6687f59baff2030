pub mod applications;
pub mod lifecycle;
pub mod results;
pub mod server;
pub mod slot_store;

pub use applications::ApplicationEngine;
pub use lifecycle::MatchLifecycle;
pub use results::ResultPipeline;
pub use server::ServerService;
pub use slot_store::SlotStore;
