pub mod brush;
pub mod bus;
pub mod config;
pub mod error;
pub mod feed;
pub mod games;
pub mod interaction;
pub mod simulation;
pub mod snapshot;
pub mod stats;
pub mod timeline;
pub mod world;
pub mod world_file;

pub use config::ClientConfig;
pub use error::{EngineError, EngineResult};
pub use games::{Game, GameId, Games};
pub use simulation::{IngestOutcome, Simulation};
pub use timeline::{Round, SimulationState, Timeline};
pub use world::World;
