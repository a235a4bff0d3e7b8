pub mod ab;
pub mod abx;
pub mod channel;
pub mod clock;
pub mod config;
pub mod controller;
pub mod error;
pub mod protocol;
pub mod random;
pub mod scheduler;
pub mod simulation;
pub mod stats;
pub mod status;
pub mod sync;
pub mod traits;
pub mod view;
pub mod ws;
