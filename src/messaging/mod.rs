pub mod channels;
pub mod command;

pub use channels::{EngineCommandConsumer, EngineCommandProducer, create_engine_command_channel};
pub use command::EngineCommand;
