// Communication channels lock-free

use crate::messaging::command::EngineCommand;
use ringbuf::{HeapRb, traits::Split};

pub type EngineCommandProducer = ringbuf::HeapProd<EngineCommand>;
pub type EngineCommandConsumer = ringbuf::HeapCons<EngineCommand>;

pub fn create_engine_command_channel(
    capacity: usize,
) -> (EngineCommandProducer, EngineCommandConsumer) {
    let rb = HeapRb::<EngineCommand>::new(capacity);
    rb.split()
}
