// Lock-free command channel - hands commands from device threads to the control thread

use crate::messaging::command::{Command, CommandBus};
use ringbuf::traits::{Consumer, Split};
use ringbuf::HeapRb;

pub type CommandProducer = ringbuf::HeapProd<Command>;
pub type CommandConsumer = ringbuf::HeapCons<Command>;

pub fn create_command_channel(capacity: usize) -> (CommandProducer, CommandConsumer) {
    let rb = HeapRb::<Command>::new(capacity);
    rb.split()
}

/// Forward every queued command onto the bus, in arrival order
pub fn drain_into(consumer: &mut CommandConsumer, bus: &CommandBus) -> usize {
    let mut forwarded = 0;
    while let Some(command) = consumer.try_pop() {
        bus.emit(command);
        forwarded += 1;
    }
    forwarded
}
