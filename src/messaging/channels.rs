// Messaging channels - SPSC rings wiring the input thread, the
// sequencer and its observers together

use crate::messaging::command::Command;
use crate::messaging::notification::Notification;
use ringbuf::{HeapRb, traits::Split};

/// Producer half of the command ring. Held by the MIDI input callback
/// and any control surface feeding the sequencer.
pub type CommandProducer = ringbuf::HeapProd<Command>;

/// Consumer half of the command ring, drained by the sequencer at the
/// start of every `advance()`.
pub type CommandConsumer = ringbuf::HeapCons<Command>;

/// Producer half of the notification ring, written by the sequencer as
/// steps dispatch and errors surface.
pub type NotificationProducer = ringbuf::HeapProd<Notification>;

/// Consumer half of the notification ring, polled by observers. A slow
/// observer loses notifications, never blocks the loop.
pub type NotificationConsumer = ringbuf::HeapCons<Notification>;

pub fn create_command_channel(capacity: usize) -> (CommandProducer, CommandConsumer) {
    HeapRb::new(capacity).split()
}

pub fn create_notification_channel(
    capacity: usize,
) -> (NotificationProducer, NotificationConsumer) {
    HeapRb::new(capacity).split()
}
