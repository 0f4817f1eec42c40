/// Payload shapes for outbound broadcast events and the inbound session bus.
pub mod events;
