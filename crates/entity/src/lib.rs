pub mod rsvp;

pub use rsvp::Entity as Rsvp;
