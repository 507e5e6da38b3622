//! Inbound event shapes: object-created notifications from the object
//! store and change notifications from the record store's change stream.

pub mod change;
pub mod object;

pub use change::{ChangeBatch, ChangeKind, ChangeNotification, RecordImage, RecordKeys};
pub use object::{ObjectCreatedEvent, ObjectCreatedRecord};
