//! Domain model (keys, ids, options, outcomes, descriptors, events).

pub mod ids;
pub mod options;
pub mod outcome;
pub mod errors;
pub mod events;
pub mod registration;
pub mod descriptor;

pub use self::ids::{FiringId, Id, IdMarker, RegistrationId, TaskKey};
pub use self::options::TaskOptions;
pub use self::outcome::{Delivery, Outcome, TaskFailure};
pub use self::errors::TaskError;
pub use self::events::DomainEvent;
pub use self::registration::{TaskHandle, TaskRegistration};
pub use self::descriptor::{TaskDescriptor, TaskSnapshot};
