mod collectives;
mod collectives_nb;
mod communicator;
mod handle;
mod typed;

pub use communicator::Communicator;
pub use handle::{CollectiveGroup, CollectiveHandle};
pub use typed::Element;
