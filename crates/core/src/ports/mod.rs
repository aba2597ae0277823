mod notifier;
mod price;
mod roster;
mod store;
mod wallet;

pub use notifier::*;
pub use price::*;
pub use roster::*;
pub use store::*;
pub use wallet::*;
