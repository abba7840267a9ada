pub mod user;

pub use user::{UserOutput, UserService};
