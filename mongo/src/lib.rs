pub mod context;
pub mod test_util;
pub mod withid;

pub use mongodm;
pub use mongodm::{bson, mongo as mongodb};
use fresh_connect_utils as utils;
