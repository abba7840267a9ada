pub mod app_data;
pub mod app_error;
pub mod controller;
pub mod form;
pub mod image;
pub mod result;
pub mod server;
pub mod services;
pub mod stores;

#[cfg(test)]
mod test_util;

use fresh_connect_mongo as mongo;
use fresh_connect_utils as utils;
