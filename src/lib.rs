pub mod client;
pub mod codec;
pub mod error;
pub mod invoice_kind;
pub mod model;
pub mod time;
pub mod transport;
pub mod util;
pub mod xml;

#[macro_use]
extern crate log;

pub use client::{BaiwangClient, BaiwangConfig, BaiwangConfigBuilder};
pub use error::{BaiwangResult, Error};
pub use model::{Invoice, InvoiceRequest};
