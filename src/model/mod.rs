pub mod invoice;
pub mod invoice_request;

pub use invoice::Invoice;
pub use invoice_request::InvoiceRequest;
