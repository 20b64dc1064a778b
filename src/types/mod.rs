//! Data types for the export pipeline.

mod cell;
mod message;
mod notification;
mod page;
mod workbook;

pub use cell::*;
pub use message::*;
pub use notification::*;
pub use page::*;
pub use workbook::*;
