//! Service layer: request recording and scheduled log maintenance.

pub mod recorder;
pub mod rotation;
