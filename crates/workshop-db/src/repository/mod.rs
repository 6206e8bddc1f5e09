//! # Repository Layer
//!
//! One repository per aggregate. Each repository owns the SQL for its
//! tables and the transaction boundaries of its multi-step writes.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  branch     customer    vehicle      - registry                        │
//! │  catalog    inventory                - catalog (+ stock adjustment)    │
//! │  quotation  job_card    invoice      - the document-to-cash flow       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Document repositories cooperate where the money flow crosses documents:
//! quotation conversion inserts a job card, invoice creation updates its
//! source job card, payment recording cascades job card payment state. Each
//! of those units runs inside a single transaction.

pub mod branch;
pub mod catalog;
pub mod customer;
pub mod inventory;
pub mod invoice;
pub mod job_card;
pub mod lines;
pub mod quotation;
pub mod vehicle;
