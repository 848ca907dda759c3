//! Data models for Visitgate

pub mod card;
pub mod operator;
pub mod visit;
pub mod visitor;

// Re-export commonly used types
pub use card::{IssuedCard, PrintedCard, VisitorCard};
pub use operator::{OperatorClaims, OperatorType};
pub use visit::{CheckedInVisitor, CreateVisit, Visit, VisitDecision, VisitDetails, VisitStatus};
pub use visitor::{Visitor, VisitorSummary};
