pub mod expressions;
pub mod functions;
pub mod ident;
pub mod rewriter;
pub mod tables;
pub mod tree;

pub use rewriter::{QueryRewriter, RemappedStatements, NOOP_STATEMENT};
