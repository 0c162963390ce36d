//! MDX body rewriting: parse the legacy component vocabulary, map it onto the new one,
//! and write the result back out in a stable form.

mod ast;
mod parse;
mod prose;
mod quiz;
mod rewrite;
mod serialize;

pub use ast::{AttrValue, Attribute, Element, Node};
pub use parse::parse;
pub use rewrite::{rewrite, AssetUse, RewriteContext, Visit};
pub use serialize::serialize;

pub const CRATE_NAME: &str = "campus-markup";
