// Level-annotated interaction nets for lambda terms. A term is compiled to a net of abstraction,
// application and replicator agents, reduced by local rewrites at active pairs, then read back.

mod cleanup;
mod core;
mod equal;
mod redex;
mod rules;
mod syntax;

pub use self::cleanup::*;
pub use self::core::*;
pub use self::equal::*;
pub use self::redex::*;
pub use self::rules::*;
pub use self::syntax::*;
