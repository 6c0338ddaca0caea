//! Sandboxed expression language for guard constraints.
//!
//! Constraint `condition_code` is parsed and interpreted here — never
//! handed to a host-language eval. Expressions can read the `state`,
//! `param` and `user` scopes and nothing else: no imports, no attribute
//! escape, no mutation.
//!
//! ```
//! use oag_expr::{compile, Scope};
//! use serde_json::json;
//!
//! let expr = compile("state.status == 'VACANT_CLEAN' and len(param.guest_name) > 0").unwrap();
//! let state = json!({"status": "VACANT_CLEAN"});
//! let param = json!({"guest_name": "A"});
//! let user = json!({});
//! let ok = expr.check(&Scope::new(&state, &param, &user)).unwrap();
//! assert!(ok);
//! ```

pub mod ast;
pub mod error;
pub mod eval;
pub mod parser;

pub use ast::Expr;
pub use error::ExprError;
pub use eval::{evaluate, evaluate_predicate, Scope};
pub use parser::parse_expression;

/// A parsed, reusable predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledExpr {
    source: String,
    expr: Expr,
}

/// Parse `source` once; the result can be checked against many scopes.
pub fn compile(source: &str) -> Result<CompiledExpr, ExprError> {
    let expr = parse_expression(source)?;
    Ok(CompiledExpr {
        source: source.to_string(),
        expr,
    })
}

impl CompiledExpr {
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn check(&self, scope: &Scope<'_>) -> Result<bool, ExprError> {
        evaluate_predicate(&self.expr, scope)
    }
}
