use std::collections::HashMap;

use crate::diagnostics::Diagnostics;
use crate::environment::Environment;
use crate::expr::Stmt;
use crate::scanner::{Token, TokenId};
use crate::walker;

mod returns;
mod symbols;

use returns::Returns;
use symbols::Symbols;

/// Use-site token id -> id of the declaring token. For a `super` keyword
/// the value is the declaration of the class its method lookup starts at.
#[derive(Debug, Default, Clone)]
pub struct Resolutions(HashMap<TokenId, TokenId>);

impl Resolutions {
    pub fn bind(&mut self, use_site: &Token, decl: TokenId) {
        self.0.insert(use_site.id, decl);
    }

    pub fn target(&self, use_site: &Token) -> Option<TokenId> {
        self.0.get(&use_site.id).copied()
    }

    pub fn extend(&mut self, other: Resolutions) {
        self.0.extend(other.0)
    }

    pub fn clear(&mut self) {
        self.0.clear()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Runs the return/dead-code pass, then symbol resolution against a copy of
/// `env`'s globals. Both passes run even when the first reports errors.
pub fn analyze(stmts: &[Stmt], env: &Environment, diagnostics: &mut Diagnostics) -> Resolutions {
    let _span = tracing::debug_span!("analyze", stmts = stmts.len()).entered();

    let mut returns = Returns::default();
    walker::walk(&mut returns, stmts, diagnostics);

    let mut symbols = Symbols::new(env.globals_snapshot());
    walker::walk(&mut symbols, stmts, diagnostics);
    let resolutions = symbols.into_resolutions();

    tracing::debug!(
        resolved = resolutions.len(),
        errors = diagnostics.error_count(),
        warnings = diagnostics.warning_count(),
        "analysis finished"
    );
    resolutions
}
