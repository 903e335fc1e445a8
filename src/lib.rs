pub mod compiler;
pub mod lexer;
pub mod parser;
pub mod runtime;
pub mod world;

use tracing::debug;

pub use compiler::{
    bytecode::{Instruction, Program},
    generate,
};
pub use lexer::{scan, scan_spanned, ScanError, Scanner, Span, Token};
pub use parser::{ast::Node, parse, SyntaxError};
pub use runtime::{
    run, run_with,
    value::{self, Value},
    vm::{VmError, VmErrorKind},
    Vars,
};
pub use world::{Iwakura, SearchPath, TemplateSource};

/// Anything that can go wrong rendering a template
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error("syntax error: {0}")]
    Syntax(#[from] SyntaxError),
    #[error("runtime error: {0}")]
    Runtime(#[from] VmError),
    #[error("template `{name}` not found in {searched}")]
    TemplateNotFound { name: Box<str>, searched: String },
    #[error("could not read template `{name}`")]
    Io {
        name: Box<str>,
        #[source]
        source: std::io::Error,
    },
}

pub fn render_text(text: &str) -> Result<String, Error> {
    render_text_with(text, &Vars::new())
}

/// Scan, parse, compile and run `text` with `vars` in the root scope
#[tracing::instrument(level = "debug", skip_all, fields(len = text.len()))]
pub fn render_text_with(text: &str, vars: &Vars) -> Result<String, Error> {
    let tokens = scan(text)?;
    debug!(tokens = tokens.len(), "scanned");
    let root = parse(&tokens)?;
    let program = generate(&root);
    let output = run_with(&program, vars)?;
    debug!(output = output.len(), "rendered");
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::{render_text, Error};
    use assert2::{check, let_assert};

    #[test]
    fn errors_from_each_phase() {
        let_assert!(Err(Error::Scan(_)) = render_text("[% ? %]"));
        let_assert!(Err(Error::Syntax(err)) = render_text("[% 3+ %]"));
        check!(err.position() == 3);
        let_assert!(Err(err @ Error::Runtime(_)) = render_text("[% 1 / 0 %]"));
        check!(err.to_string() == "runtime error: division by zero (at instruction 2)");
    }
}
