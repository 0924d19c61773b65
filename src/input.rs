/// Where a piece of source text came from, for error reports.
pub enum Source {
    Literal,
    File(String),
    Repl,
}

pub struct Input {
    pub source: Source,
    pub content: String,
}

impl Input {
    pub fn name(&self) -> &str {
        match &self.source {
            Source::Literal => "<command-line input>",
            Source::File(filename) => filename,
            Source::Repl => "<repl>",
        }
    }
}
