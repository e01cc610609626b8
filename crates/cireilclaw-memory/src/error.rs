use thiserror::Error;

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is missing its +++ frontmatter delimiters")]
    MissingFrontmatter { path: String },

    #[error("invalid frontmatter in {path}: {source}")]
    InvalidFrontmatter {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

pub type Result<T> = std::result::Result<T, MemoryError>;
