//! Splits a Markdown file whose leading section is TOML delimited by `+++`
//! fences (`MemoryBlock`/`Skill`) into the parsed frontmatter and the
//! remaining body.

use crate::error::{MemoryError, Result};

pub fn split<'a>(path: &str, raw: &'a str) -> Result<(&'a str, &'a str)> {
    let rest = raw
        .strip_prefix("+++")
        .ok_or_else(|| MemoryError::MissingFrontmatter {
            path: path.to_string(),
        })?;
    let rest = rest.strip_prefix('\n').unwrap_or(rest);

    let end = rest
        .find("\n+++")
        .ok_or_else(|| MemoryError::MissingFrontmatter {
            path: path.to_string(),
        })?;

    let frontmatter = &rest[..end];
    let body = &rest[end + "\n+++".len()..];
    let body = body.strip_prefix('\n').unwrap_or(body);
    Ok((frontmatter, body))
}

pub fn parse<T: serde::de::DeserializeOwned>(path: &str, raw: &str) -> Result<(T, String)> {
    let (frontmatter, body) = split(path, raw)?;
    let parsed: T = toml::from_str(frontmatter).map_err(|source| MemoryError::InvalidFrontmatter {
        path: path.to_string(),
        source,
    })?;
    Ok((parsed, body.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_frontmatter_and_body() {
        let raw = "+++\ndescription = \"hi\"\n+++\nbody text\n";
        let (fm, body) = split("x.md", raw).unwrap();
        assert_eq!(fm, "description = \"hi\"");
        assert_eq!(body, "body text\n");
    }

    #[test]
    fn missing_fence_is_an_error() {
        let raw = "no frontmatter here";
        assert!(split("x.md", raw).is_err());
    }
}
