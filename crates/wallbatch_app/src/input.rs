use std::fs;
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Args;

/// Where the raw target text comes from.
#[derive(Debug, Clone, Args)]
pub struct SourceArgs {
    /// Read target text from a file, or `-` for stdin
    #[arg(short, long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Target text: links separated by commas, semicolons, newlines, spaces or `|`
    #[arg(value_name = "TEXT")]
    pub text: Vec<String>,
}

impl SourceArgs {
    /// Positional text and the input file, joined by newlines. Falls back to
    /// piped stdin when neither is given.
    pub fn read_raw(&self) -> Result<String> {
        let stdin = io::stdin();
        let piped = !stdin.is_terminal();
        self.read_raw_from(stdin.lock(), piped)
    }

    fn read_raw_from(&self, mut stdin: impl Read, piped: bool) -> Result<String> {
        let mut parts: Vec<String> = Vec::new();
        if !self.text.is_empty() {
            parts.push(self.text.join(" "));
        }
        match self.input.as_deref() {
            Some(path) if path == Path::new("-") => parts.push(read_all(&mut stdin)?),
            Some(path) => parts.push(
                fs::read_to_string(path)
                    .with_context(|| format!("failed to read targets from {:?}", path))?,
            ),
            None if parts.is_empty() && piped => parts.push(read_all(&mut stdin)?),
            None => {}
        }
        if parts.is_empty() {
            bail!("no target text given; pass links as arguments, --input FILE, or pipe them in");
        }
        Ok(parts.join("\n"))
    }
}

fn read_all(stdin: &mut impl Read) -> Result<String> {
    let mut text = String::new();
    stdin
        .read_to_string(&mut text)
        .context("failed to read targets from stdin")?;
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(input: Option<&Path>, text: &[&str]) -> SourceArgs {
        SourceArgs {
            input: input.map(Path::to_path_buf),
            text: text.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn positional_text_and_file_are_joined() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("links.txt");
        fs::write(&file, "https://vk.com/wall1_2\n").unwrap();

        let raw = args(Some(&file), &["https://vk.com/wall1_1"])
            .read_raw_from(io::empty(), false)
            .unwrap();
        assert_eq!(raw, "https://vk.com/wall1_1\nhttps://vk.com/wall1_2\n");
    }

    #[test]
    fn dash_reads_stdin() {
        let raw = args(Some(Path::new("-")), &[])
            .read_raw_from("https://vk.com/wall1_1".as_bytes(), false)
            .unwrap();
        assert_eq!(raw, "https://vk.com/wall1_1");
    }

    #[test]
    fn piped_stdin_is_the_fallback() {
        let source = args(None, &[]);
        assert_eq!(
            source.read_raw_from("a b".as_bytes(), true).unwrap(),
            "a b"
        );
        assert!(source.read_raw_from("a b".as_bytes(), false).is_err());
    }

    #[test]
    fn missing_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = args(Some(&dir.path().join("absent.txt")), &[])
            .read_raw_from(io::empty(), false)
            .unwrap_err();
        assert!(format!("{err:#}").contains("failed to read targets from"));
    }
}
