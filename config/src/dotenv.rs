//! Parse a project `.env` file into a key-value map. Applying it is left to the caller.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

fn dotenv_path(override_dir: Option<&Path>) -> Option<PathBuf> {
    let dir = match override_dir {
        Some(d) => d.to_path_buf(),
        None => std::env::current_dir().ok()?,
    };
    let path = dir.join(".env");
    path.is_file().then_some(path)
}

/// Strips one pair of matching quotes. Double quotes honour `\"` and `\n`; single
/// quotes are literal. Unquoted values lose a trailing ` # comment`.
fn unquote(raw: &str) -> String {
    let raw = raw.trim();
    if raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') {
        return raw[1..raw.len() - 1].replace("\\\"", "\"").replace("\\n", "\n");
    }
    if raw.len() >= 2 && raw.starts_with('\'') && raw.ends_with('\'') {
        return raw[1..raw.len() - 1].to_string();
    }
    match raw.find(" #") {
        Some(i) => raw[..i].trim_end().to_string(),
        None => raw.to_string(),
    }
}

/// One `KEY=VALUE` per line; `export KEY=VALUE` is accepted. Blank lines, `#` comment
/// lines, lines without `=` and empty keys are skipped. Later duplicates win.
fn parse_dotenv(content: &str) -> HashMap<String, String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let line = line.strip_prefix("export ").unwrap_or(line);
            let (key, value) = line.split_once('=')?;
            let key = key.trim();
            (!key.is_empty()).then(|| (key.to_string(), unquote(value)))
        })
        .collect()
}

/// Missing file yields an empty map.
pub fn load_env_map(override_dir: Option<&Path>) -> std::io::Result<HashMap<String, String>> {
    let Some(path) = dotenv_path(override_dir) else {
        return Ok(HashMap::new());
    };
    let content = std::fs::read_to_string(path)?;
    Ok(parse_dotenv(&content))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_pairs_and_skips_noise() {
        let m = parse_dotenv("\n# comment\nFOO=bar\nNOT_A_PAIR\n=orphan\n  BAZ = quux  \n");
        assert_eq!(m.len(), 2);
        assert_eq!(m["FOO"], "bar");
        assert_eq!(m["BAZ"], "quux");
    }

    #[test]
    fn quoting_rules() {
        let m = parse_dotenv(
            "A=\"hello world\"\nB='lit \\n'\nC=\"say \\\"hi\\\"\"\nD=\"\"\nE=\nF=plain # trailing\n",
        );
        assert_eq!(m["A"], "hello world");
        assert_eq!(m["B"], "lit \\n");
        assert_eq!(m["C"], "say \"hi\"");
        assert_eq!(m["D"], "");
        assert_eq!(m["E"], "");
        assert_eq!(m["F"], "plain");
    }

    #[test]
    fn export_prefix_and_duplicates() {
        let m = parse_dotenv("export THOUGHTGRAPH_MAX_DEPTH=5\nTHOUGHTGRAPH_MAX_DEPTH=6\n");
        assert_eq!(m["THOUGHTGRAPH_MAX_DEPTH"], "6");
    }

    #[test]
    fn load_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_env_map(Some(dir.path())).unwrap().is_empty());
        std::fs::write(dir.path().join(".env"), "A=1\nB=2\n").unwrap();
        let m = load_env_map(Some(dir.path())).unwrap();
        assert_eq!(m["A"], "1");
        assert_eq!(m["B"], "2");
    }
}
