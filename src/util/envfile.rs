use anyhow::{Context, Result};
use log::warn;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Parse `KEY=VALUE` lines. Blank lines and `#` comments are skipped, one
/// layer of matching single or double quotes is stripped from values.
pub fn parse_env_str(content: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for (idx, line) in content.lines().enumerate() {
        let s = line.trim();
        if s.is_empty() || s.starts_with('#') {
            continue;
        }
        let Some((key, val)) = s.split_once('=') else {
            warn!("ignoring .env line {} without '=': {}", idx + 1, line);
            continue;
        };
        let key = key.trim().trim_start_matches("export ").trim();
        let val = val.trim();
        let val = if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            &val[1..val.len() - 1]
        } else {
            val
        };
        map.insert(key.to_string(), val.to_string());
    }
    map
}

/// Parse the env file at `path`. A missing file yields an empty map.
pub fn parse_env_file(path: &Path) -> Result<HashMap<String, String>> {
    if !path.exists() {
        return Ok(HashMap::new());
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    Ok(parse_env_str(&content))
}

/// Load `.env` from the current directory into the process environment.
/// Variables that are already set win over the file.
pub fn load_dotenv_if_present() -> Result<usize> {
    let map = parse_env_file(Path::new(".env"))?;
    let mut applied = 0;
    for (k, v) in map {
        if std::env::var_os(&k).is_none() {
            // SAFETY: called from main before any other thread is spawned
            unsafe {
                std::env::set_var(&k, &v);
            }
            applied += 1;
        }
    }
    Ok(applied)
}
