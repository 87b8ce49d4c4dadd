//! API token resolution.
//!
//! The bearer token is taken from configuration when present, otherwise read
//! from a token file. The file content is trimmed, so a trailing newline left
//! by an editor does not end up in the `Authorization` header.

use camino::Utf8Path;
use cap_std::{ambient_authority, fs_utf8::Dir};
use thiserror::Error;

/// Errors raised while resolving the API token.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum TokenError {
    /// Raised when no inline token is configured and no file path is set.
    #[error("no API token configured: set NUBES_API_TOKEN or NUBES_TOKEN_FILE")]
    Missing,
    /// Raised when the token file holds only whitespace.
    #[error("API token file `{path}` is empty")]
    FileEmpty {
        /// Expanded path of the empty file.
        path: String,
    },
    /// Raised when reading the token file fails.
    #[error("failed to read API token file `{path}`: {message} (set NUBES_API_TOKEN or NUBES_TOKEN_FILE)")]
    FileRead {
        /// Expanded path that failed to read.
        path: String,
        /// Underlying error message.
        message: String,
    },
}

/// Resolves the API token from an inline value or a file.
///
/// A non-blank inline token wins. Otherwise the file at `file` is read, with a
/// leading `~/` expanded to the home directory.
///
/// # Errors
///
/// Returns [`TokenError`] when neither source yields a token.
pub fn resolve_api_token(inline: Option<&str>, file: Option<&str>) -> Result<String, TokenError> {
    if let Some(token) = inline.map(str::trim).filter(|token| !token.is_empty()) {
        return Ok(token.to_owned());
    }

    let Some(path) = file.map(str::trim).filter(|path| !path.is_empty()) else {
        return Err(TokenError::Missing);
    };

    let expanded = expand_tilde(path);
    let content = read_to_string_ambient(&expanded).map_err(|message| TokenError::FileRead {
        path: expanded.clone(),
        message,
    })?;

    let token = content.trim();
    if token.is_empty() {
        return Err(TokenError::FileEmpty { path: expanded });
    }
    Ok(token.to_owned())
}

/// Expands a leading `~/` prefix to the user's home directory.
///
/// If `HOME` is not set the input is returned unchanged.
///
/// ```
/// # use nubes_lifecycle::token::expand_tilde;
/// assert_eq!(expand_tilde("/absolute/path"), "/absolute/path");
/// ```
#[must_use]
pub fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/")
        && let Some(home) = std::env::var_os("HOME")
    {
        return format!("{}/{rest}", home.to_string_lossy());
    }
    path.to_owned()
}

fn read_to_string_ambient(path: &str) -> Result<String, String> {
    let path_buf = Utf8Path::new(path);

    let (dir_path, file_path) = if path_buf.is_absolute() {
        let parent = path_buf
            .parent()
            .ok_or_else(|| format!("path has no parent directory: {path_buf}"))?;
        let file_name = path_buf
            .file_name()
            .ok_or_else(|| format!("path has no file name: {path_buf}"))?;
        (parent, Utf8Path::new(file_name))
    } else {
        (Utf8Path::new("."), path_buf)
    };

    let dir =
        Dir::open_ambient_dir(dir_path, ambient_authority()).map_err(|err| err.to_string())?;
    dir.read_to_string(file_path).map_err(|err| err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inline_token_wins_and_is_trimmed() {
        let token = resolve_api_token(Some("  abc \n"), Some("/nonexistent/token"))
            .unwrap_or_else(|err| panic!("inline token: {err}"));
        assert_eq!(token, "abc");
    }

    #[test]
    fn blank_inline_without_file_is_missing() {
        assert_eq!(resolve_api_token(Some("   "), None), Err(TokenError::Missing));
        assert_eq!(resolve_api_token(None, Some("  ")), Err(TokenError::Missing));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = resolve_api_token(None, Some("/nonexistent-dir/token"))
            .expect_err("file does not exist");
        let TokenError::FileRead { path, .. } = err else {
            panic!("expected FileRead error");
        };
        assert_eq!(path, "/nonexistent-dir/token");
    }
}
