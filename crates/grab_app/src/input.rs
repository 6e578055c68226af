use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use grab_core::parse_url_list;

/// Source URLs from `path`. A missing file or one without any URL is fatal.
pub fn read_url_file(path: &Path) -> Result<Vec<String>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("cannot read url file {}", path.display()))?;
    let urls = parse_url_list(&raw);
    if urls.is_empty() {
        bail!("url file {} contains no urls", path.display());
    }
    Ok(urls)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_trimmed_non_empty_lines() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("urls.txt");
        fs::write(
            &path,
            "  https://www.instagram.com/stories/a/\n\n\thttps://www.instagram.com/b/ \n",
        )
        .unwrap();

        assert_eq!(
            read_url_file(&path).unwrap(),
            vec![
                "https://www.instagram.com/stories/a/".to_string(),
                "https://www.instagram.com/b/".to_string(),
            ]
        );
    }

    #[test]
    fn missing_or_blank_file_is_fatal() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("urls.txt");
        assert!(read_url_file(&path).is_err());

        fs::write(&path, "\n   \n").unwrap();
        let err = read_url_file(&path).unwrap_err();
        assert!(err.to_string().contains("no urls"));
    }
}
