//! Texture page discovery for `.atlas` files.

use crate::FileHandle;
use crate::names::sort_natural;
use serde::{Deserialize, Serialize};

/// What to do when an atlas names a page that was not provided.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MissingAssetPolicy {
    /// Load with whatever resolved and report the rest.
    #[default]
    Warn,
    Fail,
}

fn is_page_line(line: &str) -> bool {
    let line = line.trim();
    !line.is_empty()
        && !line.contains(char::is_whitespace)
        && line.to_ascii_lowercase().ends_with(".png")
}

/// Texture page file names referenced by an atlas, deduplicated and naturally sorted.
pub fn atlas_page_names(atlas_text: &str) -> Vec<String> {
    let mut pages: Vec<String> = atlas_text
        .lines()
        .filter(|line| is_page_line(line))
        .map(|line| line.trim().to_string())
        .collect();
    sort_natural(&mut pages);
    pages.dedup();
    pages
}

#[derive(Debug)]
pub struct PageResolution<'a, F> {
    /// `(page name, file)` in page order.
    pub resolved: Vec<(String, &'a F)>,
    pub missing: Vec<String>,
}

impl<F> PageResolution<'_, F> {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Matches names against the provided files by exact file name.
pub fn resolve_pages<'a, F: FileHandle>(names: &[String], files: &'a [F]) -> PageResolution<'a, F> {
    let mut resolved = Vec::new();
    let mut missing = Vec::new();
    for name in names {
        match files.iter().find(|f| f.name() == name) {
            Some(file) => resolved.push((name.clone(), file)),
            None => missing.push(name.clone()),
        }
    }
    PageResolution { resolved, missing }
}

/// Prefixes every page line with `{prefix}_`, keeping the rest of the atlas untouched.
pub fn rewrite_page_names(atlas_text: &str, prefix: &str) -> String {
    let mut out = String::with_capacity(atlas_text.len() + prefix.len() * 4);
    for line in atlas_text.split_inclusive('\n') {
        let content = line.trim_end_matches(['\r', '\n']);
        if is_page_line(content) {
            let indent = &content[..content.len() - content.trim_start().len()];
            out.push_str(indent);
            out.push_str(prefix);
            out.push('_');
            out.push_str(content.trim());
            out.push_str(&line[content.len()..]);
        } else {
            out.push_str(line);
        }
    }
    out
}

/// Texture cache key of one page: `{atlas_key}!{atlas_key}_{page}`.
pub fn texture_key(atlas_key: &str, page: &str) -> String {
    format!("{atlas_key}!{atlas_key}_{page}")
}
