//! GitCode provider.
//!
//! Endpoint used: `GET {base_api}/repos/{owner}/{repo}/pulls/{n}/files.json`.
//! The response carries per-file line records which are reassembled into
//! unified-diff text with `--- a/` / `+++ b/` headers.

use lazy_static::lazy_static;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::errors::{ProviderError, ProviderResult};
use crate::models::{Diff, DiffFile, DiffSummary};
use crate::providers::parse_pull_url;

lazy_static! {
    static ref PULL_URL: Regex =
        Regex::new(r"^https?://gitcode\.com/[A-Za-z0-9_-]+/[A-Za-z0-9_-]+/pull/[0-9]+").unwrap();
}

#[derive(Debug, Clone)]
pub struct GitcodeClient {
    http: Client,
    base_api: String, // e.g. "https://api.gitcode.com/api/v5"
    token: String,
}

impl GitcodeClient {
    pub fn new(http: Client, base_api: String, token: String) -> Self {
        Self {
            http,
            base_api,
            token,
        }
    }

    pub fn domain(&self) -> &str {
        "gitcode.com"
    }

    pub async fn get_diff(&self, url: &str) -> ProviderResult<Diff> {
        if !PULL_URL.is_match(url) {
            return Err(ProviderError::InvalidUrl(url.to_string()));
        }
        let (owner, repo, number) = parse_pull_url(url)?;

        let endpoint = format!(
            "{}/repos/{owner}/{repo}/pulls/{number}/files.json",
            self.base_api
        );
        debug!("fetching gitcode diff: {endpoint}");

        let resp: FilesResponse = self
            .http
            .get(&endpoint)
            .header("Accept", "application/json")
            .bearer_auth(&self.token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if let Some(code) = resp.code {
            if code != 0 {
                return Err(ProviderError::RemoteReject(code));
            }
        }

        let files = resp.diffs.iter().map(reassemble_file).collect();

        Ok(Diff {
            remote: self.domain().to_string(),
            project: format!("{owner}/{repo}"),
            summary: DiffSummary {
                total_files: resp.count,
                added_lines: resp.added_lines,
                removed_lines: resp.remove_lines,
                base_sha: resp.diff_refs.base_sha,
                head_sha: resp.diff_refs.head_sha,
            },
            files,
        })
    }
}

fn reassemble_file(item: &FileDiff) -> DiffFile {
    let path = &item.statistic.path;
    let old_path = if item.statistic.old_path.is_empty() {
        path
    } else {
        &item.statistic.old_path
    };
    let new_path = if item.statistic.new_path.is_empty() {
        path
    } else {
        &item.statistic.new_path
    };

    let mut lines = vec![
        format!("diff --git a/{old_path} b/{new_path}"),
        format!("--- a/{old_path}"),
        format!("+++ b/{new_path}"),
    ];

    for line in &item.content.text {
        match line.kind.as_str() {
            "match" => lines.push(line.line_content.clone()),
            "new" => lines.push(format!("+{}", line.line_content)),
            "old" => lines.push(format!("-{}", line.line_content)),
            _ => lines.push(format!(" {}", line.line_content)),
        }
    }

    DiffFile {
        path: path.clone(),
        diff: lines.join("\n"),
        added_lines: item.added_lines,
        removed_lines: item.remove_lines,
    }
}

// ===== wire shapes =====

#[derive(Debug, Deserialize)]
struct FilesResponse {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    count: u64,
    #[serde(default)]
    added_lines: u64,
    #[serde(default)]
    remove_lines: u64,
    #[serde(default)]
    diff_refs: DiffRefs,
    #[serde(default)]
    diffs: Vec<FileDiff>,
}

#[derive(Debug, Default, Deserialize)]
struct DiffRefs {
    #[serde(default)]
    base_sha: String,
    #[serde(default)]
    head_sha: String,
}

#[derive(Debug, Deserialize)]
struct FileDiff {
    #[serde(default)]
    statistic: Statistic,
    #[serde(default)]
    content: Content,
    #[serde(default)]
    added_lines: u64,
    #[serde(default)]
    remove_lines: u64,
}

#[derive(Debug, Default, Deserialize)]
struct Statistic {
    #[serde(default)]
    path: String,
    #[serde(default)]
    old_path: String,
    #[serde(default)]
    new_path: String,
}

#[derive(Debug, Default, Deserialize)]
struct Content {
    #[serde(default)]
    text: Vec<Line>,
}

#[derive(Debug, Deserialize)]
struct Line {
    #[serde(default)]
    line_content: String,
    #[serde(default, rename = "type")]
    kind: String,
}
