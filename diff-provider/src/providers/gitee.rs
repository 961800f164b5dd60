//! Gitee provider.
//!
//! Two calls per pull request: the PR itself for base/head shas, then the
//! file list. File items already carry unified-diff hunks; only the
//! `--- a/` / `+++ b/` headers are prepended.

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
        Regex::new(r"^https?://gitee\.com/[A-Za-z0-9_-]+/[A-Za-z0-9_-]+/pull/[0-9]+").unwrap();
}

#[derive(Debug, Clone)]
pub struct GiteeClient {
    http: Client,
    base_api: String, // e.g. "https://gitee.com/api/v5"
    token: String,
}

impl GiteeClient {
    pub fn new(http: Client, base_api: String, token: String) -> Self {
        Self {
            http,
            base_api,
            token,
        }
    }

    pub fn domain(&self) -> &str {
        "gitee.com"
    }

    pub async fn get_diff(&self, url: &str) -> ProviderResult<Diff> {
        if !PULL_URL.is_match(url) {
            return Err(ProviderError::InvalidUrl(url.to_string()));
        }
        let (owner, repo, number) = parse_pull_url(url)?;

        let meta_endpoint = format!("{}/repos/{owner}/{repo}/pulls/{number}", self.base_api);
        debug!("fetching gitee pull meta: {meta_endpoint}");
        let meta: Pull = self
            .http
            .get(&meta_endpoint)
            .header("Accept", "application/json")
            .bearer_auth(&self.token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let files_endpoint = format!(
            "{}/repos/{owner}/{repo}/pulls/{number}/files.json",
            self.base_api
        );
        debug!("fetching gitee diff: {files_endpoint}");
        let items: Vec<FileItem> = self
            .http
            .get(&files_endpoint)
            .header("Accept", "application/json")
            .bearer_auth(&self.token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let files: Vec<DiffFile> = items.iter().map(reassemble_file).collect();
        let added_lines = files.iter().map(|f| f.added_lines).sum();
        let removed_lines = files.iter().map(|f| f.removed_lines).sum();

        Ok(Diff {
            remote: self.domain().to_string(),
            project: format!("{owner}/{repo}"),
            summary: DiffSummary {
                total_files: files.len() as u64,
                added_lines,
                removed_lines,
                base_sha: meta.base.sha,
                head_sha: meta.head.sha,
            },
            files,
        })
    }
}

fn reassemble_file(item: &FileItem) -> DiffFile {
    let patch = item.patch.clone().unwrap_or_default();
    let path = if patch.new_path.is_empty() {
        patch.old_path.clone()
    } else {
        patch.new_path.clone()
    };
    let old_path = if patch.old_path.is_empty() {
        &path
    } else {
        &patch.old_path
    };

    let mut lines = vec![
        format!("diff --git a/{old_path} b/{path}"),
        format!("--- a/{old_path}"),
        format!("+++ b/{path}"),
    ];
    lines.extend(patch.diff.lines().map(str::to_string));

    DiffFile {
        path,
        diff: lines.join("\n"),
        added_lines: item.additions,
        removed_lines: item.deletions,
    }
}

// ===== wire shapes =====

#[derive(Debug, Deserialize)]
struct Pull {
    #[serde(default)]
    base: PullRef,
    #[serde(default)]
    head: PullRef,
}

#[derive(Debug, Default, Deserialize)]
struct PullRef {
    #[serde(default)]
    sha: String,
}

#[derive(Debug, Deserialize)]
struct FileItem {
    #[serde(default)]
    additions: u64,
    #[serde(default)]
    deletions: u64,
    patch: Option<Patch>,
}

#[derive(Debug, Default, Clone, Deserialize)]
struct Patch {
    #[serde(default)]
    new_path: String,
    #[serde(default)]
    old_path: String,
    #[serde(default)]
    diff: String,
}
