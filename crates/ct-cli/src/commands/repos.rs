//! Repos command for listing repositories visible to the GitHub token.

use std::io::Write;

use anyhow::{Context, Result};
use ct_github::RemoteRepository;

use super::util::{format_timestamp, github_client, runtime};
use crate::Config;

pub fn run<W: Write>(writer: &mut W, config: &Config, json: bool) -> Result<()> {
    let client = github_client(config)?;
    let repositories = runtime()?
        .block_on(client.list_repositories())
        .context("failed to list repositories")?;
    render(writer, &repositories, json)
}

fn render<W: Write>(writer: &mut W, repositories: &[RemoteRepository], json: bool) -> Result<()> {
    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(repositories)?)?;
        return Ok(());
    }

    if repositories.is_empty() {
        writeln!(writer, "No repositories found.")?;
        return Ok(());
    }

    for repo in repositories {
        let visibility = if repo.private { "private" } else { "public" };
        let language = repo.language.as_deref().unwrap_or("-");
        let updated = repo
            .updated_at
            .map_or_else(|| "-".to_string(), format_timestamp);
        writeln!(
            writer,
            "{}  [{visibility}]  {language}  updated {updated}",
            repo.full_name
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::{DateTime, Utc};

    use insta::assert_snapshot;

    fn repository(full_name: &str, private: bool, language: Option<&str>) -> RemoteRepository {
        RemoteRepository {
            id: 1,
            full_name: full_name.to_string(),
            description: None,
            private,
            language: language.map(ToString::to_string),
            stargazers_count: 3,
            updated_at: Some(
                DateTime::parse_from_rfc3339("2025-02-01T08:00:00Z")
                    .unwrap()
                    .with_timezone(&Utc),
            ),
            html_url: format!("https://github.com/{full_name}"),
        }
    }

    #[test]
    fn render_lists_repositories() {
        let repos = vec![
            repository("octo/api", false, Some("Rust")),
            repository("octo/secret", true, None),
        ];
        let mut output = Vec::new();
        render(&mut output, &repos, false).unwrap();
        assert_snapshot!(String::from_utf8(output).unwrap(), @r"
        octo/api  [public]  Rust  updated 2025-02-01T08:00:00Z
        octo/secret  [private]  -  updated 2025-02-01T08:00:00Z
        ");
    }

    #[test]
    fn render_json_keeps_fields() {
        let repos = vec![repository("octo/api", false, Some("Rust"))];
        let mut output = Vec::new();
        render(&mut output, &repos, true).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&output).unwrap();
        assert_eq!(value[0]["full_name"], "octo/api");
        assert_eq!(value[0]["stargazers_count"], 3);
    }
}
