use crate::expr::Filter;
use crate::links::{LinkSource, file_name_for, resolve_link};
use crate::retrieval::{Pause, RetryPolicy, Retriever, fetch_with_retry};
use log::{debug, info, warn};
use serde::Serialize;
use serde_json::json;
use std::collections::HashSet;
use std::fmt::Write;
use std::path::Path;

/// Links accepted by the filter, resolved against `base` (when given)
/// and de-duplicated, in the order the source listed them
pub fn select_links(source: &impl LinkSource, base: Option<&str>, filter: &Filter) -> Selection {
    let links = source.links();
    let examined = links.len();
    let mut seen = HashSet::new();
    let mut accepted = Vec::new();

    for link in links {
        let absolute = match base {
            Some(base) => resolve_link(base, &link),
            None => link,
        };
        if !filter.matches(&absolute) {
            debug!("rejected {absolute}");
            continue;
        }
        if seen.insert(absolute.clone()) {
            debug!("accepted {absolute}");
            accepted.push(absolute);
        }
    }

    Selection { examined, accepted }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Selection {
    /// Number of links the source produced
    pub examined: usize,
    pub accepted: Vec<String>,
}

impl Selection {
    /// Fold in the selection of another page, keeping links unique
    pub fn merge(&mut self, other: Selection) {
        self.examined += other.examined;
        for link in other.accepted {
            if !self.accepted.contains(&link) {
                self.accepted.push(link);
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Downloaded {
    pub url: String,
    pub file_name: String,
    pub bytes: u64,
    /// The link pointed at the destination file itself, which was left alone
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub already_present: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedDownload {
    pub url: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HarvestReport {
    pub examined: usize,
    pub accepted: usize,
    pub downloaded: Vec<Downloaded>,
    pub failed: Vec<FailedDownload>,
}

impl HarvestReport {
    pub fn merge(&mut self, other: HarvestReport) {
        self.examined += other.examined;
        self.accepted += other.accepted;
        self.downloaded.extend(other.downloaded);
        self.failed.extend(other.failed);
    }
}

/// Downloads the accepted links of one or more pages into a directory
///
/// File names are claimed for the whole run, so two links ending in the same
/// name never overwrite each other (`x.pdf`, then `x-1.pdf`), and a URL
/// accepted on several pages is fetched once.
pub struct Harvester<'a, R, P> {
    retriever: &'a mut R,
    pause: &'a mut P,
    policy: RetryPolicy,
    output_dir: &'a Path,
    claimed: HashSet<String>,
    fetched: HashSet<String>,
}

impl<'a, R: Retriever, P: Pause> Harvester<'a, R, P> {
    pub fn new(
        retriever: &'a mut R,
        pause: &'a mut P,
        policy: RetryPolicy,
        output_dir: &'a Path,
    ) -> Self {
        Self {
            retriever,
            pause,
            policy,
            output_dir,
            claimed: HashSet::new(),
            fetched: HashSet::new(),
        }
    }

    /// Select the links `filter` accepts and download each of them
    pub fn harvest(
        &mut self,
        source: &impl LinkSource,
        base: Option<&str>,
        filter: &Filter,
    ) -> HarvestReport {
        let selection = select_links(source, base, filter);
        info!(
            "{} of {} links accepted by {filter}",
            selection.accepted.len(),
            selection.examined
        );

        let mut report = HarvestReport {
            examined: selection.examined,
            accepted: selection.accepted.len(),
            ..HarvestReport::default()
        };

        for url in selection.accepted {
            if !self.fetched.insert(url.clone()) {
                debug!("{url} was already harvested in this run");
                continue;
            }
            let Some(file_name) = file_name_for(&url) else {
                warn!("skipping {url}: no file name in the link");
                report.failed.push(FailedDownload {
                    url,
                    reason: "link has no file name".to_string(),
                });
                continue;
            };
            let file_name = self.claim(&file_name);
            let dest = self.output_dir.join(&file_name);

            match fetch_with_retry(&mut *self.retriever, &mut *self.pause, &url, &dest, &self.policy) {
                Ok(retrieved) => report.downloaded.push(Downloaded {
                    url,
                    file_name,
                    bytes: retrieved.bytes,
                    already_present: retrieved.already_present,
                }),
                Err(err) => {
                    warn!("{err}");
                    report.failed.push(FailedDownload {
                        url,
                        reason: err.to_string(),
                    });
                }
            }
        }

        report
    }

    /// First unclaimed variant of `name`: `name`, `stem-1.ext`, `stem-2.ext`, ...
    fn claim(&mut self, name: &str) -> String {
        if self.claimed.insert(name.to_string()) {
            return name.to_string();
        }
        let (stem, ext) = match name.rfind('.') {
            Some(idx) if idx > 0 => name.split_at(idx),
            _ => (name, ""),
        };
        let mut n = 1;
        loop {
            let candidate = format!("{stem}-{n}{ext}");
            if self.claimed.insert(candidate.clone()) {
                debug!("{name} is taken, saving as {candidate}");
                return candidate;
            }
            n += 1;
        }
    }
}

pub fn format_selection_text(selection: &Selection) -> String {
    let mut out = String::new();
    for link in &selection.accepted {
        let _ = writeln!(out, "{link}");
    }
    out
}

pub fn format_selection_json(sources: &[String], filter: &Filter, selection: &Selection) -> String {
    serde_json::to_string_pretty(&json!({
        "links": {
            "sources": sources,
            "expression": filter.to_string(),
            "examined": selection.examined,
            "accepted": selection.accepted,
        }
    }))
    .unwrap_or_else(|_| "{\"links\":{\"error\":\"failed to serialize links output\"}}".into())
}

pub fn format_report_text(report: &HarvestReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "HARVEST accepted {} of {} link{}",
        report.accepted,
        report.examined,
        if report.examined == 1 { "" } else { "s" }
    );

    if report.downloaded.is_empty() {
        let _ = writeln!(out, "No matching files found or download failed.");
    } else {
        let _ = writeln!(out, "Downloaded files:");
        for item in &report.downloaded {
            if item.already_present {
                let _ = writeln!(
                    out,
                    "  {} ({} bytes, already present)",
                    item.file_name, item.bytes
                );
            } else {
                let _ = writeln!(out, "  {} ({} bytes)", item.file_name, item.bytes);
            }
        }
    }

    if !report.failed.is_empty() {
        let _ = writeln!(out, "Failed:");
        for item in &report.failed {
            let _ = writeln!(out, "  {}: {}", item.url, item.reason);
        }
    }

    out
}

pub fn format_report_json(report: &HarvestReport) -> String {
    serde_json::to_string_pretty(&json!({ "harvest": report }))
        .unwrap_or_else(|_| "{\"harvest\":{\"error\":\"failed to serialize report\"}}".into())
}
